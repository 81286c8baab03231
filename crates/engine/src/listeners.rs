// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener dispatch.
//!
//! Hooks run in declaration order. A failing hook stops the dispatch and
//! surfaces as a [`Phase::Listener`] step error, except `after_step` and
//! `after_job` which run every listener and report the first failure.

use crate::artifact::{
    ChunkListener, Item, ItemListener, JobListener, RetryListener, SkipListener, StepListener,
};
use crate::registry::ArtifactRegistry;
use crate::{ArtifactError, JobContext, Phase, StepContext, StepError};
use bw_plan::{ArtifactRef, PropertyResolver};
use std::sync::Arc;

fn failed(e: ArtifactError) -> StepError {
    StepError::artifact(Phase::Listener, e)
}

#[derive(Default, Clone)]
pub(crate) struct JobListeners(Vec<Arc<dyn JobListener>>);

impl std::fmt::Debug for JobListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("JobListeners").field(&self.0.len()).finish()
    }
}

impl JobListeners {
    pub(crate) fn create(
        registry: &ArtifactRegistry,
        refs: &[ArtifactRef],
        resolver: &PropertyResolver,
    ) -> Result<Self, StepError> {
        refs.iter()
            .map(|r| registry.create_job_listener(&ArtifactRegistry::config(r, resolver)))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub(crate) async fn before_job(&self, ctx: &JobContext) -> Result<(), StepError> {
        for listener in &self.0 {
            listener.before_job(ctx).await.map_err(failed)?;
        }
        Ok(())
    }

    pub(crate) async fn after_job(&self, ctx: &JobContext) -> Result<(), StepError> {
        let mut first = None;
        for listener in &self.0 {
            if let Err(e) = listener.after_job(ctx).await {
                tracing::warn!(job = ctx.job_name(), error = %e, "listener:after_job failed");
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), |e| Err(failed(e)))
    }
}

/// Every step-scoped listener of one step (or partition).
#[derive(Default, Clone)]
pub(crate) struct Listeners {
    step: Vec<Arc<dyn StepListener>>,
    chunk: Vec<Arc<dyn ChunkListener>>,
    item: Vec<Arc<dyn ItemListener>>,
    retry: Vec<Arc<dyn RetryListener>>,
    skip: Vec<Arc<dyn SkipListener>>,
}

impl Listeners {
    pub(crate) fn create(
        registry: &ArtifactRegistry,
        refs: &[ArtifactRef],
        resolver: &PropertyResolver,
    ) -> Result<Self, StepError> {
        let mut out = Self::default();
        for r in refs {
            let created = registry.step_scoped_listeners(&ArtifactRegistry::config(r, resolver))?;
            out.step.extend(created.step);
            out.chunk.extend(created.chunk);
            out.item.extend(created.item);
            out.retry.extend(created.retry);
            out.skip.extend(created.skip);
        }
        Ok(out)
    }

    pub(crate) async fn before_step(&self, ctx: &StepContext) -> Result<(), StepError> {
        for l in &self.step {
            l.before_step(ctx).await.map_err(failed)?;
        }
        Ok(())
    }

    pub(crate) async fn after_step(&self, ctx: &StepContext) -> Result<(), StepError> {
        let mut first = None;
        for l in &self.step {
            if let Err(e) = l.after_step(ctx).await {
                tracing::warn!(step = ctx.step_name(), error = %e, "listener:after_step failed");
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), |e| Err(failed(e)))
    }

    pub(crate) async fn before_chunk(&self, ctx: &StepContext) -> Result<(), StepError> {
        for l in &self.chunk {
            l.before_chunk(ctx).await.map_err(failed)?;
        }
        Ok(())
    }

    pub(crate) async fn on_chunk_error(&self, ctx: &StepContext, error: &ArtifactError) -> Result<(), StepError> {
        for l in &self.chunk {
            l.on_error(ctx, error).await.map_err(failed)?;
        }
        Ok(())
    }

    pub(crate) async fn after_chunk(&self, ctx: &StepContext) -> Result<(), StepError> {
        for l in &self.chunk {
            l.after_chunk(ctx).await.map_err(failed)?;
        }
        Ok(())
    }

    pub(crate) async fn before_read(&self) -> Result<(), StepError> {
        for l in &self.item {
            l.before_read().await.map_err(failed)?;
        }
        Ok(())
    }

    pub(crate) async fn after_read(&self, item: &Item) -> Result<(), StepError> {
        for l in &self.item {
            l.after_read(item).await.map_err(failed)?;
        }
        Ok(())
    }

    pub(crate) async fn on_read_error(&self, error: &ArtifactError) -> Result<(), StepError> {
        for l in &self.item {
            l.on_read_error(error).await.map_err(failed)?;
        }
        Ok(())
    }

    pub(crate) async fn before_process(&self, item: &Item) -> Result<(), StepError> {
        for l in &self.item {
            l.before_process(item).await.map_err(failed)?;
        }
        Ok(())
    }

    pub(crate) async fn after_process(&self, item: &Item, result: Option<&Item>) -> Result<(), StepError> {
        for l in &self.item {
            l.after_process(item, result).await.map_err(failed)?;
        }
        Ok(())
    }

    pub(crate) async fn on_process_error(&self, item: &Item, error: &ArtifactError) -> Result<(), StepError> {
        for l in &self.item {
            l.on_process_error(item, error).await.map_err(failed)?;
        }
        Ok(())
    }

    pub(crate) async fn before_write(&self, items: &[Item]) -> Result<(), StepError> {
        for l in &self.item {
            l.before_write(items).await.map_err(failed)?;
        }
        Ok(())
    }

    pub(crate) async fn after_write(&self, items: &[Item]) -> Result<(), StepError> {
        for l in &self.item {
            l.after_write(items).await.map_err(failed)?;
        }
        Ok(())
    }

    pub(crate) async fn on_write_error(&self, items: &[Item], error: &ArtifactError) -> Result<(), StepError> {
        for l in &self.item {
            l.on_write_error(items, error).await.map_err(failed)?;
        }
        Ok(())
    }

    pub(crate) async fn on_retry_read(&self, error: &ArtifactError) -> Result<(), StepError> {
        for l in &self.retry {
            l.on_retry_read(error).await.map_err(failed)?;
        }
        Ok(())
    }

    pub(crate) async fn on_retry_process(&self, item: &Item, error: &ArtifactError) -> Result<(), StepError> {
        for l in &self.retry {
            l.on_retry_process(item, error).await.map_err(failed)?;
        }
        Ok(())
    }

    pub(crate) async fn on_retry_write(&self, items: &[Item], error: &ArtifactError) -> Result<(), StepError> {
        for l in &self.retry {
            l.on_retry_write(items, error).await.map_err(failed)?;
        }
        Ok(())
    }

    pub(crate) async fn on_skip_read(&self, error: &ArtifactError) -> Result<(), StepError> {
        for l in &self.skip {
            l.on_skip_read(error).await.map_err(failed)?;
        }
        Ok(())
    }

    pub(crate) async fn on_skip_process(&self, item: &Item, error: &ArtifactError) -> Result<(), StepError> {
        for l in &self.skip {
            l.on_skip_process(item, error).await.map_err(failed)?;
        }
        Ok(())
    }

    pub(crate) async fn on_skip_write(&self, items: &[Item], error: &ArtifactError) -> Result<(), StepError> {
        for l in &self.skip {
            l.on_skip_write(items, error).await.map_err(failed)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "listeners_tests.rs"]
mod tests;
