// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chunk-oriented read-process-write loop.
//!
//! Items are read and processed into a buffer until the checkpoint trigger
//! fires, then the buffer is written and the reader/writer checkpoints are
//! persisted with the execution record. That commit is the unit of
//! progress: a restart reopens the reader and writer at the last one.
//!
//! A retryable error rolls the chunk back to the last commit (unless it
//! matches the no-rollback filter, in which case only the failed operation
//! is repeated) and re-processes the rolled-back items one per chunk until
//! the failure point is passed.

use crate::artifact::{Item, ItemProcessor, ItemReader, ItemWriter};
use crate::checkpoint::CheckpointTrigger;
use crate::engine::Engine;
use crate::fault::{Action, FaultPolicy};
use crate::listeners::Listeners;
use crate::partition::CollectorLink;
use crate::registry::ArtifactRegistry;
use crate::{ArtifactError, Phase, StepContext, StepError};
use bw_core::{BatchStatus, Checkpoint, Clock, PartitionExecution, StepExecution, StepMetrics};
use bw_plan::{ArtifactRef, CheckpointPolicy, Chunk, PropertyResolver};
use bw_storage::{Repository, RepositoryError};
use serde_json::Value;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Execution record whose progress a chunk loop commits.
pub(crate) trait Progress: Send {
    fn metrics(&self) -> StepMetrics;
    fn metrics_mut(&mut self) -> &mut StepMetrics;
    /// Last committed reader and writer checkpoints.
    fn checkpoints(&self) -> (Option<Checkpoint>, Option<Checkpoint>);
    fn commit(&mut self, reader: Option<Checkpoint>, writer: Option<Checkpoint>, user_data: Option<Value>);
    fn persist(&self, repo: &dyn Repository) -> Result<(), RepositoryError>;
}

impl Progress for StepExecution {
    fn metrics(&self) -> StepMetrics {
        self.metrics
    }

    fn metrics_mut(&mut self) -> &mut StepMetrics {
        &mut self.metrics
    }

    fn checkpoints(&self) -> (Option<Checkpoint>, Option<Checkpoint>) {
        (self.reader_checkpoint.clone(), self.writer_checkpoint.clone())
    }

    fn commit(&mut self, reader: Option<Checkpoint>, writer: Option<Checkpoint>, user_data: Option<Value>) {
        self.reader_checkpoint = reader;
        self.writer_checkpoint = writer;
        self.persistent_user_data = user_data;
    }

    fn persist(&self, repo: &dyn Repository) -> Result<(), RepositoryError> {
        repo.update_step_execution(self)
    }
}

impl Progress for PartitionExecution {
    fn metrics(&self) -> StepMetrics {
        self.metrics
    }

    fn metrics_mut(&mut self) -> &mut StepMetrics {
        &mut self.metrics
    }

    fn checkpoints(&self) -> (Option<Checkpoint>, Option<Checkpoint>) {
        (self.reader_checkpoint.clone(), self.writer_checkpoint.clone())
    }

    fn commit(&mut self, reader: Option<Checkpoint>, writer: Option<Checkpoint>, user_data: Option<Value>) {
        self.reader_checkpoint = reader;
        self.writer_checkpoint = writer;
        self.persistent_user_data = user_data;
    }

    fn persist(&self, repo: &dyn Repository) -> Result<(), RepositoryError> {
        repo.update_partition_execution(self)
    }
}

enum Fault {
    /// Roll back to the last commit and retry.
    Rollback { error: ArtifactError },
    Fatal(StepError),
    /// Force-stop dropped an in-flight artifact call.
    Killed,
}

impl Fault {
    fn fatal(phase: Phase, error: ArtifactError) -> Self {
        Fault::Fatal(StepError::artifact(phase, error))
    }
}

impl From<StepError> for Fault {
    fn from(e: StepError) -> Self {
        Fault::Fatal(e)
    }
}

/// Run `fut` unless force-stop fires first.
async fn guard<T>(kill: &CancellationToken, fut: impl Future<Output = T>) -> Result<T, Fault> {
    tokio::select! {
        biased;
        _ = kill.cancelled() => Err(Fault::Killed),
        out = fut => Ok(out),
    }
}

enum Read {
    Item(Item),
    Skipped,
    End,
}

pub(crate) struct ChunkRunner<'a, C: Clock, P: Progress> {
    ctx: &'a StepContext,
    listeners: &'a Listeners,
    repo: &'a dyn Repository,
    record: &'a mut P,
    collector: Option<&'a mut CollectorLink>,
    reader: Box<dyn ItemReader>,
    processor: Option<Box<dyn ItemProcessor>>,
    writer: Box<dyn ItemWriter>,
    trigger: CheckpointTrigger<C>,
    policy: FaultPolicy,
    kill: CancellationToken,
    /// Reader positions consumed by the current chunk.
    positions: u64,
    /// Rolled-back positions still to re-process one per chunk.
    retry_remaining: u64,
}

impl<'a, C: Clock, P: Progress> ChunkRunner<'a, C, P> {
    pub(crate) fn new(
        engine: &'a Engine<C>,
        chunk: &Chunk,
        resolver: &PropertyResolver,
        ctx: &'a StepContext,
        listeners: &'a Listeners,
        record: &'a mut P,
        collector: Option<&'a mut CollectorLink>,
    ) -> Result<Self, StepError> {
        let registry = &engine.registry;
        let config = |artifact: &ArtifactRef| ArtifactRegistry::config(artifact, resolver);
        let reader = registry.create_reader(&config(&chunk.reader))?;
        let processor = chunk
            .processor
            .as_ref()
            .map(|p| registry.create_processor(&config(p)))
            .transpose()?;
        let writer = registry.create_writer(&config(&chunk.writer))?;
        let trigger = match &chunk.checkpoint {
            CheckpointPolicy::Item {
                item_count,
                time_limit_secs,
            } => CheckpointTrigger::items(
                item_count.unwrap_or(engine.config.default_item_count),
                *time_limit_secs,
                engine.clock.clone(),
            ),
            CheckpointPolicy::Custom { algorithm } => {
                CheckpointTrigger::custom(registry.create_checkpoint_algorithm(&config(algorithm))?)
            }
        };
        Ok(Self {
            ctx,
            listeners,
            repo: engine.repo.as_ref(),
            record,
            collector,
            reader,
            processor,
            writer,
            trigger,
            policy: FaultPolicy::new(chunk),
            kill: ctx.signals().kill_token().clone(),
            positions: 0,
            retry_remaining: 0,
        })
    }

    /// Process chunks until the reader is exhausted or a stop is observed.
    ///
    /// Returns COMPLETED or STOPPED; an error means the step failed and the
    /// uncommitted chunk was discarded.
    pub(crate) async fn run(mut self) -> Result<BatchStatus, StepError> {
        let (reader_cp, writer_cp) = self.record.checkpoints();
        if let Err(fault) = self.open(reader_cp, writer_cp).await {
            return self.abort(fault, None).await;
        }
        let status = loop {
            if self.ctx.is_stop_requested() {
                break BatchStatus::Stopped;
            }
            let baseline = self.record.metrics();
            let fault = match self.chunk().await {
                Ok(true) => break BatchStatus::Completed,
                Ok(false) => continue,
                Err(Fault::Rollback { error }) => match self.rollback(&baseline, error).await {
                    Ok(()) => continue,
                    Err(fault) => fault,
                },
                Err(fault) => fault,
            };
            return self.abort(fault, Some(baseline)).await;
        };
        if let Err(fault) = self.close().await {
            return self.abort(fault, None).await;
        }
        Ok(status)
    }

    /// One chunk; true once the reader is exhausted.
    async fn chunk(&mut self) -> Result<bool, Fault> {
        self.listeners.before_chunk(self.ctx).await?;
        self.trigger
            .begin()
            .await
            .map_err(|e| Fault::fatal(Phase::Checkpoint, e))?;
        self.positions = 0;
        let mut buffer = Vec::new();
        let mut depleted = false;
        loop {
            let ready = match self.read().await? {
                Read::End => {
                    depleted = true;
                    break;
                }
                Read::Skipped => {
                    self.positions += 1;
                    false
                }
                Read::Item(item) => {
                    self.positions += 1;
                    if let Some(out) = self.process(item).await? {
                        buffer.push(out);
                    }
                    self.trigger
                        .item_read()
                        .await
                        .map_err(|e| Fault::fatal(Phase::Checkpoint, e))?
                }
            };
            if ready || self.retry_remaining > 0 || self.ctx.is_stop_requested() {
                break;
            }
        }

        if self.positions > 0 {
            self.write(buffer).await?;
            self.commit().await?;
        }
        self.trigger
            .end()
            .await
            .map_err(|e| Fault::fatal(Phase::Checkpoint, e))?;
        self.listeners.after_chunk(self.ctx).await?;
        if let Some(collector) = self.collector.as_deref_mut() {
            collector.collect().await?;
        }
        self.retry_remaining = self.retry_remaining.saturating_sub(self.positions);
        Ok(depleted)
    }

    async fn read(&mut self) -> Result<Read, Fault> {
        loop {
            self.listeners.before_read().await?;
            let error = match guard(&self.kill, self.reader.read_item()).await? {
                Ok(Some(item)) => {
                    self.listeners.after_read(&item).await?;
                    self.record.metrics_mut().read_count += 1;
                    return Ok(Read::Item(item));
                }
                Ok(None) => return Ok(Read::End),
                Err(e) => e,
            };
            self.listeners.on_read_error(&error).await?;
            match self.policy.decide(&error, self.retry_remaining > 0, 1) {
                Action::Retry { rollback } => {
                    tracing::info!(
                        step = self.ctx.step_name(),
                        partition = ?self.ctx.partition_index(),
                        error = %error,
                        rollback,
                        "chunk:retry read"
                    );
                    self.listeners.on_retry_read(&error).await?;
                    if rollback {
                        // the failed read is a position the retry must pass
                        self.positions += 1;
                        return Err(Fault::Rollback { error });
                    }
                }
                Action::Skip => {
                    tracing::info!(step = self.ctx.step_name(), error = %error, "chunk:skip read");
                    self.listeners.on_skip_read(&error).await?;
                    self.record.metrics_mut().read_skip_count += 1;
                    return Ok(Read::Skipped);
                }
                Action::Fail => return Err(Fault::fatal(Phase::Read, error)),
            }
        }
    }

    /// `None` when the item was filtered or skipped.
    async fn process(&mut self, item: Item) -> Result<Option<Item>, Fault> {
        let Some(processor) = self.processor.as_mut() else {
            return Ok(Some(item));
        };
        loop {
            self.listeners.before_process(&item).await?;
            let error = match guard(&self.kill, processor.process_item(&item)).await? {
                Ok(out) => {
                    self.listeners.after_process(&item, out.as_ref()).await?;
                    if out.is_none() {
                        self.record.metrics_mut().filter_count += 1;
                    }
                    return Ok(out);
                }
                Err(e) => e,
            };
            self.listeners.on_process_error(&item, &error).await?;
            match self.policy.decide(&error, self.retry_remaining > 0, 1) {
                Action::Retry { rollback } => {
                    tracing::info!(
                        step = self.ctx.step_name(),
                        partition = ?self.ctx.partition_index(),
                        error = %error,
                        rollback,
                        "chunk:retry process"
                    );
                    self.listeners.on_retry_process(&item, &error).await?;
                    if rollback {
                        return Err(Fault::Rollback { error });
                    }
                }
                Action::Skip => {
                    tracing::info!(step = self.ctx.step_name(), error = %error, "chunk:skip process");
                    self.listeners.on_skip_process(&item, &error).await?;
                    self.record.metrics_mut().process_skip_count += 1;
                    return Ok(None);
                }
                Action::Fail => return Err(Fault::fatal(Phase::Process, error)),
            }
        }
    }

    async fn write(&mut self, buffer: Vec<Item>) -> Result<(), Fault> {
        if buffer.is_empty() {
            return Ok(());
        }
        let weight = u32::try_from(buffer.len()).unwrap_or(u32::MAX);
        loop {
            self.listeners.before_write(&buffer).await?;
            let error = match guard(&self.kill, self.writer.write_items(&buffer)).await? {
                Ok(()) => {
                    self.listeners.after_write(&buffer).await?;
                    self.record.metrics_mut().write_count += buffer.len() as u64;
                    return Ok(());
                }
                Err(e) => e,
            };
            self.listeners.on_write_error(&buffer, &error).await?;
            match self.policy.decide(&error, self.retry_remaining > 0, weight) {
                Action::Retry { rollback } => {
                    tracing::info!(
                        step = self.ctx.step_name(),
                        partition = ?self.ctx.partition_index(),
                        error = %error,
                        rollback,
                        "chunk:retry write"
                    );
                    self.listeners.on_retry_write(&buffer, &error).await?;
                    if rollback {
                        return Err(Fault::Rollback { error });
                    }
                }
                Action::Skip => {
                    // the whole buffer is dropped; the limit was charged per item
                    tracing::info!(step = self.ctx.step_name(), error = %error, items = buffer.len(), "chunk:skip write");
                    self.listeners.on_skip_write(&buffer, &error).await?;
                    self.record.metrics_mut().write_skip_count += 1;
                    return Ok(());
                }
                Action::Fail => return Err(Fault::fatal(Phase::Write, error)),
            }
        }
    }

    /// Persist reader/writer checkpoints with the record.
    async fn commit(&mut self) -> Result<(), Fault> {
        let reader_cp = guard(&self.kill, self.reader.checkpoint_info())
            .await?
            .map_err(|e| Fault::fatal(Phase::Checkpoint, e))?;
        let writer_cp = guard(&self.kill, self.writer.checkpoint_info())
            .await?
            .map_err(|e| Fault::fatal(Phase::Checkpoint, e))?;
        self.record.metrics_mut().commit_count += 1;
        self.record
            .commit(reader_cp, writer_cp, self.ctx.persistent_user_data());
        self.record
            .persist(self.repo)
            .map_err(|e| Fault::Fatal(e.into()))?;
        let metrics = self.record.metrics();
        self.ctx.set_metrics(metrics);
        tracing::debug!(
            step = self.ctx.step_name(),
            partition = ?self.ctx.partition_index(),
            read = metrics.read_count,
            written = metrics.write_count,
            commits = metrics.commit_count,
            "chunk:committed"
        );
        Ok(())
    }

    async fn rollback(&mut self, baseline: &StepMetrics, error: ArtifactError) -> Result<(), Fault> {
        tracing::warn!(
            step = self.ctx.step_name(),
            partition = ?self.ctx.partition_index(),
            error = %error,
            "chunk:rollback"
        );
        self.record.metrics_mut().rollback_to(baseline);
        self.ctx.set_metrics(self.record.metrics());
        self.listeners.on_chunk_error(self.ctx, &error).await?;
        self.close().await?;
        let (reader_cp, writer_cp) = self.record.checkpoints();
        self.open(reader_cp, writer_cp).await?;
        self.retry_remaining = self.retry_remaining.max(self.positions.max(1));
        Ok(())
    }

    async fn open(&mut self, reader_cp: Option<Checkpoint>, writer_cp: Option<Checkpoint>) -> Result<(), Fault> {
        guard(&self.kill, self.reader.open(reader_cp))
            .await?
            .map_err(|e| Fault::fatal(Phase::Open, e))?;
        guard(&self.kill, self.writer.open(writer_cp))
            .await?
            .map_err(|e| Fault::fatal(Phase::Open, e))
    }

    async fn close(&mut self) -> Result<(), Fault> {
        let reader = guard(&self.kill, self.reader.close()).await?;
        let writer = guard(&self.kill, self.writer.close()).await?;
        reader
            .and(writer)
            .map_err(|e| Fault::fatal(Phase::Close, e))
    }

    /// Discard the uncommitted chunk and end the loop.
    async fn abort(mut self, fault: Fault, baseline: Option<StepMetrics>) -> Result<BatchStatus, StepError> {
        if let Some(baseline) = baseline {
            self.record.metrics_mut().rollback_to(&baseline);
            self.ctx.set_metrics(self.record.metrics());
        }
        match fault {
            Fault::Killed => {
                tracing::info!(step = self.ctx.step_name(), "chunk:killed");
                Ok(BatchStatus::Stopped)
            }
            Fault::Fatal(error) => {
                let cause = match &error {
                    StepError::Artifact { source, .. } => source.clone(),
                    other => ArtifactError::new("step", other.to_string()),
                };
                if let Err(e) = self.listeners.on_chunk_error(self.ctx, &cause).await {
                    tracing::warn!(step = self.ctx.step_name(), error = %e, "chunk:error listener failed");
                }
                if let Err(Fault::Fatal(close_err)) = self.close().await {
                    tracing::warn!(step = self.ctx.step_name(), error = %close_err, "chunk:close failed");
                }
                Err(error)
            }
            Fault::Rollback { error } => Err(StepError::artifact(Phase::Checkpoint, error)),
        }
    }
}

#[cfg(test)]
#[path = "chunk_tests.rs"]
mod tests;
