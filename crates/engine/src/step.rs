// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Running a single step: restart bookkeeping, step listeners and dispatch
//! to the batchlet, chunk or partition runner.

use crate::batchlet::run_batchlet;
use crate::chunk::ChunkRunner;
use crate::listeners::Listeners;
use crate::partition::run_partitioned;
use crate::registry::ArtifactRegistry;
use crate::walk::JobRun;
use crate::{StepContext, StepError};
use bw_core::{BatchStatus, Clock, StepExecution};
use bw_plan::{Step, StepTask};
use std::sync::Arc;

/// Outcome of one step, as seen by the walk.
#[derive(Debug)]
pub(crate) struct StepResult {
    pub status: BatchStatus,
    pub exit_status: String,
    pub execution: StepExecution,
    /// An `after_step` listener failed; the step keeps its status but the
    /// job fails.
    pub listener_failed: bool,
}

impl<C: Clock> JobRun<C> {
    /// Run `step`, or replay its prior result when a restart skips it.
    ///
    /// Errors mean the step could not be started at all; failures of the
    /// step itself come back as a FAILED [`StepResult`].
    pub(crate) async fn run_step(&self, step: &Step) -> Result<StepResult, StepError> {
        let repo = &self.engine.repo;
        let prior = repo.find_last_step_execution(self.instance_id, &step.id)?;
        if let Some(prior) = prior.as_ref().filter(|p| p.batch_status == BatchStatus::Completed) {
            let explicit = self.explicit_restart.as_deref() == Some(step.id.as_str());
            if !step.allow_start_if_complete && !explicit {
                tracing::info!(job = %self.job.id, step = %step.id, "step:already completed");
                return Ok(StepResult {
                    status: BatchStatus::Completed,
                    exit_status: prior.exit_status_or_default().to_string(),
                    execution: prior.clone(),
                    listener_failed: false,
                });
            }
        }
        if step.start_limit > 0 {
            let starts = repo.count_step_starts(self.instance_id, &step.id)?;
            if starts >= step.start_limit as usize {
                return Err(StepError::StartLimit {
                    step: step.id.clone(),
                    limit: step.start_limit,
                });
            }
        }

        let mut record = repo.create_step_execution(self.execution_id, &step.id, self.engine.now_ms())?;
        if let Some(prior) = &prior {
            record.persistent_user_data = prior.persistent_user_data.clone();
        }
        // checkpoints only carry over from an unfinished prior run
        let unfinished = prior.filter(|p| p.batch_status != BatchStatus::Completed);
        if let Some(prior) = &unfinished {
            record.reader_checkpoint = prior.reader_checkpoint.clone();
            record.writer_checkpoint = prior.writer_checkpoint.clone();
        }
        record.batch_status = BatchStatus::Started;
        repo.update_step_execution(&record)?;
        tracing::info!(
            job = %self.job.id,
            step = %step.id,
            step_execution_id = %record.id,
            restart = unfinished.is_some(),
            "step:started"
        );

        let ctx = StepContext::new(
            Arc::clone(&self.ctx),
            step.id.clone(),
            record.id,
            self.resolver.resolve_all(&step.properties),
            self.signals.clone(),
        );
        if let Some(data) = record.persistent_user_data.clone() {
            ctx.set_persistent_user_data(data);
        }
        ctx.set_batch_status(BatchStatus::Started);

        let mut listener_failed = false;
        let status = match Listeners::create(&self.engine.registry, &step.listeners, &self.resolver) {
            Err(e) => fail(&ctx, &mut record, e),
            Ok(listeners) => match listeners.before_step(&ctx).await {
                Err(e) => fail(&ctx, &mut record, e),
                Ok(()) => {
                    let status = match self.dispatch(step, &ctx, &listeners, &mut record, unfinished.as_ref()).await {
                        Ok(status) => status,
                        Err(e) => fail(&ctx, &mut record, e),
                    };
                    ctx.set_batch_status(status);
                    if let Err(e) = listeners.after_step(&ctx).await {
                        listener_failed = true;
                        record.failure.get_or_insert_with(|| e.to_string());
                    }
                    status
                }
            },
        };

        record.batch_status = status;
        record.exit_status = ctx.exit_status();
        record.end_time_ms = Some(self.engine.now_ms());
        record.persistent_user_data = ctx.persistent_user_data();
        repo.update_step_execution(&record)?;
        let exit_status = record.exit_status_or_default().to_string();
        tracing::info!(
            job = %self.job.id,
            step = %step.id,
            status = %status,
            exit_status = %exit_status,
            read = record.metrics.read_count,
            written = record.metrics.write_count,
            "step:finished"
        );
        Ok(StepResult {
            status,
            exit_status,
            execution: record,
            listener_failed,
        })
    }

    async fn dispatch(
        &self,
        step: &Step,
        ctx: &StepContext,
        listeners: &Listeners,
        record: &mut StepExecution,
        unfinished: Option<&StepExecution>,
    ) -> Result<BatchStatus, StepError> {
        if let Some(partition) = &step.partition {
            return run_partitioned(&self.engine, step, partition, &self.resolver, ctx, record, unfinished).await;
        }
        match &step.task {
            StepTask::Batchlet(b) => {
                let config = ArtifactRegistry::config(b, &self.resolver);
                let batchlet = self.engine.registry.create_batchlet(&config)?;
                run_batchlet(batchlet, ctx).await
            }
            StepTask::Chunk(chunk) => {
                ChunkRunner::new(&self.engine, chunk, &self.resolver, ctx, listeners, record, None)?
                    .run()
                    .await
            }
        }
    }
}

fn fail(ctx: &StepContext, record: &mut StepExecution, e: StepError) -> BatchStatus {
    tracing::warn!(step = ctx.step_name(), error = %e, "step:failed");
    record.failure = Some(e.to_string());
    ctx.set_failure(e.to_string());
    BatchStatus::Failed
}

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;
