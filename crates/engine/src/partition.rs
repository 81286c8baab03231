// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Partitioned step coordination.
//!
//! Each partition runs the step's batchlet or chunk on its own task with its
//! own artifacts, context and checkpoint stream. Partitions talk to the
//! coordinator only through a channel: collector data and final outcomes
//! are handed to the analyzer on the coordinating task, in arrival order.

use crate::artifact::{PartitionCollector, PartitionOutcome, PartitionReducer};
use crate::batchlet::run_batchlet;
use crate::chunk::ChunkRunner;
use crate::engine::Engine;
use crate::listeners::Listeners;
use crate::registry::ArtifactRegistry;
use crate::{ArtifactError, Phase, StepContext, StepError};
use bw_core::{BatchStatus, Clock, PartitionExecution, StepExecution, StepMetrics};
use bw_plan::{ArtifactRef, Partition, PartitionPlan, PartitionSource, PropertyResolver, Step, StepTask};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

pub(crate) enum PartitionMessage {
    Collected { index: u32, data: Value },
    Finished { index: u32, status: BatchStatus, exit_status: String },
}

/// A partition's collector and its channel to the coordinator.
pub(crate) struct CollectorLink {
    index: u32,
    collector: Box<dyn PartitionCollector>,
    tx: mpsc::UnboundedSender<PartitionMessage>,
}

impl CollectorLink {
    pub(crate) fn new(
        index: u32,
        collector: Box<dyn PartitionCollector>,
        tx: mpsc::UnboundedSender<PartitionMessage>,
    ) -> Self {
        Self { index, collector, tx }
    }

    pub(crate) async fn collect(&mut self) -> Result<(), StepError> {
        let data = self
            .collector
            .collect_partition_data()
            .await
            .map_err(|e| StepError::artifact(Phase::Partition, e))?;
        if let Some(data) = data {
            // the coordinator only goes away once every partition finished
            let _ = self.tx.send(PartitionMessage::Collected {
                index: self.index,
                data,
            });
        }
        Ok(())
    }
}

fn partition_error(e: ArtifactError) -> StepError {
    StepError::artifact(Phase::Partition, e)
}

/// Everything one partition task owns.
struct PartitionTask<C: Clock> {
    engine: Arc<Engine<C>>,
    step: Arc<Step>,
    resolver: PropertyResolver,
    ctx: StepContext,
    record: PartitionExecution,
    collector: Option<ArtifactRef>,
    tx: mpsc::UnboundedSender<PartitionMessage>,
}

impl<C: Clock> PartitionTask<C> {
    async fn run(mut self) -> PartitionExecution {
        let index = self.record.partition_index;
        self.record.batch_status = BatchStatus::Started;
        self.ctx.set_batch_status(BatchStatus::Started);
        let status = match self.persist() {
            Err(e) => self.fail(e),
            // a sibling failed or the job stopped while this one waited
            Ok(()) if self.ctx.is_stop_requested() => BatchStatus::Stopped,
            Ok(()) => match self.work().await {
                Ok(status) => status,
                Err(e) => self.fail(e),
            },
        };

        self.record.batch_status = status;
        self.record.exit_status = self.ctx.exit_status();
        self.record.persistent_user_data = self.ctx.persistent_user_data();
        // an outcome the repository never saw cannot count as finished
        let status = match self.persist() {
            Ok(()) => status,
            Err(e) => {
                let status = self.fail(e);
                self.record.batch_status = status;
                if let Err(e) = self.persist() {
                    tracing::error!(step = %self.step.id, partition = index, error = %e, "partition:persist failed");
                }
                status
            }
        };
        tracing::info!(
            step = %self.step.id,
            partition = index,
            status = %status,
            exit_status = self.record.exit_status_or_default(),
            "partition:finished"
        );
        let _ = self.tx.send(PartitionMessage::Finished {
            index,
            status,
            exit_status: self.record.exit_status_or_default().to_string(),
        });
        self.record
    }

    async fn work(&mut self) -> Result<BatchStatus, StepError> {
        let engine = Arc::clone(&self.engine);
        let registry = &engine.registry;
        let listeners = Listeners::create(registry, &self.step.listeners, &self.resolver)?;
        let mut link = match &self.collector {
            Some(c) => Some(CollectorLink::new(
                self.record.partition_index,
                registry.create_collector(&ArtifactRegistry::config(c, &self.resolver))?,
                self.tx.clone(),
            )),
            None => None,
        };
        match &self.step.task {
            StepTask::Chunk(chunk) => {
                ChunkRunner::new(
                    &engine,
                    chunk,
                    &self.resolver,
                    &self.ctx,
                    &listeners,
                    &mut self.record,
                    link.as_mut(),
                )?
                .run()
                .await
            }
            StepTask::Batchlet(b) => {
                let batchlet = registry.create_batchlet(&ArtifactRegistry::config(b, &self.resolver))?;
                let status = run_batchlet(batchlet, &self.ctx).await?;
                if let Some(link) = link.as_mut() {
                    link.collect().await?;
                }
                Ok(status)
            }
        }
    }

    fn fail(&mut self, e: StepError) -> BatchStatus {
        tracing::warn!(
            step = %self.step.id,
            partition = self.record.partition_index,
            error = %e,
            "partition:failed"
        );
        self.record.failure = Some(e.to_string());
        self.ctx.set_failure(e.to_string());
        BatchStatus::Failed
    }

    fn persist(&self) -> Result<(), StepError> {
        Ok(self.engine.repo.update_partition_execution(&self.record)?)
    }
}

/// Run a partitioned step and merge its partitions into `record`.
///
/// `prior` is the step's previous unfinished execution on restart; only its
/// partitions that did not complete are run again, each from its own
/// checkpoint, unless the plan overrides partitions.
pub(crate) async fn run_partitioned<C: Clock>(
    engine: &Arc<Engine<C>>,
    step: &Step,
    partition: &Partition,
    resolver: &PropertyResolver,
    ctx: &StepContext,
    record: &mut StepExecution,
    prior: Option<&StepExecution>,
) -> Result<BatchStatus, StepError> {
    let registry = &engine.registry;
    let config = |artifact: &ArtifactRef| ArtifactRegistry::config(artifact, resolver);
    let mut reducer = partition
        .reducer
        .as_ref()
        .map(|r| registry.create_reducer(&config(r)))
        .transpose()?;
    let mut analyzer = partition
        .analyzer
        .as_ref()
        .map(|a| registry.create_analyzer(&config(a)))
        .transpose()?;

    if let Some(reducer) = reducer.as_mut() {
        reducer.begin_partitioned_step().await.map_err(partition_error)?;
    }
    let plan = match &partition.source {
        PartitionSource::Static(plan) => plan.clone(),
        PartitionSource::Mapper(m) => registry
            .create_mapper(&config(m))?
            .map_partitions()
            .await
            .map_err(partition_error)?,
    };
    if plan.partitions == 0 {
        return Err(bw_plan::PlanError::InvalidPartitionCount {
            step: step.id.clone(),
        }
        .into());
    }

    let records = partition_records(engine, &plan, record, prior)?;
    let total = records.len();
    tracing::info!(
        step = %step.id,
        partitions = total,
        threads = plan.effective_threads(),
        "partition:begin"
    );

    let group = ctx.signals().child();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let threads = Arc::new(Semaphore::new(plan.effective_threads()));
    let step = Arc::new(step.clone());
    let mut tasks = JoinSet::new();
    for part in records {
        let index = part.partition_index;
        let part_resolver = resolver.with_partition(plan.properties_of(index));
        let part_ctx = ctx.for_partition(
            index,
            part_resolver.resolve_all(&step.properties),
            group.clone(),
            part.persistent_user_data.clone(),
        );
        let task = PartitionTask {
            engine: Arc::clone(engine),
            step: Arc::clone(&step),
            resolver: part_resolver,
            ctx: part_ctx,
            record: part,
            collector: partition.collector.clone(),
            tx: tx.clone(),
        };
        let threads = Arc::clone(&threads);
        let workers = Arc::clone(&engine.workers);
        tasks.spawn(async move {
            let _local = threads.acquire_owned().await.ok();
            let _global = workers.acquire_owned().await.ok();
            task.run().await
        });
    }
    drop(tx);

    let mut analyzer_error = None;
    while let Some(message) = rx.recv().await {
        let result = match (&mut analyzer, message) {
            (analyzer, PartitionMessage::Finished { index, status, exit_status }) => {
                if status == BatchStatus::Failed && !group.is_stop_requested() {
                    tracing::warn!(step = %step.id, partition = index, "partition:stopping siblings");
                    group.request_stop();
                }
                match analyzer {
                    Some(a) => a.analyze_status(status, &exit_status).await,
                    None => Ok(()),
                }
            }
            (Some(a), PartitionMessage::Collected { data, .. }) => a.analyze_collector_data(data).await,
            (None, PartitionMessage::Collected { .. }) => Ok(()),
        };
        if let Err(e) = result {
            tracing::warn!(step = %step.id, error = %e, "partition:analyzer failed");
            if analyzer_error.is_none() {
                group.request_stop();
                analyzer_error = Some(partition_error(e));
            }
        }
    }

    let mut metrics = StepMetrics::default();
    let mut failed = 0;
    let mut stopped = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(part) => {
                metrics.merge(&part.metrics);
                match part.batch_status {
                    BatchStatus::Failed => failed += 1,
                    BatchStatus::Stopped => stopped += 1,
                    _ => {}
                }
            }
            Err(e) => {
                tracing::error!(step = %step.id, error = %e, "partition:task aborted");
                failed += 1;
            }
        }
    }
    record.metrics = metrics;
    ctx.set_metrics(metrics);

    let outcome = match (analyzer_error, failed) {
        (Some(e), _) => Err(e),
        (None, 0) => Ok(if stopped > 0 || ctx.is_stop_requested() {
            BatchStatus::Stopped
        } else {
            BatchStatus::Completed
        }),
        (None, failed) => Err(StepError::Partitions { failed, total }),
    };
    reduce(reducer.as_mut(), outcome).await
}

/// Create this run's partition records, carrying prior progress on restart.
fn partition_records<C: Clock>(
    engine: &Engine<C>,
    plan: &PartitionPlan,
    record: &StepExecution,
    prior: Option<&StepExecution>,
) -> Result<Vec<PartitionExecution>, StepError> {
    let prior_parts = match prior {
        Some(prior) if !plan.partitions_override => engine.repo.get_partition_executions(prior.id)?,
        _ => Vec::new(),
    };
    let mut out = Vec::new();
    if prior_parts.is_empty() {
        for index in 0..plan.partitions {
            out.push(engine.repo.create_partition_execution(record.id, index)?);
        }
        return Ok(out);
    }
    for old in prior_parts {
        if old.batch_status == BatchStatus::Completed {
            continue;
        }
        let mut part = engine.repo.create_partition_execution(record.id, old.partition_index)?;
        part.reader_checkpoint = old.reader_checkpoint;
        part.writer_checkpoint = old.writer_checkpoint;
        part.persistent_user_data = old.persistent_user_data;
        engine.repo.update_partition_execution(&part)?;
        out.push(part);
    }
    Ok(out)
}

/// Run the reducer's completion or rollback hooks for `outcome`.
async fn reduce(
    reducer: Option<&mut Box<dyn PartitionReducer>>,
    outcome: Result<BatchStatus, StepError>,
) -> Result<BatchStatus, StepError> {
    let Some(reducer) = reducer else {
        return outcome;
    };
    let outcome = match outcome {
        Ok(BatchStatus::Completed) => match reducer.before_partitioned_step_completion().await {
            Ok(()) => {
                reducer
                    .after_partitioned_step_completion(PartitionOutcome::Commit)
                    .await
                    .map_err(partition_error)?;
                return Ok(BatchStatus::Completed);
            }
            Err(e) => Err(partition_error(e)),
        },
        other => other,
    };
    reducer.rollback_partitioned_step().await.map_err(partition_error)?;
    reducer
        .after_partitioned_step_completion(PartitionOutcome::Rollback)
        .await
        .map_err(partition_error)?;
    outcome
}

#[cfg(test)]
#[path = "partition_tests.rs"]
mod tests;
