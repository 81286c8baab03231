// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plugin artifact traits.
//!
//! Artifacts are created fresh for every step or partition execution by the
//! factories in [`crate::ArtifactRegistry`], so stateful implementations
//! never see two executions. Listener traits have no-op defaults.

use crate::{ArtifactError, JobContext, StepContext};
use async_trait::async_trait;
use bw_core::{BatchStatus, Checkpoint, JobParameters, StepExecution};
use bw_plan::{PartitionPlan, Properties};
use std::str::FromStr;

/// Unit of data flowing through a chunk step.
pub type Item = serde_json::Value;

/// Resolved properties handed to an artifact factory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtifactConfig {
    pub name: String,
    pub properties: Properties,
    pub params: JobParameters,
}

impl ArtifactConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Parse a property, `Ok(None)` when it is absent or empty.
    pub fn parse<T: FromStr>(&self, key: &str) -> Result<Option<T>, ArtifactError>
    where
        T::Err: std::fmt::Display,
    {
        match self.get(key).filter(|v| !v.is_empty()) {
            None => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(|e| {
                ArtifactError::new(
                    "config.invalid",
                    format!("{}: property '{key}' = '{raw}': {e}", self.name),
                )
            }),
        }
    }
}

/// A single-call task.
///
/// `stop` may be called from another task while `process` is running; the
/// implementation should make `process` return soon after.
#[async_trait]
pub trait Batchlet: Send + Sync {
    /// Returns the exit status; an empty string keeps the default.
    async fn process(&self, ctx: &StepContext) -> Result<String, ArtifactError>;

    async fn stop(&self) -> Result<(), ArtifactError> {
        Ok(())
    }
}

#[async_trait]
pub trait ItemReader: Send {
    /// Position the reader; `checkpoint` is the last committed one, if any.
    async fn open(&mut self, checkpoint: Option<Checkpoint>) -> Result<(), ArtifactError>;

    /// Next item, `None` at end of data.
    async fn read_item(&mut self) -> Result<Option<Item>, ArtifactError>;

    async fn checkpoint_info(&mut self) -> Result<Option<Checkpoint>, ArtifactError> {
        Ok(None)
    }

    async fn close(&mut self) -> Result<(), ArtifactError> {
        Ok(())
    }
}

#[async_trait]
pub trait ItemProcessor: Send {
    /// Transform an item; `None` filters it out.
    async fn process_item(&mut self, item: &Item) -> Result<Option<Item>, ArtifactError>;
}

#[async_trait]
pub trait ItemWriter: Send {
    async fn open(&mut self, checkpoint: Option<Checkpoint>) -> Result<(), ArtifactError>;

    async fn write_items(&mut self, items: &[Item]) -> Result<(), ArtifactError>;

    async fn checkpoint_info(&mut self) -> Result<Option<Checkpoint>, ArtifactError> {
        Ok(None)
    }

    async fn close(&mut self) -> Result<(), ArtifactError> {
        Ok(())
    }
}

/// Decides when a chunk commits under a custom checkpoint policy.
#[async_trait]
pub trait CheckpointAlgorithm: Send {
    async fn begin_checkpoint(&mut self) -> Result<(), ArtifactError> {
        Ok(())
    }

    /// Asked after every item read.
    async fn is_ready_to_checkpoint(&mut self) -> Result<bool, ArtifactError>;

    async fn end_checkpoint(&mut self) -> Result<(), ArtifactError> {
        Ok(())
    }
}

/// Computes an exit status from the step executions of the preceding element.
#[async_trait]
pub trait Decider: Send {
    async fn decide(&mut self, executions: &[StepExecution]) -> Result<String, ArtifactError>;
}

#[async_trait]
pub trait JobListener: Send + Sync {
    async fn before_job(&self, _ctx: &JobContext) -> Result<(), ArtifactError> {
        Ok(())
    }

    async fn after_job(&self, _ctx: &JobContext) -> Result<(), ArtifactError> {
        Ok(())
    }
}

#[async_trait]
pub trait StepListener: Send + Sync {
    async fn before_step(&self, _ctx: &StepContext) -> Result<(), ArtifactError> {
        Ok(())
    }

    async fn after_step(&self, _ctx: &StepContext) -> Result<(), ArtifactError> {
        Ok(())
    }
}

#[async_trait]
pub trait ChunkListener: Send + Sync {
    async fn before_chunk(&self, _ctx: &StepContext) -> Result<(), ArtifactError> {
        Ok(())
    }

    /// A chunk is about to be rolled back because of `error`.
    async fn on_error(&self, _ctx: &StepContext, _error: &ArtifactError) -> Result<(), ArtifactError> {
        Ok(())
    }

    async fn after_chunk(&self, _ctx: &StepContext) -> Result<(), ArtifactError> {
        Ok(())
    }
}

#[async_trait]
pub trait ItemListener: Send + Sync {
    async fn before_read(&self) -> Result<(), ArtifactError> {
        Ok(())
    }

    async fn after_read(&self, _item: &Item) -> Result<(), ArtifactError> {
        Ok(())
    }

    async fn on_read_error(&self, _error: &ArtifactError) -> Result<(), ArtifactError> {
        Ok(())
    }

    async fn before_process(&self, _item: &Item) -> Result<(), ArtifactError> {
        Ok(())
    }

    async fn after_process(&self, _item: &Item, _result: Option<&Item>) -> Result<(), ArtifactError> {
        Ok(())
    }

    async fn on_process_error(&self, _item: &Item, _error: &ArtifactError) -> Result<(), ArtifactError> {
        Ok(())
    }

    async fn before_write(&self, _items: &[Item]) -> Result<(), ArtifactError> {
        Ok(())
    }

    async fn after_write(&self, _items: &[Item]) -> Result<(), ArtifactError> {
        Ok(())
    }

    async fn on_write_error(&self, _items: &[Item], _error: &ArtifactError) -> Result<(), ArtifactError> {
        Ok(())
    }
}

#[async_trait]
pub trait RetryListener: Send + Sync {
    async fn on_retry_read(&self, _error: &ArtifactError) -> Result<(), ArtifactError> {
        Ok(())
    }

    async fn on_retry_process(&self, _item: &Item, _error: &ArtifactError) -> Result<(), ArtifactError> {
        Ok(())
    }

    async fn on_retry_write(&self, _items: &[Item], _error: &ArtifactError) -> Result<(), ArtifactError> {
        Ok(())
    }
}

#[async_trait]
pub trait SkipListener: Send + Sync {
    async fn on_skip_read(&self, _error: &ArtifactError) -> Result<(), ArtifactError> {
        Ok(())
    }

    async fn on_skip_process(&self, _item: &Item, _error: &ArtifactError) -> Result<(), ArtifactError> {
        Ok(())
    }

    async fn on_skip_write(&self, _items: &[Item], _error: &ArtifactError) -> Result<(), ArtifactError> {
        Ok(())
    }
}

/// Computes the partition plan of a step at run time.
#[async_trait]
pub trait PartitionMapper: Send {
    async fn map_partitions(&mut self) -> Result<PartitionPlan, ArtifactError>;
}

/// Runs inside a partition after every checkpoint and when the partition
/// ends; its data is handed to the step's analyzer.
#[async_trait]
pub trait PartitionCollector: Send {
    async fn collect_partition_data(&mut self) -> Result<Option<serde_json::Value>, ArtifactError>;
}

/// Receives collector data and partition outcomes on the coordinating task.
///
/// Calls from different partitions arrive in no particular order.
#[async_trait]
pub trait PartitionAnalyzer: Send {
    async fn analyze_collector_data(&mut self, _data: serde_json::Value) -> Result<(), ArtifactError> {
        Ok(())
    }

    async fn analyze_status(&mut self, _status: BatchStatus, _exit_status: &str) -> Result<(), ArtifactError> {
        Ok(())
    }
}

/// How a partitioned step ended, as seen by the reducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionOutcome {
    Commit,
    Rollback,
}

bw_core::simple_display! {
    PartitionOutcome {
        Commit => "commit",
        Rollback => "rollback",
    }
}

#[async_trait]
pub trait PartitionReducer: Send {
    async fn begin_partitioned_step(&mut self) -> Result<(), ArtifactError> {
        Ok(())
    }

    async fn before_partitioned_step_completion(&mut self) -> Result<(), ArtifactError> {
        Ok(())
    }

    async fn rollback_partitioned_step(&mut self) -> Result<(), ArtifactError> {
        Ok(())
    }

    async fn after_partitioned_step_completion(
        &mut self,
        _outcome: PartitionOutcome,
    ) -> Result<(), ArtifactError> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "artifact_tests.rs"]
mod tests;
