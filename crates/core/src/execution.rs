// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution history records.
//!
//! These are the rows a repository persists. Parent/child relationships are
//! expressed by id (a step execution carries its job execution id); ordered
//! child lists are owned by the repository.

use crate::{
    BatchStatus, JobExecutionId, JobInstanceId, JobParameters, PartitionExecutionId,
    StepExecutionId, StepMetrics,
};
use serde::{Deserialize, Serialize};

/// Opaque reader/writer progress marker.
pub type Checkpoint = serde_json::Value;

/// Identity of one logical job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInstance {
    pub id: JobInstanceId,
    pub job_name: String,
    pub create_time_ms: u64,
}

/// One run (or restart run) of a job instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobExecution {
    pub id: JobExecutionId,
    pub instance_id: JobInstanceId,
    pub job_name: String,
    pub batch_status: BatchStatus,
    /// Free-form exit status; the batch status name when unset.
    pub exit_status: Option<String>,
    pub params: JobParameters,
    pub create_time_ms: u64,
    pub start_time_ms: Option<u64>,
    pub end_time_ms: Option<u64>,
    pub last_updated_ms: u64,
    /// Element a later restart resumes at, set by a `stop` transition.
    #[serde(default)]
    pub restart_position: Option<String>,
    #[serde(default)]
    pub stop_requested: bool,
}

impl JobExecution {
    pub fn new(
        id: JobExecutionId,
        instance: &JobInstance,
        params: JobParameters,
        now_ms: u64,
    ) -> Self {
        Self {
            id,
            instance_id: instance.id,
            job_name: instance.job_name.clone(),
            batch_status: BatchStatus::Starting,
            exit_status: None,
            params,
            create_time_ms: now_ms,
            start_time_ms: None,
            end_time_ms: None,
            last_updated_ms: now_ms,
            restart_position: None,
            stop_requested: false,
        }
    }

    /// Exit status with the batch-status fallback applied.
    pub fn exit_status_or_default(&self) -> &str {
        self.exit_status
            .as_deref()
            .unwrap_or(self.batch_status.as_str())
    }
}

/// One execution of one step within a job execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepExecution {
    pub id: StepExecutionId,
    pub execution_id: JobExecutionId,
    pub step_name: String,
    pub batch_status: BatchStatus,
    pub exit_status: Option<String>,
    pub start_time_ms: Option<u64>,
    pub end_time_ms: Option<u64>,
    pub metrics: StepMetrics,
    /// Opaque data set by artifacts; carried into the next restart.
    pub persistent_user_data: Option<serde_json::Value>,
    pub reader_checkpoint: Option<Checkpoint>,
    pub writer_checkpoint: Option<Checkpoint>,
    /// Rendered error that failed the step.
    pub failure: Option<String>,
}

impl StepExecution {
    pub fn new(
        id: StepExecutionId,
        execution_id: JobExecutionId,
        step_name: impl Into<String>,
        now_ms: u64,
    ) -> Self {
        Self {
            id,
            execution_id,
            step_name: step_name.into(),
            batch_status: BatchStatus::Starting,
            exit_status: None,
            start_time_ms: Some(now_ms),
            end_time_ms: None,
            metrics: StepMetrics::default(),
            persistent_user_data: None,
            reader_checkpoint: None,
            writer_checkpoint: None,
            failure: None,
        }
    }

    pub fn exit_status_or_default(&self) -> &str {
        self.exit_status
            .as_deref()
            .unwrap_or(self.batch_status.as_str())
    }
}

/// One partition's execution within a partitioned step execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionExecution {
    pub id: PartitionExecutionId,
    pub step_execution_id: StepExecutionId,
    pub partition_index: u32,
    pub batch_status: BatchStatus,
    pub exit_status: Option<String>,
    pub metrics: StepMetrics,
    pub persistent_user_data: Option<serde_json::Value>,
    pub reader_checkpoint: Option<Checkpoint>,
    pub writer_checkpoint: Option<Checkpoint>,
    pub failure: Option<String>,
}

impl PartitionExecution {
    pub fn new(
        id: PartitionExecutionId,
        step_execution_id: StepExecutionId,
        partition_index: u32,
    ) -> Self {
        Self {
            id,
            step_execution_id,
            partition_index,
            batch_status: BatchStatus::Starting,
            exit_status: None,
            metrics: StepMetrics::default(),
            persistent_user_data: None,
            reader_checkpoint: None,
            writer_checkpoint: None,
            failure: None,
        }
    }

    pub fn exit_status_or_default(&self) -> &str {
        self.exit_status
            .as_deref()
            .unwrap_or(self.batch_status.as_str())
    }
}

crate::builder! {
    pub struct StepExecutionBuilder => StepExecution {
        into {
            step_name: String = "step1",
        }
        set {
            id: StepExecutionId = StepExecutionId::new(1),
            execution_id: JobExecutionId = JobExecutionId::new(1),
            batch_status: BatchStatus = BatchStatus::Completed,
            metrics: StepMetrics = StepMetrics::default(),
        }
        option {
            exit_status: String = None,
            start_time_ms: u64 = Some(1_000_000),
            end_time_ms: u64 = Some(1_000_000),
            persistent_user_data: serde_json::Value = None,
            reader_checkpoint: Checkpoint = None,
            writer_checkpoint: Checkpoint = None,
            failure: String = None,
        }
    }
}

#[cfg(test)]
#[path = "execution_tests.rs"]
mod tests;
