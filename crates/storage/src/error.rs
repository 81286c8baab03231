// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use bw_core::{BatchStatus, JobExecutionId, JobInstanceId, PartitionExecutionId, StepExecutionId};
use thiserror::Error;

/// Errors surfaced by repository backends.
///
/// Every failed mutation is reported; a backend never drops a write silently.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("no job instance with id {0}")]
    NoSuchJobInstance(JobInstanceId),
    #[error("no job execution with id {0}")]
    NoSuchJobExecution(JobExecutionId),
    #[error("no step execution with id {0}")]
    NoSuchStepExecution(StepExecutionId),
    #[error("no partition execution with id {0}")]
    NoSuchPartitionExecution(PartitionExecutionId),
    #[error("job execution {id} is {status} and can no longer change")]
    Immutable { id: JobExecutionId, status: BatchStatus },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot version {found} is newer than supported version {supported}")]
    SnapshotTooNew { found: u32, supported: u32 },
}
