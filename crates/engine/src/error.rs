// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error types

use bw_core::{BatchStatus, JobExecutionId};
use bw_plan::PlanError;
use bw_storage::RepositoryError;
use thiserror::Error;

/// Error returned by every plugin artifact.
///
/// `kind` is a dotted hierarchical name (`io.timeout`); retry, skip and
/// no-rollback filters match it or any of its dot-prefixes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ArtifactError {
    pub kind: String,
    pub message: String,
}

impl ArtifactError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Where an artifact error surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Instantiate,
    Open,
    Read,
    Process,
    Write,
    Checkpoint,
    Close,
    Batchlet,
    Listener,
    Decision,
    Partition,
}

bw_core::simple_display! {
    Phase {
        Instantiate => "instantiate",
        Open => "open",
        Read => "read",
        Process => "process",
        Write => "write",
        Checkpoint => "checkpoint",
        Close => "close",
        Batchlet => "batchlet",
        Listener => "listener",
        Decision => "decision",
        Partition => "partition",
    }
}

/// Errors that fail a step (and, unless a transition rule catches it, the
/// job).
#[derive(Debug, Error)]
pub enum StepError {
    #[error("{phase} failed: {source}")]
    Artifact {
        phase: Phase,
        #[source]
        source: ArtifactError,
    },
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("plan error: {0}")]
    Plan(#[from] PlanError),
    #[error("step '{step}' reached its start limit of {limit}")]
    StartLimit { step: String, limit: u32 },
    #[error("transition loops back to already executed step '{0}'")]
    LoopBack(String),
    #[error("{failed} of {total} partitions failed")]
    Partitions { failed: usize, total: usize },
    #[error("split '{split}' did not finish within {timeout_ms}ms")]
    SplitTimeout { split: String, timeout_ms: u64 },
}

impl StepError {
    pub fn artifact(phase: Phase, source: ArtifactError) -> Self {
        StepError::Artifact { phase, source }
    }

    pub fn phase(&self) -> Option<Phase> {
        match self {
            StepError::Artifact { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

/// Errors returned by [`crate::JobOperator`].
#[derive(Debug, Error)]
pub enum OperatorError {
    #[error("no such job: {0}")]
    NoSuchJob(String),
    #[error("no such job execution: {0}")]
    NoSuchJobExecution(JobExecutionId),
    #[error("job execution {id} is not restartable: {reason}")]
    JobExecutionNotRestartable { id: JobExecutionId, reason: String },
    #[error("job execution {id} is not running ({status})")]
    JobExecutionNotRunning { id: JobExecutionId, status: BatchStatus },
    #[error("job execution {0} is still running")]
    JobExecutionIsRunning(JobExecutionId),
    #[error("no tokio runtime available to launch the job")]
    NoRuntime,
    #[error("plan error: {0}")]
    Plan(#[from] PlanError),
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl OperatorError {
    /// Map a repository miss on an execution id to `NoSuchJobExecution`.
    pub(crate) fn from_lookup(id: JobExecutionId, e: RepositoryError) -> Self {
        match e {
            RepositoryError::NoSuchJobExecution(_) => OperatorError::NoSuchJobExecution(id),
            other => OperatorError::Repository(other),
        }
    }
}

/// Errors loading [`crate::EngineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
