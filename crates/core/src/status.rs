// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batch status lifecycle shared by job, step and partition executions.

use serde::{Deserialize, Serialize};

/// Status of a job, step or partition execution.
///
/// `Starting -> Started -> {Completed, Failed, Stopped, Abandoned}`;
/// `Stopping` is the transient state between a stop request and the next
/// safe suspension point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    #[default]
    Starting,
    Started,
    Stopping,
    Stopped,
    Failed,
    Completed,
    Abandoned,
}

impl BatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Starting => "STARTING",
            BatchStatus::Started => "STARTED",
            BatchStatus::Stopping => "STOPPING",
            BatchStatus::Stopped => "STOPPED",
            BatchStatus::Failed => "FAILED",
            BatchStatus::Completed => "COMPLETED",
            BatchStatus::Abandoned => "ABANDONED",
        }
    }

    /// No further transitions happen once an execution reaches this status.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BatchStatus::Stopped
                | BatchStatus::Failed
                | BatchStatus::Completed
                | BatchStatus::Abandoned
        )
    }

    pub fn is_running(self) -> bool {
        matches!(
            self,
            BatchStatus::Starting | BatchStatus::Started | BatchStatus::Stopping
        )
    }

    /// Only stopped or failed executions may be restarted.
    pub fn is_restartable(self) -> bool {
        matches!(self, BatchStatus::Stopped | BatchStatus::Failed)
    }

    /// Severity used when merging the outcomes of concurrent branches:
    /// a failure outranks a stop, which outranks completion.
    pub fn severity(self) -> u8 {
        match self {
            BatchStatus::Failed => 3,
            BatchStatus::Stopped | BatchStatus::Stopping => 2,
            BatchStatus::Abandoned => 1,
            _ => 0,
        }
    }
}

crate::simple_display! {
    BatchStatus {
        Starting => "STARTING",
        Started => "STARTED",
        Stopping => "STOPPING",
        Stopped => "STOPPED",
        Failed => "FAILED",
        Completed => "COMPLETED",
        Abandoned => "ABANDONED",
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
