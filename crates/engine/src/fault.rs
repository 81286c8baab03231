// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry and skip policy of a chunk step.

use crate::ArtifactError;
use bw_plan::{Chunk, ErrorFilter};

/// What the chunk processor does with a failed read, process or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    /// Retry; with `rollback` the chunk is rolled back to its last
    /// checkpoint, otherwise only the failed operation is repeated.
    Retry { rollback: bool },
    /// Drop the offending item (or write buffer) and carry on.
    Skip,
    Fail,
}

/// Retry/skip counters and filters of one step or partition execution.
#[derive(Debug, Clone)]
pub(crate) struct FaultPolicy {
    retryable: ErrorFilter,
    skippable: ErrorFilter,
    no_rollback: ErrorFilter,
    retry_limit: Option<u32>,
    skip_limit: Option<u32>,
    retries: u32,
    skips: u32,
}

impl FaultPolicy {
    pub(crate) fn new(chunk: &Chunk) -> Self {
        Self {
            retryable: chunk.retryable.clone(),
            skippable: chunk.skippable.clone(),
            no_rollback: chunk.no_rollback.clone(),
            retry_limit: chunk.retry_limit,
            skip_limit: chunk.skip_limit,
            retries: 0,
            skips: 0,
        }
    }

    /// Decide and count. Outside retry mode retry wins over skip; while a
    /// rolled-back chunk is being re-processed skip wins over retry.
    ///
    /// A skip counts `items` against the skip limit: one for a read or
    /// process, the buffer size for a write.
    pub(crate) fn decide(&mut self, error: &ArtifactError, retry_mode: bool, items: u32) -> Action {
        let retry = self.can_retry(&error.kind);
        let skip = self.can_skip(&error.kind);
        let action = match (retry_mode, retry, skip) {
            (true, _, true) | (false, false, true) => Action::Skip,
            (_, true, _) => Action::Retry {
                rollback: !self.no_rollback.matches(&error.kind),
            },
            _ => Action::Fail,
        };
        match action {
            Action::Retry { .. } => self.retries += 1,
            Action::Skip => self.skips = self.skips.saturating_add(items),
            Action::Fail => {}
        }
        action
    }

    pub(crate) fn retries(&self) -> u32 {
        self.retries
    }

    pub(crate) fn skips(&self) -> u32 {
        self.skips
    }

    fn can_retry(&self, kind: &str) -> bool {
        within(self.retries, self.retry_limit) && self.retryable.matches(kind)
    }

    fn can_skip(&self, kind: &str) -> bool {
        within(self.skips, self.skip_limit) && self.skippable.matches(kind)
    }
}

fn within(count: u32, limit: Option<u32>) -> bool {
    match limit {
        Some(limit) => count < limit,
        None => true,
    }
}

#[cfg(test)]
#[path = "fault_tests.rs"]
mod tests;
