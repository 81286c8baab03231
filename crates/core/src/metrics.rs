// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step and partition counters.

use serde::{Deserialize, Serialize};

/// Read/write/skip/filter/commit counters of a step or partition execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepMetrics {
    pub read_count: u64,
    pub write_count: u64,
    pub filter_count: u64,
    pub commit_count: u64,
    pub rollback_count: u64,
    pub read_skip_count: u64,
    pub process_skip_count: u64,
    pub write_skip_count: u64,
}

impl StepMetrics {
    /// Total skips across the read, process and write phases.
    pub fn skip_count(&self) -> u64 {
        self.read_skip_count + self.process_skip_count + self.write_skip_count
    }

    /// Add every counter of `other` into `self`.
    pub fn merge(&mut self, other: &StepMetrics) {
        self.read_count += other.read_count;
        self.write_count += other.write_count;
        self.filter_count += other.filter_count;
        self.commit_count += other.commit_count;
        self.rollback_count += other.rollback_count;
        self.read_skip_count += other.read_skip_count;
        self.process_skip_count += other.process_skip_count;
        self.write_skip_count += other.write_skip_count;
    }

    /// Revert item-level counters to `baseline`, keeping commit and rollback
    /// counts. Used when an uncommitted chunk is rolled back.
    pub fn rollback_to(&mut self, baseline: &StepMetrics) {
        *self = StepMetrics {
            commit_count: self.commit_count,
            rollback_count: self.rollback_count + 1,
            ..*baseline
        };
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
