// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::{BatchStatus, JobInstance, JobInstanceId, StepExecution, StepExecutionId};

/// A job instance record with fixed timestamps.
pub fn job_instance(id: u64, name: &str) -> JobInstance {
    JobInstance {
        id: JobInstanceId::new(id),
        job_name: name.to_string(),
        create_time_ms: 1_000_000,
    }
}

/// A finished step execution with the given status and exit status.
pub fn finished_step(id: u64, name: &str, status: BatchStatus, exit: &str) -> StepExecution {
    StepExecution::builder()
        .id(StepExecutionId::new(id))
        .step_name(name)
        .batch_status(status)
        .exit_status(exit)
        .build()
}
