// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! bw-core: Core records and state types for the Batchwork execution engine

pub mod macros;

pub mod clock;
pub mod execution;
pub mod id;
pub mod metrics;
pub mod params;
pub mod status;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use execution::{
    Checkpoint, JobExecution, JobInstance, PartitionExecution, StepExecution,
};
pub use id::{JobExecutionId, JobInstanceId, PartitionExecutionId, StepExecutionId};
pub use metrics::StepMetrics;
pub use params::{JobParameters, RESTART_POSITION_PARAM};
pub use status::BatchStatus;
