// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! bw-engine: Execution engine for Batchwork jobs
//!
//! [`JobOperator`] launches a registered plan on a tokio task and walks its
//! elements: batchlet and chunk steps, flows, concurrently executed splits
//! and decisions, with partitioned steps fanned out over a bounded pool.
//! Every state change is persisted through a [`bw_storage::Repository`].

mod artifact;
mod batchlet;
mod checkpoint;
mod chunk;
mod config;
mod context;
mod engine;
pub mod env;
mod error;
mod fault;
mod listeners;
pub mod logging;
mod operator;
mod partition;
mod registry;
mod signals;
mod step;
#[cfg(test)]
mod test_support;
mod transition;
mod walk;

pub use artifact::{
    ArtifactConfig, Batchlet, CheckpointAlgorithm, ChunkListener, Decider, Item, ItemListener,
    ItemProcessor, ItemReader, ItemWriter, JobListener, PartitionAnalyzer, PartitionCollector,
    PartitionMapper, PartitionOutcome, PartitionReducer, RetryListener, SkipListener, StepListener,
};
pub use config::EngineConfig;
pub use context::{JobContext, StepContext};
pub use error::{ArtifactError, ConfigError, OperatorError, Phase, StepError};
pub use operator::JobOperator;
pub use registry::ArtifactRegistry;
