// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! bw-plan: Execution plan model for Batchwork jobs
//!
//! A plan is an already-parsed, read-only tree: a [`Job`] holds an ordered
//! sequence of [`Element`]s (steps, flows, splits and decisions) wired
//! together by `next` attributes and [`Transition`] rules.

mod builder;
mod filter;
mod model;
mod resolve;
mod transition;
mod validate;

pub use builder::{ChunkBuilder, DecisionBuilder, FlowBuilder, JobBuilder, SplitBuilder, StepBuilder};
pub use filter::ErrorFilter;
pub use model::{
    ArtifactRef, CheckpointPolicy, Chunk, Decision, Element, ElementPath, Flow, Job, Partition,
    PartitionPlan, PartitionSource, Properties, Split, Step, StepTask,
};
pub use resolve::PropertyResolver;
pub use transition::{glob_matches, Transition};
pub use validate::{validate, PlanError};
