// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chunk commit triggers.

use crate::{ArtifactError, CheckpointAlgorithm};
use bw_core::Clock;
use std::time::{Duration, Instant};

/// Decides when the current chunk is full.
pub(crate) enum CheckpointTrigger<C: Clock> {
    /// Commit after `item_count` reads or once `time_limit` has elapsed
    /// since the chunk began, whichever comes first.
    Item {
        item_count: u32,
        time_limit: Option<Duration>,
        clock: C,
        read: u32,
        began: Instant,
    },
    Custom(Box<dyn CheckpointAlgorithm>),
}

impl<C: Clock> CheckpointTrigger<C> {
    pub(crate) fn items(item_count: u32, time_limit_secs: Option<u64>, clock: C) -> Self {
        let began = clock.now();
        CheckpointTrigger::Item {
            item_count: item_count.max(1),
            time_limit: time_limit_secs.filter(|s| *s > 0).map(Duration::from_secs),
            clock,
            read: 0,
            began,
        }
    }

    pub(crate) fn custom(algorithm: Box<dyn CheckpointAlgorithm>) -> Self {
        CheckpointTrigger::Custom(algorithm)
    }

    /// Start a new chunk.
    pub(crate) async fn begin(&mut self) -> Result<(), ArtifactError> {
        match self {
            CheckpointTrigger::Item {
                clock, read, began, ..
            } => {
                *read = 0;
                *began = clock.now();
                Ok(())
            }
            CheckpointTrigger::Custom(algorithm) => algorithm.begin_checkpoint().await,
        }
    }

    /// Count one successfully read item; true when the chunk should commit.
    pub(crate) async fn item_read(&mut self) -> Result<bool, ArtifactError> {
        match self {
            CheckpointTrigger::Item {
                item_count,
                time_limit,
                clock,
                read,
                began,
            } => {
                *read += 1;
                let timed_out = time_limit.is_some_and(|limit| clock.elapsed(*began) >= limit);
                Ok(*read >= *item_count || timed_out)
            }
            CheckpointTrigger::Custom(algorithm) => algorithm.is_ready_to_checkpoint().await,
        }
    }

    /// The chunk committed.
    pub(crate) async fn end(&mut self) -> Result<(), ArtifactError> {
        match self {
            CheckpointTrigger::Item { .. } => Ok(()),
            CheckpointTrigger::Custom(algorithm) => algorithm.end_checkpoint().await,
        }
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
