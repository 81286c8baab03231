// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Services shared by every execution of one operator.

use crate::{ArtifactRegistry, EngineConfig};
use bw_core::Clock;
use bw_storage::Repository;
use std::sync::Arc;
use tokio::sync::Semaphore;

pub(crate) struct Engine<C: Clock> {
    pub repo: Arc<dyn Repository>,
    pub registry: ArtifactRegistry,
    pub config: EngineConfig,
    pub clock: C,
    /// Engine-wide partition permits (`max_workers`).
    pub workers: Arc<Semaphore>,
}

impl<C: Clock> Engine<C> {
    pub(crate) fn new(
        repo: Arc<dyn Repository>,
        registry: ArtifactRegistry,
        config: EngineConfig,
        clock: C,
    ) -> Self {
        let workers = Arc::new(Semaphore::new(config.worker_permits()));
        Self {
            repo,
            registry,
            config,
            clock,
            workers,
        }
    }

    pub(crate) fn now_ms(&self) -> u64 {
        self.clock.epoch_ms()
    }
}
