// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cooperative stop and force-stop tokens.

use tokio_util::sync::CancellationToken;

/// Stop is observed at checkpoint and element boundaries; kill additionally
/// drops in-flight artifact futures.
#[derive(Debug, Clone, Default)]
pub(crate) struct Signals {
    stop: CancellationToken,
    kill: CancellationToken,
}

impl Signals {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Tokens cancelled with `self` that can also be cancelled on their own,
    /// used to stop sibling partitions without stopping the job.
    pub(crate) fn child(&self) -> Self {
        Self {
            stop: self.stop.child_token(),
            kill: self.kill.child_token(),
        }
    }

    pub(crate) fn request_stop(&self) {
        self.stop.cancel();
    }

    pub(crate) fn kill(&self) {
        self.stop.cancel();
        self.kill.cancel();
    }

    pub(crate) fn is_stop_requested(&self) -> bool {
        self.stop.is_cancelled()
    }

    pub(crate) fn is_killed(&self) -> bool {
        self.kill.is_cancelled()
    }

    pub(crate) fn stop_token(&self) -> &CancellationToken {
        &self.stop
    }

    pub(crate) fn kill_token(&self) -> &CancellationToken {
        &self.kill
    }
}

#[cfg(test)]
#[path = "signals_tests.rs"]
mod tests;
