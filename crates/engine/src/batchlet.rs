// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batchlet execution with cooperative stop and force-stop.

use crate::artifact::Batchlet;
use crate::{Phase, StepContext, StepError};
use bw_core::BatchStatus;
use std::sync::Arc;

/// Run a batchlet to completion.
///
/// A stop request is forwarded once to [`Batchlet::stop`] and the batchlet
/// is left to return on its own; force-stop drops the in-flight `process`
/// future. Either way the step ends STOPPED. A non-empty returned string
/// becomes the step's exit status.
pub(crate) async fn run_batchlet(batchlet: Arc<dyn Batchlet>, ctx: &StepContext) -> Result<BatchStatus, StepError> {
    let signals = ctx.signals().clone();
    let process = batchlet.process(ctx);
    tokio::pin!(process);
    let mut stop_forwarded = false;

    let exit_status = loop {
        tokio::select! {
            biased;
            _ = signals.kill_token().cancelled() => {
                tracing::info!(step = ctx.step_name(), partition = ?ctx.partition_index(), "batchlet:killed");
                return Ok(BatchStatus::Stopped);
            }
            _ = signals.stop_token().cancelled(), if !stop_forwarded => {
                stop_forwarded = true;
                tracing::info!(step = ctx.step_name(), partition = ?ctx.partition_index(), "batchlet:stop");
                if let Err(e) = batchlet.stop().await {
                    tracing::warn!(step = ctx.step_name(), error = %e, "batchlet:stop failed");
                }
            }
            result = &mut process => {
                break result.map_err(|e| StepError::artifact(Phase::Batchlet, e))?;
            }
        }
    };

    if !exit_status.is_empty() {
        ctx.set_exit_status(exit_status);
    }
    Ok(if signals.is_stop_requested() {
        BatchStatus::Stopped
    } else {
        BatchStatus::Completed
    })
}

#[cfg(test)]
#[path = "batchlet_tests.rs"]
mod tests;
