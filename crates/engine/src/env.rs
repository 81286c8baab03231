// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the engine crate.

use std::time::Duration;

/// Worker pool size override (`BW_MAX_WORKERS`); zero is ignored.
pub fn max_workers() -> Option<usize> {
    std::env::var("BW_MAX_WORKERS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|n| *n > 0)
}

/// Split wait bound override (`BW_SPLIT_TIMEOUT_MS`)
pub fn split_timeout() -> Option<Duration> {
    std::env::var("BW_SPLIT_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Default log level when `RUST_LOG` is unset (`BW_LOG`, else `info`)
pub fn log_level() -> String {
    std::env::var("BW_LOG")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "info".to_string())
}
