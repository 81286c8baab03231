// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! bw-storage: Execution history repository for Batchwork
//!
//! One [`Repository`] contract, two backends: an in-memory store and a
//! journal store that appends every mutation to a write-ahead log and
//! rebuilds state by replay.

mod error;
mod journal;
mod repository;
mod snapshot;
mod state;
mod store;
mod wal;

pub use error::RepositoryError;
pub use journal::{Journal, JournalRepository};
pub use repository::Repository;
pub use snapshot::{Snapshot, CURRENT_SNAPSHOT_VERSION};
pub use state::{RepoEvent, RepoState};
pub use store::{EventSink, EventStore, MemoryRepository, Volatile};
pub use wal::{Wal, WalEntry};
