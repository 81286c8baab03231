// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable repository: snapshot + write-ahead log in one directory.

use crate::{EventSink, EventStore, RepoEvent, RepoState, RepositoryError, Snapshot, Wal};
use std::path::{Path, PathBuf};

const WAL_FILE: &str = "journal.wal";
const SNAPSHOT_FILE: &str = "snapshot.json";

/// Sink that appends every mutation to the journal.
pub struct Journal {
    wal: Wal,
    snapshot_path: PathBuf,
}

impl EventSink for Journal {
    fn record(&mut self, event: &RepoEvent) -> Result<(), RepositoryError> {
        self.wal.append(event).map(drop)
    }
}

/// Repository persisted under a directory.
pub type JournalRepository = EventStore<Journal>;

impl EventStore<Journal> {
    /// Open (or create) the repository in `dir`, loading the latest snapshot
    /// and replaying journal entries written after it.
    pub fn open(dir: &Path) -> Result<Self, RepositoryError> {
        std::fs::create_dir_all(dir)?;
        let snapshot_path = dir.join(SNAPSHOT_FILE);
        let (mut state, base_seq) = match Snapshot::load(&snapshot_path)? {
            Some(snapshot) => (snapshot.state, snapshot.seq),
            None => (RepoState::default(), 0),
        };

        let wal = Wal::open(&dir.join(WAL_FILE), base_seq)?;
        let entries = wal.entries_after(base_seq)?;
        for entry in &entries {
            state.apply(&entry.event);
        }
        tracing::info!(
            dir = %dir.display(),
            snapshot_seq = base_seq,
            replayed = entries.len(),
            "opened journal repository"
        );

        Ok(Self::with_sink(
            state,
            Journal {
                wal,
                snapshot_path,
            },
        ))
    }

    /// Fold the journal into a fresh snapshot and empty the journal.
    pub fn compact(&self) -> Result<(), RepositoryError> {
        let mut inner = self.inner.lock();
        let seq = inner.sink.wal.write_seq();
        Snapshot::new(seq, inner.state.clone()).save(&inner.sink.snapshot_path)?;
        inner.sink.wal.clear()?;
        tracing::info!(seq, "compacted journal into snapshot");
        Ok(())
    }
}

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;
