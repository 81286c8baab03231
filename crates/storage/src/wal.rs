// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-ahead log of repository mutations.
//!
//! One JSON object per line: `{"seq":N,"event":{...}}`. Every append is
//! flushed and synced before it returns, so a mutation the repository
//! applied is never lost. A torn or corrupt tail found on open is moved
//! aside to a `.bak` file and the log is rewritten with the valid prefix.

use crate::snapshot::rotate_bak_path;
use crate::{RepoEvent, RepositoryError};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    pub seq: u64,
    pub event: RepoEvent,
}

pub struct Wal {
    path: PathBuf,
    file: File,
    write_seq: u64,
}

impl Wal {
    /// Open or create the log. Sequence numbers continue from the larger of
    /// `base_seq` and the last valid entry.
    pub fn open(path: &Path, base_seq: u64) -> Result<Self, RepositoryError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let (entries, clean) = read_entries(path)?;
        if !clean {
            let bak = rotate_bak_path(path);
            tracing::warn!(
                path = %path.display(),
                backup = %bak.display(),
                valid_entries = entries.len(),
                "corrupt journal tail, rotating and keeping valid entries"
            );
            fs::rename(path, &bak)?;
            let mut file = File::create(path)?;
            for entry in &entries {
                write_line(&mut file, entry)?;
            }
            file.sync_all()?;
        }

        let write_seq = entries.last().map_or(0, |e| e.seq).max(base_seq);
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            write_seq,
        })
    }

    /// Append and sync one event, returning its sequence number.
    pub fn append(&mut self, event: &RepoEvent) -> Result<u64, RepositoryError> {
        let entry = WalEntry {
            seq: self.write_seq + 1,
            event: event.clone(),
        };
        write_line(&mut self.file, &entry)?;
        self.file.flush()?;
        self.file.sync_data()?;
        self.write_seq = entry.seq;
        Ok(entry.seq)
    }

    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Valid entries with `seq > after`, stopping at the first corrupt line.
    pub fn entries_after(&self, after: u64) -> Result<Vec<WalEntry>, RepositoryError> {
        let (entries, _) = read_entries(&self.path)?;
        Ok(entries.into_iter().filter(|e| e.seq > after).collect())
    }

    /// Drop every entry. Sequence numbers keep counting from `write_seq`.
    pub fn clear(&mut self) -> Result<(), RepositoryError> {
        let file = File::create(&self.path)?;
        file.sync_all()?;
        self.file = OpenOptions::new().append(true).open(&self.path)?;
        Ok(())
    }
}

fn write_line(file: &mut File, entry: &WalEntry) -> Result<(), RepositoryError> {
    let mut line = serde_json::to_vec(entry)?;
    line.push(b'\n');
    file.write_all(&line)?;
    Ok(())
}

/// Read the valid prefix of a log. The flag is false when a corrupt or
/// unterminated line was found.
fn read_entries(path: &Path) -> Result<(Vec<WalEntry>, bool), RepositoryError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((Vec::new(), true)),
        Err(e) => return Err(e.into()),
    };

    let mut entries = Vec::new();
    let mut rest = bytes.as_slice();
    while !rest.is_empty() {
        let Some(end) = rest.iter().position(|b| *b == b'\n') else {
            return Ok((entries, false));
        };
        let line = &rest[..end];
        rest = &rest[end + 1..];
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice::<WalEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(_) => return Ok((entries, false)),
        }
    }
    Ok((entries, true))
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
