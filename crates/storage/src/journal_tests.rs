// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::Repository;
use bw_core::{BatchStatus, JobParameters};
use tempfile::tempdir;

#[test]
fn reopen_replays_every_mutation() {
    let dir = tempdir().unwrap();
    let (exec_id, step_id) = {
        let repo = JournalRepository::open(dir.path()).unwrap();
        let inst = repo.create_job_instance("j", 1).unwrap();
        let exec = repo
            .create_job_execution(inst.id, JobParameters::new().with("k", "v"), 2)
            .unwrap();
        let mut step = repo.create_step_execution(exec.id, "s", 3).unwrap();
        step.reader_checkpoint = Some(serde_json::json!({"offset": 30}));
        step.batch_status = BatchStatus::Failed;
        repo.update_step_execution(&step).unwrap();
        (exec.id, step.id)
    };

    let repo = JournalRepository::open(dir.path()).unwrap();
    let exec = repo.get_job_execution(exec_id).unwrap();
    assert_eq!(exec.params.get("k"), Some("v"));
    let step = repo.get_step_execution(step_id).unwrap();
    assert_eq!(step.batch_status, BatchStatus::Failed);
    assert_eq!(step.reader_checkpoint, Some(serde_json::json!({"offset": 30})));

    // Ids continue after replay
    let next = repo.create_step_execution(exec_id, "t", 4).unwrap();
    assert_eq!(next.id.get(), step_id.get() + 1);
}

#[test]
fn compaction_preserves_state_and_empties_log() {
    let dir = tempdir().unwrap();
    {
        let repo = JournalRepository::open(dir.path()).unwrap();
        let inst = repo.create_job_instance("j", 1).unwrap();
        repo.create_job_execution(inst.id, JobParameters::new(), 2).unwrap();
        repo.compact().unwrap();
        repo.create_job_instance("k", 3).unwrap();
    }
    assert!(dir.path().join("snapshot.json").exists());

    let repo = JournalRepository::open(dir.path()).unwrap();
    assert_eq!(repo.get_job_names().unwrap(), vec!["j", "k"]);
    assert_eq!(repo.state().last_execution_id, 1);
    let wal = Wal::open(&dir.path().join("journal.wal"), 0).unwrap();
    assert_eq!(wal.entries_after(0).unwrap().len(), 1);
}

#[test]
fn corrupt_journal_tail_is_discarded_on_open() {
    let dir = tempdir().unwrap();
    {
        let repo = JournalRepository::open(dir.path()).unwrap();
        repo.create_job_instance("kept", 1).unwrap();
    }
    std::fs::OpenOptions::new()
        .append(true)
        .open(dir.path().join("journal.wal"))
        .and_then(|mut f| std::io::Write::write_all(&mut f, b"{broken\n"))
        .unwrap();

    let repo = JournalRepository::open(dir.path()).unwrap();
    assert_eq!(repo.get_job_names().unwrap(), vec!["kept"]);
    assert!(dir.path().join("journal.bak").exists());
}
