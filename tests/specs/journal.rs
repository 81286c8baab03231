// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job history survives a process restart with the journal repository.

use crate::prelude::*;
use bw_storage::JournalRepository;

fn job() -> JobBuilder {
    JobBuilder::new("durable")
        .element(echo("s1", "OK").next("s2"))
        .element(StepBuilder::batchlet("s2", "flaky"))
}

fn open(dir: &std::path::Path) -> Harness {
    let h = Harness::with_repo(Arc::new(JournalRepository::open(dir).unwrap()));
    h.register(job());
    h
}

#[tokio::test]
async fn a_failed_run_is_restartable_after_reopening() {
    let dir = tempfile::tempdir().unwrap();

    let failed = {
        let h = open(dir.path());
        h.run("durable", JobParameters::new()).await
    };
    assert_eq!(failed.batch_status, BatchStatus::Failed);

    let h = open(dir.path());
    assert_eq!(h.operator.get_job_execution(failed.id).unwrap(), failed);
    assert_eq!(h.steps(failed.id), vec!["s1", "s2"]);

    h.heal();
    let second = h.restart(failed.id, JobParameters::new()).await;

    assert_eq!(second.batch_status, BatchStatus::Completed);
    assert_eq!(second.instance_id, failed.instance_id);
    assert_eq!(h.steps(second.id), vec!["s2"]);
    assert_eq!(h.trace.count("s1"), 0);
}

#[tokio::test]
async fn compaction_keeps_the_history() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Arc::new(JournalRepository::open(dir.path()).unwrap());
    let h = Harness::with_repo(Arc::clone(&repo) as Arc<dyn bw_storage::Repository>);
    h.register(JobBuilder::new("quick").element(echo("s1", "OK")));
    let done = h.run("quick", JobParameters::new()).await;

    repo.compact().unwrap();
    drop(h);
    drop(repo);

    let reopened = open(dir.path());
    assert_eq!(reopened.operator.get_job_execution(done.id).unwrap(), done);
    assert_eq!(reopened.operator.get_job_instance_count("quick").unwrap(), 1);
}
