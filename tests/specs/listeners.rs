// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener failures and how they surface on the job.

use crate::prelude::*;

#[tokio::test]
async fn after_step_failure_fails_the_job_but_not_the_step() {
    let h = Harness::new();
    h.register(JobBuilder::new("listened").element(echo("s1", "DONE").listener("broken_after_step")));

    let exec = h.run("listened", JobParameters::new()).await;

    assert_eq!(exec.batch_status, BatchStatus::Failed);
    let steps = h.operator.get_step_executions(exec.id).unwrap();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].batch_status, BatchStatus::Completed);
    assert_eq!(steps[0].exit_status.as_deref(), Some("DONE"));
    assert_eq!(h.trace.count("s1"), 1);
}

#[tokio::test]
async fn registering_a_job_with_an_unknown_listener_is_rejected() {
    let h = Harness::new();
    let job = JobBuilder::new("bad")
        .listener("nobody")
        .element(echo("s1", "OK"))
        .build()
        .unwrap();

    let err = h.operator.register_job(job).unwrap_err();

    assert!(err.to_string().contains("nobody"), "{err}");
}
