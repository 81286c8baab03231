// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transition rules decide where a job goes after each element.

use crate::prelude::*;

#[tokio::test]
async fn first_matching_rule_wins() {
    let h = Harness::new();
    h.register(
        JobBuilder::new("rules")
            .element(
                StepBuilder::batchlet("s1", "flaky")
                    .transition(Transition::fail("FAILED"))
                    .transition(Transition::next("*", "s2")),
            )
            .element(echo("s2", "OK")),
    );

    let exec = h.run("rules", JobParameters::new()).await;

    assert_eq!(exec.batch_status, BatchStatus::Failed);
    assert_eq!(h.steps(exec.id), vec!["s1"]);
    assert_eq!(h.trace.count("s2"), 0);
}

#[tokio::test]
async fn stop_on_a_parameterised_exit_status() {
    let h = Harness::new();
    h.register(
        JobBuilder::new("batchlet1")
            .element(
                echo("step1", "#{jobParameters['action']}")
                    .transition(Transition::stop("stop").with_exit_status("stop"))
                    .next("step2"),
            )
            .element(echo("step2", "OK")),
    );

    let stopped = h.run("batchlet1", JobParameters::new().with("action", "stop")).await;

    assert_eq!(stopped.batch_status, BatchStatus::Stopped);
    assert_eq!(stopped.exit_status.as_deref(), Some("stop"));
    let steps = h.operator.get_step_executions(stopped.id).unwrap();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].batch_status, BatchStatus::Completed);
    assert_eq!(steps[0].exit_status.as_deref(), Some("stop"));

    let completed = h.run("batchlet1", JobParameters::new().with("action", "go")).await;

    assert_eq!(completed.batch_status, BatchStatus::Completed);
    assert_eq!(h.steps(completed.id), vec!["step1", "step2"]);
}

#[tokio::test]
async fn end_rule_completes_with_its_exit_status() {
    let h = Harness::new();
    h.register(
        JobBuilder::new("early")
            .element(
                echo("s1", "SHORTCUT")
                    .transition(Transition::end("SHORT*").with_exit_status("EARLY"))
                    .next("s2"),
            )
            .element(echo("s2", "OK")),
    );

    let exec = h.run("early", JobParameters::new()).await;

    assert_eq!(exec.batch_status, BatchStatus::Completed);
    assert_eq!(exec.exit_status.as_deref(), Some("EARLY"));
    assert_eq!(h.steps(exec.id), vec!["s1"]);
}

#[tokio::test]
async fn stop_rule_with_a_restart_target_resumes_there() {
    let h = Harness::new();
    h.register(
        JobBuilder::new("resume")
            .element(echo("s1", "PAUSE").transition(Transition::stop("PAUSE").with_restart("s3")))
            .element(echo("s2", "OK"))
            .element(echo("s3", "OK")),
    );

    let first = h.run("resume", JobParameters::new()).await;
    assert_eq!(first.batch_status, BatchStatus::Stopped);
    assert_eq!(first.restart_position.as_deref(), Some("s3"));

    let second = h.restart(first.id, JobParameters::new()).await;

    assert_eq!(second.batch_status, BatchStatus::Completed);
    assert_eq!(h.steps(second.id), vec!["s3"]);
}
