// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restart resumes where the failed run left off.

use crate::prelude::*;

fn four_steps(first_reruns: bool) -> JobBuilder {
    JobBuilder::new("four")
        .element(echo("s1", "OK").allow_start_if_complete(first_reruns).next("s2"))
        .element(echo("s2", "OK").next("s3"))
        .element(StepBuilder::batchlet("s3", "flaky").next("s4"))
        .element(echo("s4", "OK"))
}

#[tokio::test]
async fn restart_runs_only_the_unfinished_steps() {
    let h = Harness::new();
    h.register(four_steps(false));

    let first = h.run("four", JobParameters::new()).await;
    assert_eq!(first.batch_status, BatchStatus::Failed);
    assert_eq!(h.steps(first.id), vec!["s1", "s2", "s3"]);

    h.heal();
    let second = h.restart(first.id, JobParameters::new()).await;

    assert_eq!(second.batch_status, BatchStatus::Completed);
    assert_eq!(second.instance_id, first.instance_id);
    assert_eq!(h.steps(second.id), vec!["s3", "s4"]);
    assert_eq!(h.trace.count("s1"), 1);
    assert_eq!(h.trace.count("s2"), 1);
}

#[tokio::test]
async fn allow_start_if_complete_reruns_a_finished_step() {
    let h = Harness::new();
    h.register(four_steps(true));

    let first = h.run("four", JobParameters::new()).await;
    h.heal();
    let second = h.restart(first.id, JobParameters::new()).await;

    assert_eq!(second.batch_status, BatchStatus::Completed);
    assert_eq!(h.steps(second.id), vec!["s1", "s3", "s4"]);
}

#[tokio::test]
async fn explicit_restart_position_resumes_there() {
    let h = Harness::new();
    h.register(four_steps(false));

    let first = h.run("four", JobParameters::new()).await;
    h.heal();
    let params = JobParameters::new().with(RESTART_POSITION_PARAM, "s2");
    let second = h.restart(first.id, params).await;

    assert_eq!(second.batch_status, BatchStatus::Completed);
    assert_eq!(h.steps(second.id), vec!["s2", "s3", "s4"]);
    assert_eq!(second.params.get(RESTART_POSITION_PARAM), Some("s2"));
}

#[tokio::test]
async fn restart_of_a_split_reruns_only_the_failed_branch() {
    let h = Harness::new();
    h.register(
        JobBuilder::new("fan")
            .element(
                SplitBuilder::new("p1")
                    .flow(FlowBuilder::new("fa").element(echo("sa", "OK")))
                    .flow(FlowBuilder::new("fb").element(StepBuilder::batchlet("sb", "flaky")))
                    .next("s3"),
            )
            .element(echo("s3", "OK")),
    );

    let first = h.run("fan", JobParameters::new()).await;
    assert_eq!(first.batch_status, BatchStatus::Failed);

    h.heal();
    let second = h.restart(first.id, JobParameters::new()).await;

    assert_eq!(second.batch_status, BatchStatus::Completed);
    assert_eq!(h.steps(second.id), vec!["sb", "s3"]);
    assert_eq!(h.trace.count("sa"), 1);
}

#[tokio::test]
async fn restart_keeps_the_prior_parameters_unless_overridden() {
    let h = Harness::new();
    h.register(
        JobBuilder::new("params")
            .element(echo("s1", "#{jobParameters['tag']}").next("s2"))
            .element(StepBuilder::batchlet("s2", "flaky")),
    );

    let first = h.run("params", JobParameters::new().with("tag", "A").with("other", "x")).await;
    h.heal();
    let second = h.restart(first.id, JobParameters::new().with("tag", "B")).await;

    assert_eq!(second.params.get("tag"), Some("B"));
    assert_eq!(second.params.get("other"), Some("x"));
}
