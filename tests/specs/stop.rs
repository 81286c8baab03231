// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stopping running jobs from the operator.

use crate::prelude::*;
use std::time::Instant;

fn sleepy(batchlet: &str) -> JobBuilder {
    JobBuilder::new("sleepy")
        .element(StepBuilder::batchlet("nap", batchlet).next("after"))
        .element(echo("after", "OK"))
}

#[tokio::test]
async fn stop_interrupts_a_cooperative_batchlet() {
    let h = Harness::new();
    h.register(sleepy("sleeper"));
    let id = h.operator.start("sleepy", JobParameters::new()).unwrap();
    h.until_traced("nap asleep").await;

    h.operator.stop(id).unwrap();
    let exec = h.wait(id).await;

    assert_eq!(exec.batch_status, BatchStatus::Stopped);
    let steps = h.operator.get_step_executions(id).unwrap();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].batch_status, BatchStatus::Stopped);
    assert_eq!(steps[0].exit_status.as_deref(), Some("INTERRUPTED"));
    assert_eq!(h.trace.count("after"), 0);
}

#[tokio::test]
async fn force_stop_abandons_a_batchlet_that_ignores_stop() {
    let h = Harness::new();
    h.register(sleepy("deep_sleeper"));
    let id = h.operator.start("sleepy", JobParameters::new()).unwrap();
    for _ in 0..400 {
        if !h.operator.get_step_executions(id).unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let started = Instant::now();

    h.operator.force_stop(id).unwrap();
    let exec = h.wait(id).await;

    assert_eq!(exec.batch_status, BatchStatus::Stopped);
    assert!(started.elapsed() < SPEC_WAIT);
    assert!(exec.end_time_ms.is_some());
}

#[tokio::test]
async fn a_stopped_job_restarts_at_the_stopped_step() {
    let h = Harness::new();
    h.register(
        JobBuilder::new("resumable")
            .element(echo("s1", "OK").next("nap"))
            .element(StepBuilder::batchlet("nap", "sleeper").next("s3"))
            .element(echo("s3", "OK")),
    );
    let id = h.operator.start("resumable", JobParameters::new()).unwrap();
    h.until_traced("nap asleep").await;
    h.operator.stop(id).unwrap();
    let first = h.wait(id).await;
    assert_eq!(first.batch_status, BatchStatus::Stopped);

    let restarted = h.operator.restart(id, JobParameters::new()).unwrap();
    h.until_traced_times("nap asleep", 2).await;
    h.operator.stop(restarted).unwrap();
    let second = h.wait(restarted).await;

    assert_eq!(second.batch_status, BatchStatus::Stopped);
    assert_eq!(h.steps(restarted), vec!["nap"]);
    assert_eq!(h.trace.count("s1"), 1);
}

#[tokio::test]
async fn stopping_a_finished_execution_is_rejected() {
    let h = Harness::new();
    h.register(JobBuilder::new("quick").element(echo("s1", "OK")));
    let exec = h.run("quick", JobParameters::new()).await;

    let err = h.operator.stop(exec.id).unwrap_err();

    assert!(matches!(err, OperatorError::JobExecutionNotRunning { .. }));
}
