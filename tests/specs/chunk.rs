// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chunk steps: checkpoints, retries and skips seen through the operator.

use crate::prelude::*;

fn chunk_job(chunk: ChunkBuilder) -> JobBuilder {
    JobBuilder::new("numbers").element(StepBuilder::chunk("load", chunk))
}

#[tokio::test]
async fn restart_after_a_write_failure_writes_each_item_once() {
    let h = Harness::new();
    h.write_faults.fail(7, "io.disk", 1);
    h.register(chunk_job(number_chunk(10).item_count(3)));

    let first = h.run("numbers", JobParameters::new()).await;
    assert_eq!(first.batch_status, BatchStatus::Failed);
    assert_eq!(h.written(), vec![0, 1, 2, 3, 4, 5]);

    let second = h.restart(first.id, JobParameters::new()).await;

    assert_eq!(second.batch_status, BatchStatus::Completed);
    similar_asserts::assert_eq!(h.written(), (0..10).collect::<Vec<_>>());
    let step = &h.operator.get_step_executions(second.id).unwrap()[0];
    assert_eq!(step.metrics.read_count, 4);
    assert_eq!(step.metrics.write_count, 4);
}

#[tokio::test]
async fn retryable_read_is_attempted_retry_limit_plus_one_times() {
    let h = Harness::new();
    h.read_faults.fail(4, "io.timeout", 100);
    h.register(chunk_job(
        number_chunk(10)
            .item_count(5)
            .retryable(ErrorFilter::new().include("io"))
            .retry_limit(2u32),
    ));

    let exec = h.run("numbers", JobParameters::new()).await;

    assert_eq!(exec.batch_status, BatchStatus::Failed);
    assert_eq!(h.trace.count("read 4"), 3);
}

#[tokio::test]
async fn transient_processor_failure_is_retried_and_the_job_completes() {
    let h = Harness::new();
    h.process_faults.fail(3, "io.busy", 1);
    h.register(chunk_job(
        number_chunk(6)
            .item_count(10)
            .retryable(ErrorFilter::new().include("io")),
    ));

    let exec = h.run("numbers", JobParameters::new()).await;

    assert_eq!(exec.batch_status, BatchStatus::Completed);
    assert_eq!(h.written(), vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(h.trace.count("process 3"), 2);
}

#[yare::parameterized(
    within_limit = { &[2, 5], BatchStatus::Completed },
    over_limit = { &[2, 5, 8], BatchStatus::Failed },
)]
#[test_macro(tokio::test)]
async fn skip_limit_bounds_skipped_items(bad: &[i64], expected: BatchStatus) {
    let h = Harness::new();
    for item in bad {
        h.process_faults.fail(*item, "data.bad", 1);
    }
    h.register(chunk_job(
        number_chunk(10)
            .item_count(4)
            .skippable(ErrorFilter::new().include("data"))
            .skip_limit(2u32),
    ));

    let exec = h.run("numbers", JobParameters::new()).await;

    assert_eq!(exec.batch_status, expected);
    let step = &h.operator.get_step_executions(exec.id).unwrap()[0];
    assert_eq!(step.metrics.process_skip_count, 2);
    if expected == BatchStatus::Completed {
        assert_eq!(h.written(), vec![0, 1, 3, 4, 6, 7, 8, 9]);
    }
}
