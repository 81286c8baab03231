// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Partitioned chunk steps through the operator.

use crate::prelude::*;
use bw_plan::Properties;

fn range(first: i64, count: i64) -> Properties {
    [("first", first.to_string()), ("count", count.to_string())]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

fn partitioned_job() -> JobBuilder {
    let reader = ArtifactRef::new("numbers")
        .property("first", "#{partitionPlan['first']}")
        .property("count", "#{partitionPlan['count']}");
    JobBuilder::new("ranges").element(
        StepBuilder::chunk("load", ChunkBuilder::new(reader, "sink").processor("check").item_count(2))
            .partitions(3, vec![range(0, 5), range(10, 5), range(20, 5)]),
    )
}

#[tokio::test]
async fn partitions_split_the_work_and_the_step_sums_it() {
    let h = Harness::new();
    h.register(partitioned_job());

    let exec = h.run("ranges", JobParameters::new()).await;

    assert_eq!(exec.batch_status, BatchStatus::Completed);
    let mut written = h.written();
    written.sort_unstable();
    let expected: Vec<i64> = (0..5).chain(10..15).chain(20..25).collect();
    similar_asserts::assert_eq!(written, expected);

    let step = &h.operator.get_step_executions(exec.id).unwrap()[0];
    assert_eq!(step.batch_status, BatchStatus::Completed);
    assert_eq!(step.metrics.read_count, 15);
    assert_eq!(step.metrics.write_count, 15);

    let partitions = h.operator.get_partition_executions(step.id).unwrap();
    assert_eq!(partitions.len(), 3);
    assert!(partitions.iter().all(|p| p.metrics.read_count == 5));
}

#[tokio::test]
async fn restart_resumes_unfinished_partitions_without_rewriting() {
    let h = Harness::new();
    h.process_faults.fail(12, "fatal", 1);
    h.register(partitioned_job());

    let first = h.run("ranges", JobParameters::new()).await;
    assert_eq!(first.batch_status, BatchStatus::Failed);

    let second = h.restart(first.id, JobParameters::new()).await;

    assert_eq!(second.batch_status, BatchStatus::Completed);
    let mut written = h.written();
    written.sort_unstable();
    let expected: Vec<i64> = (0..5).chain(10..15).chain(20..25).collect();
    similar_asserts::assert_eq!(written, expected);
    let step = &h.operator.get_step_executions(second.id).unwrap()[0];
    let partitions = h.operator.get_partition_executions(step.id).unwrap();
    assert!(partitions.iter().any(|p| p.partition_index == 1));
    assert!(partitions.iter().all(|p| p.batch_status == BatchStatus::Completed));
}
