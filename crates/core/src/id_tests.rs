// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::BTreeSet;

#[test]
fn ids_display_as_plain_numbers() {
    assert_eq!(JobExecutionId::new(17).to_string(), "17");
    assert_eq!(StepExecutionId::from(3).get(), 3);
}

#[test]
fn ids_serialize_transparently() {
    let json = serde_json::to_string(&PartitionExecutionId::new(9)).unwrap();
    assert_eq!(json, "9");
    let back: PartitionExecutionId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, PartitionExecutionId::new(9));
}

#[test]
fn ids_order_numerically() {
    let set: BTreeSet<_> = [10, 2, 7].into_iter().map(JobInstanceId::new).collect();
    let ordered: Vec<u64> = set.into_iter().map(JobInstanceId::get).collect();
    assert_eq!(ordered, vec![2, 7, 10]);
}
