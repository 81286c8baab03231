// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime contexts handed to batchlets and listeners.

use crate::signals::Signals;
use bw_core::{BatchStatus, JobExecutionId, JobInstanceId, JobParameters, StepExecutionId, StepMetrics};
use bw_plan::Properties;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug)]
struct JobState {
    batch_status: BatchStatus,
    exit_status: Option<String>,
    transient_user_data: Option<Value>,
}

/// View of the running job execution.
#[derive(Debug)]
pub struct JobContext {
    job_name: String,
    instance_id: JobInstanceId,
    execution_id: JobExecutionId,
    params: JobParameters,
    properties: Properties,
    state: Mutex<JobState>,
}

impl JobContext {
    pub(crate) fn new(
        job_name: impl Into<String>,
        instance_id: JobInstanceId,
        execution_id: JobExecutionId,
        params: JobParameters,
        properties: Properties,
    ) -> Self {
        Self {
            job_name: job_name.into(),
            instance_id,
            execution_id,
            params,
            properties,
            state: Mutex::new(JobState {
                batch_status: BatchStatus::Starting,
                exit_status: None,
                transient_user_data: None,
            }),
        }
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn instance_id(&self) -> JobInstanceId {
        self.instance_id
    }

    pub fn execution_id(&self) -> JobExecutionId {
        self.execution_id
    }

    pub fn params(&self) -> &JobParameters {
        &self.params
    }

    /// Resolved job-level property.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn batch_status(&self) -> BatchStatus {
        self.state.lock().batch_status
    }

    pub fn exit_status(&self) -> Option<String> {
        self.state.lock().exit_status.clone()
    }

    pub fn set_exit_status(&self, exit_status: impl Into<String>) {
        self.state.lock().exit_status = Some(exit_status.into());
    }

    pub fn transient_user_data(&self) -> Option<Value> {
        self.state.lock().transient_user_data.clone()
    }

    pub fn set_transient_user_data(&self, data: Value) {
        self.state.lock().transient_user_data = Some(data);
    }

    pub(crate) fn set_batch_status(&self, status: BatchStatus) {
        self.state.lock().batch_status = status;
    }
}

#[derive(Debug, Default)]
struct StepState {
    batch_status: BatchStatus,
    exit_status: Option<String>,
    persistent_user_data: Option<Value>,
    transient_user_data: Option<Value>,
    metrics: StepMetrics,
    failure: Option<String>,
}

/// View of a running step execution, or of one partition of it.
#[derive(Debug)]
pub struct StepContext {
    job: Arc<JobContext>,
    step_name: String,
    step_execution_id: StepExecutionId,
    partition: Option<u32>,
    properties: Properties,
    signals: Signals,
    state: Mutex<StepState>,
}

impl StepContext {
    pub(crate) fn new(
        job: Arc<JobContext>,
        step_name: impl Into<String>,
        step_execution_id: StepExecutionId,
        properties: Properties,
        signals: Signals,
    ) -> Self {
        Self {
            job,
            step_name: step_name.into(),
            step_execution_id,
            partition: None,
            properties,
            signals,
            state: Mutex::new(StepState::default()),
        }
    }

    /// Context of partition `index`, seeded with the partition's prior
    /// persistent data.
    pub(crate) fn for_partition(
        &self,
        index: u32,
        properties: Properties,
        signals: Signals,
        persistent_user_data: Option<Value>,
    ) -> Self {
        let ctx = Self {
            job: Arc::clone(&self.job),
            step_name: self.step_name.clone(),
            step_execution_id: self.step_execution_id,
            partition: Some(index),
            properties,
            signals,
            state: Mutex::new(StepState::default()),
        };
        ctx.state.lock().persistent_user_data = persistent_user_data;
        ctx
    }

    pub fn job(&self) -> &JobContext {
        &self.job
    }

    pub fn step_name(&self) -> &str {
        &self.step_name
    }

    pub fn step_execution_id(&self) -> StepExecutionId {
        self.step_execution_id
    }

    /// Partition index when running inside a partition.
    pub fn partition_index(&self) -> Option<u32> {
        self.partition
    }

    /// Resolved step property (partition plan properties included).
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn batch_status(&self) -> BatchStatus {
        self.state.lock().batch_status
    }

    pub fn exit_status(&self) -> Option<String> {
        self.state.lock().exit_status.clone()
    }

    pub fn set_exit_status(&self, exit_status: impl Into<String>) {
        self.state.lock().exit_status = Some(exit_status.into());
    }

    pub fn persistent_user_data(&self) -> Option<Value> {
        self.state.lock().persistent_user_data.clone()
    }

    /// Saved with the step execution and restored on restart.
    pub fn set_persistent_user_data(&self, data: Value) {
        self.state.lock().persistent_user_data = Some(data);
    }

    pub fn transient_user_data(&self) -> Option<Value> {
        self.state.lock().transient_user_data.clone()
    }

    pub fn set_transient_user_data(&self, data: Value) {
        self.state.lock().transient_user_data = Some(data);
    }

    /// Counters as of the last commit.
    pub fn metrics(&self) -> StepMetrics {
        self.state.lock().metrics
    }

    /// The error that failed the step, once it failed.
    pub fn failure(&self) -> Option<String> {
        self.state.lock().failure.clone()
    }

    pub fn is_stop_requested(&self) -> bool {
        self.signals.is_stop_requested()
    }

    /// Resolves once a stop or force-stop is requested.
    pub async fn stop_requested(&self) {
        self.signals.stop_token().cancelled().await
    }

    pub(crate) fn signals(&self) -> &Signals {
        &self.signals
    }

    pub(crate) fn set_batch_status(&self, status: BatchStatus) {
        self.state.lock().batch_status = status;
    }

    pub(crate) fn set_metrics(&self, metrics: StepMetrics) {
        self.state.lock().metrics = metrics;
    }

    pub(crate) fn set_failure(&self, failure: impl Into<String>) {
        self.state.lock().failure = Some(failure.into());
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
