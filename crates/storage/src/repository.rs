// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backend-agnostic repository contract.

use crate::RepositoryError;
use bw_core::{
    JobExecution, JobExecutionId, JobInstance, JobInstanceId, JobParameters, PartitionExecution,
    StepExecution, StepExecutionId,
};

/// Persists and retrieves execution history.
///
/// Implementations serialize concurrent writes from simultaneously running
/// executions internally, so callers never lock around them. Creation calls
/// assign monotonically increasing ids.
pub trait Repository: Send + Sync {
    fn create_job_instance(&self, job_name: &str, now_ms: u64) -> Result<JobInstance, RepositoryError>;

    /// Create a STARTING execution and append it to the instance's history.
    fn create_job_execution(
        &self,
        instance: JobInstanceId,
        params: JobParameters,
        now_ms: u64,
    ) -> Result<JobExecution, RepositoryError>;

    /// Replace a stored execution. Terminal executions only accept a move to
    /// ABANDONED.
    fn update_job_execution(&self, execution: &JobExecution) -> Result<(), RepositoryError>;

    /// Create a STARTING step execution and append it to the execution's
    /// step list.
    fn create_step_execution(
        &self,
        execution: JobExecutionId,
        step_name: &str,
        now_ms: u64,
    ) -> Result<StepExecution, RepositoryError>;

    fn update_step_execution(&self, step: &StepExecution) -> Result<(), RepositoryError>;

    fn create_partition_execution(
        &self,
        step: StepExecutionId,
        partition_index: u32,
    ) -> Result<PartitionExecution, RepositoryError>;

    fn update_partition_execution(&self, partition: &PartitionExecution) -> Result<(), RepositoryError>;

    /// Distinct job names, sorted.
    fn get_job_names(&self) -> Result<Vec<String>, RepositoryError>;

    fn get_job_instance(&self, id: JobInstanceId) -> Result<JobInstance, RepositoryError>;

    /// Instances of `job_name`, most recent first, paged by `start`/`count`.
    fn get_job_instances(
        &self,
        job_name: &str,
        start: usize,
        count: usize,
    ) -> Result<Vec<JobInstance>, RepositoryError>;

    fn get_job_instance_count(&self, job_name: &str) -> Result<usize, RepositoryError>;

    fn get_job_execution(&self, id: JobExecutionId) -> Result<JobExecution, RepositoryError>;

    /// Executions of one instance, oldest first.
    fn get_job_executions(&self, instance: JobInstanceId) -> Result<Vec<JobExecution>, RepositoryError>;

    /// Step executions of one job execution in the order they ran.
    fn get_step_executions(&self, execution: JobExecutionId) -> Result<Vec<StepExecution>, RepositoryError>;

    fn get_step_execution(&self, id: StepExecutionId) -> Result<StepExecution, RepositoryError>;

    /// Partitions of one step execution ordered by partition index.
    fn get_partition_executions(
        &self,
        step: StepExecutionId,
    ) -> Result<Vec<PartitionExecution>, RepositoryError>;

    /// How many times `step_name` started across every execution of the
    /// instance.
    fn count_step_starts(&self, instance: JobInstanceId, step_name: &str) -> Result<usize, RepositoryError>;

    /// Most recent execution of `step_name` across every execution of the
    /// instance.
    fn find_last_step_execution(
        &self,
        instance: JobInstanceId,
        step_name: &str,
    ) -> Result<Option<StepExecution>, RepositoryError>;
}
