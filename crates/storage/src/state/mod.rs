// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized repository state built from mutation events.

use crate::RepositoryError;
use bw_core::{
    BatchStatus, JobExecution, JobExecutionId, JobInstance, JobInstanceId, PartitionExecution,
    PartitionExecutionId, StepExecution, StepExecutionId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single repository mutation, as recorded in the journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RepoEvent {
    JobInstanceCreated { instance: JobInstance },
    JobExecutionCreated { execution: JobExecution },
    JobExecutionUpdated { execution: JobExecution },
    StepExecutionCreated { step: StepExecution },
    StepExecutionUpdated { step: StepExecution },
    PartitionExecutionCreated { partition: PartitionExecution },
    PartitionExecutionUpdated { partition: PartitionExecution },
}

/// All records plus the ordering indexes between them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoState {
    pub instances: BTreeMap<JobInstanceId, JobInstance>,
    pub executions: BTreeMap<JobExecutionId, JobExecution>,
    pub steps: BTreeMap<StepExecutionId, StepExecution>,
    pub partitions: BTreeMap<PartitionExecutionId, PartitionExecution>,
    /// Instance -> executions, oldest first
    pub instance_executions: BTreeMap<JobInstanceId, Vec<JobExecutionId>>,
    /// Execution -> step executions in run order
    pub execution_steps: BTreeMap<JobExecutionId, Vec<StepExecutionId>>,
    /// Step execution -> partitions in creation order
    pub step_partitions: BTreeMap<StepExecutionId, Vec<PartitionExecutionId>>,
    pub last_instance_id: u64,
    pub last_execution_id: u64,
    pub last_step_id: u64,
    pub last_partition_id: u64,
}

impl RepoState {
    /// Apply an event.
    ///
    /// Handlers are idempotent: applying the same event twice leaves the same
    /// state as applying it once, so journal replay after a partial snapshot
    /// is safe. Id counters only move forward.
    pub fn apply(&mut self, event: &RepoEvent) {
        match event {
            RepoEvent::JobInstanceCreated { instance } => {
                self.last_instance_id = self.last_instance_id.max(instance.id.get());
                self.instances.insert(instance.id, instance.clone());
                self.instance_executions.entry(instance.id).or_default();
            }
            RepoEvent::JobExecutionCreated { execution } => {
                self.last_execution_id = self.last_execution_id.max(execution.id.get());
                push_unique(
                    self.instance_executions.entry(execution.instance_id).or_default(),
                    execution.id,
                );
                self.execution_steps.entry(execution.id).or_default();
                self.executions.insert(execution.id, execution.clone());
            }
            RepoEvent::JobExecutionUpdated { execution } => {
                self.executions.insert(execution.id, execution.clone());
            }
            RepoEvent::StepExecutionCreated { step } => {
                self.last_step_id = self.last_step_id.max(step.id.get());
                push_unique(self.execution_steps.entry(step.execution_id).or_default(), step.id);
                self.steps.insert(step.id, step.clone());
            }
            RepoEvent::StepExecutionUpdated { step } => {
                self.steps.insert(step.id, step.clone());
            }
            RepoEvent::PartitionExecutionCreated { partition } => {
                self.last_partition_id = self.last_partition_id.max(partition.id.get());
                push_unique(
                    self.step_partitions.entry(partition.step_execution_id).or_default(),
                    partition.id,
                );
                self.partitions.insert(partition.id, partition.clone());
            }
            RepoEvent::PartitionExecutionUpdated { partition } => {
                self.partitions.insert(partition.id, partition.clone());
            }
        }
    }

    /// Check that an update event targets an existing, mutable record.
    pub fn check(&self, event: &RepoEvent) -> Result<(), RepositoryError> {
        match event {
            RepoEvent::JobExecutionCreated { execution } => {
                if !self.instances.contains_key(&execution.instance_id) {
                    return Err(RepositoryError::NoSuchJobInstance(execution.instance_id));
                }
            }
            RepoEvent::JobExecutionUpdated { execution } => {
                let stored = self
                    .executions
                    .get(&execution.id)
                    .ok_or(RepositoryError::NoSuchJobExecution(execution.id))?;
                let abandoning = execution.batch_status == BatchStatus::Abandoned;
                if stored.batch_status.is_terminal() && !abandoning && stored != execution {
                    return Err(RepositoryError::Immutable {
                        id: stored.id,
                        status: stored.batch_status,
                    });
                }
            }
            RepoEvent::StepExecutionCreated { step } => {
                if !self.executions.contains_key(&step.execution_id) {
                    return Err(RepositoryError::NoSuchJobExecution(step.execution_id));
                }
            }
            RepoEvent::StepExecutionUpdated { step } => {
                if !self.steps.contains_key(&step.id) {
                    return Err(RepositoryError::NoSuchStepExecution(step.id));
                }
            }
            RepoEvent::PartitionExecutionCreated { partition } => {
                if !self.steps.contains_key(&partition.step_execution_id) {
                    return Err(RepositoryError::NoSuchStepExecution(partition.step_execution_id));
                }
            }
            RepoEvent::PartitionExecutionUpdated { partition } => {
                if !self.partitions.contains_key(&partition.id) {
                    return Err(RepositoryError::NoSuchPartitionExecution(partition.id));
                }
            }
            RepoEvent::JobInstanceCreated { .. } => {}
        }
        Ok(())
    }

    /// Step executions of every execution of `instance`, oldest first.
    pub fn instance_steps(&self, instance: JobInstanceId) -> impl Iterator<Item = &StepExecution> {
        self.instance_executions
            .get(&instance)
            .into_iter()
            .flatten()
            .filter_map(|exec| self.execution_steps.get(exec))
            .flatten()
            .filter_map(|id| self.steps.get(id))
    }
}

fn push_unique<T: PartialEq>(list: &mut Vec<T>, item: T) {
    if !list.contains(&item) {
        list.push(item);
    }
}

#[cfg(test)]
#[path = "../state_tests.rs"]
mod tests;
