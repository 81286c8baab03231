// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event-sourced repository shared by every backend.
//!
//! A mutation is validated against the current state, handed to the sink,
//! and only applied once the sink accepted it. A sink failure therefore
//! leaves the in-memory view unchanged.

use crate::{RepoEvent, RepoState, Repository, RepositoryError};
use bw_core::{
    JobExecution, JobExecutionId, JobInstance, JobInstanceId, JobParameters, PartitionExecution,
    PartitionExecutionId, StepExecution, StepExecutionId,
};
use parking_lot::Mutex;

/// Where accepted mutations are recorded.
pub trait EventSink: Send {
    fn record(&mut self, event: &RepoEvent) -> Result<(), RepositoryError>;
}

/// Sink that keeps nothing; state lives only in memory.
#[derive(Debug, Default)]
pub struct Volatile;

impl EventSink for Volatile {
    fn record(&mut self, _event: &RepoEvent) -> Result<(), RepositoryError> {
        Ok(())
    }
}

pub(crate) struct Inner<S> {
    pub(crate) state: RepoState,
    pub(crate) sink: S,
}

/// Repository backed by a materialized [`RepoState`] and an [`EventSink`].
pub struct EventStore<S> {
    pub(crate) inner: Mutex<Inner<S>>,
}

/// Non-durable repository for tests and embedded use.
pub type MemoryRepository = EventStore<Volatile>;

impl MemoryRepository {
    pub fn new() -> Self {
        Self::with_sink(RepoState::default(), Volatile)
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: EventSink> EventStore<S> {
    pub fn with_sink(state: RepoState, sink: S) -> Self {
        Self {
            inner: Mutex::new(Inner { state, sink }),
        }
    }

    /// Clone of the current materialized state.
    pub fn state(&self) -> RepoState {
        self.inner.lock().state.clone()
    }

    fn commit(&self, event: RepoEvent) -> Result<(), RepositoryError> {
        let mut inner = self.inner.lock();
        inner.state.check(&event)?;
        inner.sink.record(&event)?;
        inner.state.apply(&event);
        Ok(())
    }

    /// Build a record under the lock (so its id is unique) and commit the
    /// event that creates it.
    fn create<T: Clone>(
        &self,
        build: impl FnOnce(&RepoState) -> T,
        wrap: impl FnOnce(T) -> RepoEvent,
    ) -> Result<T, RepositoryError> {
        let mut inner = self.inner.lock();
        let record = build(&inner.state);
        let event = wrap(record.clone());
        inner.state.check(&event)?;
        inner.sink.record(&event)?;
        inner.state.apply(&event);
        Ok(record)
    }

    fn read<T>(&self, f: impl FnOnce(&RepoState) -> T) -> T {
        f(&self.inner.lock().state)
    }
}

impl<S: EventSink> Repository for EventStore<S> {
    fn create_job_instance(&self, job_name: &str, now_ms: u64) -> Result<JobInstance, RepositoryError> {
        self.create(
            |state| JobInstance {
                id: JobInstanceId::new(state.last_instance_id + 1),
                job_name: job_name.to_string(),
                create_time_ms: now_ms,
            },
            |instance| RepoEvent::JobInstanceCreated { instance },
        )
    }

    fn create_job_execution(
        &self,
        instance: JobInstanceId,
        params: JobParameters,
        now_ms: u64,
    ) -> Result<JobExecution, RepositoryError> {
        let job_instance = self.get_job_instance(instance)?;
        self.create(
            |state| {
                JobExecution::new(
                    JobExecutionId::new(state.last_execution_id + 1),
                    &job_instance,
                    params,
                    now_ms,
                )
            },
            |execution| RepoEvent::JobExecutionCreated { execution },
        )
    }

    fn update_job_execution(&self, execution: &JobExecution) -> Result<(), RepositoryError> {
        self.commit(RepoEvent::JobExecutionUpdated {
            execution: execution.clone(),
        })
    }

    fn create_step_execution(
        &self,
        execution: JobExecutionId,
        step_name: &str,
        now_ms: u64,
    ) -> Result<StepExecution, RepositoryError> {
        self.create(
            |state| {
                StepExecution::new(
                    StepExecutionId::new(state.last_step_id + 1),
                    execution,
                    step_name,
                    now_ms,
                )
            },
            |step| RepoEvent::StepExecutionCreated { step },
        )
    }

    fn update_step_execution(&self, step: &StepExecution) -> Result<(), RepositoryError> {
        self.commit(RepoEvent::StepExecutionUpdated { step: step.clone() })
    }

    fn create_partition_execution(
        &self,
        step: StepExecutionId,
        partition_index: u32,
    ) -> Result<PartitionExecution, RepositoryError> {
        self.create(
            |state| {
                PartitionExecution::new(
                    PartitionExecutionId::new(state.last_partition_id + 1),
                    step,
                    partition_index,
                )
            },
            |partition| RepoEvent::PartitionExecutionCreated { partition },
        )
    }

    fn update_partition_execution(&self, partition: &PartitionExecution) -> Result<(), RepositoryError> {
        self.commit(RepoEvent::PartitionExecutionUpdated {
            partition: partition.clone(),
        })
    }

    fn get_job_names(&self) -> Result<Vec<String>, RepositoryError> {
        Ok(self.read(|state| {
            let mut names: Vec<String> =
                state.instances.values().map(|i| i.job_name.clone()).collect();
            names.sort();
            names.dedup();
            names
        }))
    }

    fn get_job_instance(&self, id: JobInstanceId) -> Result<JobInstance, RepositoryError> {
        self.read(|state| state.instances.get(&id).cloned())
            .ok_or(RepositoryError::NoSuchJobInstance(id))
    }

    fn get_job_instances(
        &self,
        job_name: &str,
        start: usize,
        count: usize,
    ) -> Result<Vec<JobInstance>, RepositoryError> {
        Ok(self.read(|state| {
            state
                .instances
                .values()
                .rev()
                .filter(|i| i.job_name == job_name)
                .skip(start)
                .take(count)
                .cloned()
                .collect()
        }))
    }

    fn get_job_instance_count(&self, job_name: &str) -> Result<usize, RepositoryError> {
        Ok(self.read(|state| {
            state
                .instances
                .values()
                .filter(|i| i.job_name == job_name)
                .count()
        }))
    }

    fn get_job_execution(&self, id: JobExecutionId) -> Result<JobExecution, RepositoryError> {
        self.read(|state| state.executions.get(&id).cloned())
            .ok_or(RepositoryError::NoSuchJobExecution(id))
    }

    fn get_job_executions(&self, instance: JobInstanceId) -> Result<Vec<JobExecution>, RepositoryError> {
        self.read(|state| {
            let ids = state
                .instance_executions
                .get(&instance)
                .ok_or(RepositoryError::NoSuchJobInstance(instance))?;
            Ok(ids
                .iter()
                .filter_map(|id| state.executions.get(id).cloned())
                .collect())
        })
    }

    fn get_step_executions(&self, execution: JobExecutionId) -> Result<Vec<StepExecution>, RepositoryError> {
        self.read(|state| {
            let ids = state
                .execution_steps
                .get(&execution)
                .ok_or(RepositoryError::NoSuchJobExecution(execution))?;
            Ok(ids
                .iter()
                .filter_map(|id| state.steps.get(id).cloned())
                .collect())
        })
    }

    fn get_step_execution(&self, id: StepExecutionId) -> Result<StepExecution, RepositoryError> {
        self.read(|state| state.steps.get(&id).cloned())
            .ok_or(RepositoryError::NoSuchStepExecution(id))
    }

    fn get_partition_executions(
        &self,
        step: StepExecutionId,
    ) -> Result<Vec<PartitionExecution>, RepositoryError> {
        Ok(self.read(|state| {
            let mut parts: Vec<PartitionExecution> = state
                .step_partitions
                .get(&step)
                .into_iter()
                .flatten()
                .filter_map(|id| state.partitions.get(id).cloned())
                .collect();
            parts.sort_by_key(|p| p.partition_index);
            parts
        }))
    }

    fn count_step_starts(&self, instance: JobInstanceId, step_name: &str) -> Result<usize, RepositoryError> {
        Ok(self.read(|state| {
            state
                .instance_steps(instance)
                .filter(|s| s.step_name == step_name)
                .count()
        }))
    }

    fn find_last_step_execution(
        &self,
        instance: JobInstanceId,
        step_name: &str,
    ) -> Result<Option<StepExecution>, RepositoryError> {
        Ok(self.read(|state| {
            state
                .instance_steps(instance)
                .filter(|s| s.step_name == step_name)
                .last()
                .cloned()
        }))
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
