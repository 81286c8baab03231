// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The operator API: launching, restarting, stopping and inspecting job
//! executions.

use crate::engine::Engine;
use crate::signals::Signals;
use crate::walk::JobRun;
use crate::{ArtifactRegistry, EngineConfig, OperatorError};
use bw_core::{
    BatchStatus, Clock, JobExecution, JobExecutionId, JobInstance, JobInstanceId, JobParameters,
    PartitionExecution, StepExecution, StepExecutionId, SystemClock,
};
use bw_plan::{ElementPath, Job, PlanError};
use bw_storage::Repository;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;

/// An execution launched by this operator that has not finished yet.
struct RunHandle {
    job_name: String,
    execution: Arc<Mutex<JobExecution>>,
    signals: Signals,
    done: watch::Receiver<bool>,
}

type Running = Arc<Mutex<HashMap<JobExecutionId, RunHandle>>>;

/// Entry point for running registered jobs.
///
/// `start` and `restart` return as soon as the execution is recorded; the
/// walk runs on a task of the current tokio runtime. Observe completion with
/// [`JobOperator::await_termination`] or by polling the repository.
pub struct JobOperator<C: Clock = SystemClock> {
    engine: Arc<Engine<C>>,
    jobs: RwLock<HashMap<String, Arc<Job>>>,
    running: Running,
}

impl JobOperator {
    pub fn new(repo: Arc<dyn Repository>, registry: ArtifactRegistry, config: EngineConfig) -> Self {
        Self::with_clock(repo, registry, config, SystemClock)
    }
}

impl<C: Clock> JobOperator<C> {
    pub fn with_clock(
        repo: Arc<dyn Repository>,
        registry: ArtifactRegistry,
        config: EngineConfig,
        clock: C,
    ) -> Self {
        Self {
            engine: Arc::new(Engine::new(repo, registry, config, clock)),
            jobs: RwLock::new(HashMap::new()),
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Make `job` startable by its id. The plan is validated and every
    /// artifact it names must be registered.
    pub fn register_job(&self, job: Job) -> Result<(), OperatorError> {
        bw_plan::validate(&job)?;
        self.engine.registry.check(&job)?;
        tracing::debug!(job = %job.id, "operator:registered");
        self.jobs.write().insert(job.id.clone(), Arc::new(job));
        Ok(())
    }

    fn job(&self, name: &str) -> Result<Arc<Job>, OperatorError> {
        self.jobs
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| OperatorError::NoSuchJob(name.to_string()))
    }

    /// Create a new job instance and launch its first execution.
    pub fn start(&self, job_name: &str, params: JobParameters) -> Result<JobExecutionId, OperatorError> {
        let job = self.job(job_name)?;
        let runtime = Handle::try_current().map_err(|_| OperatorError::NoRuntime)?;
        let now = self.engine.now_ms();
        let repo = &self.engine.repo;
        let instance = repo.create_job_instance(job_name, now)?;
        let execution = repo.create_job_execution(instance.id, params, now)?;
        tracing::info!(
            job = job_name,
            instance_id = %instance.id,
            execution_id = %execution.id,
            "operator:start"
        );
        Ok(self.launch(&runtime, job, execution, ElementPath::new(), None))
    }

    /// Launch a new execution of the instance `execution_id` belongs to.
    ///
    /// Only the instance's most recent execution may be restarted, and only
    /// once it is STOPPED or FAILED. `params` override the prior run's
    /// parameters; an explicit restart position among them re-runs that
    /// element even if it completed before.
    pub fn restart(
        &self,
        execution_id: JobExecutionId,
        params: JobParameters,
    ) -> Result<JobExecutionId, OperatorError> {
        let repo = &self.engine.repo;
        let prior = repo
            .get_job_execution(execution_id)
            .map_err(|e| OperatorError::from_lookup(execution_id, e))?;
        let job = self.job(&prior.job_name)?;
        let not_restartable = |reason: String| OperatorError::JobExecutionNotRestartable {
            id: execution_id,
            reason,
        };
        if !job.restartable {
            return Err(not_restartable(format!("job '{}' is not restartable", job.id)));
        }
        if !prior.batch_status.is_restartable() {
            return Err(not_restartable(format!("execution is {}", prior.batch_status)));
        }
        let history = repo.get_job_executions(prior.instance_id)?;
        if history.last().map(|e| e.id) != Some(execution_id) {
            return Err(not_restartable("a later execution of the instance exists".to_string()));
        }
        let instance_busy = self
            .running
            .lock()
            .values()
            .any(|h| h.execution.lock().instance_id == prior.instance_id);
        if instance_busy {
            return Err(not_restartable("another execution of the instance is running".to_string()));
        }

        let explicit = params.restart_position().map(str::to_string);
        let position = explicit.clone().or_else(|| prior.restart_position.clone());
        let start = match &position {
            Some(position) => job
                .locate(position)
                .filter(|path| job.element_at(path).is_some())
                .ok_or_else(|| PlanError::UnknownRestartPosition(position.clone()))?,
            None => ElementPath::new(),
        };
        let runtime = Handle::try_current().map_err(|_| OperatorError::NoRuntime)?;
        let execution = repo.create_job_execution(prior.instance_id, params.over(&prior.params), self.engine.now_ms())?;
        tracing::info!(
            job = %job.id,
            prior_execution_id = %execution_id,
            execution_id = %execution.id,
            position = ?position,
            "operator:restart"
        );
        Ok(self.launch(&runtime, job, execution, start, explicit))
    }

    fn launch(
        &self,
        runtime: &Handle,
        job: Arc<Job>,
        execution: JobExecution,
        start: ElementPath,
        explicit_restart: Option<String>,
    ) -> JobExecutionId {
        let id = execution.id;
        let execution = Arc::new(Mutex::new(execution));
        let signals = Signals::new();
        let (done_tx, done_rx) = watch::channel(false);
        self.running.lock().insert(
            id,
            RunHandle {
                job_name: job.id.clone(),
                execution: Arc::clone(&execution),
                signals: signals.clone(),
                done: done_rx,
            },
        );

        let run = Arc::new(JobRun::new(
            Arc::clone(&self.engine),
            job,
            Arc::clone(&execution),
            signals,
            start,
            explicit_restart,
        ));
        let engine = Arc::clone(&self.engine);
        let running = Arc::clone(&self.running);
        let walk = runtime.spawn(run.run());
        runtime.spawn(async move {
            if let Err(e) = walk.await {
                tracing::error!(execution_id = %id, error = %e, "job:task aborted");
                let mut exec = execution.lock();
                if !exec.batch_status.is_terminal() {
                    exec.batch_status = BatchStatus::Failed;
                    exec.exit_status = Some(BatchStatus::Failed.as_str().to_string());
                    exec.end_time_ms = Some(engine.now_ms());
                    exec.last_updated_ms = engine.now_ms();
                    if let Err(e) = engine.repo.update_job_execution(&exec) {
                        tracing::error!(execution_id = %id, error = %e, "job:persist failed");
                    }
                }
            }
            running.lock().remove(&id);
            let _ = done_tx.send(true);
        });
        id
    }

    /// Ask a running execution to stop at its next checkpoint or element
    /// boundary. The execution moves to STOPPING right away.
    pub fn stop(&self, execution_id: JobExecutionId) -> Result<(), OperatorError> {
        self.signal(execution_id, false)
    }

    /// Stop a running execution and abandon in-flight artifact calls
    /// (a sleeping batchlet, a blocked read) instead of waiting for them.
    pub fn force_stop(&self, execution_id: JobExecutionId) -> Result<(), OperatorError> {
        self.signal(execution_id, true)
    }

    fn signal(&self, execution_id: JobExecutionId, kill: bool) -> Result<(), OperatorError> {
        let running = self.running.lock();
        let Some(handle) = running.get(&execution_id) else {
            drop(running);
            let exec = self
                .engine
                .repo
                .get_job_execution(execution_id)
                .map_err(|e| OperatorError::from_lookup(execution_id, e))?;
            return Err(OperatorError::JobExecutionNotRunning {
                id: execution_id,
                status: exec.batch_status,
            });
        };
        {
            let mut exec = handle.execution.lock();
            if exec.batch_status.is_terminal() {
                return Err(OperatorError::JobExecutionNotRunning {
                    id: execution_id,
                    status: exec.batch_status,
                });
            }
            exec.stop_requested = true;
            exec.batch_status = BatchStatus::Stopping;
            exec.last_updated_ms = self.engine.now_ms();
            self.engine.repo.update_job_execution(&exec)?;
        }
        if kill {
            tracing::info!(job = %handle.job_name, execution_id = %execution_id, "operator:force stop");
            handle.signals.kill();
        } else {
            tracing::info!(job = %handle.job_name, execution_id = %execution_id, "operator:stop");
            handle.signals.request_stop();
        }
        Ok(())
    }

    /// Mark a finished (or orphaned) execution ABANDONED so it can never be
    /// restarted.
    pub fn abandon(&self, execution_id: JobExecutionId) -> Result<(), OperatorError> {
        if self.running.lock().contains_key(&execution_id) {
            return Err(OperatorError::JobExecutionIsRunning(execution_id));
        }
        let repo = &self.engine.repo;
        let mut exec = repo
            .get_job_execution(execution_id)
            .map_err(|e| OperatorError::from_lookup(execution_id, e))?;
        exec.batch_status = BatchStatus::Abandoned;
        exec.last_updated_ms = self.engine.now_ms();
        repo.update_job_execution(&exec)?;
        tracing::info!(job = %exec.job_name, execution_id = %execution_id, "operator:abandon");
        Ok(())
    }

    /// Wait up to `timeout` for the execution to reach a terminal status.
    /// Returns false on timeout; the job keeps running.
    pub async fn await_termination(
        &self,
        execution_id: JobExecutionId,
        timeout: Duration,
    ) -> Result<bool, OperatorError> {
        let done = self.running.lock().get(&execution_id).map(|h| h.done.clone());
        match done {
            // a dropped sender means the task is gone either way
            Some(mut done) => Ok(tokio::time::timeout(timeout, done.wait_for(|d| *d)).await.is_ok()),
            None => Ok(self.get_job_execution(execution_id)?.batch_status.is_terminal()),
        }
    }

    pub fn get_job_execution(&self, execution_id: JobExecutionId) -> Result<JobExecution, OperatorError> {
        self.engine
            .repo
            .get_job_execution(execution_id)
            .map_err(|e| OperatorError::from_lookup(execution_id, e))
    }

    /// Executions of one instance, oldest first.
    pub fn get_job_executions(&self, instance: JobInstanceId) -> Result<Vec<JobExecution>, OperatorError> {
        Ok(self.engine.repo.get_job_executions(instance)?)
    }

    /// Step executions of one job execution in the order they ran.
    pub fn get_step_executions(&self, execution_id: JobExecutionId) -> Result<Vec<StepExecution>, OperatorError> {
        self.get_job_execution(execution_id)?;
        Ok(self.engine.repo.get_step_executions(execution_id)?)
    }

    pub fn get_partition_executions(&self, step: StepExecutionId) -> Result<Vec<PartitionExecution>, OperatorError> {
        Ok(self.engine.repo.get_partition_executions(step)?)
    }

    /// The instance an execution belongs to.
    pub fn get_job_instance(&self, execution_id: JobExecutionId) -> Result<JobInstance, OperatorError> {
        let exec = self.get_job_execution(execution_id)?;
        Ok(self.engine.repo.get_job_instance(exec.instance_id)?)
    }

    /// Instances of `job_name`, most recent first.
    pub fn get_job_instances(
        &self,
        job_name: &str,
        start: usize,
        count: usize,
    ) -> Result<Vec<JobInstance>, OperatorError> {
        self.known(job_name)?;
        Ok(self.engine.repo.get_job_instances(job_name, start, count)?)
    }

    pub fn get_job_instance_count(&self, job_name: &str) -> Result<usize, OperatorError> {
        self.known(job_name)?;
        Ok(self.engine.repo.get_job_instance_count(job_name)?)
    }

    /// Names of every job with at least one instance.
    pub fn get_job_names(&self) -> Result<Vec<String>, OperatorError> {
        Ok(self.engine.repo.get_job_names()?)
    }

    /// Executions of `job_name` launched by this operator that are still
    /// running, in launch order.
    pub fn get_running_executions(&self, job_name: &str) -> Result<Vec<JobExecutionId>, OperatorError> {
        self.known(job_name)?;
        let mut ids: Vec<_> = self
            .running
            .lock()
            .iter()
            .filter(|(_, h)| h.job_name == job_name)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// A job is known once registered or once the repository has seen it.
    fn known(&self, job_name: &str) -> Result<(), OperatorError> {
        if self.jobs.read().contains_key(job_name) {
            return Ok(());
        }
        if self.engine.repo.get_job_names()?.iter().any(|n| n == job_name) {
            return Ok(());
        }
        Err(OperatorError::NoSuchJob(job_name.to_string()))
    }
}

#[cfg(test)]
#[path = "operator_tests.rs"]
mod tests;
