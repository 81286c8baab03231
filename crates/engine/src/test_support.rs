// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted artifacts and fixtures for the engine's unit tests.

use crate::artifact::*;
use crate::engine::Engine;
use crate::signals::Signals;
use crate::walk::JobRun;
use crate::{ArtifactError, ArtifactRegistry, EngineConfig, JobContext, StepContext};
use async_trait::async_trait;
use bw_core::{
    BatchStatus, Checkpoint, FakeClock, JobExecution, JobExecutionId, JobInstance, JobInstanceId, JobParameters,
    PartitionExecution, StepExecution, StepExecutionId,
};
use bw_plan::{Job, Properties, PropertyResolver};
use bw_storage::{MemoryRepository, Repository, RepositoryError};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

/// Errors to raise at given item keys, each entry consumed once.
#[derive(Clone, Default)]
pub(crate) struct Faults(Arc<Mutex<Vec<(i64, ArtifactError)>>>);

impl Faults {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fail `times` times at `key` with error kind `kind`.
    pub(crate) fn at(self, key: i64, kind: &str, times: usize) -> Self {
        {
            let mut faults = self.0.lock();
            for _ in 0..times {
                faults.push((key, ArtifactError::new(kind, format!("scripted failure at {key}"))));
            }
        }
        self
    }

    fn take(&self, key: i64) -> Option<ArtifactError> {
        let mut faults = self.0.lock();
        let index = faults.iter().position(|(k, _)| *k == key)?;
        Some(faults.remove(index).1)
    }
}

/// Shared record of what the fakes saw.
#[derive(Clone, Default)]
pub(crate) struct Trace(Arc<Mutex<Vec<String>>>);

impl Trace {
    pub(crate) fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub(crate) fn count(&self, entry: &str) -> usize {
        self.0.lock().iter().filter(|e| *e == entry).count()
    }
}

/// Reads the numbers `0..count`; its checkpoint is the next index.
///
/// A failed read consumes its position. Reading `block_at` never returns.
pub(crate) struct NumberReader {
    pub count: i64,
    pub next: i64,
    pub faults: Faults,
    pub block_at: Option<i64>,
    pub trace: Trace,
}

impl NumberReader {
    pub(crate) fn new(count: i64) -> Self {
        Self {
            count,
            next: 0,
            faults: Faults::new(),
            block_at: None,
            trace: Trace::default(),
        }
    }
}

#[async_trait]
impl ItemReader for NumberReader {
    async fn open(&mut self, checkpoint: Option<Checkpoint>) -> Result<(), ArtifactError> {
        self.next = checkpoint.and_then(|c| c.as_i64()).unwrap_or(0);
        self.trace.push(format!("open {}", self.next));
        Ok(())
    }

    async fn read_item(&mut self) -> Result<Option<Item>, ArtifactError> {
        if self.next >= self.count {
            return Ok(None);
        }
        let index = self.next;
        self.trace.push(format!("read {index}"));
        if self.block_at == Some(index) {
            std::future::pending::<()>().await;
        }
        self.next += 1;
        match self.faults.take(index) {
            Some(e) => Err(e),
            None => Ok(Some(json!(index))),
        }
    }

    async fn checkpoint_info(&mut self) -> Result<Option<Checkpoint>, ArtifactError> {
        Ok(Some(json!(self.next)))
    }

    async fn close(&mut self) -> Result<(), ArtifactError> {
        self.trace.push("close");
        Ok(())
    }
}

/// Multiplies items by ten; `filter` keys are dropped.
#[derive(Default)]
pub(crate) struct TimesTen {
    pub faults: Faults,
    pub filter: Vec<i64>,
    pub trace: Trace,
}

#[async_trait]
impl ItemProcessor for TimesTen {
    async fn process_item(&mut self, item: &Item) -> Result<Option<Item>, ArtifactError> {
        let n = item.as_i64().unwrap_or_default();
        self.trace.push(format!("process {n}"));
        if let Some(e) = self.faults.take(n) {
            return Err(e);
        }
        if self.filter.contains(&n) {
            return Ok(None);
        }
        Ok(Some(json!(n * 10)))
    }
}

/// Appends written chunks to a shared list. A fault keyed by any item of a
/// chunk fails the whole write.
#[derive(Clone, Default)]
pub(crate) struct CollectWriter {
    pub chunks: Arc<Mutex<Vec<Vec<i64>>>>,
    pub faults: Faults,
}

impl CollectWriter {
    pub(crate) fn items(&self) -> Vec<i64> {
        self.chunks.lock().iter().flatten().copied().collect()
    }

    pub(crate) fn chunks(&self) -> Vec<Vec<i64>> {
        self.chunks.lock().clone()
    }
}

#[async_trait]
impl ItemWriter for CollectWriter {
    async fn open(&mut self, _checkpoint: Option<Checkpoint>) -> Result<(), ArtifactError> {
        Ok(())
    }

    async fn write_items(&mut self, items: &[Item]) -> Result<(), ArtifactError> {
        let items: Vec<i64> = items.iter().filter_map(Value::as_i64).collect();
        if let Some(e) = items.iter().find_map(|n| self.faults.take(*n)) {
            return Err(e);
        }
        self.chunks.lock().push(items);
        Ok(())
    }
}

/// Returns `exit` and records its partition index.
pub(crate) struct EchoBatchlet {
    pub exit: String,
    pub trace: Trace,
}

#[async_trait]
impl Batchlet for EchoBatchlet {
    async fn process(&self, ctx: &StepContext) -> Result<String, ArtifactError> {
        match ctx.partition_index() {
            Some(index) => self.trace.push(format!("{} {index}", ctx.step_name())),
            None => self.trace.push(ctx.step_name()),
        }
        Ok(self.exit.clone())
    }
}

/// Fails every call with `kind`.
pub(crate) struct FailingBatchlet(pub &'static str);

#[async_trait]
impl Batchlet for FailingBatchlet {
    async fn process(&self, _ctx: &StepContext) -> Result<String, ArtifactError> {
        Err(ArtifactError::new(self.0, "batchlet failed"))
    }
}

/// Sleeps until stopped; `stop` is recorded.
pub(crate) struct SleepyBatchlet {
    pub trace: Trace,
}

#[async_trait]
impl Batchlet for SleepyBatchlet {
    async fn process(&self, ctx: &StepContext) -> Result<String, ArtifactError> {
        ctx.stop_requested().await;
        self.trace.push("woke");
        Ok("WOKE".to_string())
    }

    async fn stop(&self) -> Result<(), ArtifactError> {
        self.trace.push("stop");
        Ok(())
    }
}

/// Records every hook it sees; hooks named in `fail_on` return an error.
#[derive(Clone, Default)]
pub(crate) struct RecordingListener {
    pub trace: Trace,
    pub fail_on: Vec<&'static str>,
}

impl RecordingListener {
    fn hook(&self, name: &'static str) -> Result<(), ArtifactError> {
        self.trace.push(name);
        if self.fail_on.contains(&name) {
            return Err(ArtifactError::new("listener", format!("{name} failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl JobListener for RecordingListener {
    async fn before_job(&self, _ctx: &JobContext) -> Result<(), ArtifactError> {
        self.hook("before_job")
    }

    async fn after_job(&self, _ctx: &JobContext) -> Result<(), ArtifactError> {
        self.hook("after_job")
    }
}

#[async_trait]
impl StepListener for RecordingListener {
    async fn before_step(&self, _ctx: &StepContext) -> Result<(), ArtifactError> {
        self.hook("before_step")
    }

    async fn after_step(&self, _ctx: &StepContext) -> Result<(), ArtifactError> {
        self.hook("after_step")
    }
}

#[async_trait]
impl ChunkListener for RecordingListener {
    async fn before_chunk(&self, _ctx: &StepContext) -> Result<(), ArtifactError> {
        self.hook("before_chunk")
    }

    async fn on_error(&self, _ctx: &StepContext, _error: &ArtifactError) -> Result<(), ArtifactError> {
        self.hook("chunk_error")
    }

    async fn after_chunk(&self, _ctx: &StepContext) -> Result<(), ArtifactError> {
        self.hook("after_chunk")
    }
}

#[async_trait]
impl RetryListener for RecordingListener {
    async fn on_retry_read(&self, _error: &ArtifactError) -> Result<(), ArtifactError> {
        self.hook("retry_read")
    }

    async fn on_retry_process(&self, _item: &Item, _error: &ArtifactError) -> Result<(), ArtifactError> {
        self.hook("retry_process")
    }

    async fn on_retry_write(&self, _items: &[Item], _error: &ArtifactError) -> Result<(), ArtifactError> {
        self.hook("retry_write")
    }
}

#[async_trait]
impl SkipListener for RecordingListener {
    async fn on_skip_read(&self, _error: &ArtifactError) -> Result<(), ArtifactError> {
        self.hook("skip_read")
    }

    async fn on_skip_process(&self, _item: &Item, _error: &ArtifactError) -> Result<(), ArtifactError> {
        self.hook("skip_process")
    }

    async fn on_skip_write(&self, _items: &[Item], _error: &ArtifactError) -> Result<(), ArtifactError> {
        self.hook("skip_write")
    }
}

pub(crate) fn engine(registry: ArtifactRegistry) -> Arc<Engine<FakeClock>> {
    engine_with(registry, EngineConfig::default())
}

pub(crate) fn engine_with(registry: ArtifactRegistry, config: EngineConfig) -> Arc<Engine<FakeClock>> {
    Arc::new(Engine::new(Arc::new(MemoryRepository::new()), registry, config, FakeClock::new()))
}

pub(crate) fn engine_on(repo: Arc<dyn Repository>, registry: ArtifactRegistry) -> Arc<Engine<FakeClock>> {
    Arc::new(Engine::new(repo, registry, EngineConfig::default(), FakeClock::new()))
}

/// A persisted STARTED step execution under a fresh job execution.
pub(crate) fn step_record(repo: &dyn Repository, step: &str) -> StepExecution {
    let instance = repo.create_job_instance("job", 0).unwrap();
    let execution = repo.create_job_execution(instance.id, JobParameters::new(), 0).unwrap();
    repo.create_step_execution(execution.id, step, 0).unwrap()
}

/// A fresh execution of `job`, in a new instance unless `instance` is given.
pub(crate) fn job_run(
    engine: &Arc<Engine<FakeClock>>,
    job: &Job,
    instance: Option<JobInstanceId>,
) -> Arc<JobRun<FakeClock>> {
    let instance = match instance {
        Some(id) => id,
        None => engine.repo.create_job_instance(&job.id, 0).unwrap().id,
    };
    let execution = engine.repo.create_job_execution(instance, JobParameters::new(), 0).unwrap();
    Arc::new(JobRun::new(
        Arc::clone(engine),
        Arc::new(job.clone()),
        Arc::new(Mutex::new(execution)),
        Signals::new(),
        vec![],
        None,
    ))
}

pub(crate) fn resolver() -> PropertyResolver {
    PropertyResolver::new(JobParameters::new(), &Properties::new())
}

pub(crate) fn step_ctx(record: &StepExecution, signals: Signals) -> StepContext {
    let job = Arc::new(JobContext::new(
        "job",
        bw_core::JobInstanceId::new(1),
        record.execution_id,
        JobParameters::new(),
        Properties::new(),
    ));
    StepContext::new(job, record.step_name.clone(), record.id, Properties::new(), signals)
}

/// In-memory repository whose selected updates fail like a full disk.
#[derive(Default)]
pub(crate) struct BrokenRepo {
    pub inner: MemoryRepository,
    /// Reject job execution updates that move the record to this status.
    pub reject_job_status: Option<BatchStatus>,
    /// Reject partition updates carrying a terminal status.
    pub reject_finished_partitions: bool,
}

fn disk_full() -> RepositoryError {
    RepositoryError::Io(std::io::Error::other("disk full"))
}

impl Repository for BrokenRepo {
    fn create_job_instance(&self, job_name: &str, now_ms: u64) -> Result<JobInstance, RepositoryError> {
        self.inner.create_job_instance(job_name, now_ms)
    }

    fn create_job_execution(
        &self,
        instance: JobInstanceId,
        params: JobParameters,
        now_ms: u64,
    ) -> Result<JobExecution, RepositoryError> {
        self.inner.create_job_execution(instance, params, now_ms)
    }

    fn update_job_execution(&self, execution: &JobExecution) -> Result<(), RepositoryError> {
        if self.reject_job_status == Some(execution.batch_status) {
            return Err(disk_full());
        }
        self.inner.update_job_execution(execution)
    }

    fn create_step_execution(
        &self,
        execution: JobExecutionId,
        step_name: &str,
        now_ms: u64,
    ) -> Result<StepExecution, RepositoryError> {
        self.inner.create_step_execution(execution, step_name, now_ms)
    }

    fn update_step_execution(&self, step: &StepExecution) -> Result<(), RepositoryError> {
        self.inner.update_step_execution(step)
    }

    fn create_partition_execution(
        &self,
        step: StepExecutionId,
        partition_index: u32,
    ) -> Result<PartitionExecution, RepositoryError> {
        self.inner.create_partition_execution(step, partition_index)
    }

    fn update_partition_execution(&self, partition: &PartitionExecution) -> Result<(), RepositoryError> {
        if self.reject_finished_partitions && partition.batch_status.is_terminal() {
            return Err(disk_full());
        }
        self.inner.update_partition_execution(partition)
    }

    fn get_job_names(&self) -> Result<Vec<String>, RepositoryError> {
        self.inner.get_job_names()
    }

    fn get_job_instance(&self, id: JobInstanceId) -> Result<JobInstance, RepositoryError> {
        self.inner.get_job_instance(id)
    }

    fn get_job_instances(&self, job_name: &str, start: usize, count: usize) -> Result<Vec<JobInstance>, RepositoryError> {
        self.inner.get_job_instances(job_name, start, count)
    }

    fn get_job_instance_count(&self, job_name: &str) -> Result<usize, RepositoryError> {
        self.inner.get_job_instance_count(job_name)
    }

    fn get_job_execution(&self, id: JobExecutionId) -> Result<JobExecution, RepositoryError> {
        self.inner.get_job_execution(id)
    }

    fn get_job_executions(&self, instance: JobInstanceId) -> Result<Vec<JobExecution>, RepositoryError> {
        self.inner.get_job_executions(instance)
    }

    fn get_step_executions(&self, execution: JobExecutionId) -> Result<Vec<StepExecution>, RepositoryError> {
        self.inner.get_step_executions(execution)
    }

    fn get_step_execution(&self, id: StepExecutionId) -> Result<StepExecution, RepositoryError> {
        self.inner.get_step_execution(id)
    }

    fn get_partition_executions(&self, step: StepExecutionId) -> Result<Vec<PartitionExecution>, RepositoryError> {
        self.inner.get_partition_executions(step)
    }

    fn count_step_starts(&self, instance: JobInstanceId, step_name: &str) -> Result<usize, RepositoryError> {
        self.inner.count_step_starts(instance, step_name)
    }

    fn find_last_step_execution(
        &self,
        instance: JobInstanceId,
        step_name: &str,
    ) -> Result<Option<StepExecution>, RepositoryError> {
        self.inner.find_last_step_execution(instance, step_name)
    }
}
