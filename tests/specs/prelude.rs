// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures: scripted artifacts and an operator harness.

pub use bw_core::{BatchStatus, JobExecution, JobExecutionId, JobParameters, RESTART_POSITION_PARAM};
pub use bw_engine::{ArtifactError, ArtifactRegistry, EngineConfig, JobOperator, OperatorError};
pub use bw_plan::{
    ArtifactRef, ChunkBuilder, ErrorFilter, FlowBuilder, JobBuilder, SplitBuilder, StepBuilder,
    Transition,
};
pub use std::sync::Arc;
pub use std::time::Duration;

use async_trait::async_trait;
use bw_core::Checkpoint;
use bw_engine::{Batchlet, Item, ItemProcessor, ItemReader, ItemWriter, StepContext, StepListener};
use bw_storage::{MemoryRepository, Repository};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;

/// Upper bound on how long a spec waits for a job.
pub const SPEC_WAIT: Duration = Duration::from_secs(10);

/// Shared log of what artifacts saw.
#[derive(Clone, Default)]
pub struct Trace(Arc<Mutex<Vec<String>>>);

impl Trace {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().iter().filter(|e| *e == entry).count()
    }
}

/// Failures keyed by item value: `(error kind, remaining failures)`.
#[derive(Clone, Default)]
pub struct Script(Arc<Mutex<HashMap<i64, (String, u32)>>>);

impl Script {
    pub fn fail(&self, item: i64, kind: &str, times: u32) {
        self.0.lock().insert(item, (kind.to_string(), times));
    }

    fn check(&self, item: i64) -> Result<(), ArtifactError> {
        let mut script = self.0.lock();
        match script.get_mut(&item) {
            Some((kind, remaining)) if *remaining > 0 => {
                *remaining -= 1;
                Err(ArtifactError::new(kind.clone(), format!("scripted failure at {item}")))
            }
            _ => Ok(()),
        }
    }
}

/// Reads `first..first + count`; the checkpoint is the next value.
pub struct Numbers {
    first: i64,
    end: i64,
    next: i64,
    script: Script,
    trace: Trace,
}

#[async_trait]
impl ItemReader for Numbers {
    async fn open(&mut self, checkpoint: Option<Checkpoint>) -> Result<(), ArtifactError> {
        self.next = checkpoint.and_then(|c| c.as_i64()).unwrap_or(self.first);
        Ok(())
    }

    async fn read_item(&mut self) -> Result<Option<Item>, ArtifactError> {
        if self.next >= self.end {
            return Ok(None);
        }
        let n = self.next;
        self.next += 1;
        self.trace.push(format!("read {n}"));
        self.script.check(n)?;
        Ok(Some(json!(n)))
    }

    async fn checkpoint_info(&mut self) -> Result<Option<Checkpoint>, ArtifactError> {
        Ok(Some(json!(self.next)))
    }
}

/// Passes items through, failing where scripted.
pub struct Check {
    script: Script,
    trace: Trace,
}

#[async_trait]
impl ItemProcessor for Check {
    async fn process_item(&mut self, item: &Item) -> Result<Option<Item>, ArtifactError> {
        let n = item.as_i64().unwrap_or_default();
        self.trace.push(format!("process {n}"));
        self.script.check(n)?;
        Ok(Some(item.clone()))
    }
}

/// Appends every written item to a shared list.
pub struct Sink {
    written: Arc<Mutex<Vec<i64>>>,
    script: Script,
}

#[async_trait]
impl ItemWriter for Sink {
    async fn open(&mut self, _checkpoint: Option<Checkpoint>) -> Result<(), ArtifactError> {
        Ok(())
    }

    async fn write_items(&mut self, items: &[Item]) -> Result<(), ArtifactError> {
        let items: Vec<i64> = items.iter().filter_map(|i| i.as_i64()).collect();
        for n in &items {
            self.script.check(*n)?;
        }
        self.written.lock().extend(items);
        Ok(())
    }
}

/// Returns its `exit` property (or "OK") and records the step name.
pub struct Echo {
    exit: String,
    trace: Trace,
}

#[async_trait]
impl Batchlet for Echo {
    async fn process(&self, ctx: &StepContext) -> Result<String, ArtifactError> {
        match ctx.partition_index() {
            Some(i) => self.trace.push(format!("{} {i}", ctx.step_name())),
            None => self.trace.push(ctx.step_name()),
        }
        Ok(self.exit.clone())
    }
}

/// Fails until `healed` is set.
pub struct Flaky {
    healed: Arc<Mutex<bool>>,
    trace: Trace,
}

#[async_trait]
impl Batchlet for Flaky {
    async fn process(&self, ctx: &StepContext) -> Result<String, ArtifactError> {
        self.trace.push(ctx.step_name());
        if *self.healed.lock() {
            Ok(String::new())
        } else {
            Err(ArtifactError::new("flaky", "not healed yet"))
        }
    }
}

/// Sleeps for an hour unless stopped first.
pub struct Sleeper {
    trace: Trace,
}

#[async_trait]
impl Batchlet for Sleeper {
    async fn process(&self, ctx: &StepContext) -> Result<String, ArtifactError> {
        self.trace.push(format!("{} asleep", ctx.step_name()));
        tokio::select! {
            _ = ctx.stop_requested() => Ok("INTERRUPTED".to_string()),
            _ = tokio::time::sleep(Duration::from_secs(3600)) => Ok("RESTED".to_string()),
        }
    }
}

/// Sleeps for an hour and ignores stop requests.
pub struct DeepSleeper;

#[async_trait]
impl Batchlet for DeepSleeper {
    async fn process(&self, _ctx: &StepContext) -> Result<String, ArtifactError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok("RESTED".to_string())
    }
}

/// Step listener whose `after_step` fails.
pub struct BrokenAfterStep;

#[async_trait]
impl StepListener for BrokenAfterStep {
    async fn after_step(&self, _ctx: &StepContext) -> Result<(), ArtifactError> {
        Err(ArtifactError::new("listener", "after_step failed"))
    }
}

/// Operator plus handles on everything its artifacts share.
pub struct Harness {
    pub operator: JobOperator,
    pub trace: Trace,
    pub read_faults: Script,
    pub process_faults: Script,
    pub write_faults: Script,
    pub written: Arc<Mutex<Vec<i64>>>,
    pub healed: Arc<Mutex<bool>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_repo(Arc::new(MemoryRepository::new()))
    }

    pub fn with_repo(repo: Arc<dyn Repository>) -> Self {
        let trace = Trace::default();
        let faults = [Script::default(), Script::default(), Script::default()];
        let written = Arc::new(Mutex::new(Vec::new()));
        let healed = Arc::new(Mutex::new(false));
        let registry = registry(&trace, &faults, &written, &healed);
        let [read_faults, process_faults, write_faults] = faults;
        Self {
            operator: JobOperator::new(repo, registry, EngineConfig::default()),
            trace,
            read_faults,
            process_faults,
            write_faults,
            written,
            healed,
        }
    }

    pub fn register(&self, job: JobBuilder) {
        self.operator.register_job(job.build().unwrap()).unwrap();
    }

    pub fn heal(&self) {
        *self.healed.lock() = true;
    }

    pub fn written(&self) -> Vec<i64> {
        self.written.lock().clone()
    }

    /// Start `job` and wait for it to finish.
    pub async fn run(&self, job: &str, params: JobParameters) -> JobExecution {
        let id = self.operator.start(job, params).unwrap();
        self.wait(id).await
    }

    pub async fn restart(&self, id: JobExecutionId, params: JobParameters) -> JobExecution {
        let id = self.operator.restart(id, params).unwrap();
        self.wait(id).await
    }

    pub async fn wait(&self, id: JobExecutionId) -> JobExecution {
        assert!(
            self.operator.await_termination(id, SPEC_WAIT).await.unwrap(),
            "execution {id} did not finish"
        );
        self.operator.get_job_execution(id).unwrap()
    }

    /// Names of the steps recorded for an execution, in run order.
    pub fn steps(&self, id: JobExecutionId) -> Vec<String> {
        self.operator
            .get_step_executions(id)
            .unwrap()
            .into_iter()
            .map(|s| s.step_name)
            .collect()
    }

    /// Wait until `entry` shows up in the trace.
    pub async fn until_traced(&self, entry: &str) {
        self.until_traced_times(entry, 1).await;
    }

    pub async fn until_traced_times(&self, entry: &str, times: usize) {
        for _ in 0..400 {
            if self.trace.count(entry) >= times {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("'{entry}' traced fewer than {times} times");
    }
}

fn registry(
    trace: &Trace,
    faults: &[Script; 3],
    written: &Arc<Mutex<Vec<i64>>>,
    healed: &Arc<Mutex<bool>>,
) -> ArtifactRegistry {
    let (t_read, s_read) = (trace.clone(), faults[0].clone());
    let (t_proc, s_proc) = (trace.clone(), faults[1].clone());
    let (w, s_write) = (Arc::clone(written), faults[2].clone());
    let (t_echo, t_flaky, t_sleep) = (trace.clone(), trace.clone(), trace.clone());
    let healed = Arc::clone(healed);
    ArtifactRegistry::new()
        .reader("numbers", move |config| {
            let first = config.parse::<i64>("first")?.unwrap_or(0);
            let count = config.parse::<i64>("count")?.unwrap_or(10);
            Ok(Numbers {
                first,
                end: first + count,
                next: first,
                script: s_read.clone(),
                trace: t_read.clone(),
            })
        })
        .processor("check", move |_| {
            Ok(Check {
                script: s_proc.clone(),
                trace: t_proc.clone(),
            })
        })
        .writer("sink", move |_| {
            Ok(Sink {
                written: Arc::clone(&w),
                script: s_write.clone(),
            })
        })
        .batchlet("echo", move |config| {
            Ok(Echo {
                exit: config.get("exit").unwrap_or("OK").to_string(),
                trace: t_echo.clone(),
            })
        })
        .batchlet("flaky", move |_| {
            Ok(Flaky {
                healed: Arc::clone(&healed),
                trace: t_flaky.clone(),
            })
        })
        .batchlet("sleeper", move |_| Ok(Sleeper { trace: t_sleep.clone() }))
        .batchlet("deep_sleeper", |_| Ok(DeepSleeper))
        .step_listener("broken_after_step", |_| Ok(BrokenAfterStep))
}

/// A chunk step reading `count` numbers through `check` into `sink`.
pub fn number_chunk(count: u32) -> ChunkBuilder {
    ChunkBuilder::new(
        ArtifactRef::new("numbers").property("count", count.to_string()),
        "sink",
    )
    .processor("check")
}

/// Batchlet step returning `exit`.
pub fn echo(id: &str, exit: &str) -> StepBuilder {
    StepBuilder::batchlet(id, ArtifactRef::new("echo").property("exit", exit))
}
