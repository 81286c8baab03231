// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job walk.
//!
//! A [`JobRun`] drives one job execution from its start element to a
//! terminal status: steps run in sequence, flows recurse, splits fan their
//! flows out onto tasks, decisions feed the transition resolver. Stop is
//! observed at every element boundary.

use crate::engine::Engine;
use crate::listeners::JobListeners;
use crate::registry::ArtifactRegistry;
use crate::signals::Signals;
use crate::transition::{self, Outcome};
use crate::{JobContext, Phase, StepError};
use bw_core::{BatchStatus, Clock, JobExecution, JobExecutionId, JobInstanceId, StepExecution};
use bw_plan::{Decision, Element, ElementPath, Flow, Job, PropertyResolver, Split};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::task::JoinSet;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// How a sequence of elements ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Ending {
    /// The last element had no matching rule and no successor.
    Finished { exit_status: String },
    /// A directive, a failure or a stop ended the job.
    Terminated {
        status: BatchStatus,
        exit_status: Option<String>,
        restart: Option<String>,
    },
}

impl Ending {
    fn terminated(status: BatchStatus) -> Self {
        Ending::Terminated {
            status,
            exit_status: None,
            restart: None,
        }
    }
}

pub(crate) struct SequenceEnd {
    pub ending: Ending,
    /// Step executions of the last element, handed to a following decision.
    pub last: Vec<StepExecution>,
}

/// What one element produced before transition resolution.
struct ElementResult {
    status: BatchStatus,
    exit_status: String,
    last: Vec<StepExecution>,
}

/// One running job execution.
pub(crate) struct JobRun<C: Clock> {
    pub(crate) engine: Arc<Engine<C>>,
    pub(crate) job: Arc<Job>,
    pub(crate) execution: Arc<Mutex<JobExecution>>,
    pub(crate) instance_id: JobInstanceId,
    pub(crate) execution_id: JobExecutionId,
    pub(crate) signals: Signals,
    pub(crate) ctx: Arc<JobContext>,
    pub(crate) resolver: PropertyResolver,
    start: ElementPath,
    /// Step named by an explicit restart position; it runs even if it
    /// completed before.
    pub(crate) explicit_restart: Option<String>,
    executed: Mutex<HashSet<String>>,
}

impl<C: Clock> JobRun<C> {
    pub(crate) fn new(
        engine: Arc<Engine<C>>,
        job: Arc<Job>,
        execution: Arc<Mutex<JobExecution>>,
        signals: Signals,
        start: ElementPath,
        explicit_restart: Option<String>,
    ) -> Self {
        let (instance_id, execution_id, params) = {
            let exec = execution.lock();
            (exec.instance_id, exec.id, exec.params.clone())
        };
        let resolver = PropertyResolver::new(params.clone(), &job.properties);
        let ctx = Arc::new(JobContext::new(
            job.id.clone(),
            instance_id,
            execution_id,
            params,
            resolver.resolve_all(&job.properties),
        ));
        Self {
            engine,
            job,
            execution,
            instance_id,
            execution_id,
            signals,
            ctx,
            resolver,
            start,
            explicit_restart,
            executed: Mutex::new(HashSet::new()),
        }
    }

    /// Walk the job to a terminal status and persist it.
    pub(crate) async fn run(self: Arc<Self>) -> BatchStatus {
        let started = self.update_execution(|exec, now| {
            if !exec.stop_requested {
                exec.batch_status = BatchStatus::Started;
            }
            exec.start_time_ms = Some(now);
        });
        if let Err(e) = started {
            return self.finish(BatchStatus::Failed, None, None, Some(e.into()));
        }
        self.ctx.set_batch_status(BatchStatus::Started);
        tracing::info!(job = %self.job.id, execution_id = %self.execution_id, "job:started");

        let listeners = match JobListeners::create(&self.engine.registry, &self.job.listeners, &self.resolver) {
            Ok(listeners) => listeners,
            Err(e) => return self.finish(BatchStatus::Failed, None, None, Some(e)),
        };
        if let Err(e) = listeners.before_job(&self.ctx).await {
            return self.finish(BatchStatus::Failed, None, None, Some(e));
        }

        let start = self.start.clone();
        let end = self.run_sequence(&self.job.elements, &start).await;
        let (mut status, fallback_exit, restart) = match end.ending {
            Ending::Finished { exit_status } => (BatchStatus::Completed, Some(exit_status), None),
            Ending::Terminated {
                status,
                exit_status,
                restart,
            } => {
                if let Some(exit) = exit_status {
                    self.ctx.set_exit_status(exit);
                }
                (status, None, restart)
            }
        };
        self.ctx.set_batch_status(status);

        let mut failure = None;
        if let Err(e) = listeners.after_job(&self.ctx).await {
            status = BatchStatus::Failed;
            failure = Some(e);
        }
        if status == BatchStatus::Completed && self.signals.is_stop_requested() {
            status = BatchStatus::Stopped;
        }
        let fallback_exit = fallback_exit.filter(|_| status == BatchStatus::Completed);
        self.finish(status, fallback_exit, restart, failure)
    }

    /// Record the terminal status. The exit status is the one set on the
    /// job context, else `fallback_exit`, else the status name.
    fn finish(
        &self,
        status: BatchStatus,
        fallback_exit: Option<String>,
        restart: Option<String>,
        failure: Option<StepError>,
    ) -> BatchStatus {
        if let Some(e) = &failure {
            tracing::warn!(job = %self.job.id, execution_id = %self.execution_id, error = %e, "job:failed");
        }
        self.ctx.set_batch_status(status);
        let exit_status = self
            .ctx
            .exit_status()
            .or(fallback_exit)
            .unwrap_or_else(|| status.as_str().to_string());
        let result = self.update_execution(|exec, now| {
            exec.batch_status = status;
            exec.exit_status = Some(exit_status.clone());
            exec.end_time_ms = Some(now);
            exec.restart_position = restart.clone();
        });
        if let Err(e) = result {
            tracing::error!(job = %self.job.id, execution_id = %self.execution_id, error = %e, "job:persist failed");
        }
        tracing::info!(
            job = %self.job.id,
            execution_id = %self.execution_id,
            status = %status,
            exit_status = %exit_status,
            "job:finished"
        );
        status
    }

    /// Apply `f` to the shared execution record and persist it.
    pub(crate) fn update_execution(
        &self,
        f: impl FnOnce(&mut JobExecution, u64),
    ) -> Result<(), bw_storage::RepositoryError> {
        let now = self.engine.now_ms();
        let mut exec = self.execution.lock();
        f(&mut exec, now);
        exec.last_updated_ms = now;
        self.engine.repo.update_job_execution(&exec)
    }

    /// Walk `elements` from `start` (an index path; empty means the first
    /// element) until the sequence ends.
    fn run_sequence<'a>(
        self: &'a Arc<Self>,
        elements: &'a [Element],
        start: &'a [usize],
    ) -> BoxFuture<'a, SequenceEnd> {
        Box::pin(async move {
            let (mut index, mut nested) = match start.split_first() {
                Some((first, rest)) => (*first, rest),
                None => (0, &[][..]),
            };
            let mut last = Vec::new();
            loop {
                let Some(element) = elements.get(index) else {
                    // validation keeps paths and next targets in range
                    tracing::error!(job = %self.job.id, index, "job:element out of range");
                    return SequenceEnd {
                        ending: Ending::terminated(BatchStatus::Failed),
                        last,
                    };
                };
                if self.signals.is_stop_requested() {
                    tracing::info!(job = %self.job.id, element = element.id(), "job:stopped at boundary");
                    return SequenceEnd {
                        ending: Ending::terminated(BatchStatus::Stopped),
                        last,
                    };
                }
                if !self.executed.lock().insert(element.id().to_string()) {
                    let e = StepError::LoopBack(element.id().to_string());
                    tracing::warn!(job = %self.job.id, error = %e, "job:loop back");
                    return SequenceEnd {
                        ending: Ending::terminated(BatchStatus::Failed),
                        last,
                    };
                }

                let result = match element {
                    Element::Step(step) => match self.run_step(step).await {
                        Ok(result) if result.listener_failed => {
                            return SequenceEnd {
                                ending: Ending::terminated(BatchStatus::Failed),
                                last: vec![result.execution],
                            };
                        }
                        Ok(result) => ElementResult {
                            status: result.status,
                            exit_status: result.exit_status,
                            last: vec![result.execution],
                        },
                        Err(e) => {
                            tracing::warn!(job = %self.job.id, step = %step.id, error = %e, "step:could not run");
                            return SequenceEnd {
                                ending: Ending::terminated(BatchStatus::Failed),
                                last,
                            };
                        }
                    },
                    Element::Flow(flow) => match self.run_flow(flow, nested).await {
                        Ok(result) => result,
                        Err(end) => return end,
                    },
                    Element::Split(split) => self.run_split(split, nested).await,
                    Element::Decision(decision) => match self.decide(decision, &last).await {
                        Ok(exit_status) => ElementResult {
                            status: BatchStatus::Completed,
                            exit_status,
                            last: std::mem::take(&mut last),
                        },
                        Err(e) => {
                            tracing::warn!(job = %self.job.id, decision = %decision.id, error = %e, "decision:failed");
                            return SequenceEnd {
                                ending: Ending::terminated(BatchStatus::Failed),
                                last,
                            };
                        }
                    },
                };
                nested = &[];
                last = result.last;

                let failed = match result.status {
                    BatchStatus::Stopped | BatchStatus::Stopping => {
                        return SequenceEnd {
                            ending: Ending::terminated(BatchStatus::Stopped),
                            last,
                        };
                    }
                    BatchStatus::Failed => true,
                    _ => false,
                };
                let ending = match transition::resolve(element, &result.exit_status, failed) {
                    Outcome::Next(to) => match elements.iter().position(|e| e.id() == to) {
                        Some(next) => {
                            if failed {
                                tracing::info!(job = %self.job.id, from = element.id(), to = %to, "job:continuing after failure");
                            }
                            index = next;
                            continue;
                        }
                        None => {
                            tracing::error!(job = %self.job.id, to = %to, "job:unknown transition target");
                            Ending::terminated(BatchStatus::Failed)
                        }
                    },
                    Outcome::Finished if failed => Ending::terminated(BatchStatus::Failed),
                    Outcome::Finished => Ending::Finished {
                        exit_status: result.exit_status,
                    },
                    Outcome::End { exit_status } => Ending::Terminated {
                        status: BatchStatus::Completed,
                        exit_status: Some(exit_status),
                        restart: None,
                    },
                    Outcome::Fail { exit_status } => Ending::Terminated {
                        status: BatchStatus::Failed,
                        exit_status: Some(exit_status),
                        restart: None,
                    },
                    Outcome::Stop { exit_status, restart } => Ending::Terminated {
                        status: BatchStatus::Stopped,
                        exit_status: Some(exit_status),
                        restart,
                    },
                };
                if let Ending::Terminated { status, exit_status, .. } = &ending {
                    tracing::info!(
                        job = %self.job.id,
                        element = element.id(),
                        status = %status,
                        exit_status = ?exit_status,
                        "job:transition ended"
                    );
                }
                return SequenceEnd { ending, last };
            }
        })
    }

    /// A flow that finishes normally yields its last element's exit status;
    /// any termination inside it ends the enclosing sequence too.
    async fn run_flow(self: &Arc<Self>, flow: &Flow, start: &[usize]) -> Result<ElementResult, SequenceEnd> {
        let end = self.run_sequence(&flow.elements, start).await;
        match end.ending {
            Ending::Finished { exit_status } => Ok(ElementResult {
                status: BatchStatus::Completed,
                exit_status,
                last: end.last,
            }),
            Ending::Terminated { .. } => Err(end),
        }
    }

    /// Run every flow of `split` concurrently and merge their outcomes.
    ///
    /// `start` is `[flow, path within flow...]` when a restart position lies
    /// inside the split. An `end` directive inside a flow ends only that
    /// flow; a failed flow fails the split, otherwise a stopped flow stops
    /// it.
    async fn run_split(self: &Arc<Self>, split: &Split, start: &[usize]) -> ElementResult {
        let mut tasks = JoinSet::new();
        for (index, flow) in split.flows.iter().enumerate() {
            let path = match start.split_first() {
                Some((first, rest)) if *first == index => rest.to_vec(),
                _ => Vec::new(),
            };
            let this = Arc::clone(self);
            let flow = flow.clone();
            tasks.spawn(async move {
                let end = this.run_sequence(&flow.elements, &path).await;
                (flow.id.clone(), end)
            });
        }
        tracing::info!(job = %self.job.id, split = %split.id, flows = split.flows.len(), "split:begin");

        let deadline = self
            .engine
            .config
            .split_timeout()
            .map(|timeout| tokio::time::Instant::now() + timeout);
        let mut timed_out = false;
        let mut status = BatchStatus::Completed;
        let mut last = Vec::new();
        loop {
            let joined = match deadline {
                Some(deadline) if !timed_out => match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        timed_out = true;
                        let e = StepError::SplitTimeout {
                            split: split.id.clone(),
                            timeout_ms: self.engine.config.split_timeout_ms.unwrap_or_default(),
                        };
                        tracing::warn!(job = %self.job.id, error = %e, "split:timed out");
                        self.signals.request_stop();
                        continue;
                    }
                },
                _ => tasks.join_next().await,
            };
            let Some(joined) = joined else { break };
            let flow_status = match joined {
                Ok((flow, end)) => {
                    last.extend(end.last);
                    let flow_status = match end.ending {
                        Ending::Finished { .. } => BatchStatus::Completed,
                        Ending::Terminated { status, .. } => status,
                    };
                    tracing::debug!(job = %self.job.id, split = %split.id, flow = %flow, status = %flow_status, "split:flow finished");
                    flow_status
                }
                Err(e) => {
                    tracing::error!(job = %self.job.id, split = %split.id, error = %e, "split:flow aborted");
                    BatchStatus::Failed
                }
            };
            if flow_status.severity() > status.severity() {
                status = flow_status;
            }
        }
        if timed_out {
            status = BatchStatus::Failed;
        }
        tracing::info!(job = %self.job.id, split = %split.id, status = %status, "split:finished");
        ElementResult {
            status,
            exit_status: status.as_str().to_string(),
            last,
        }
    }

    /// Ask the decision's decider for the exit status to match rules on.
    async fn decide(&self, decision: &Decision, last: &[StepExecution]) -> Result<String, StepError> {
        let config = ArtifactRegistry::config(&decision.decider, &self.resolver);
        let mut decider = self.engine.registry.create_decider(&config)?;
        let exit_status = decider
            .decide(last)
            .await
            .map_err(|e| StepError::artifact(Phase::Decision, e))?;
        tracing::info!(job = %self.job.id, decision = %decision.id, exit_status = %exit_status, "decision:decided");
        Ok(exit_status)
    }
}

#[cfg(test)]
#[path = "walk_tests.rs"]
mod tests;
