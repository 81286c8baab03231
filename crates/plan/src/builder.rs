// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fluent plan builders for embedding applications and tests.

use crate::{
    validate, ArtifactRef, CheckpointPolicy, Chunk, Decision, Element, ErrorFilter, Flow, Job,
    Partition, PartitionPlan, PartitionSource, PlanError, Properties, Split, Step, StepTask,
    Transition,
};

pub struct JobBuilder {
    id: String,
    restartable: bool,
    properties: Properties,
    listeners: Vec<ArtifactRef>,
    elements: Vec<Element>,
}

impl JobBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            restartable: true,
            properties: Properties::new(),
            listeners: Vec::new(),
            elements: Vec::new(),
        }
    }

    bw_core::setters! {
        set {
            restartable: bool,
        }
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn listener(mut self, artifact: impl Into<ArtifactRef>) -> Self {
        self.listeners.push(artifact.into());
        self
    }

    pub fn element(mut self, element: impl Into<Element>) -> Self {
        self.elements.push(element.into());
        self
    }

    /// Build and validate the plan.
    pub fn build(self) -> Result<Job, PlanError> {
        let job = Job {
            id: self.id,
            restartable: self.restartable,
            properties: self.properties,
            listeners: self.listeners,
            elements: self.elements,
        };
        validate(&job)?;
        Ok(job)
    }
}

pub struct StepBuilder {
    id: String,
    next: Option<String>,
    transitions: Vec<Transition>,
    allow_start_if_complete: bool,
    start_limit: u32,
    properties: Properties,
    listeners: Vec<ArtifactRef>,
    task: StepTask,
    partition: Option<Partition>,
}

impl StepBuilder {
    pub fn batchlet(id: impl Into<String>, batchlet: impl Into<ArtifactRef>) -> Self {
        Self::with_task(id, StepTask::Batchlet(batchlet.into()))
    }

    pub fn chunk(id: impl Into<String>, chunk: impl Into<Chunk>) -> Self {
        Self::with_task(id, StepTask::Chunk(chunk.into()))
    }

    fn with_task(id: impl Into<String>, task: StepTask) -> Self {
        Self {
            id: id.into(),
            next: None,
            transitions: Vec::new(),
            allow_start_if_complete: false,
            start_limit: 0,
            properties: Properties::new(),
            listeners: Vec::new(),
            task,
            partition: None,
        }
    }

    bw_core::setters! {
        set {
            allow_start_if_complete: bool,
            start_limit: u32,
        }
        option {
            next: String,
            partition: Partition,
        }
    }

    pub fn transition(mut self, rule: Transition) -> Self {
        self.transitions.push(rule);
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn listener(mut self, artifact: impl Into<ArtifactRef>) -> Self {
        self.listeners.push(artifact.into());
        self
    }

    /// Partition into `count` static partitions with per-partition
    /// properties.
    pub fn partitions(self, count: u32, properties: Vec<Properties>) -> Self {
        self.partition(Partition {
            source: PartitionSource::Static(PartitionPlan {
                partitions: count,
                properties,
                ..Default::default()
            }),
            collector: None,
            analyzer: None,
            reducer: None,
        })
    }

    pub fn build(self) -> Step {
        Step {
            id: self.id,
            next: self.next,
            transitions: self.transitions,
            allow_start_if_complete: self.allow_start_if_complete,
            start_limit: self.start_limit,
            properties: self.properties,
            listeners: self.listeners,
            task: self.task,
            partition: self.partition,
        }
    }
}

impl From<StepBuilder> for Element {
    fn from(b: StepBuilder) -> Self {
        Element::Step(b.build())
    }
}

pub struct ChunkBuilder {
    reader: ArtifactRef,
    processor: Option<ArtifactRef>,
    writer: ArtifactRef,
    checkpoint: CheckpointPolicy,
    skip_limit: Option<u32>,
    retry_limit: Option<u32>,
    skippable: ErrorFilter,
    retryable: ErrorFilter,
    no_rollback: ErrorFilter,
}

impl ChunkBuilder {
    pub fn new(reader: impl Into<ArtifactRef>, writer: impl Into<ArtifactRef>) -> Self {
        Self {
            reader: reader.into(),
            processor: None,
            writer: writer.into(),
            checkpoint: CheckpointPolicy::default(),
            skip_limit: None,
            retry_limit: None,
            skippable: ErrorFilter::default(),
            retryable: ErrorFilter::default(),
            no_rollback: ErrorFilter::default(),
        }
    }

    bw_core::setters! {
        set {
            checkpoint: CheckpointPolicy,
            skippable: ErrorFilter,
            retryable: ErrorFilter,
            no_rollback: ErrorFilter,
        }
        option {
            processor: ArtifactRef,
            skip_limit: u32,
            retry_limit: u32,
        }
    }

    /// Commit every `n` items.
    pub fn item_count(self, n: u32) -> Self {
        let time_limit_secs = match self.checkpoint {
            CheckpointPolicy::Item {
                time_limit_secs, ..
            } => time_limit_secs,
            CheckpointPolicy::Custom { .. } => None,
        };
        self.checkpoint(CheckpointPolicy::Item {
            item_count: Some(n),
            time_limit_secs,
        })
    }

    pub fn build(self) -> Chunk {
        Chunk {
            reader: self.reader,
            processor: self.processor,
            writer: self.writer,
            checkpoint: self.checkpoint,
            skip_limit: self.skip_limit,
            retry_limit: self.retry_limit,
            skippable: self.skippable,
            retryable: self.retryable,
            no_rollback: self.no_rollback,
        }
    }
}

impl From<ChunkBuilder> for Chunk {
    fn from(b: ChunkBuilder) -> Self {
        b.build()
    }
}

pub struct FlowBuilder {
    id: String,
    next: Option<String>,
    transitions: Vec<Transition>,
    elements: Vec<Element>,
}

impl FlowBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            next: None,
            transitions: Vec::new(),
            elements: Vec::new(),
        }
    }

    bw_core::setters! {
        option {
            next: String,
        }
    }

    pub fn transition(mut self, rule: Transition) -> Self {
        self.transitions.push(rule);
        self
    }

    pub fn element(mut self, element: impl Into<Element>) -> Self {
        self.elements.push(element.into());
        self
    }

    pub fn build(self) -> Flow {
        Flow {
            id: self.id,
            next: self.next,
            transitions: self.transitions,
            elements: self.elements,
        }
    }
}

impl From<FlowBuilder> for Element {
    fn from(b: FlowBuilder) -> Self {
        Element::Flow(b.build())
    }
}

pub struct SplitBuilder {
    id: String,
    next: Option<String>,
    flows: Vec<Flow>,
}

impl SplitBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            next: None,
            flows: Vec::new(),
        }
    }

    bw_core::setters! {
        option {
            next: String,
        }
    }

    pub fn flow(mut self, flow: FlowBuilder) -> Self {
        self.flows.push(flow.build());
        self
    }
}

impl From<SplitBuilder> for Element {
    fn from(b: SplitBuilder) -> Self {
        Element::Split(Split {
            id: b.id,
            next: b.next,
            flows: b.flows,
        })
    }
}

pub struct DecisionBuilder {
    id: String,
    decider: ArtifactRef,
    transitions: Vec<Transition>,
}

impl DecisionBuilder {
    pub fn new(id: impl Into<String>, decider: impl Into<ArtifactRef>) -> Self {
        Self {
            id: id.into(),
            decider: decider.into(),
            transitions: Vec::new(),
        }
    }

    pub fn transition(mut self, rule: Transition) -> Self {
        self.transitions.push(rule);
        self
    }
}

impl From<DecisionBuilder> for Element {
    fn from(b: DecisionBuilder) -> Self {
        Element::Decision(Decision {
            id: b.id,
            decider: b.decider,
            transitions: b.transitions,
        })
    }
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
