// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan entities.

use crate::{ErrorFilter, Transition};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered string properties attached to jobs, steps and artifacts.
pub type Properties = IndexMap<String, String>;

/// Index path from the job root to a nested element.
///
/// `[2, 0, 1]` is the second element of the first flow of the split at
/// position 2 of the job. Flows contribute one index, splits two (flow then
/// element).
pub type ElementPath = Vec<usize>;

/// Reference to a registered artifact plus the properties handed to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: Properties,
}

impl ArtifactRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Properties::new(),
        }
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

impl From<&str> for ArtifactRef {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ArtifactRef {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Root of an execution plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    #[serde(default = "default_true")]
    pub restartable: bool,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub listeners: Vec<ArtifactRef>,
    pub elements: Vec<Element>,
}

fn default_true() -> bool {
    true
}

/// One node of a job or flow sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Element {
    Step(Step),
    Flow(Flow),
    Split(Split),
    Decision(Decision),
}

impl Element {
    pub fn id(&self) -> &str {
        match self {
            Element::Step(s) => &s.id,
            Element::Flow(f) => &f.id,
            Element::Split(s) => &s.id,
            Element::Decision(d) => &d.id,
        }
    }

    /// Declared default successor.
    pub fn next(&self) -> Option<&str> {
        match self {
            Element::Step(s) => s.next.as_deref(),
            Element::Flow(f) => f.next.as_deref(),
            Element::Split(s) => s.next.as_deref(),
            Element::Decision(_) => None,
        }
    }

    pub fn transitions(&self) -> &[Transition] {
        match self {
            Element::Step(s) => &s.transitions,
            Element::Flow(f) => &f.transitions,
            Element::Split(_) => &[],
            Element::Decision(d) => &d.transitions,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Element::Step(_) => "step",
            Element::Flow(_) => "flow",
            Element::Split(_) => "split",
            Element::Decision(_) => "decision",
        }
    }
}

/// A unit of work: a batchlet or a chunk, optionally partitioned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub transitions: Vec<Transition>,
    #[serde(default)]
    pub allow_start_if_complete: bool,
    /// Maximum starts per job instance; 0 means unlimited.
    #[serde(default)]
    pub start_limit: u32,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub listeners: Vec<ArtifactRef>,
    pub task: StepTask,
    #[serde(default)]
    pub partition: Option<Partition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepTask {
    Batchlet(ArtifactRef),
    Chunk(Chunk),
}

/// Read-process-write configuration of a chunk step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub reader: ArtifactRef,
    #[serde(default)]
    pub processor: Option<ArtifactRef>,
    pub writer: ArtifactRef,
    #[serde(default)]
    pub checkpoint: CheckpointPolicy,
    /// `None` is unlimited, `Some(0)` disables skipping.
    #[serde(default)]
    pub skip_limit: Option<u32>,
    /// `None` is unlimited, `Some(0)` disables retrying.
    #[serde(default)]
    pub retry_limit: Option<u32>,
    #[serde(default)]
    pub skippable: ErrorFilter,
    #[serde(default)]
    pub retryable: ErrorFilter,
    #[serde(default)]
    pub no_rollback: ErrorFilter,
}

/// When a chunk commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum CheckpointPolicy {
    /// Commit after `item_count` items were read, or after `time_limit_secs`
    /// elapsed since the chunk began, whichever comes first.
    Item {
        #[serde(default)]
        item_count: Option<u32>,
        #[serde(default)]
        time_limit_secs: Option<u64>,
    },
    /// Commit when a checkpoint algorithm artifact says so.
    Custom { algorithm: ArtifactRef },
}

impl Default for CheckpointPolicy {
    fn default() -> Self {
        CheckpointPolicy::Item {
            item_count: None,
            time_limit_secs: None,
        }
    }
}

/// Fan-out configuration of a partitioned step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    pub source: PartitionSource,
    #[serde(default)]
    pub collector: Option<ArtifactRef>,
    #[serde(default)]
    pub analyzer: Option<ArtifactRef>,
    #[serde(default)]
    pub reducer: Option<ArtifactRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionSource {
    Static(PartitionPlan),
    Mapper(ArtifactRef),
}

/// Partition count, concurrency and per-partition properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartitionPlan {
    pub partitions: u32,
    /// Concurrency cap; defaults to the partition count.
    #[serde(default)]
    pub threads: Option<u32>,
    /// On restart, re-run every partition from scratch instead of only the
    /// unfinished ones.
    #[serde(default)]
    pub partitions_override: bool,
    /// Properties of partition `i` at index `i`. May be shorter than
    /// `partitions`; missing entries are empty.
    #[serde(default)]
    pub properties: Vec<Properties>,
}

impl PartitionPlan {
    pub fn new(partitions: u32) -> Self {
        Self {
            partitions,
            ..Default::default()
        }
    }

    pub fn properties_of(&self, index: u32) -> Properties {
        self.properties
            .get(index as usize)
            .cloned()
            .unwrap_or_default()
    }

    pub fn effective_threads(&self) -> usize {
        self.threads
            .filter(|t| *t > 0)
            .unwrap_or(self.partitions)
            .max(1) as usize
    }
}

/// An ordered sequence executed as one transitionable unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub id: String,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub transitions: Vec<Transition>,
    pub elements: Vec<Element>,
}

/// Flows executed concurrently; completes when every flow finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Split {
    pub id: String,
    #[serde(default)]
    pub next: Option<String>,
    pub flows: Vec<Flow>,
}

/// Computes an exit status for transition matching from the preceding
/// element's step executions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    pub decider: ArtifactRef,
    #[serde(default)]
    pub transitions: Vec<Transition>,
}

impl Job {
    /// Locate an element anywhere in the tree by id.
    pub fn locate(&self, id: &str) -> Option<ElementPath> {
        locate_in(&self.elements, id)
    }

    /// Resolve an index path produced by [`Job::locate`].
    pub fn element_at(&self, path: &[usize]) -> Option<&Element> {
        let (first, rest) = path.split_first()?;
        element_in(self.elements.get(*first)?, rest)
    }

    /// Find a step anywhere in the tree.
    pub fn step(&self, id: &str) -> Option<&Step> {
        match self.element_at(&self.locate(id)?)? {
            Element::Step(s) => Some(s),
            _ => None,
        }
    }

    /// Every step in declaration order, depth first.
    pub fn steps(&self) -> Vec<&Step> {
        let mut out = Vec::new();
        collect_steps(&self.elements, &mut out);
        out
    }
}

fn locate_in(elements: &[Element], id: &str) -> Option<ElementPath> {
    for (i, element) in elements.iter().enumerate() {
        if element.id() == id {
            return Some(vec![i]);
        }
        let nested = match element {
            Element::Flow(f) => locate_in(&f.elements, id),
            Element::Split(s) => s.flows.iter().enumerate().find_map(|(fi, flow)| {
                if flow.id == id {
                    return Some(vec![fi]);
                }
                locate_in(&flow.elements, id).map(|mut p| {
                    p.insert(0, fi);
                    p
                })
            }),
            _ => None,
        };
        if let Some(mut path) = nested {
            path.insert(0, i);
            return Some(path);
        }
    }
    None
}

fn element_in<'a>(element: &'a Element, rest: &[usize]) -> Option<&'a Element> {
    let Some((first, rest)) = rest.split_first() else {
        return Some(element);
    };
    match element {
        Element::Flow(f) => element_in(f.elements.get(*first)?, rest),
        Element::Split(s) => {
            let flow = s.flows.get(*first)?;
            match rest.split_first() {
                None => None,
                Some((second, rest)) => element_in(flow.elements.get(*second)?, rest),
            }
        }
        _ => None,
    }
}

fn collect_steps<'a>(elements: &'a [Element], out: &mut Vec<&'a Step>) {
    for element in elements {
        match element {
            Element::Step(s) => out.push(s),
            Element::Flow(f) => collect_steps(&f.elements, out),
            Element::Split(s) => {
                for flow in &s.flows {
                    collect_steps(&flow.elements, out);
                }
            }
            Element::Decision(_) => {}
        }
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
