// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan validation.
//!
//! Every structural problem is reported before a job starts, never while it
//! runs.

use crate::{ArtifactRef, CheckpointPolicy, Element, Flow, Job, PartitionSource, StepTask, Transition};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("{kind} '{id}' has no elements")]
    EmptySequence { kind: &'static str, id: String },
    #[error("a {kind} has an empty id")]
    EmptyId { kind: &'static str },
    #[error("duplicate element id '{0}'")]
    DuplicateId(String),
    #[error("{from} references unknown element '{to}'")]
    UnknownTarget { from: String, to: String },
    #[error("decision '{0}' cannot be the first element of a sequence")]
    DecisionFirst(String),
    #[error("step '{step}': item count must be at least 1")]
    InvalidItemCount { step: String },
    #[error("step '{step}': a static partition plan needs at least one partition")]
    InvalidPartitionCount { step: String },
    #[error("{element}: {role} artifact name is empty")]
    MissingArtifact { element: String, role: &'static str },
    #[error("restart position '{0}' does not name a runnable element of the job")]
    UnknownRestartPosition(String),
    #[error("no {family} artifact named '{name}' is registered")]
    UnknownArtifact { name: String, family: &'static str },
}

/// Validate the structure of a plan.
pub fn validate(job: &Job) -> Result<(), PlanError> {
    if job.id.is_empty() {
        return Err(PlanError::EmptyId { kind: "job" });
    }
    let mut ids = HashSet::new();
    check_artifacts("job", &job.id, &job.listeners)?;
    check_sequence(job, "job", &job.id, &job.elements, &mut ids)
}

fn check_sequence<'a>(
    job: &Job,
    kind: &'static str,
    id: &str,
    elements: &'a [Element],
    ids: &mut HashSet<&'a str>,
) -> Result<(), PlanError> {
    let Some(first) = elements.first() else {
        return Err(PlanError::EmptySequence {
            kind,
            id: id.to_string(),
        });
    };
    if let Element::Decision(d) = first {
        return Err(PlanError::DecisionFirst(d.id.clone()));
    }

    for element in elements {
        let eid = element.id();
        if eid.is_empty() {
            return Err(PlanError::EmptyId {
                kind: element.kind(),
            });
        }
        if !ids.insert(eid) {
            return Err(PlanError::DuplicateId(eid.to_string()));
        }
    }

    let siblings: HashSet<&str> = elements.iter().map(Element::id).collect();
    for element in elements {
        let from = format!("{} '{}'", element.kind(), element.id());
        if let Some(next) = element.next() {
            check_sibling(&siblings, &from, next)?;
        }
        for rule in element.transitions() {
            match rule {
                Transition::Next { to, .. } => check_sibling(&siblings, &from, to)?,
                Transition::Stop {
                    restart: Some(target),
                    ..
                } => {
                    let runnable = job
                        .locate(target)
                        .and_then(|path| job.element_at(&path))
                        .is_some();
                    if !runnable {
                        return Err(PlanError::UnknownTarget {
                            from,
                            to: target.clone(),
                        });
                    }
                }
                _ => {}
            }
        }
        check_element(job, element, ids)?;
    }
    Ok(())
}

fn check_sibling(siblings: &HashSet<&str>, from: &str, to: &str) -> Result<(), PlanError> {
    if siblings.contains(to) {
        Ok(())
    } else {
        Err(PlanError::UnknownTarget {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

fn check_element<'a>(
    job: &Job,
    element: &'a Element,
    ids: &mut HashSet<&'a str>,
) -> Result<(), PlanError> {
    match element {
        Element::Step(step) => {
            check_artifacts("step", &step.id, &step.listeners)?;
            match &step.task {
                StepTask::Batchlet(b) => check_artifact(&step.id, "batchlet", b)?,
                StepTask::Chunk(chunk) => {
                    check_artifact(&step.id, "reader", &chunk.reader)?;
                    check_artifact(&step.id, "writer", &chunk.writer)?;
                    if let Some(p) = &chunk.processor {
                        check_artifact(&step.id, "processor", p)?;
                    }
                    match &chunk.checkpoint {
                        CheckpointPolicy::Item {
                            item_count: Some(0),
                            ..
                        } => {
                            return Err(PlanError::InvalidItemCount {
                                step: step.id.clone(),
                            })
                        }
                        CheckpointPolicy::Custom { algorithm } => {
                            check_artifact(&step.id, "checkpoint algorithm", algorithm)?
                        }
                        CheckpointPolicy::Item { .. } => {}
                    }
                }
            }
            if let Some(partition) = &step.partition {
                match &partition.source {
                    PartitionSource::Static(plan) if plan.partitions == 0 => {
                        return Err(PlanError::InvalidPartitionCount {
                            step: step.id.clone(),
                        })
                    }
                    PartitionSource::Mapper(mapper) => {
                        check_artifact(&step.id, "partition mapper", mapper)?
                    }
                    PartitionSource::Static(_) => {}
                }
                for (role, artifact) in [
                    ("partition collector", &partition.collector),
                    ("partition analyzer", &partition.analyzer),
                    ("partition reducer", &partition.reducer),
                ] {
                    if let Some(a) = artifact {
                        check_artifact(&step.id, role, a)?;
                    }
                }
            }
            Ok(())
        }
        Element::Flow(flow) => check_flow(job, flow, ids),
        Element::Split(split) => {
            if split.flows.is_empty() {
                return Err(PlanError::EmptySequence {
                    kind: "split",
                    id: split.id.clone(),
                });
            }
            for flow in &split.flows {
                if flow.id.is_empty() {
                    return Err(PlanError::EmptyId { kind: "flow" });
                }
                if !ids.insert(&flow.id) {
                    return Err(PlanError::DuplicateId(flow.id.clone()));
                }
                check_flow(job, flow, ids)?;
            }
            Ok(())
        }
        Element::Decision(decision) => check_artifact(&decision.id, "decider", &decision.decider),
    }
}

fn check_flow<'a>(job: &Job, flow: &'a Flow, ids: &mut HashSet<&'a str>) -> Result<(), PlanError> {
    check_sequence(job, "flow", &flow.id, &flow.elements, ids)
}

fn check_artifacts(kind: &str, id: &str, refs: &[ArtifactRef]) -> Result<(), PlanError> {
    for r in refs {
        check_artifact(&format!("{kind} '{id}'"), "listener", r)?;
    }
    Ok(())
}

fn check_artifact(element: &str, role: &'static str, artifact: &ArtifactRef) -> Result<(), PlanError> {
    if artifact.name.trim().is_empty() {
        return Err(PlanError::MissingArtifact {
            element: element.to_string(),
            role,
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
