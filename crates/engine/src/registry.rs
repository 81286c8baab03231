// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact factories keyed by name.
//!
//! A plan refers to artifacts by name; the registry turns a name plus its
//! resolved properties into a fresh instance for each step or partition
//! execution.

use crate::artifact::*;
use crate::{ArtifactError, Phase, StepError};
use bw_plan::{ArtifactRef, CheckpointPolicy, Element, Job, PartitionSource, PlanError, PropertyResolver, StepTask};
use std::collections::HashMap;
use std::sync::Arc;

type Factory<T> = Arc<dyn Fn(&ArtifactConfig) -> Result<T, ArtifactError> + Send + Sync>;

macro_rules! families {
    ($( $field:ident, $create:ident, $family:literal => $holder:ident<dyn $tr:ident> ),* $(,)?) => {
        /// Named artifact factories, one map per artifact family.
        #[derive(Clone, Default)]
        pub struct ArtifactRegistry {
            $( $field: HashMap<String, Factory<$holder<dyn $tr>>>, )*
        }

        impl ArtifactRegistry {
            $(
                pub fn $field<A, F>(mut self, name: impl Into<String>, factory: F) -> Self
                where
                    A: $tr + 'static,
                    F: Fn(&ArtifactConfig) -> Result<A, ArtifactError> + Send + Sync + 'static,
                {
                    let factory: Factory<$holder<dyn $tr>> = Arc::new(move |config: &ArtifactConfig| {
                        factory(config).map(|a| $holder::new(a) as $holder<dyn $tr>)
                    });
                    self.$field.insert(name.into(), factory);
                    self
                }

                pub(crate) fn $create(&self, config: &ArtifactConfig) -> Result<$holder<dyn $tr>, StepError> {
                    let factory = self.$field.get(&config.name).ok_or_else(|| {
                        PlanError::UnknownArtifact {
                            name: config.name.clone(),
                            family: $family,
                        }
                    })?;
                    factory(config).map_err(|e| StepError::artifact(Phase::Instantiate, e))
                }
            )*
        }

        impl std::fmt::Debug for ArtifactRegistry {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let mut s = f.debug_struct("ArtifactRegistry");
                $( s.field(stringify!($field), &self.$field.keys().collect::<Vec<_>>()); )*
                s.finish()
            }
        }
    };
}

families! {
    batchlet, create_batchlet, "batchlet" => Arc<dyn Batchlet>,
    reader, create_reader, "reader" => Box<dyn ItemReader>,
    processor, create_processor, "processor" => Box<dyn ItemProcessor>,
    writer, create_writer, "writer" => Box<dyn ItemWriter>,
    checkpoint_algorithm, create_checkpoint_algorithm, "checkpoint algorithm" => Box<dyn CheckpointAlgorithm>,
    decider, create_decider, "decider" => Box<dyn Decider>,
    job_listener, create_job_listener, "job listener" => Arc<dyn JobListener>,
    step_listener, create_step_listener, "step listener" => Arc<dyn StepListener>,
    chunk_listener, create_chunk_listener, "chunk listener" => Arc<dyn ChunkListener>,
    item_listener, create_item_listener, "item listener" => Arc<dyn ItemListener>,
    retry_listener, create_retry_listener, "retry listener" => Arc<dyn RetryListener>,
    skip_listener, create_skip_listener, "skip listener" => Arc<dyn SkipListener>,
    mapper, create_mapper, "partition mapper" => Box<dyn PartitionMapper>,
    collector, create_collector, "partition collector" => Box<dyn PartitionCollector>,
    analyzer, create_analyzer, "partition analyzer" => Box<dyn PartitionAnalyzer>,
    reducer, create_reducer, "partition reducer" => Box<dyn PartitionReducer>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve an artifact reference into the config its factory receives.
    pub(crate) fn config(artifact: &ArtifactRef, resolver: &PropertyResolver) -> ArtifactConfig {
        ArtifactConfig {
            name: artifact.name.clone(),
            properties: resolver.resolve_all(&artifact.properties),
            params: resolver.job_parameters().clone(),
        }
    }

    /// Whether `name` is registered in any step-scoped listener family.
    pub(crate) fn has_step_scoped_listener(&self, name: &str) -> bool {
        self.step_listener.contains_key(name)
            || self.chunk_listener.contains_key(name)
            || self.item_listener.contains_key(name)
            || self.retry_listener.contains_key(name)
            || self.skip_listener.contains_key(name)
    }

    /// Instantiate every family `name` is registered in as a step-scoped
    /// listener.
    pub(crate) fn step_scoped_listeners(
        &self,
        config: &ArtifactConfig,
    ) -> Result<StepScopedListeners, StepError> {
        let name = config.name.as_str();
        let mut out = StepScopedListeners::default();
        if self.step_listener.contains_key(name) {
            out.step = Some(self.create_step_listener(config)?);
        }
        if self.chunk_listener.contains_key(name) {
            out.chunk = Some(self.create_chunk_listener(config)?);
        }
        if self.item_listener.contains_key(name) {
            out.item = Some(self.create_item_listener(config)?);
        }
        if self.retry_listener.contains_key(name) {
            out.retry = Some(self.create_retry_listener(config)?);
        }
        if self.skip_listener.contains_key(name) {
            out.skip = Some(self.create_skip_listener(config)?);
        }
        Ok(out)
    }

    /// Verify that every artifact the plan names is registered.
    pub fn check(&self, job: &Job) -> Result<(), PlanError> {
        for listener in &job.listeners {
            require(&self.job_listener, listener, "job listener")?;
        }
        self.check_elements(&job.elements)
    }

    fn check_elements(&self, elements: &[Element]) -> Result<(), PlanError> {
        for element in elements {
            match element {
                Element::Step(step) => {
                    for listener in &step.listeners {
                        if !self.has_step_scoped_listener(&listener.name) {
                            return Err(unknown(listener, "step listener"));
                        }
                    }
                    match &step.task {
                        StepTask::Batchlet(b) => require(&self.batchlet, b, "batchlet")?,
                        StepTask::Chunk(chunk) => {
                            require(&self.reader, &chunk.reader, "reader")?;
                            require(&self.writer, &chunk.writer, "writer")?;
                            if let Some(p) = &chunk.processor {
                                require(&self.processor, p, "processor")?;
                            }
                            if let CheckpointPolicy::Custom { algorithm } = &chunk.checkpoint {
                                require(&self.checkpoint_algorithm, algorithm, "checkpoint algorithm")?;
                            }
                        }
                    }
                    if let Some(partition) = &step.partition {
                        if let PartitionSource::Mapper(m) = &partition.source {
                            require(&self.mapper, m, "partition mapper")?;
                        }
                        if let Some(c) = &partition.collector {
                            require(&self.collector, c, "partition collector")?;
                        }
                        if let Some(a) = &partition.analyzer {
                            require(&self.analyzer, a, "partition analyzer")?;
                        }
                        if let Some(r) = &partition.reducer {
                            require(&self.reducer, r, "partition reducer")?;
                        }
                    }
                }
                Element::Flow(flow) => self.check_elements(&flow.elements)?,
                Element::Split(split) => {
                    for flow in &split.flows {
                        self.check_elements(&flow.elements)?;
                    }
                }
                Element::Decision(d) => require(&self.decider, &d.decider, "decider")?,
            }
        }
        Ok(())
    }
}

/// Step-scoped listener instances created from one listener reference.
#[derive(Default)]
pub(crate) struct StepScopedListeners {
    pub step: Option<Arc<dyn StepListener>>,
    pub chunk: Option<Arc<dyn ChunkListener>>,
    pub item: Option<Arc<dyn ItemListener>>,
    pub retry: Option<Arc<dyn RetryListener>>,
    pub skip: Option<Arc<dyn SkipListener>>,
}

fn require<T>(
    map: &HashMap<String, T>,
    artifact: &ArtifactRef,
    family: &'static str,
) -> Result<(), PlanError> {
    if map.contains_key(&artifact.name) {
        Ok(())
    } else {
        Err(unknown(artifact, family))
    }
}

fn unknown(artifact: &ArtifactRef, family: &'static str) -> PlanError {
    PlanError::UnknownArtifact {
        name: artifact.name.clone(),
        family,
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
