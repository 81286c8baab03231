// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Property value resolution.
//!
//! Values may reference `#{jobParameters['k']}`, `#{jobProperties['k']}` and
//! `#{partitionPlan['k']}`. A run of references may be followed by
//! `?:default;`, used when the references resolve to an empty string.
//! Unknown keys resolve to empty; unknown sources are left as written.

use crate::Properties;
use bw_core::JobParameters;
use regex::{Captures, Regex};
use std::sync::LazyLock;

// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
static EXPR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"((?:#\{(?:jobParameters|jobProperties|partitionPlan)\['[^']*'\]\})+)(?:\?:([^;]*);)?")
        .expect("constant regex pattern is valid")
});

#[allow(clippy::expect_used)]
static REF_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"#\{(jobParameters|jobProperties|partitionPlan)\['([^']*)'\]\}")
        .expect("constant regex pattern is valid")
});

/// Resolves `#{...}` references against one artifact's scope.
#[derive(Debug, Clone, Default)]
pub struct PropertyResolver {
    job_parameters: JobParameters,
    job_properties: Properties,
    partition_plan: Properties,
}

impl PropertyResolver {
    /// Build a resolver whose job properties are themselves resolved against
    /// the job parameters and the job properties declared before them.
    pub fn new(job_parameters: JobParameters, job_properties: &Properties) -> Self {
        let mut resolver = Self {
            job_parameters,
            job_properties: Properties::new(),
            partition_plan: Properties::new(),
        };
        for (key, raw) in job_properties {
            let value = resolver.resolve(raw);
            resolver.job_properties.insert(key.clone(), value);
        }
        resolver
    }

    /// Scope the resolver to one partition's plan properties.
    pub fn with_partition(&self, partition_plan: Properties) -> Self {
        Self {
            partition_plan,
            ..self.clone()
        }
    }

    pub fn job_parameters(&self) -> &JobParameters {
        &self.job_parameters
    }

    pub fn job_properties(&self) -> &Properties {
        &self.job_properties
    }

    pub fn resolve(&self, raw: &str) -> String {
        EXPR_PATTERN
            .replace_all(raw, |caps: &Captures| {
                let value = REF_PATTERN
                    .replace_all(&caps[1], |r: &Captures| self.lookup(&r[1], &r[2]))
                    .into_owned();
                match caps.get(2) {
                    Some(default) if value.is_empty() => default.as_str().to_string(),
                    _ => value,
                }
            })
            .into_owned()
    }

    pub fn resolve_all(&self, props: &Properties) -> Properties {
        props
            .iter()
            .map(|(k, v)| (k.clone(), self.resolve(v)))
            .collect()
    }

    fn lookup(&self, source: &str, key: &str) -> String {
        let value = match source {
            "jobParameters" => self.job_parameters.get(key),
            "jobProperties" => self.job_properties.get(key).map(String::as_str),
            _ => self.partition_plan.get(key).map(String::as_str),
        };
        value.unwrap_or_default().to_string()
    }
}

#[cfg(test)]
#[path = "resolve_tests.rs"]
mod tests;
