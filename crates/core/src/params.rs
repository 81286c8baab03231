// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job parameters supplied at start or restart.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reserved parameter naming the element a restart resumes at.
pub const RESTART_POSITION_PARAM: &str = "restart.position";

/// Immutable key/value parameters of a job execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobParameters(BTreeMap<String, String>);

impl JobParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Explicit restart position, if the caller supplied one.
    pub fn restart_position(&self) -> Option<&str> {
        self.get(RESTART_POSITION_PARAM).filter(|s| !s.is_empty())
    }

    /// Parameters for a restart: the prior run's values overridden by `self`.
    ///
    /// The restart position is a one-shot instruction and is never inherited.
    pub fn over(&self, prior: &JobParameters) -> JobParameters {
        let mut merged = prior.0.clone();
        merged.remove(RESTART_POSITION_PARAM);
        for (k, v) in &self.0 {
            merged.insert(k.clone(), v.clone());
        }
        JobParameters(merged)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for JobParameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
#[path = "params_tests.rs"]
mod tests;
