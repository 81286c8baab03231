// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Include/exclude filters over hierarchical error kinds.
//!
//! Error kinds are dotted names (`io.timeout.connect`). A pattern matches a
//! kind when it equals the kind or is one of its dot-prefixes; `*` matches
//! every kind. When both an include and an exclude pattern match, the more
//! specific one decides and a tie excludes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorFilter {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl ErrorFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(mut self, kind: impl Into<String>) -> Self {
        self.include.push(kind.into());
        self
    }

    pub fn exclude(mut self, kind: impl Into<String>) -> Self {
        self.exclude.push(kind.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty()
    }

    /// Whether `kind` is selected by this filter.
    pub fn matches(&self, kind: &str) -> bool {
        let Some(included) = closest(&self.include, kind) else {
            return false;
        };
        match closest(&self.exclude, kind) {
            Some(excluded) => excluded > included,
            None => true,
        }
    }
}

/// Smallest ancestry distance from `kind` to any of `patterns`.
fn closest(patterns: &[String], kind: &str) -> Option<usize> {
    patterns.iter().filter_map(|p| distance(p, kind)).min()
}

/// Number of dot segments separating `pattern` from `kind`, if `pattern` is
/// `kind` itself or one of its ancestors.
fn distance(pattern: &str, kind: &str) -> Option<usize> {
    if pattern == kind {
        return Some(0);
    }
    let depth = kind.split('.').count();
    if pattern == "*" {
        return Some(depth);
    }
    let rest = kind.strip_prefix(pattern)?.strip_prefix('.')?;
    Some(rest.split('.').count())
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod tests;
