// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transition rules attached to steps, flows and decisions.

use serde::{Deserialize, Serialize};

/// A declarative `on`-pattern to outcome mapping.
///
/// `on` is matched against an exit status with [`glob_matches`]; rules are
/// evaluated in declaration order and the first match wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "directive", rename_all = "snake_case")]
pub enum Transition {
    /// Continue at the sibling element `to`.
    Next { on: String, to: String },
    /// Terminate the job as COMPLETED.
    End {
        on: String,
        #[serde(default)]
        exit_status: Option<String>,
    },
    /// Terminate the job as FAILED.
    Fail {
        on: String,
        #[serde(default)]
        exit_status: Option<String>,
    },
    /// Terminate the job as STOPPED, optionally recording where a restart
    /// should resume.
    Stop {
        on: String,
        #[serde(default)]
        exit_status: Option<String>,
        #[serde(default)]
        restart: Option<String>,
    },
}

impl Transition {
    pub fn next(on: impl Into<String>, to: impl Into<String>) -> Self {
        Transition::Next {
            on: on.into(),
            to: to.into(),
        }
    }

    pub fn end(on: impl Into<String>) -> Self {
        Transition::End {
            on: on.into(),
            exit_status: None,
        }
    }

    pub fn fail(on: impl Into<String>) -> Self {
        Transition::Fail {
            on: on.into(),
            exit_status: None,
        }
    }

    pub fn stop(on: impl Into<String>) -> Self {
        Transition::Stop {
            on: on.into(),
            exit_status: None,
            restart: None,
        }
    }

    /// Set the directive's exit status. No effect on `next` rules.
    pub fn with_exit_status(mut self, status: impl Into<String>) -> Self {
        match &mut self {
            Transition::End { exit_status, .. }
            | Transition::Fail { exit_status, .. }
            | Transition::Stop { exit_status, .. } => *exit_status = Some(status.into()),
            Transition::Next { .. } => {}
        }
        self
    }

    /// Set the restart position of a `stop` rule.
    pub fn with_restart(mut self, target: impl Into<String>) -> Self {
        if let Transition::Stop { restart, .. } = &mut self {
            *restart = Some(target.into());
        }
        self
    }

    pub fn on(&self) -> &str {
        match self {
            Transition::Next { on, .. }
            | Transition::End { on, .. }
            | Transition::Fail { on, .. }
            | Transition::Stop { on, .. } => on,
        }
    }

    pub fn matches(&self, exit_status: &str) -> bool {
        glob_matches(self.on(), exit_status)
    }

    pub fn exit_status(&self) -> Option<&str> {
        match self {
            Transition::End { exit_status, .. }
            | Transition::Fail { exit_status, .. }
            | Transition::Stop { exit_status, .. } => exit_status.as_deref(),
            Transition::Next { .. } => None,
        }
    }
}

/// Simple glob match: `*` matches any run of characters (including none),
/// `?` matches exactly one character, everything else matches verbatim.
pub fn glob_matches(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    // Position of the last `*` and the text index it was tried against
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|c| *c == '*')
}

#[cfg(test)]
#[path = "transition_tests.rs"]
mod tests;
