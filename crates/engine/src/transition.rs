// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transition resolution after a step, flow, split or decision finishes.

use bw_plan::{Element, Transition};

/// Where the walk goes after an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// Continue at the sibling element with this id.
    Next(String),
    End { exit_status: String },
    Fail { exit_status: String },
    Stop { exit_status: String, restart: Option<String> },
    /// No rule matched and no successor is declared.
    Finished,
}

/// Select the outcome for `element` given its exit status.
///
/// Rules are evaluated in declaration order and the first match wins; the
/// `next` attribute applies only when no rule matches. A failed element
/// consults its rules but never its `next` attribute, so a failure without
/// a matching rule finishes the sequence.
pub(crate) fn resolve(element: &Element, exit_status: &str, failed: bool) -> Outcome {
    if let Some(rule) = element.transitions().iter().find(|r| r.matches(exit_status)) {
        let exit = || rule.exit_status().unwrap_or(exit_status).to_string();
        return match rule {
            Transition::Next { to, .. } => Outcome::Next(to.clone()),
            Transition::End { .. } => Outcome::End { exit_status: exit() },
            Transition::Fail { .. } => Outcome::Fail { exit_status: exit() },
            Transition::Stop { restart, .. } => Outcome::Stop {
                exit_status: exit(),
                restart: restart.clone(),
            },
        };
    }
    match element.next() {
        Some(next) if !failed => Outcome::Next(next.to_string()),
        _ => Outcome::Finished,
    }
}

#[cfg(test)]
#[path = "transition_tests.rs"]
mod tests;
