// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Record identifiers.
//!
//! Every repository record is keyed by a monotonically increasing integer.
//! The newtypes keep a step execution id from being passed where a job
//! execution id is expected.

/// Define a newtype ID wrapper around `u64`.
///
/// Generates `new()`, `get()`, `Display`, `From<u64>`, and transparent serde.
///
/// ```ignore
/// define_id! {
///     /// Doc comment for the ID type.
///     pub struct JobExecutionId;
/// }
/// ```
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }
    };
}

define_id! {
    /// Identity of one logical job (job name + instance number).
    pub struct JobInstanceId;
}

define_id! {
    /// One run or re-run of a job instance. Unique across all instances.
    pub struct JobExecutionId;
}

define_id! {
    /// One execution of one step inside a job execution.
    pub struct StepExecutionId;
}

define_id! {
    /// One partition of a partitioned step execution.
    pub struct PartitionExecutionId;
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
