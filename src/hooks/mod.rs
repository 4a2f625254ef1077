//! Named extension points.
//!
//! The [`HookRegistry`] is a publish/subscribe table keyed by slot name. It
//! holds two kinds of callbacks:
//!
//! - **actions**: invoked for their side effects by [`HookRegistry::do_action`]
//! - **filters**: folded over a value by [`HookRegistry::apply_filters`]
//!
//! Callbacks are ordered by `(priority, registration order)` and each one is
//! isolated: an error or panic is logged, recorded in a [`HookReport`], and
//! the remaining callbacks still run.

pub mod handle;
pub mod isolation;
pub mod registry;

use serde::Serialize;

pub use handle::{HookHandle, Recorded, Registrations};
pub use registry::{ActionFn, DEFAULT_PRIORITY, HookRegistry, RegistrationToken};

/// Failure of a single hook callback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HookError {
    #[error("hook failed: {0}")]
    Failed(String),

    #[error("hook panicked: {0}")]
    Panic(String),

    /// A filter registered for a different value type than the one applied.
    #[error("filter value type mismatch: expected {expected}")]
    TypeMismatch { expected: &'static str },
}

impl HookError {
    pub fn failed(msg: impl Into<String>) -> Self {
        HookError::Failed(msg.into())
    }
}

/// A callback that failed during dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookFailure {
    pub slot: String,
    pub registrant_key: String,
    pub error: String,
}

/// Outcome of one dispatch over a slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HookReport {
    /// Callbacks invoked, failed ones included.
    pub invoked: usize,
    pub failures: Vec<HookFailure>,
}

impl HookReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_keys(&self) -> impl Iterator<Item = &str> {
        self.failures.iter().map(|f| f.registrant_key.as_str())
    }
}
