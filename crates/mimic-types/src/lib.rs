use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity of a behavior state inside the outer FSM: a numeric mode plus a
/// human-readable label (e.g. `(4, "Mimic")`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateId {
    pub mode: i32,
    pub label: String,
}

impl StateId {
    pub fn new(mode: i32, label: impl Into<String>) -> Self {
        Self {
            mode,
            label: label.into(),
        }
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.label, self.mode)
    }
}

/// Flat observation vector handed to the policy once per tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub values: Vec<f32>,
}

impl Observation {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    /// Append one observation term.
    pub fn push_term(&mut self, term: &[f32]) {
        self.values.extend_from_slice(term);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Joint position targets returned by the policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub joint_targets: Vec<f32>,
}

impl Action {
    pub fn new(joint_targets: Vec<f32>) -> Self {
        Self { joint_targets }
    }

    /// An all-zero action for `dof` joints.
    pub fn zeros(dof: usize) -> Self {
        Self::new(vec![0.0; dof])
    }
}

/// A liveness or hardware fault observed by the runtime.
///
/// Faults are reported (logged and retained) rather than propagated as panics
/// so that the dispatcher can decide how to escalate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultReport {
    pub component: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl FaultReport {
    pub fn now(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Failure to turn a motion archive into a usable clip.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LoadError {
    #[error("Motion archive not readable: {path}")]
    NotFound { path: PathBuf },

    #[error("Invalid motion archive: {0}")]
    InvalidArchive(String),

    #[error("Required array '{0}' missing from motion archive")]
    MissingField(String),

    #[error("Array '{name}' is malformed: {reason}")]
    InvalidArray { name: String, reason: String },

    #[error("Array '{field}' has {found} frames, expected {expected}")]
    ShapeMismatch {
        field: String,
        expected: usize,
        found: usize,
    },

    #[error("Motion clip has no frames")]
    Empty,
}

/// Error type spanning clip loading, lifecycle misuse, policy failures and
/// worker liveness faults.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum MimicError {
    #[error("Motion load failed: {0}")]
    Load(#[from] LoadError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No state registered for mode {mode:?} / label {label:?}")]
    UnknownState {
        mode: Option<i32>,
        label: Option<String>,
    },

    #[error("Policy inference failed: {0}")]
    PolicyFailed(String),

    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Worker for '{label}' did not stop within {timeout_ms} ms; detached")]
    WorkerStalled { label: String, timeout_ms: u64 },

    #[error("State '{0}' is already active")]
    AlreadyActive(String),
}
