//! [`FsmRegistry`] – explicit table of constructible behavior states.
//!
//! States are registered by a deterministic initialisation routine at startup
//! (see `mimic-cli`), never as a side effect of linking.  Each entry pairs a
//! [`StateId`] with a factory, so the dispatcher can construct a state by
//! mode or by label and the registry contents can be inspected in tests.

use mimic_types::{MimicError, StateId};
use tracing::debug;

use crate::state::FsmState;

/// Builds a fresh state instance for the given id.
pub type StateFactory =
    Box<dyn Fn(&StateId) -> Result<Box<dyn FsmState>, MimicError> + Send + Sync>;

/// Registration-ordered table of behavior factories.
#[derive(Default)]
pub struct FsmRegistry {
    entries: Vec<(StateId, StateFactory)>,
}

impl FsmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `(mode, label)`.
    ///
    /// # Errors
    ///
    /// Returns [`MimicError::InvalidConfig`] if the mode or the label is
    /// already taken.
    pub fn register<F>(&mut self, mode: i32, label: &str, factory: F) -> Result<(), MimicError>
    where
        F: Fn(&StateId) -> Result<Box<dyn FsmState>, MimicError> + Send + Sync + 'static,
    {
        if let Some((existing, _)) = self
            .entries
            .iter()
            .find(|(id, _)| id.mode == mode || id.label == label)
        {
            return Err(MimicError::InvalidConfig(format!(
                "state ({mode}, {label}) collides with registered state {existing}"
            )));
        }
        debug!(mode, label, "state registered");
        self.entries
            .push((StateId::new(mode, label), Box::new(factory)));
        Ok(())
    }

    /// Construct the state registered under `mode`.
    pub fn create_by_mode(&self, mode: i32) -> Result<Box<dyn FsmState>, MimicError> {
        match self.entries.iter().find(|(id, _)| id.mode == mode) {
            Some((id, factory)) => factory(id),
            None => Err(MimicError::UnknownState {
                mode: Some(mode),
                label: None,
            }),
        }
    }

    /// Construct the state registered under `label`.
    pub fn create_by_label(&self, label: &str) -> Result<Box<dyn FsmState>, MimicError> {
        match self.entries.iter().find(|(id, _)| id.label == label) {
            Some((id, factory)) => factory(id),
            None => Err(MimicError::UnknownState {
                mode: None,
                label: Some(label.to_string()),
            }),
        }
    }

    pub fn contains_label(&self, label: &str) -> bool {
        self.entries.iter().any(|(id, _)| id.label == label)
    }

    /// Registered ids in registration order.
    pub fn ids(&self) -> Vec<StateId> {
        self.entries.iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
