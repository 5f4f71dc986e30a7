//! The [`FsmState`] contract between a behavior and the outer dispatcher.
//!
//! The dispatcher owns scheduling: it calls [`FsmState::enter`] once when the
//! behavior becomes active, [`FsmState::run`] once per dispatcher tick, polls
//! [`FsmState::check_transition`] to learn whether the behavior wants to hand
//! over, and calls [`FsmState::exit`] before switching away.  A behavior never
//! transitions itself.

use mimic_types::{MimicError, StateId};

/// Lifecycle phase of a behavior instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Constructed, never entered.
    Idle,
    /// Entered; background work is running.
    Active,
    /// Exited; may be entered again.
    Stopped,
}

/// A behavior state driven by the outer FSM dispatcher.
pub trait FsmState: Send {
    fn id(&self) -> &StateId;

    fn phase(&self) -> LifecyclePhase;

    /// Become active.
    fn enter(&mut self) -> Result<(), MimicError>;

    /// Per-dispatcher-tick hook.  Must not block.
    fn run(&mut self) -> Result<(), MimicError>;

    /// Stop all background work.  Returns only once nothing started by
    /// [`FsmState::enter`] is still running.
    fn exit(&mut self) -> Result<(), MimicError>;

    /// Label of the state the dispatcher should switch to, if any.
    fn check_transition(&self) -> Option<String> {
        None
    }
}
