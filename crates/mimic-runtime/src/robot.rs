//! Collaborator interfaces consumed by the mimic behavior.
//!
//! The behavior never talks to hardware or to the inference backend
//! directly.  It reads robot state through [`Articulation`], hands
//! observations to a [`Policy`], and writes joint targets to a
//! [`JointCommandSink`].  Real drivers and the simulated stand-ins in
//! [`sim`][crate::sim] implement the same traits, so either can be swapped in
//! without touching the playback logic.

use mimic_types::{Action, MimicError, Observation};
use nalgebra::{UnitQuaternion, Vector3};

/// Read-only view of the robot's articulation state.
///
/// Shared between the dispatcher thread and the policy worker, hence
/// `Send + Sync`.
pub trait Articulation: Send + Sync {
    /// Root orientation in the world frame.
    fn root_orientation(&self) -> UnitQuaternion<f32>;

    /// Joint positions in radians, in policy joint order.
    fn joint_positions(&self) -> Vec<f32>;

    /// Joint velocities in rad/s, in policy joint order.
    fn joint_velocities(&self) -> Vec<f32>;

    /// World gravity direction expressed in the root frame.
    fn projected_gravity(&self) -> Vector3<f32> {
        self.root_orientation().inverse() * Vector3::new(0.0, 0.0, -1.0)
    }
}

/// Opaque control policy mapping an observation to an action.
pub trait Policy: Send {
    /// # Errors
    ///
    /// Returns [`MimicError::PolicyFailed`] if inference cannot produce an
    /// action for `observation`.
    fn act(&mut self, observation: &Observation) -> Result<Action, MimicError>;
}

/// Low-level joint command output.
pub trait JointCommandSink: Send {
    /// Apply per-joint PD gains.  Called once on behavior entry.
    ///
    /// # Errors
    ///
    /// Returns [`MimicError::HardwareFault`] if the gains cannot be applied.
    fn set_gains(&mut self, kp: &[f32], kd: &[f32]) -> Result<(), MimicError>;

    /// Command joint position targets.
    ///
    /// # Errors
    ///
    /// Returns [`MimicError::HardwareFault`] if the command cannot be sent.
    fn command(&mut self, targets: &[f32]) -> Result<(), MimicError>;
}
