//! In-process stand-ins for the robot and the policy.
//!
//! [`SimArticulation`] keeps a settable root orientation and joint state and
//! records every command sent through its [`SimJointSink`], which tracks
//! targets perfectly.  [`ReplayPolicy`] answers each observation with the
//! reference joint positions it contains.  Together they let the full mimic
//! lifecycle run headless in tests and from the CLI.
//!
//! # Example
//!
//! ```rust
//! use mimic_runtime::sim::SimArticulation;
//! use mimic_runtime::robot::{Articulation, JointCommandSink};
//!
//! let robot = SimArticulation::new(2);
//! let mut sink = robot.sink();
//! sink.command(&[0.1, -0.2]).expect("sim command must succeed");
//! assert_eq!(robot.joint_positions(), vec![0.1, -0.2]);
//! ```

use std::sync::{Arc, PoisonError, RwLock};

use mimic_types::{Action, MimicError, Observation};
use nalgebra::UnitQuaternion;

use crate::robot::{Articulation, JointCommandSink, Policy};

// ────────────────────────────────────────────────────────────────────────────
// Simulated articulation
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct SimState {
    orientation: UnitQuaternion<f32>,
    joint_pos: Vec<f32>,
    joint_vel: Vec<f32>,
    kp: Vec<f32>,
    kd: Vec<f32>,
    commands: u64,
}

/// A simulated robot with `dof` joints, upright and facing `+x` until told
/// otherwise.
#[derive(Debug)]
pub struct SimArticulation {
    dof: usize,
    state: RwLock<SimState>,
}

impl SimArticulation {
    pub fn new(dof: usize) -> Arc<Self> {
        Arc::new(Self {
            dof,
            state: RwLock::new(SimState {
                orientation: UnitQuaternion::identity(),
                joint_pos: vec![0.0; dof],
                joint_vel: vec![0.0; dof],
                kp: Vec::new(),
                kd: Vec::new(),
                commands: 0,
            }),
        })
    }

    pub fn dof(&self) -> usize {
        self.dof
    }

    pub fn set_orientation(&self, orientation: UnitQuaternion<f32>) {
        self.write().orientation = orientation;
    }

    /// Most recently applied `(kp, kd)` gains.
    pub fn gains(&self) -> (Vec<f32>, Vec<f32>) {
        let state = self.read();
        (state.kp.clone(), state.kd.clone())
    }

    /// Number of joint commands received so far.
    pub fn command_count(&self) -> u64 {
        self.read().commands
    }

    /// A command sink driving this robot.
    pub fn sink(self: &Arc<Self>) -> SimJointSink {
        SimJointSink {
            robot: Arc::clone(self),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, SimState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, SimState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_width(&self, what: &str, len: usize) -> Result<(), MimicError> {
        if len != self.dof {
            return Err(MimicError::HardwareFault {
                component: "sim_articulation".to_string(),
                details: format!("{what} has {len} entries, robot has {} joints", self.dof),
            });
        }
        Ok(())
    }
}

impl Articulation for SimArticulation {
    fn root_orientation(&self) -> UnitQuaternion<f32> {
        self.read().orientation
    }

    fn joint_positions(&self) -> Vec<f32> {
        self.read().joint_pos.clone()
    }

    fn joint_velocities(&self) -> Vec<f32> {
        self.read().joint_vel.clone()
    }
}

/// Command sink that moves the simulated joints straight to their targets.
pub struct SimJointSink {
    robot: Arc<SimArticulation>,
}

impl JointCommandSink for SimJointSink {
    fn set_gains(&mut self, kp: &[f32], kd: &[f32]) -> Result<(), MimicError> {
        self.robot.check_width("kp", kp.len())?;
        self.robot.check_width("kd", kd.len())?;
        let mut state = self.robot.write();
        state.kp = kp.to_vec();
        state.kd = kd.to_vec();
        Ok(())
    }

    fn command(&mut self, targets: &[f32]) -> Result<(), MimicError> {
        self.robot.check_width("target", targets.len())?;
        let mut state = self.robot.write();
        state.joint_pos.copy_from_slice(targets);
        state.joint_vel.iter_mut().for_each(|v| *v = 0.0);
        state.commands += 1;
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Replay policy
// ────────────────────────────────────────────────────────────────────────────

/// Policy that outputs the reference joint positions, which lead every
/// observation (see [`mimic_motion::observation::motion_command`]).
#[derive(Debug, Clone)]
pub struct ReplayPolicy {
    dof: usize,
}

impl ReplayPolicy {
    pub fn new(dof: usize) -> Self {
        Self { dof }
    }
}

impl Policy for ReplayPolicy {
    fn act(&mut self, observation: &Observation) -> Result<Action, MimicError> {
        observation
            .values
            .get(..self.dof)
            .map(|targets| Action::new(targets.to_vec()))
            .ok_or_else(|| {
                MimicError::PolicyFailed(format!(
                    "observation has {} values, need at least {}",
                    observation.len(),
                    self.dof
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_moves_joints_and_counts_commands() {
        let robot = SimArticulation::new(3);
        let mut sink = robot.sink();
        sink.command(&[0.1, 0.2, 0.3]).unwrap();
        sink.command(&[0.4, 0.5, 0.6]).unwrap();
        assert_eq!(robot.joint_positions(), vec![0.4, 0.5, 0.6]);
        assert_eq!(robot.joint_velocities(), vec![0.0; 3]);
        assert_eq!(robot.command_count(), 2);
    }

    #[test]
    fn sink_rejects_wrong_width() {
        let robot = SimArticulation::new(2);
        let mut sink = robot.sink();
        let err = sink.command(&[1.0]).unwrap_err();
        assert!(matches!(err, MimicError::HardwareFault { .. }));
        assert_eq!(robot.command_count(), 0);
    }

    #[test]
    fn gains_are_recorded() {
        let robot = SimArticulation::new(2);
        robot.sink().set_gains(&[40.0, 40.0], &[1.0, 1.0]).unwrap();
        assert_eq!(robot.gains(), (vec![40.0, 40.0], vec![1.0, 1.0]));
    }

    #[test]
    fn orientation_is_settable() {
        let robot = SimArticulation::new(1);
        let q = UnitQuaternion::from_euler_angles(0.0, 0.0, 0.5);
        robot.set_orientation(q);
        assert_eq!(robot.root_orientation(), q);
    }

    #[test]
    fn replay_policy_returns_leading_values() {
        let mut policy = ReplayPolicy::new(2);
        let obs = Observation {
            values: vec![0.5, -0.5, 9.0, 9.0],
        };
        assert_eq!(policy.act(&obs).unwrap().joint_targets, vec![0.5, -0.5]);
    }

    #[test]
    fn replay_policy_fails_on_short_observation() {
        let mut policy = ReplayPolicy::new(4);
        let obs = Observation { values: vec![1.0] };
        assert!(matches!(policy.act(&obs), Err(MimicError::PolicyFailed(_))));
    }
}
