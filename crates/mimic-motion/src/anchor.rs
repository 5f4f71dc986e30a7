//! [`AnchorAligner`] – yaw-only alignment of a clip to the robot's heading.
//!
//! A clip recorded with an arbitrary starting heading is re-expressed in the
//! robot's world frame through a single rotation computed at reset:
//!
//! ```text
//! world_to_init = yaw(q_robot) · yaw(q_clip[anchor_frame])ᵀ
//! ```
//!
//! Only the heading of each orientation is used; pitch and roll are
//! discarded so that the vertical axis of the reference is never tilted.
//!
//! # Consumption
//!
//! A clip root orientation `q_ref` maps into the robot's world frame as
//! `world_to_init · R(q_ref)` ([`AnchorAligner::orientation_in_world`]).  A
//! clip root position maps relative to the anchor frame as
//! `world_to_init · (p_ref − p_anchor) + p_robot`
//! ([`AnchorAligner::position_in_world`]).

use nalgebra::{Rotation3, UnitQuaternion, Vector3};
use tracing::debug;

use crate::cursor::PlaybackCursor;

/// The heading-only part of `q`, as a rotation about world `+z`.
///
/// Uses the ZYX Euler yaw `atan2(2(wz + xy), 1 − 2(y² + z²))`.
pub fn yaw_quaternion(q: &UnitQuaternion<f32>) -> UnitQuaternion<f32> {
    let (w, x, y, z) = (q.w, q.i, q.j, q.k);
    let yaw = (2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (y * y + z * z));
    UnitQuaternion::from_axis_angle(&Vector3::z_axis(), yaw)
}

/// Rotation relating a clip's reference heading to the robot's heading.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorAligner {
    world_to_init: Rotation3<f32>,
    anchor_frame: usize,
    anchor_position: Vector3<f32>,
}

impl Default for AnchorAligner {
    fn default() -> Self {
        Self {
            world_to_init: Rotation3::identity(),
            anchor_frame: 0,
            anchor_position: Vector3::zeros(),
        }
    }
}

impl AnchorAligner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance `cursor` to `time` and recompute `world_to_init` against
    /// `robot_orientation`.
    ///
    /// Identical inputs always produce an identical transform; no state from
    /// a previous reset survives.
    pub fn reset(
        &mut self,
        cursor: &mut PlaybackCursor,
        robot_orientation: &UnitQuaternion<f32>,
        time: f32,
    ) -> &Rotation3<f32> {
        self.anchor_frame = cursor.advance(time);
        self.anchor_position = *cursor.root_position();

        let init_to_anchor = yaw_quaternion(cursor.root_orientation()).to_rotation_matrix();
        let world_to_anchor = yaw_quaternion(robot_orientation).to_rotation_matrix();
        self.world_to_init = world_to_anchor * init_to_anchor.transpose();

        debug!(
            frame = self.anchor_frame,
            yaw_offset_rad = self.world_to_init.angle(),
            "anchor alignment reset"
        );
        &self.world_to_init
    }

    pub fn world_to_init(&self) -> &Rotation3<f32> {
        &self.world_to_init
    }

    /// Frame the last reset aligned against.
    pub fn anchor_frame(&self) -> usize {
        self.anchor_frame
    }

    /// Clip orientation `reference` expressed in the robot's world frame.
    pub fn orientation_in_world(&self, reference: &UnitQuaternion<f32>) -> Rotation3<f32> {
        self.world_to_init * reference.to_rotation_matrix()
    }

    /// Clip root position `reference` expressed in the robot's world frame,
    /// with the anchor frame's root landing on `robot_anchor`.
    pub fn position_in_world(
        &self,
        reference: &Vector3<f32>,
        robot_anchor: &Vector3<f32>,
    ) -> Vector3<f32> {
        self.world_to_init * (reference - self.anchor_position) + robot_anchor
    }
}
