//! Reference-motion observation terms.
//!
//! These are the clip-derived slices of the policy observation.  Robot
//! proprioception is appended by the runtime.

use nalgebra::UnitQuaternion;

use crate::anchor::AnchorAligner;
use crate::cursor::PlaybackCursor;

/// Joint position targets followed by joint velocity targets at the cursor's
/// frame (`2 × dof` values).
pub fn motion_command(cursor: &PlaybackCursor) -> Vec<f32> {
    let mut out = Vec::with_capacity(2 * cursor.clip().num_dof());
    out.extend_from_slice(cursor.joint_position());
    out.extend_from_slice(cursor.joint_velocity());
    out
}

/// Reference root orientation relative to the robot's root, as the first
/// two columns of the rotation matrix in row-major order.
///
/// The relative rotation is `R(robot)ᵀ · world_to_init · R(q_ref)`; when the
/// robot tracks the aligned reference exactly this is the identity and the
/// term reads `[1, 0, 0, 1, 0, 0]`.
pub fn motion_anchor_ori_b(
    cursor: &PlaybackCursor,
    anchor: &AnchorAligner,
    robot_orientation: &UnitQuaternion<f32>,
) -> [f32; 6] {
    let reference = anchor.orientation_in_world(cursor.root_orientation());
    let relative = robot_orientation.to_rotation_matrix().transpose() * reference;
    let m = relative.matrix();
    [
        m[(0, 0)],
        m[(0, 1)],
        m[(1, 0)],
        m[(1, 1)],
        m[(2, 0)],
        m[(2, 1)],
    ]
}
