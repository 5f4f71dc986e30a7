//! [`MotionClip`] – an immutable reference trajectory table.
//!
//! A clip is built from four frame-indexed arrays of an `.npz` archive:
//!
//! | name | shape | kept |
//! |---|---|---|
//! | `body_pos_w` | `[frames, bodies, 3]` | body 0 only (root) |
//! | `body_quat_w` | `[frames, bodies, 4]` | body 0 only, `(w, x, y, z)`, normalised |
//! | `joint_pos` | `[frames, dof]` | all |
//! | `joint_vel` | `[frames, dof]` | all |
//!
//! All four arrays must agree on the frame count.  A mismatch is rejected
//! rather than truncated, so a successfully built clip always satisfies
//! `root_positions.len() == root_orientations.len() == num_frames`.

use std::path::Path;

use mimic_types::LoadError;
use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use tracing::{debug, info, instrument};

use crate::npz::{NpyArray, NpzArchive};

pub const BODY_POS_W: &str = "body_pos_w";
pub const BODY_QUAT_W: &str = "body_quat_w";
pub const JOINT_POS: &str = "joint_pos";
pub const JOINT_VEL: &str = "joint_vel";

/// Sampling step used by the motion capture pipeline (50 Hz).
pub const DEFAULT_CLIP_DT: f32 = 1.0 / 50.0;

/// The four raw arrays a clip is built from.
#[derive(Debug, Clone)]
pub struct MotionArrays {
    pub body_pos_w: NpyArray,
    pub body_quat_w: NpyArray,
    pub joint_pos: NpyArray,
    pub joint_vel: NpyArray,
}

impl MotionArrays {
    /// Read the four required arrays from an opened archive.
    pub fn read<R: std::io::Read + std::io::Seek>(
        archive: &mut NpzArchive<R>,
    ) -> Result<Self, LoadError> {
        Ok(Self {
            body_pos_w: archive.read_f32(BODY_POS_W)?,
            body_quat_w: archive.read_f32(BODY_QUAT_W)?,
            joint_pos: archive.read_f32(JOINT_POS)?,
            joint_vel: archive.read_f32(JOINT_VEL)?,
        })
    }
}

/// Borrowed view of a single clip frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameRef<'a> {
    pub root_position: &'a Vector3<f32>,
    pub root_orientation: &'a UnitQuaternion<f32>,
    pub joint_position: &'a [f32],
    pub joint_velocity: &'a [f32],
}

/// A loaded, fixed-length sequence of root poses and joint states sampled at
/// a constant time step.  Immutable once built.
#[derive(Debug, Clone)]
pub struct MotionClip {
    dt: f32,
    num_frames: usize,
    num_dof: usize,
    root_positions: Vec<Vector3<f32>>,
    root_orientations: Vec<UnitQuaternion<f32>>,
    /// Row-major `[num_frames, num_dof]`.
    joint_positions: Vec<f32>,
    /// Row-major `[num_frames, num_dof]`.
    joint_velocities: Vec<f32>,
}

impl MotionClip {
    /// Load a clip from the `.npz` archive at `path`, sampled every `dt`
    /// seconds.
    ///
    /// # Errors
    ///
    /// - [`LoadError::NotFound`] if `path` cannot be opened.
    /// - [`LoadError::MissingField`] if a required array is absent.
    /// - [`LoadError::ShapeMismatch`] if the arrays disagree on frame count.
    /// - [`LoadError::InvalidArray`] / [`LoadError::Empty`] for malformed data.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path, dt: f32) -> Result<Self, LoadError> {
        let mut archive = NpzArchive::open(path)?;
        debug!(arrays = ?archive.names(), "archive opened");
        let arrays = MotionArrays::read(&mut archive)?;
        let clip = Self::from_arrays(dt, &arrays)?;
        info!(
            frames = clip.num_frames,
            dof = clip.num_dof,
            duration_s = clip.duration(),
            "motion clip loaded"
        );
        Ok(clip)
    }

    /// Build a clip from in-memory arrays, applying the same validation as
    /// [`MotionClip::load`].
    pub fn from_arrays(dt: f32, arrays: &MotionArrays) -> Result<Self, LoadError> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(LoadError::InvalidArray {
                name: "dt".to_string(),
                reason: format!("time step must be positive, got {dt}"),
            });
        }

        expect_body_array(BODY_POS_W, &arrays.body_pos_w, 3)?;
        expect_body_array(BODY_QUAT_W, &arrays.body_quat_w, 4)?;
        expect_rank(JOINT_POS, &arrays.joint_pos, 2)?;
        expect_rank(JOINT_VEL, &arrays.joint_vel, 2)?;

        let num_frames = arrays.body_pos_w.len();
        for (field, array) in [
            (BODY_QUAT_W, &arrays.body_quat_w),
            (JOINT_POS, &arrays.joint_pos),
            (JOINT_VEL, &arrays.joint_vel),
        ] {
            if array.len() != num_frames {
                return Err(LoadError::ShapeMismatch {
                    field: field.to_string(),
                    expected: num_frames,
                    found: array.len(),
                });
            }
        }
        if num_frames == 0 {
            return Err(LoadError::Empty);
        }

        let num_dof = arrays.joint_pos.shape()[1];
        if arrays.joint_vel.shape()[1] != num_dof {
            return Err(LoadError::InvalidArray {
                name: JOINT_VEL.to_string(),
                reason: format!(
                    "{} joints, {JOINT_POS} has {num_dof}",
                    arrays.joint_vel.shape()[1]
                ),
            });
        }

        let pos_stride = arrays.body_pos_w.row_stride();
        let root_positions = (0..num_frames)
            .map(|i| Vector3::from_column_slice(&arrays.body_pos_w.data()[i * pos_stride..][..3]))
            .collect();

        let quat_stride = arrays.body_quat_w.row_stride();
        let root_orientations = (0..num_frames)
            .map(|i| {
                let q = &arrays.body_quat_w.data()[i * quat_stride..][..4];
                unit_quaternion(i, q[0], q[1], q[2], q[3])
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            dt,
            num_frames,
            num_dof,
            root_positions,
            root_orientations,
            joint_positions: arrays.joint_pos.data().to_vec(),
            joint_velocities: arrays.joint_vel.data().to_vec(),
        })
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    pub fn num_dof(&self) -> usize {
        self.num_dof
    }

    /// `num_frames * dt`.
    pub fn duration(&self) -> f32 {
        self.num_frames as f32 * self.dt
    }

    /// Borrow frame `index`, or `None` past the end of the clip.
    pub fn frame(&self, index: usize) -> Option<FrameRef<'_>> {
        if index >= self.num_frames {
            return None;
        }
        Some(self.row(index))
    }

    /// Borrow frame `index`.  Panics when `index >= num_frames`.
    pub(crate) fn row(&self, index: usize) -> FrameRef<'_> {
        let joints = index * self.num_dof..(index + 1) * self.num_dof;
        FrameRef {
            root_position: &self.root_positions[index],
            root_orientation: &self.root_orientations[index],
            joint_position: &self.joint_positions[joints.clone()],
            joint_velocity: &self.joint_velocities[joints],
        }
    }
}

fn expect_rank(name: &str, array: &NpyArray, rank: usize) -> Result<(), LoadError> {
    if array.shape().len() != rank {
        return Err(LoadError::InvalidArray {
            name: name.to_string(),
            reason: format!("expected rank {rank}, got shape {:?}", array.shape()),
        });
    }
    Ok(())
}

/// `[frames, bodies, width]` with at least one body.
fn expect_body_array(name: &str, array: &NpyArray, width: usize) -> Result<(), LoadError> {
    expect_rank(name, array, 3)?;
    let shape = array.shape();
    if shape[2] != width || shape[1] == 0 {
        return Err(LoadError::InvalidArray {
            name: name.to_string(),
            reason: format!("expected [frames, bodies>=1, {width}], got {shape:?}"),
        });
    }
    Ok(())
}

fn unit_quaternion(frame: usize, w: f32, x: f32, y: f32, z: f32) -> Result<UnitQuaternion<f32>, LoadError> {
    let q = Quaternion::new(w, x, y, z);
    let norm = q.norm();
    if !norm.is_finite() || norm <= f32::EPSILON {
        return Err(LoadError::InvalidArray {
            name: BODY_QUAT_W.to_string(),
            reason: format!("frame {frame} has a degenerate quaternion (norm {norm})"),
        });
    }
    Ok(UnitQuaternion::from_quaternion(q))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{npy_bytes, synthetic_entries, write_npz};

    fn write_clip(dir: &Path, entries: &[(&str, Vec<u8>)]) -> std::path::PathBuf {
        let path = dir.join("motion.npz");
        write_npz(&path, entries);
        path
    }

    #[test]
    fn load_keeps_only_root_body() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write_clip(dir.path(), &synthetic_entries(10, 3, 4, 0.02));

        let clip = MotionClip::load(&path, 0.02).unwrap();
        assert_eq!(clip.num_frames(), 10);
        assert_eq!(clip.num_dof(), 4);
        assert!((clip.duration() - 0.2).abs() < 1e-6);

        // Body 0 sits at x = t; bodies 1 and 2 are offset and must be ignored.
        let frame = clip.frame(5).unwrap();
        assert!((frame.root_position.x - 0.1).abs() < 1e-6);
        assert!((frame.root_position.z - 0.8).abs() < 1e-6);
        assert_eq!(frame.joint_position, &[5.0, 5.1, 5.2, 5.3]);
        assert_eq!(frame.joint_velocity, &[-5.0; 4]);
    }

    #[test]
    fn frame_past_end_is_none() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write_clip(dir.path(), &synthetic_entries(3, 1, 2, 0.02));
        let clip = MotionClip::load(&path, 0.02).unwrap();
        assert!(clip.frame(2).is_some());
        assert!(clip.frame(3).is_none());
    }

    #[test]
    fn quaternions_are_normalised() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let mut entries = synthetic_entries(2, 1, 1, 0.02);
        entries[1] = (BODY_QUAT_W, npy_bytes(&[2, 1, 4], &[2.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 3.0]));
        let path = write_clip(dir.path(), &entries);

        let clip = MotionClip::load(&path, 0.02).unwrap();
        let q0 = clip.frame(0).unwrap().root_orientation;
        let q1 = clip.frame(1).unwrap().root_orientation;
        assert!((q0.w - 1.0).abs() < 1e-6);
        assert!((q1.k - 1.0).abs() < 1e-6);
        assert!((q1.quaternion().norm() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn degenerate_quaternion_is_rejected() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let mut entries = synthetic_entries(1, 1, 1, 0.02);
        entries[1] = (BODY_QUAT_W, npy_bytes(&[1, 1, 4], &[0.0; 4]));
        let path = write_clip(dir.path(), &entries);
        assert!(matches!(
            MotionClip::load(&path, 0.02),
            Err(LoadError::InvalidArray { .. })
        ));
    }

    #[test]
    fn missing_required_array_is_rejected() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let mut entries = synthetic_entries(5, 1, 2, 0.02);
        entries.retain(|(name, _)| *name != JOINT_VEL);
        let path = write_clip(dir.path(), &entries);

        let err = MotionClip::load(&path, 0.02).unwrap_err();
        assert_eq!(err, LoadError::MissingField(JOINT_VEL.to_string()));
    }

    #[test]
    fn frame_count_mismatch_is_rejected() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let mut entries = synthetic_entries(5, 1, 2, 0.02);
        entries[2] = (JOINT_POS, npy_bytes(&[4, 2], &[0.0; 8]));
        let path = write_clip(dir.path(), &entries);

        let err = MotionClip::load(&path, 0.02).unwrap_err();
        assert_eq!(
            err,
            LoadError::ShapeMismatch {
                field: JOINT_POS.to_string(),
                expected: 5,
                found: 4,
            }
        );
    }

    #[test]
    fn joint_width_mismatch_is_rejected() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let mut entries = synthetic_entries(2, 1, 2, 0.02);
        entries[3] = (JOINT_VEL, npy_bytes(&[2, 3], &[0.0; 6]));
        let path = write_clip(dir.path(), &entries);
        assert!(matches!(
            MotionClip::load(&path, 0.02),
            Err(LoadError::InvalidArray { .. })
        ));
    }

    #[test]
    fn empty_clip_is_rejected() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write_clip(dir.path(), &synthetic_entries(0, 1, 2, 0.02));
        assert_eq!(MotionClip::load(&path, 0.02).unwrap_err(), LoadError::Empty);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let err = MotionClip::load(&dir.path().join("nope.npz"), 0.02).unwrap_err();
        assert!(matches!(err, LoadError::NotFound { .. }));
    }

    #[test]
    fn non_positive_dt_is_rejected() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write_clip(dir.path(), &synthetic_entries(2, 1, 1, 0.02));
        assert!(MotionClip::load(&path, 0.0).is_err());
        assert!(MotionClip::load(&path, -0.02).is_err());
    }
}
