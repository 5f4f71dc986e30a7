//! [`PlaybackCursor`] – maps elapsed playback time to a clip frame.
//!
//! ```text
//! phase = clamp(time, 0, duration)
//! frame = min(floor(phase / dt), num_frames - 1)
//! ```
//!
//! Times before the start hold frame 0 and times at or past the end hold the
//! last frame; playback never wraps around.

use std::sync::Arc;

use nalgebra::{UnitQuaternion, Vector3};

use crate::clip::{FrameRef, MotionClip};

/// Time-indexed view into a shared [`MotionClip`].
///
/// A freshly constructed cursor points at frame 0, so the accessors are
/// always valid even before the first [`PlaybackCursor::advance`].
#[derive(Debug, Clone)]
pub struct PlaybackCursor {
    clip: Arc<MotionClip>,
    frame: usize,
}

impl PlaybackCursor {
    pub fn new(clip: Arc<MotionClip>) -> Self {
        Self { clip, frame: 0 }
    }

    /// Move the cursor to the frame covering `time` seconds and return it.
    ///
    /// A NaN time is treated as the start of the clip.
    pub fn advance(&mut self, time: f32) -> usize {
        self.frame = frame_at(&self.clip, time);
        self.frame
    }

    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn clip(&self) -> &Arc<MotionClip> {
        &self.clip
    }

    pub fn root_position(&self) -> &Vector3<f32> {
        self.current().root_position
    }

    pub fn root_orientation(&self) -> &UnitQuaternion<f32> {
        self.current().root_orientation
    }

    pub fn joint_position(&self) -> &[f32] {
        self.current().joint_position
    }

    pub fn joint_velocity(&self) -> &[f32] {
        self.current().joint_velocity
    }

    // `frame` only ever comes from `frame_at`, bounded by `num_frames - 1`.
    fn current(&self) -> FrameRef<'_> {
        self.clip.row(self.frame)
    }
}

/// The frame index covering `time` in `clip`.
pub fn frame_at(clip: &MotionClip, time: f32) -> usize {
    if time.is_nan() {
        return 0;
    }
    let phase = time.clamp(0.0, clip.duration());
    let frame = (phase / clip.dt()).floor() as usize;
    frame.min(clip.num_frames() - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::MotionArrays;
    use crate::npz::NpyArray;

    /// `frames` frames at `dt`; joint 0 of frame i holds `i`.
    fn clip(frames: usize, dt: f32) -> Arc<MotionClip> {
        let mut quat = Vec::new();
        for _ in 0..frames {
            quat.extend_from_slice(&[1.0, 0.0, 0.0, 0.0]);
        }
        let joints: Vec<f32> = (0..frames).map(|i| i as f32).collect();
        let arrays = MotionArrays {
            body_pos_w: NpyArray::new("p", vec![frames, 1, 3], (0..frames * 3).map(|v| v as f32).collect()).unwrap(),
            body_quat_w: NpyArray::new("q", vec![frames, 1, 4], quat).unwrap(),
            joint_pos: NpyArray::new("jp", vec![frames, 1], joints.clone()).unwrap(),
            joint_vel: NpyArray::new("jv", vec![frames, 1], joints.iter().map(|v| -v).collect()).unwrap(),
        };
        Arc::new(MotionClip::from_arrays(dt, &arrays).unwrap())
    }

    #[test]
    fn fresh_cursor_reads_first_frame() {
        let cursor = PlaybackCursor::new(clip(10, 0.02));
        assert_eq!(cursor.frame(), 0);
        assert_eq!(cursor.joint_position(), &[0.0]);
    }

    #[test]
    fn fifty_hertz_reference_example() {
        let mut cursor = PlaybackCursor::new(clip(100, 0.02));
        assert!((cursor.clip().duration() - 2.0).abs() < 1e-6);
        assert_eq!(cursor.advance(1.99), 99);
        assert_eq!(cursor.advance(2.0), 99);
        assert_eq!(cursor.advance(2.5), 99);
        assert_eq!(cursor.advance(-0.5), 0);
    }

    #[test]
    fn in_range_times_floor_to_frame() {
        let c = clip(100, 0.02);
        let mut cursor = PlaybackCursor::new(c.clone());
        let mut t = 0.0_f32;
        while t <= c.duration() {
            let expected = ((t / c.dt()).floor() as usize).min(c.num_frames() - 1);
            assert_eq!(cursor.advance(t), expected, "t = {t}");
            t += 0.007;
        }
    }

    #[test]
    fn advance_is_idempotent() {
        let mut cursor = PlaybackCursor::new(clip(50, 0.02));
        let first = cursor.advance(0.5);
        let jp = cursor.joint_position().to_vec();
        let pos = *cursor.root_position();
        assert_eq!(cursor.advance(0.5), first);
        assert_eq!(cursor.joint_position(), jp.as_slice());
        assert_eq!(*cursor.root_position(), pos);
    }

    #[test]
    fn accessors_reflect_latest_advance_only() {
        let mut cursor = PlaybackCursor::new(clip(50, 0.02));
        cursor.advance(0.9);
        cursor.advance(0.1);
        assert_eq!(cursor.frame(), 5);
        assert_eq!(cursor.joint_position(), &[5.0]);
        assert_eq!(cursor.joint_velocity(), &[-5.0]);
        assert!((cursor.root_position().x - 15.0).abs() < 1e-6);
    }

    #[test]
    fn nan_and_infinite_times_clamp() {
        let mut cursor = PlaybackCursor::new(clip(10, 0.1));
        assert_eq!(cursor.advance(f32::NAN), 0);
        assert_eq!(cursor.advance(f32::INFINITY), 9);
        assert_eq!(cursor.advance(f32::NEG_INFINITY), 0);
    }

    #[test]
    fn single_frame_clip_always_frame_zero() {
        let mut cursor = PlaybackCursor::new(clip(1, 0.02));
        assert_eq!(cursor.advance(0.0), 0);
        assert_eq!(cursor.advance(10.0), 0);
    }
}
