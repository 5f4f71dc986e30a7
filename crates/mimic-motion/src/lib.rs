//! `mimic-motion` – reference-motion playback.
//!
//! Loads captured motion clips and answers time-indexed queries about them so
//! that a tracking policy can be fed the reference pose at every tick.
//!
//! # Modules
//!
//! - [`npz`] – [`NpzArchive`][npz::NpzArchive]: reads named dense `f32`
//!   arrays out of an `.npz` archive.
//! - [`clip`] – [`MotionClip`][clip::MotionClip]: the validated, immutable
//!   trajectory table (root position, root orientation, joint positions and
//!   velocities per frame).
//! - [`cursor`] – [`PlaybackCursor`][cursor::PlaybackCursor]: maps elapsed
//!   time to a frame with terminal hold and exposes per-frame accessors.
//! - [`anchor`] – [`AnchorAligner`][anchor::AnchorAligner]: yaw-only rotation
//!   from the clip's starting heading to the robot's current heading.
//! - [`library`] – [`MotionLibrary`][library::MotionLibrary]: explicitly owned
//!   cache that shares loaded clips between behavior instances.
//! - [`observation`] – clip-derived policy observation terms.

pub mod anchor;
pub mod clip;
pub mod cursor;
pub mod library;
pub mod npz;
pub mod observation;

#[cfg(test)]
pub(crate) mod test_support;

pub use anchor::{AnchorAligner, yaw_quaternion};
pub use clip::{DEFAULT_CLIP_DT, FrameRef, MotionArrays, MotionClip};
pub use cursor::PlaybackCursor;
pub use library::MotionLibrary;
pub use npz::{NpyArray, NpzArchive};
