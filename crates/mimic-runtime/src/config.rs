//! [`MimicConfig`] – settings of one mimic behavior instance.
//!
//! Deserialised from the `[mimic]` table of the CLI config file; every field
//! except `motion_file` has a default.

use std::path::PathBuf;
use std::time::Duration;

use mimic_motion::DEFAULT_CLIP_DT;
use mimic_types::MimicError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MimicConfig {
    /// `.npz` archive holding the reference motion.
    pub motion_file: PathBuf,

    /// Sampling step of the clip, in seconds.
    #[serde(default = "default_dt")]
    pub clip_dt: f32,

    /// Policy tick period, in seconds.
    #[serde(default = "default_dt")]
    pub step_dt: f32,

    /// Clip time the playback starts from (and the anchor is aligned at).
    #[serde(default)]
    pub time_start: f32,

    /// Clip time after which the behavior requests a hand-over.  Defaults to
    /// the clip duration.
    #[serde(default)]
    pub time_end: Option<f32>,

    /// Upper bound on how long `exit()` waits for the worker.
    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,

    /// Worker silence after which `run()` reports a stall.
    #[serde(default = "default_watchdog_timeout_ms")]
    pub watchdog_timeout_ms: u64,

    /// Root tilt (rad) beyond which the behavior requests the passive state.
    #[serde(default = "default_max_tilt_rad")]
    pub max_tilt_rad: f32,

    /// Per-joint stiffness applied on entry; empty leaves gains untouched.
    #[serde(default)]
    pub kp: Vec<f32>,

    /// Per-joint damping applied on entry.
    #[serde(default)]
    pub kd: Vec<f32>,
}

fn default_dt() -> f32 {
    DEFAULT_CLIP_DT
}
fn default_join_timeout_ms() -> u64 {
    500
}
fn default_watchdog_timeout_ms() -> u64 {
    200
}
fn default_max_tilt_rad() -> f32 {
    1.0
}

impl MimicConfig {
    /// A config with defaults for everything but the motion file.
    pub fn new(motion_file: impl Into<PathBuf>) -> Self {
        Self {
            motion_file: motion_file.into(),
            clip_dt: default_dt(),
            step_dt: default_dt(),
            time_start: 0.0,
            time_end: None,
            join_timeout_ms: default_join_timeout_ms(),
            watchdog_timeout_ms: default_watchdog_timeout_ms(),
            max_tilt_rad: default_max_tilt_rad(),
            kp: Vec::new(),
            kd: Vec::new(),
        }
    }

    /// # Errors
    ///
    /// Returns [`MimicError::InvalidConfig`] describing the first offending
    /// field.
    pub fn validate(&self) -> Result<(), MimicError> {
        let fail = |msg: String| Err(MimicError::InvalidConfig(msg));
        if !(self.clip_dt.is_finite() && self.clip_dt > 0.0) {
            return fail(format!("clip_dt must be positive, got {}", self.clip_dt));
        }
        if !(self.step_dt.is_finite() && self.step_dt > 0.0) {
            return fail(format!("step_dt must be positive, got {}", self.step_dt));
        }
        if Duration::try_from_secs_f32(self.step_dt).is_err() {
            return fail(format!("step_dt {} is not a representable period", self.step_dt));
        }
        if !(self.time_start.is_finite() && self.time_start >= 0.0) {
            return fail(format!("time_start must be >= 0, got {}", self.time_start));
        }
        if let Some(end) = self.time_end
            && !(end >= self.time_start)
        {
            return fail(format!(
                "time_end ({end}) must not precede time_start ({})",
                self.time_start
            ));
        }
        if self.join_timeout_ms == 0 {
            return fail("join_timeout_ms must be non-zero".to_string());
        }
        if self.watchdog_timeout_ms == 0 {
            return fail("watchdog_timeout_ms must be non-zero".to_string());
        }
        if self.kp.len() != self.kd.len() {
            return fail(format!(
                "kp has {} entries but kd has {}",
                self.kp.len(),
                self.kd.len()
            ));
        }
        Ok(())
    }

    pub fn step_period(&self) -> Duration {
        Duration::from_secs_f32(self.step_dt)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_millis(self.watchdog_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_config_is_valid() {
        let cfg = MimicConfig::new("dance.npz");
        cfg.validate().unwrap();
        assert!((cfg.clip_dt - 0.02).abs() < 1e-9);
        assert_eq!(cfg.join_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn toml_fills_defaults() {
        let cfg: MimicConfig = toml::from_str(r#"motion_file = "motions/dance.npz""#).unwrap();
        assert_eq!(cfg, MimicConfig::new("motions/dance.npz"));
    }

    #[test]
    fn toml_overrides_fields() {
        let cfg: MimicConfig = toml::from_str(
            r#"
            motion_file = "walk.npz"
            step_dt = 0.01
            time_start = 1.5
            time_end = 4.0
            kp = [40.0, 40.0]
            kd = [1.0, 1.0]
            "#,
        )
        .unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.time_end, Some(4.0));
        assert_eq!(cfg.step_period(), Duration::from_secs_f32(0.01));
        assert_eq!(cfg.kp.len(), 2);
    }

    #[test]
    fn rejects_non_positive_steps() {
        let mut cfg = MimicConfig::new("a.npz");
        cfg.step_dt = 0.0;
        assert!(matches!(cfg.validate(), Err(MimicError::InvalidConfig(_))));
        let mut cfg = MimicConfig::new("a.npz");
        cfg.clip_dt = f32::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_unrepresentable_step() {
        let mut cfg = MimicConfig::new("a.npz");
        cfg.step_dt = 1e30;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("step_dt"), "{err}");
    }

    #[test]
    fn rejects_inverted_time_range() {
        let mut cfg = MimicConfig::new("a.npz");
        cfg.time_start = 2.0;
        cfg.time_end = Some(1.0);
        assert!(cfg.validate().is_err());
        cfg.time_start = -1.0;
        cfg.time_end = None;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_timeouts_and_gain_mismatch() {
        let mut cfg = MimicConfig::new("a.npz");
        cfg.join_timeout_ms = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = MimicConfig::new("a.npz");
        cfg.kp = vec![1.0];
        assert!(cfg.validate().is_err());
    }
}
