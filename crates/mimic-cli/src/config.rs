//! CLI configuration – reads `~/.mimic/config.toml` or the path given as the
//! first argument.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use mimic_runtime::MimicConfig;

/// Persisted configuration of the `mimic` binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Settings of the mimic behavior.
    #[serde(default = "default_mimic")]
    pub mimic: MimicConfig,

    /// Rate at which the dispatcher calls `run()` and polls transitions.
    #[serde(default = "default_dispatcher_hz")]
    pub dispatcher_hz: u32,

    /// Stop after this many seconds; play until a transition when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_seconds: Option<f32>,
}

fn default_mimic() -> MimicConfig {
    MimicConfig::new("motion.npz")
}
fn default_dispatcher_hz() -> u32 {
    200
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            mimic: default_mimic(),
            dispatcher_hz: default_dispatcher_hz(),
            run_seconds: None,
        }
    }
}

/// Return the path to `~/.mimic/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".mimic").join("config.toml")
}

/// Load the config at `path` (defaults when the file does not exist), apply
/// `MIMIC_*` overrides and validate the result.
pub fn load(path: &Path) -> Result<CliConfig, String> {
    let mut cfg = match load_from(path)? {
        Some(cfg) => cfg,
        None => {
            warn!(path = %path.display(), "config file not found; using defaults");
            CliConfig::default()
        }
    };
    apply_env_overrides(&mut cfg);
    cfg.validate()?;
    Ok(cfg)
}

/// Parse and validate the file at `path` without environment overrides.
pub(crate) fn load_from(path: &Path) -> Result<Option<CliConfig>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: CliConfig =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    cfg.validate()?;
    Ok(Some(cfg))
}

impl CliConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.dispatcher_hz == 0 {
            return Err("dispatcher_hz must be positive".to_string());
        }
        if let Some(secs) = self.run_seconds
            && (secs.is_nan() || secs <= 0.0)
        {
            return Err(format!("run_seconds must be positive, got {secs}"));
        }
        if let Some(secs) = self.run_seconds
            && Duration::try_from_secs_f32(secs).is_err()
        {
            return Err(format!("run_seconds {secs} is out of range"));
        }
        self.mimic.validate().map_err(|e| e.to_string())
    }
}

/// Apply `MIMIC_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `MIMIC_MOTION_FILE` | `mimic.motion_file` |
/// | `MIMIC_DISPATCHER_HZ` | `dispatcher_hz` |
pub fn apply_env_overrides(cfg: &mut CliConfig) {
    if let Ok(v) = std::env::var("MIMIC_MOTION_FILE") {
        cfg.mimic.motion_file = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("MIMIC_DISPATCHER_HZ")
        && let Ok(hz) = v.parse::<u32>()
    {
        cfg.dispatcher_hz = hz;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        fs::write(&path, body).expect("write config");
        path
    }

    #[test]
    fn config_path_points_to_mimic_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".mimic"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let result = load_from(&dir.path().join("absent.toml")).expect("no error");
        assert!(result.is_none());
    }

    #[test]
    fn minimal_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write(&dir, "[mimic]\nmotion_file = \"dance.npz\"\n");
        let cfg = load_from(&path).expect("load ok").expect("some");
        assert_eq!(cfg.dispatcher_hz, 200);
        assert_eq!(cfg.run_seconds, None);
        assert_eq!(cfg.mimic.join_timeout_ms, 500);
        assert_eq!(cfg.mimic.time_end, None);
    }

    #[test]
    fn full_file_is_parsed() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write(
            &dir,
            r#"
dispatcher_hz = 100
run_seconds = 3.5

[mimic]
motion_file = "dance.npz"
step_dt = 0.01
time_start = 1.0
time_end = 4.0
kp = [40.0, 40.0]
kd = [1.0, 1.0]
"#,
        );
        let cfg = load_from(&path).expect("load ok").expect("some");
        assert_eq!(cfg.dispatcher_hz, 100);
        assert_eq!(cfg.run_seconds, Some(3.5));
        assert_eq!(cfg.mimic.time_end, Some(4.0));
        assert_eq!(cfg.mimic.kp, vec![40.0, 40.0]);
    }

    #[test]
    fn parse_error_is_reported() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write(&dir, "dispatcher_hz = \"fast\"\n");
        let err = load_from(&path).unwrap_err();
        assert!(err.contains("Failed to parse config"), "{err}");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write(&dir, "dispatcher_hz = 0\n");
        assert!(load_from(&path).unwrap_err().contains("dispatcher_hz"));

        let mut cfg = CliConfig::default();
        cfg.run_seconds = Some(0.0);
        assert!(cfg.validate().is_err());

        let mut cfg = CliConfig::default();
        cfg.mimic.step_dt = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = CliConfig::default();
        cfg.run_seconds = Some(1e30);
        assert!(cfg.validate().unwrap_err().contains("run_seconds"));
    }

    #[test]
    fn env_overrides_apply_and_are_validated() {
        // SAFETY: the only test touching these variables.
        unsafe {
            std::env::set_var("MIMIC_DISPATCHER_HZ", "50");
            std::env::set_var("MIMIC_MOTION_FILE", "/data/walk.npz");
        }
        let mut cfg = CliConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.dispatcher_hz, 50);
        assert_eq!(cfg.mimic.motion_file, PathBuf::from("/data/walk.npz"));

        unsafe { std::env::set_var("MIMIC_DISPATCHER_HZ", "not-a-rate") };
        let mut cfg = CliConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.dispatcher_hz, 200);

        // Defaults for a missing file go through the same validation.
        let dir = tempfile::tempdir().expect("tmp dir");
        let missing = dir.path().join("absent.toml");
        unsafe { std::env::set_var("MIMIC_DISPATCHER_HZ", "0") };
        assert!(load(&missing).unwrap_err().contains("dispatcher_hz"));
        unsafe { std::env::set_var("MIMIC_DISPATCHER_HZ", "100") };
        let cfg = load(&missing).expect("defaults are valid");
        assert_eq!(cfg.dispatcher_hz, 100);
        assert_eq!(cfg.mimic.motion_file, PathBuf::from("/data/walk.npz"));
        unsafe {
            std::env::remove_var("MIMIC_DISPATCHER_HZ");
            std::env::remove_var("MIMIC_MOTION_FILE");
        }
    }
}
