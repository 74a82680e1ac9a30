//! Rig configuration loaded from a JSON file.
//!
//! Every section and field has a default, so `{}` is a valid configuration
//! and a file only needs the values that differ from the stock rig.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::{ActuatorLengths, CodecConfig, ACTUATORS};
use crate::error::{Result, RigError};
use crate::serial::SerialConfig;
use crate::solver::{KinematicsSolver, StewartGeometry};
use crate::transform::{Command, TransformConfig};

/// Top-level configuration for one rig.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    /// Serial port settings. The port name identifies the device.
    #[serde(alias = "protocolConfig")]
    pub com: SerialConfig,
    /// Wire calibration (offset and scale of the actuator values).
    pub calibration: CodecConfig,
    pub transform: TransformConfig,
    pub playback: PlaybackConfig,
    pub geometry: StewartGeometry,
    /// Directory trajectory files are read from.
    pub storage_root: PathBuf,
}

impl RigConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| RigError::Config(e.to_string()))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| RigError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }
}

/// Timing and reset behavior of the playback loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Delay between trajectory frames. Unset means the trajectory's own
    /// sample interval (`1 / frequency`).
    pub frame_interval_ms: Option<u64>,
    /// Delay between synthetic steps when the request gives no period.
    pub synthetic_interval_ms: u64,
    pub synthetic_steps: usize,
    /// Upper bound on a single packet write.
    pub write_timeout_ms: u64,
    /// Actuator lengths written at the end of every run.
    /// `None` means the solver's lengths for the zero command.
    pub neutral: Option<[f64; ACTUATORS]>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: None,
            synthetic_interval_ms: 2000,
            synthetic_steps: 2,
            write_timeout_ms: 1000,
            neutral: None,
        }
    }
}

impl PlaybackConfig {
    pub fn frame_interval(&self) -> Option<Duration> {
        self.frame_interval_ms.map(Duration::from_millis)
    }

    pub fn synthetic_interval(&self) -> Duration {
        Duration::from_millis(self.synthetic_interval_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Lengths for the end-of-run reset, resolved once per device.
    pub fn neutral_lengths(&self, solver: &dyn KinematicsSolver) -> Result<ActuatorLengths> {
        match self.neutral {
            Some(lengths) => Ok(ActuatorLengths(lengths)),
            None => solver.solve(&Command::zero()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::StewartSolver;

    #[test]
    fn test_empty_object_is_default() {
        let config = RigConfig::from_json("{}").unwrap();
        assert_eq!(config, RigConfig::default());
        assert_eq!(config.playback.frame_interval(), None);
        assert_eq!(config.playback.synthetic_steps, 2);

        let solver = StewartSolver::new(config.geometry).unwrap();
        assert_eq!(
            config.playback.neutral_lengths(&solver).unwrap(),
            solver.solve(&Command::zero()).unwrap()
        );
    }

    #[test]
    fn test_partial_sections() {
        let config = RigConfig::from_json(
            r#"{
                "com": {"port": "/dev/ttyACM0", "baud_rate": 9600},
                "playback": {"synthetic_steps": 10, "neutral": [0.2, 0.2, 0.2, 0.2, 0.2, 0.2]},
                "storage_root": "/srv/trajectories"
            }"#,
        )
        .unwrap();
        assert_eq!(config.com.port, "/dev/ttyACM0");
        assert_eq!(config.com.baud_rate, 9600);
        assert_eq!(config.playback.synthetic_steps, 10);
        assert_eq!(config.playback.frame_interval_ms, None);
        let solver = StewartSolver::new(config.geometry).unwrap();
        assert_eq!(
            config.playback.neutral_lengths(&solver).unwrap(),
            ActuatorLengths::uniform(0.2)
        );
        assert_eq!(config.storage_root, PathBuf::from("/srv/trajectories"));
    }

    #[test]
    fn test_neutral_follows_geometry() {
        let config = RigConfig::from_json(r#"{"geometry": {"home_leg_length": 0.2}}"#).unwrap();
        let solver = StewartSolver::new(config.geometry).unwrap();
        let neutral = config.playback.neutral_lengths(&solver).unwrap();
        for l in neutral.0 {
            assert!((l - 0.2).abs() < 1e-12);
        }
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rig.json");
        std::fs::write(&path, r#"{"calibration": {"scale": 20000.0}}"#).unwrap();
        let config = RigConfig::from_json_file(&path).unwrap();
        assert_eq!(config.calibration.scale, 20000.0);

        let err = RigConfig::from_json_file(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, RigError::Config(_)));
    }

    #[test]
    fn test_rejects_bad_json() {
        assert!(matches!(
            RigConfig::from_json("{\"playback\": 3}"),
            Err(RigError::Config(_))
        ));
    }
}
