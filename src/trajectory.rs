//! Recorded trajectories and their JSON file format.
//!
//! ```json
//! {
//!   "frequency": 10.0,
//!   "frame_count": 2,
//!   "init": [[1,0,0,0],[0,1,0,0],[0,0,1,0],[0,0,0,1]],
//!   "frames": [
//!     [[1,0,0,0],[0,1,0,0],[0,0,1,0],[0,0,0,1]],
//!     [[1,0,0,5],[0,1,0,0],[0,0,1,0],[0,0,0,1]]
//!   ]
//! }
//! ```
//!
//! `init` and `frame_count` are optional. `init` is the base frame the
//! recording was captured in; playback measures every frame against frame 0
//! regardless, so the first command is always the zero pose. The legacy keys
//! `MatrixList` and `MatrixInit` are accepted.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, RigError};
use crate::transform::Frame;

/// Sampling frequency assumed when a file does not state one.
pub const DEFAULT_FREQUENCY_HZ: f64 = 10.0;

/// An ordered sequence of frames played relative to its first frame.
#[derive(Clone, Debug)]
pub struct Trajectory {
    frames: Vec<Frame>,
    frequency: f64,
    base: Option<Frame>,
}

impl Trajectory {
    pub fn new(frames: Vec<Frame>, frequency: f64) -> Result<Self> {
        if frames.is_empty() {
            return Err(RigError::format("trajectory has no frames"));
        }
        if !(frequency.is_finite() && frequency > 0.0) {
            return Err(RigError::format(format!(
                "frequency must be positive, got {}",
                frequency
            )));
        }
        Ok(Self {
            frames,
            frequency,
            base: None,
        })
    }

    /// Attach the frame the recording was captured in.
    pub fn with_base(mut self, base: Frame) -> Self {
        self.base = Some(base);
        self
    }

    /// Parse a downloaded trajectory file.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let file: TrajectoryFile =
            serde_json::from_slice(bytes).map_err(|e| RigError::format(e.to_string()))?;

        if let Some(count) = file.frame_count {
            if count != file.frames.len() {
                return Err(RigError::format(format!(
                    "frame_count is {} but {} frames are present",
                    count,
                    file.frames.len()
                )));
            }
        }

        let frames = file
            .frames
            .iter()
            .enumerate()
            .map(|(i, rows)| {
                Frame::from_rows(rows.as_slice())
                    .map_err(|e| RigError::format(format!("frame {}: {}", i, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        let base = file
            .init
            .as_deref()
            .map(|rows| Frame::from_rows(rows).map_err(|e| RigError::format(format!("init: {}", e))))
            .transpose()?;

        let trajectory = Self::new(frames, file.frequency.unwrap_or(DEFAULT_FREQUENCY_HZ))?;
        Ok(match base {
            Some(base) => trajectory.with_base(base),
            None => trajectory,
        })
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Sampling frequency in Hz.
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Time between recorded frames.
    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frequency)
    }

    /// The zero pose every frame is measured against: always frame 0.
    ///
    /// Relative poses compose rigidly, so measuring in the capture base frame
    /// and then subtracting frame 0 gives the same command as this.
    pub fn reference(&self) -> &Frame {
        &self.frames[0]
    }

    /// The capture base frame from the file's `init` matrix, if any.
    pub fn base(&self) -> Option<&Frame> {
        self.base.as_ref()
    }
}

#[derive(Deserialize)]
struct TrajectoryFile {
    #[serde(default)]
    frequency: Option<f64>,
    #[serde(default)]
    frame_count: Option<usize>,
    #[serde(default, alias = "MatrixInit")]
    init: Option<Vec<Vec<f64>>>,
    #[serde(alias = "MatrixList")]
    frames: Vec<Vec<Vec<f64>>>,
}
