//! Error types for rig operations.

use thiserror::Error;

use crate::device::DeviceState;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, RigError>;

/// Errors that can occur while downloading, transforming, encoding or
/// streaming a trajectory.
#[derive(Debug, Error)]
pub enum RigError {
    /// The device is not `Ready`. Retry later.
    #[error("device is busy ({state})")]
    DeviceBusy { state: DeviceState },

    /// No trajectory is stored under the requested segment.
    #[error("segment {0:?} does not exist, download it first")]
    SegmentNotFound(String),

    /// Downloaded trajectory data could not be parsed.
    #[error("malformed trajectory: {0}")]
    TrajectoryFormat(String),

    /// A frame's rotation block is not a proper rotation.
    #[error("degenerate frame: {0}")]
    DegenerateFrame(String),

    /// Input has the wrong shape.
    #[error("expected {expected} values, got {actual}")]
    Dimension { expected: usize, actual: usize },

    /// Physical transport failure (open, write, close or timeout).
    #[error("port I/O error: {0}")]
    PortIo(String),

    /// A scaled actuator value does not fit the 16-bit wire field.
    #[error("actuator {actuator} value {value} is out of encodable range")]
    ValueOutOfRange { actuator: usize, value: f64 },

    /// A packet failed header, index or checksum validation.
    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    /// The kinematics solver rejected a command.
    #[error("kinematics solver failed: {0}")]
    Solver(String),

    /// The trajectory store could not be reached.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The playback task panicked or was aborted before reporting.
    #[error("playback task aborted: {0}")]
    Aborted(String),
}

impl RigError {
    /// Create a PortIo error with a message.
    pub fn port_io(msg: impl Into<String>) -> Self {
        Self::PortIo(msg.into())
    }

    /// Create a TrajectoryFormat error with a message.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::TrajectoryFormat(msg.into())
    }

    /// Create a DegenerateFrame error with a message.
    pub fn degenerate(msg: impl Into<String>) -> Self {
        Self::DegenerateFrame(msg.into())
    }

    /// Create a Solver error with a message.
    pub fn solver(msg: impl Into<String>) -> Self {
        Self::Solver(msg.into())
    }

    /// Whether the same request may succeed later without changing anything.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::DeviceBusy { .. } | Self::PortIo(_))
    }
}

impl From<std::io::Error> for RigError {
    fn from(e: std::io::Error) -> Self {
        Self::PortIo(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let e = RigError::DeviceBusy {
            state: DeviceState::Executing,
        };
        assert_eq!(e.to_string(), "device is busy (Executing)");

        let e = RigError::SegmentNotFound("X".to_string());
        assert!(e.to_string().contains("\"X\""));

        let e = RigError::Dimension {
            expected: 6,
            actual: 4,
        };
        assert_eq!(e.to_string(), "expected 6 values, got 4");
    }

    #[test]
    fn test_retryable() {
        assert!(RigError::DeviceBusy {
            state: DeviceState::Syncing
        }
        .is_retryable());
        assert!(RigError::port_io("unplugged").is_retryable());
        assert!(!RigError::format("bad json").is_retryable());
        assert!(!RigError::SegmentNotFound("a".into()).is_retryable());
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let e: RigError = io.into();
        assert!(matches!(e, RigError::PortIo(ref m) if m.contains("pipe closed")));
    }
}
