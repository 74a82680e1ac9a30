//! digibow - driver for a six-actuator motion rig.
//!
//! Trajectories of 4×4 pose matrices are downloaded into a per-device store,
//! converted to pose commands relative to a reference frame, resolved into
//! actuator lengths by a kinematics solver, and streamed to the rig as
//! 24-byte serial packets.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use digibow::{
//!     Device, DirectoryFetcher, DownloadRequest, ExecuteRequest, RigConfig, SerialPortOpener,
//!     StewartSolver,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = RigConfig::from_json_file("rig.json")?;
//! let device = Device::new(
//!     &config,
//!     Arc::new(StewartSolver::new(config.geometry)?),
//!     Arc::new(DirectoryFetcher::new(&config.storage_root)),
//!     Arc::new(SerialPortOpener),
//! )?;
//!
//! device.download(&DownloadRequest::new("runs", "warmup")).await?;
//! let report = device.execute(&ExecuteRequest::segment("warmup"))?.join().await?;
//! println!("wrote {} packets", report.steps_written);
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod device;
pub mod error;
pub mod fetch;
pub mod playback;
pub mod port;
pub mod request;
pub mod serial;
pub mod solver;
pub mod store;
pub mod trajectory;
pub mod transform;

pub use codec::{ActuatorLengths, CodecConfig, PacketCodec, SerialPacket};
pub use config::{PlaybackConfig, RigConfig};
pub use device::{Device, DeviceRegistry, DeviceState, PlaybackHandle, StateLease};
pub use error::{Result, RigError};
pub use fetch::{DirectoryFetcher, TrajectoryFetcher};
pub use playback::{Motion, PlaybackReport};
pub use port::{ActuatorPort, DryRunOpener, PortOpener};
pub use request::{DownloadRequest, ExecuteRequest};
pub use serial::SerialConfig;
pub use solver::{KinematicsSolver, StewartGeometry, StewartSolver};
pub use store::TrajectoryStore;
pub use trajectory::Trajectory;
pub use transform::{Command, Frame, PoseTransform, TransformConfig};

#[cfg(feature = "serial")]
pub use port::SerialPortOpener;
#[cfg(feature = "serial")]
pub use serial::list_ports;
