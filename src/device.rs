//! Device state machine and the per-port device registry.
//!
//! A device is `Ready`, `Syncing` (downloading a trajectory) or `Executing`
//! (playing one). Leaving `Ready` is a compare-and-set on a watch channel that
//! hands out a [`StateLease`]; dropping the lease is the only way back.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::codec::{ActuatorLengths, PacketCodec};
use crate::config::{PlaybackConfig, RigConfig};
use crate::error::{Result, RigError};
use crate::fetch::TrajectoryFetcher;
use crate::playback::{Motion, Playback, PlaybackReport};
use crate::port::PortOpener;
use crate::request::{DownloadRequest, ExecuteRequest};
use crate::serial::SerialConfig;
use crate::solver::KinematicsSolver;
use crate::store::TrajectoryStore;
use crate::trajectory::Trajectory;
use crate::transform::PoseTransform;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DeviceState {
    #[default]
    Ready,
    Syncing,
    Executing,
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceState::Ready => "Ready",
            DeviceState::Syncing => "Syncing",
            DeviceState::Executing => "Executing",
        };
        f.write_str(name)
    }
}

/// Proof that the device left `Ready`. Dropping it stores `Ready` again,
/// including when the owning task panics.
#[derive(Debug)]
pub struct StateLease {
    state: Arc<watch::Sender<DeviceState>>,
    held: DeviceState,
}

impl StateLease {
    pub fn state(&self) -> DeviceState {
        self.held
    }
}

impl Drop for StateLease {
    fn drop(&mut self) {
        self.state.send_replace(DeviceState::Ready);
        tracing::debug!("{} -> Ready", self.held);
    }
}

/// A running playback.
#[derive(Debug)]
pub struct PlaybackHandle {
    cancel: CancellationToken,
    task: JoinHandle<Result<PlaybackReport>>,
}

impl PlaybackHandle {
    /// Ask the run to stop. It still writes the neutral packet.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn join(self) -> Result<PlaybackReport> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(RigError::Aborted(e.to_string())),
        }
    }
}

/// One motion rig behind one serial port.
pub struct Device {
    com: SerialConfig,
    state: Arc<watch::Sender<DeviceState>>,
    store: Arc<TrajectoryStore>,
    transform: PoseTransform,
    codec: PacketCodec,
    playback: PlaybackConfig,
    solver: Arc<dyn KinematicsSolver>,
    neutral: ActuatorLengths,
    fetcher: Arc<dyn TrajectoryFetcher>,
    opener: Arc<dyn PortOpener>,
    teardown: CancellationToken,
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("port", &self.com.port)
            .field("state", &self.state())
            .field("segments", &self.store.len())
            .finish()
    }
}

impl Device {
    /// Build a device for `config.com.port`.
    ///
    /// The reset lengths are resolved here: the configured neutral, otherwise
    /// the solver's answer for the zero command. A failing solve fails
    /// construction.
    pub fn new(
        config: &RigConfig,
        solver: Arc<dyn KinematicsSolver>,
        fetcher: Arc<dyn TrajectoryFetcher>,
        opener: Arc<dyn PortOpener>,
    ) -> Result<Self> {
        let neutral = config.playback.neutral_lengths(solver.as_ref())?;
        let (state, _) = watch::channel(DeviceState::Ready);
        Ok(Self {
            com: config.com.clone(),
            state: Arc::new(state),
            store: Arc::new(TrajectoryStore::new()),
            transform: PoseTransform::new(config.transform)?,
            codec: PacketCodec::new(config.calibration)?,
            playback: config.playback.clone(),
            solver,
            neutral,
            fetcher,
            opener,
            teardown: CancellationToken::new(),
        })
    }

    /// Port name; the device's identity.
    pub fn id(&self) -> &str {
        &self.com.port
    }

    pub fn state(&self) -> DeviceState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<DeviceState> {
        self.state.subscribe()
    }

    pub fn store(&self) -> &Arc<TrajectoryStore> {
        &self.store
    }

    fn begin(&self, next: DeviceState) -> Result<StateLease> {
        let mut observed = DeviceState::Ready;
        let moved = self.state.send_if_modified(|state| {
            observed = *state;
            if *state == DeviceState::Ready {
                *state = next;
                true
            } else {
                false
            }
        });

        if !moved {
            tracing::warn!("{}: rejected {} while {}", self.com.port, next, observed);
            return Err(RigError::DeviceBusy { state: observed });
        }
        tracing::debug!("Ready -> {}", next);
        Ok(StateLease {
            state: Arc::clone(&self.state),
            held: next,
        })
    }

    /// Fetch, parse and store a trajectory. The device is `Syncing` until it
    /// returns; on any failure the store is left untouched.
    pub async fn download(&self, request: &DownloadRequest) -> Result<()> {
        let _lease = self.begin(DeviceState::Syncing)?;
        tracing::info!(
            "{}: downloading {}/{}",
            self.com.port,
            request.path,
            request.segment
        );

        let bytes = self.fetcher.fetch(&request.path, &request.segment).await?;
        let trajectory = Trajectory::from_json(&bytes)?;
        if let Some(base) = trajectory.base() {
            self.transform.validate(base)?;
        }
        for frame in trajectory.frames() {
            self.transform.validate(frame)?;
        }

        let frames = trajectory.frame_count();
        if self.store.put(&request.segment, trajectory).is_some() {
            tracing::info!("Replaced segment {} ({} frames)", request.segment, frames);
        } else {
            tracing::info!("Stored segment {} ({} frames)", request.segment, frames);
        }
        Ok(())
    }

    /// Start a playback and return as soon as it is running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn execute(&self, request: &ExecuteRequest) -> Result<PlaybackHandle> {
        let current = self.state();
        if current != DeviceState::Ready {
            return Err(RigError::DeviceBusy { state: current });
        }

        let input = request.command()?;
        let motion = if request.random {
            let interval = if request.period == 0 {
                self.playback.synthetic_interval()
            } else {
                std::time::Duration::from_secs(request.period)
            };
            Motion::Synthetic {
                input,
                steps: self.playback.synthetic_steps,
                interval,
            }
        } else {
            let trajectory = self
                .store
                .get(&request.segment)
                .ok_or_else(|| RigError::SegmentNotFound(request.segment.clone()))?;
            Motion::Trajectory(trajectory)
        };

        let lease = self.begin(DeviceState::Executing)?;
        let cancel = self.teardown.child_token();
        let playback = Playback {
            com: self.com.clone(),
            transform: self.transform,
            codec: self.codec,
            solver: Arc::clone(&self.solver),
            opener: Arc::clone(&self.opener),
            neutral: self.neutral,
            frame_interval: self.playback.frame_interval(),
            write_timeout: self.playback.write_timeout(),
        };

        let run_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            let _lease = lease;
            playback.run(motion, run_cancel).await
        });

        Ok(PlaybackHandle { cancel, task })
    }

    /// Cancel any running playback. The run still resets the rig.
    pub fn shutdown(&self) {
        tracing::info!("{}: shutting down", self.com.port);
        self.teardown.cancel();
    }
}

/// Devices keyed by port name.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Mutex<HashMap<String, Arc<Device>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static DeviceRegistry {
        static GLOBAL: OnceLock<DeviceRegistry> = OnceLock::new();
        GLOBAL.get_or_init(DeviceRegistry::new)
    }

    pub fn get(&self, port: &str) -> Option<Arc<Device>> {
        self.devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(port)
            .cloned()
    }

    /// The device for `port`, built with `build` the first time it is asked for.
    pub fn get_or_create<F>(&self, port: &str, build: F) -> Result<Arc<Device>>
    where
        F: FnOnce() -> Result<Device>,
    {
        let mut devices = self.devices.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(device) = devices.get(port) {
            return Ok(Arc::clone(device));
        }
        let device = Arc::new(build()?);
        tracing::info!("Registered device {}", port);
        devices.insert(port.to_string(), Arc::clone(&device));
        Ok(device)
    }

    pub fn len(&self) -> usize {
        self.devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
