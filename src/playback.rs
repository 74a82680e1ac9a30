//! The playback loop: commands to solver to codec to port, one step at a time.
//!
//! A run opens the port, streams every step, then always writes the neutral
//! packet and closes the port, whether the steps finished, failed or were
//! cancelled.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::codec::{ActuatorLengths, PacketCodec, SerialPacket};
use crate::error::{Result, RigError};
use crate::port::{ActuatorPort, PortOpener};
use crate::serial::SerialConfig;
use crate::solver::KinematicsSolver;
use crate::trajectory::Trajectory;
use crate::transform::{Command, PoseTransform};

/// Built-in synthetic sequence, indexed by step number mod 3.
const SYNTHETIC_TABLE: [[f64; 6]; 3] = [
    [2.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [-5.0, 5.0, -5.0, 0.01, -0.01, 0.01],
    [5.0, -5.0, 5.0, -0.01, 0.01, -0.01],
];

/// What a run plays.
#[derive(Clone, Debug)]
pub enum Motion {
    /// Every frame of a stored trajectory, relative to its reference frame.
    Trajectory(Arc<Trajectory>),
    /// A fixed number of generated commands.
    Synthetic {
        input: Option<Command>,
        steps: usize,
        interval: Duration,
    },
}

impl Motion {
    pub fn steps(&self) -> usize {
        match self {
            Motion::Trajectory(t) => t.frame_count(),
            Motion::Synthetic { steps, .. } => *steps,
        }
    }

    /// Commands in playback order, one per step.
    pub fn commands(
        &self,
        transform: PoseTransform,
    ) -> Box<dyn Iterator<Item = Result<Command>> + Send + '_> {
        match self {
            Motion::Trajectory(t) => Box::new(
                t.frames()
                    .iter()
                    .map(move |frame| transform.relative_command(frame, t.reference())),
            ),
            Motion::Synthetic { input, steps, .. } => Box::new(
                (1..=*steps).map(move |number| Ok(synthetic_command(input.as_ref(), number))),
            ),
        }
    }

    /// Pause after each step. A configured frame interval overrides the
    /// trajectory's own sample interval.
    fn interval(&self, frame_interval: Option<Duration>) -> Duration {
        match self {
            Motion::Trajectory(t) => frame_interval.unwrap_or_else(|| t.sample_interval()),
            Motion::Synthetic { interval, .. } => *interval,
        }
    }
}

/// Synthetic command for the one-based step `number`.
///
/// With an explicit input, odd steps play it and even steps return to zero.
pub fn synthetic_command(input: Option<&Command>, number: usize) -> Command {
    match input {
        Some(cmd) if number % 2 == 1 => *cmd,
        Some(_) => Command::zero(),
        None => Command::from_array(SYNTHETIC_TABLE[number % 3]),
    }
}

/// Outcome of a run that did not fail.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlaybackReport {
    pub steps_planned: usize,
    pub steps_written: usize,
    pub cancelled: bool,
    pub reset_written: bool,
}

/// Everything a run needs besides the motion itself.
#[derive(Clone)]
pub struct Playback {
    pub com: SerialConfig,
    pub transform: PoseTransform,
    pub codec: PacketCodec,
    pub solver: Arc<dyn KinematicsSolver>,
    pub opener: Arc<dyn PortOpener>,
    pub neutral: ActuatorLengths,
    /// Overrides the trajectory sample interval when set.
    pub frame_interval: Option<Duration>,
    pub write_timeout: Duration,
}

impl Playback {
    /// Run `motion` to completion, failure or cancellation.
    ///
    /// Returns the first step error, otherwise the reset error, otherwise the
    /// close error.
    pub async fn run(&self, motion: Motion, cancel: CancellationToken) -> Result<PlaybackReport> {
        let mut report = PlaybackReport {
            steps_planned: motion.steps(),
            ..Default::default()
        };

        let mut port = self.opener.open(&self.com).await?;
        tracing::info!(
            "Playback started on {}: {} steps",
            self.com.port,
            report.steps_planned
        );

        let streamed = self
            .stream(&motion, port.as_mut(), &cancel, &mut report)
            .await;
        if let Err(e) = &streamed {
            tracing::error!(
                "Playback aborted after {}/{} steps: {}",
                report.steps_written,
                report.steps_planned,
                e
            );
        }

        let reset = self.reset(port.as_mut()).await;
        match &reset {
            Ok(()) => report.reset_written = true,
            Err(e) => tracing::error!("Neutral reset failed: {}", e),
        }

        let closed = port.close().await;
        if let Err(e) = &closed {
            tracing::warn!("Port close failed: {}", e);
        }

        streamed?;
        reset?;
        closed?;

        tracing::info!(
            "Playback finished: {}/{} steps{}",
            report.steps_written,
            report.steps_planned,
            if report.cancelled { " (cancelled)" } else { "" }
        );
        Ok(report)
    }

    async fn stream(
        &self,
        motion: &Motion,
        port: &mut dyn ActuatorPort,
        cancel: &CancellationToken,
        report: &mut PlaybackReport,
    ) -> Result<()> {
        let pace = motion.interval(self.frame_interval);

        for (step, command) in motion.commands(self.transform).enumerate() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let command = command?;
            let lengths = self.solver.solve(&command)?;
            let packet = self.codec.encode(&lengths)?;
            self.write(port, &packet).await?;
            report.steps_written += 1;
            tracing::debug!(
                "Step {}/{} {:?} -> {}",
                step + 1,
                report.steps_planned,
                command.to_array(),
                packet.to_hex()
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Playback cancelled after step {}", step + 1);
                    report.cancelled = true;
                    break;
                }
                _ = tokio::time::sleep(pace) => {}
            }
        }
        Ok(())
    }

    async fn reset(&self, port: &mut dyn ActuatorPort) -> Result<()> {
        let packet = self.codec.neutral(&self.neutral)?;
        self.write(port, &packet).await?;
        tracing::debug!("Neutral reset -> {}", packet.to_hex());
        Ok(())
    }

    async fn write(&self, port: &mut dyn ActuatorPort, packet: &SerialPacket) -> Result<()> {
        match tokio::time::timeout(self.write_timeout, port.write_packet(packet)).await {
            Ok(result) => result,
            Err(_) => Err(RigError::port_io(format!(
                "write timed out after {:?}",
                self.write_timeout
            ))),
        }
    }
}
