//! Pipeline Handle - tokio task that drives receiver and processor per frame
//!
//! Owns a [`FrameSource`] and a [`TrackingProcessor`] on a single task. Each
//! interval tick polls the source, runs the processor on the newest raw
//! rotation and publishes the result. Commands are applied between ticks, so
//! the processor never needs a lock.

use super::frame_source::FrameSource;
use crate::config::{PipelineConfig, TrackingConfig};
use crate::pose::Pose;
use crate::processing::TrackingProcessor;
use crate::protocol::{Transport, TransportError, UdpTransport};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const COMMAND_BUFFER: usize = 32;

/// Timing of the frame task.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineSettings {
    /// Tick period. 16 ms is roughly one frame at 60 Hz.
    pub frame_interval_ms: u64,

    /// Period of the statistics log line; `0` turns it off.
    pub stats_interval_secs: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for PipelineSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            frame_interval_ms: config.frame_interval_ms,
            stats_interval_secs: config.stats_interval_secs,
        }
    }
}

/// Errors reported by [`PipelineHandle`].
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The receiver could not be set up, or the config was rejected.
    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A rejected config update, or the task has already stopped.
    #[error("State update error: {0}")]
    StateUpdate(String),
}

/// One processed frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackingFrame {
    /// Output of the processor, stamped when it was computed.
    pub pose: Pose,
    /// A datagram arrived within the receiver's timeout.
    pub connected: bool,
    /// The sender is not on loopback.
    pub remote: bool,
    /// Newest rotation as received, before any processing.
    pub raw: (f32, f32, f32),
}

/// Requests handled by the pipeline task between frames.
#[derive(Clone, Debug)]
pub enum PipelineCommand {
    /// Treat the current raw pose as straight ahead.
    Recenter,
    /// Treat the given raw angles as straight ahead.
    RecenterTo {
        yaw: f32,
        pitch: f32,
        roll: f32,
    },
    /// Clears the recenter offset and the smoothing history.
    Reset,
    /// Replaces sensitivity, deadzone and smoothing. Receiver and timing
    /// sections only take effect on the next spawn.
    UpdateConfig(TrackingConfig),
}

/// Handle to a running frame pipeline.
///
/// Dropping the handle cancels the task without waiting for it; use
/// [`shutdown`](Self::shutdown) to wait until the receiver is closed.
#[derive(Debug)]
pub struct PipelineHandle {
    commands: mpsc::Sender<PipelineCommand>,
    frames: watch::Receiver<Option<TrackingFrame>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    local_port: Option<u16>,
}

impl PipelineHandle {
    /// Opens the receiver selected by `config` on `transport` and spawns
    /// the frame task. Must be called from within a tokio runtime.
    pub fn spawn(
        config: TrackingConfig,
        transport: Box<dyn Transport>,
    ) -> Result<Self, PipelineError> {
        config
            .validate()
            .map_err(|e| PipelineError::Initialization(e.to_string()))?;

        let settings = PipelineSettings::from(&config.pipeline);
        info!(
            "Initializing tracking pipeline: {:?} receiver on port {}, settings {:?}",
            config.receiver.mode, config.receiver.port, settings
        );

        let source = FrameSource::open(config.receiver.mode, transport, config.receiver.port)?;
        let local_port = source.local_port();

        let mut processor = TrackingProcessor::new();
        config.apply_to(&mut processor);
        debug!(
            "Processor configured: sensitivity={:?}, deadzone={:?}, smoothing={}",
            processor.sensitivity(),
            processor.deadzone(),
            processor.smoothing()
        );

        let (command_sender, command_receiver) = mpsc::channel(COMMAND_BUFFER);
        let (frame_sender, frame_receiver) = watch::channel(None);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_frame_loop(
            source,
            processor,
            settings,
            command_receiver,
            frame_sender,
            cancel.clone(),
        ));

        info!("Tracking pipeline spawned");
        Ok(Self {
            commands: command_sender,
            frames: frame_receiver,
            cancel,
            task: Some(task),
            local_port,
        })
    }

    /// [`spawn`](Self::spawn) on a real UDP socket.
    pub fn spawn_udp(config: TrackingConfig) -> Result<Self, PipelineError> {
        Self::spawn(config, Box::new(UdpTransport::new()))
    }

    /// `None` until the first valid datagram has been processed.
    pub fn subscribe(&self) -> watch::Receiver<Option<TrackingFrame>> {
        self.frames.clone()
    }

    pub fn latest(&self) -> Option<TrackingFrame> {
        *self.frames.borrow()
    }

    pub fn local_port(&self) -> Option<u16> {
        self.local_port
    }

    pub async fn recenter(&self) -> Result<(), PipelineError> {
        self.send(PipelineCommand::Recenter).await
    }

    pub async fn recenter_to(&self, yaw: f32, pitch: f32, roll: f32) -> Result<(), PipelineError> {
        self.send(PipelineCommand::RecenterTo { yaw, pitch, roll }).await
    }

    pub async fn reset(&self) -> Result<(), PipelineError> {
        self.send(PipelineCommand::Reset).await
    }

    /// Validates `config` before handing it to the task.
    pub async fn update_config(&self, config: TrackingConfig) -> Result<(), PipelineError> {
        config
            .validate()
            .map_err(|e| PipelineError::StateUpdate(e.to_string()))?;
        self.send(PipelineCommand::UpdateConfig(config)).await
    }

    pub async fn send(&self, command: PipelineCommand) -> Result<(), PipelineError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| PipelineError::StateUpdate("pipeline task has stopped".to_string()))
    }

    /// Stops the task and waits until the receiver has been closed.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Pipeline task ended abnormally: {}", e);
            }
        }
        info!("Tracking pipeline shut down");
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_frame_loop(
    mut source: FrameSource,
    mut processor: TrackingProcessor,
    settings: PipelineSettings,
    mut commands: mpsc::Receiver<PipelineCommand>,
    frames: watch::Sender<Option<TrackingFrame>>,
    cancel: CancellationToken,
) {
    let mut frame_timer = time::interval(Duration::from_millis(settings.frame_interval_ms.max(1)));
    frame_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let stats_enabled = settings.stats_interval_secs > 0;
    let stats_period = Duration::from_secs(settings.stats_interval_secs.max(1));
    let mut stats_timer = time::interval_at(Instant::now() + stats_period, stats_period);

    let mut last_frame: Option<Instant> = None;
    let mut frames_published: u64 = 0;
    let mut frames_at_last_stats: u64 = 0;
    let mut packets_at_last_stats: u64 = 0;
    let mut commands_open = true;

    info!("Frame loop started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Shutdown requested for frame loop");
                break;
            }

            command = commands.recv(), if commands_open => {
                match command {
                    Some(command) => apply_command(&mut processor, command),
                    None => {
                        debug!("Command channel closed");
                        commands_open = false;
                    }
                }
            }

            _ = frame_timer.tick() => {
                source.poll();
                let Some((yaw, pitch, roll)) = source.raw_rotation() else {
                    continue;
                };

                let now = Instant::now();
                let delta_time = last_frame
                    .map(|previous| now.duration_since(previous).as_secs_f32())
                    .unwrap_or(0.0);
                last_frame = Some(now);

                let remote = source.is_remote_connection();
                let pose = processor.process(yaw, pitch, roll, remote, delta_time);

                if frames_published == 0 {
                    info!("First tracking frame: ({:.2}, {:.2}, {:.2})", pose.yaw, pose.pitch, pose.roll);
                }
                frames_published += 1;

                frames.send_replace(Some(TrackingFrame {
                    pose,
                    connected: source.is_connected(),
                    remote,
                    raw: (yaw, pitch, roll),
                }));
            }

            _ = stats_timer.tick(), if stats_enabled => {
                let frames_delta = frames_published - frames_at_last_stats;
                frames_at_last_stats = frames_published;
                let rate = frames_delta as f64 / stats_period.as_secs_f64();

                match source.packets_received() {
                    Some(packets) => {
                        let packets_delta = packets.saturating_sub(packets_at_last_stats);
                        packets_at_last_stats = packets;
                        info!(
                            "Pipeline stats: {} frames ({:.1}/s), {} packets ({:.1}/s), connected={}, remote={}",
                            frames_published,
                            rate,
                            packets,
                            packets_delta as f64 / stats_period.as_secs_f64(),
                            source.is_connected(),
                            source.is_remote_connection()
                        );
                    }
                    None => {
                        info!(
                            "Pipeline stats: {} frames ({:.1}/s), connected={}, remote={}",
                            frames_published,
                            rate,
                            source.is_connected(),
                            source.is_remote_connection()
                        );
                    }
                }

                if !source.is_connected() && frames_published > 0 {
                    warn!("No tracking data within the connection timeout");
                }
            }
        }
    }

    source.close();
    info!("Frame loop stopped after {} frames", frames_published);
}

fn apply_command(processor: &mut TrackingProcessor, command: PipelineCommand) {
    match command {
        PipelineCommand::Recenter => {
            processor.recenter();
            info!("Recentered");
        }
        PipelineCommand::RecenterTo { yaw, pitch, roll } => {
            processor.recenter_to(yaw, pitch, roll);
            info!("Recentered to ({:.2}, {:.2}, {:.2})", yaw, pitch, roll);
        }
        PipelineCommand::Reset => {
            processor.reset();
            info!("Processor reset");
        }
        PipelineCommand::UpdateConfig(config) => {
            config.apply_to(processor);
            info!("Processor settings updated");
        }
    }
}
