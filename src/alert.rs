// src/alert.rs
//
// Rising-level alert. A two-state latch (Idle, Latched) decides when the
// audio sink is triggered; the reset policy decides when it re-arms.

use crate::types::{AlertConfig, ResetMode};
use std::path::Path;
use std::process::Command;
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("sound file not found: {0}")]
    MissingSound(String),
    #[error("failed to start player `{player}`: {source}")]
    Spawn {
        player: String,
        #[source]
        source: std::io::Error,
    },
    #[error("player `{player}` exited with {status}")]
    PlayerFailed { player: String, status: String },
    #[error("alert worker could not be started: {0}")]
    Worker(#[source] std::io::Error),
    #[error("alert worker is gone")]
    WorkerGone,
}

/// Anything that can sound an alert.
pub trait AlertSink: Send {
    fn trigger(&mut self, sound: &str) -> Result<(), AlertError>;
}

/// No audio configured; the alert only shows up in the log.
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn trigger(&mut self, sound: &str) -> Result<(), AlertError> {
        info!("🔔 Alert ({} not played, no player configured)", sound);
        Ok(())
    }
}

/// Plays the sound with an external player, blocking until it exits.
pub struct CommandAlertSink {
    player: String,
}

impl CommandAlertSink {
    pub fn new(player: impl Into<String>) -> Self {
        Self {
            player: player.into(),
        }
    }
}

impl AlertSink for CommandAlertSink {
    fn trigger(&mut self, sound: &str) -> Result<(), AlertError> {
        if !Path::new(sound).exists() {
            return Err(AlertError::MissingSound(sound.to_string()));
        }

        let status = Command::new(&self.player)
            .arg(sound)
            .status()
            .map_err(|source| AlertError::Spawn {
                player: self.player.clone(),
                source,
            })?;

        if !status.success() {
            return Err(AlertError::PlayerFailed {
                player: self.player.clone(),
                status: status.to_string(),
            });
        }
        Ok(())
    }
}

/// Runs another sink on a worker thread. The hand-off channel holds a single
/// request, so at most one playback waits behind the one in progress; extra
/// triggers are dropped.
pub struct BackgroundAlertSink {
    tx: Option<SyncSender<String>>,
    worker: Option<JoinHandle<()>>,
}

impl BackgroundAlertSink {
    pub fn spawn<S: AlertSink + 'static>(mut inner: S) -> Result<Self, AlertError> {
        let (tx, rx) = mpsc::sync_channel::<String>(1);
        let worker = thread::Builder::new()
            .name("alert-player".to_string())
            .spawn(move || {
                for sound in rx {
                    if let Err(e) = inner.trigger(&sound) {
                        warn!("Alert playback failed: {}", e);
                    }
                }
            })
            .map_err(AlertError::Worker)?;

        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
        })
    }
}

impl AlertSink for BackgroundAlertSink {
    fn trigger(&mut self, sound: &str) -> Result<(), AlertError> {
        let tx = self.tx.as_ref().ok_or(AlertError::WorkerGone)?;
        match tx.try_send(sound.to_string()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                debug!("Alert playback already pending, trigger dropped");
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(AlertError::WorkerGone),
        }
    }
}

impl Drop for BackgroundAlertSink {
    fn drop(&mut self) {
        // Closing the channel lets the worker finish what is queued and exit
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Log,
    Command,
    BackgroundCommand,
}

impl SinkKind {
    pub fn for_config(config: &AlertConfig) -> Self {
        match (config.player_command(), config.background) {
            (None, _) => SinkKind::Log,
            (Some(_), false) => SinkKind::Command,
            (Some(_), true) => SinkKind::BackgroundCommand,
        }
    }
}

/// Build the sink described by the alert config.
pub fn sink_from_config(config: &AlertConfig) -> Result<Box<dyn AlertSink>, AlertError> {
    let kind = SinkKind::for_config(config);
    let player = config.player_command().unwrap_or_default();
    info!("Alert sink: {:?} {}", kind, player);

    let sink: Box<dyn AlertSink> = match kind {
        SinkKind::Log => Box::new(LogAlertSink),
        SinkKind::Command => Box::new(CommandAlertSink::new(player)),
        SinkKind::BackgroundCommand => {
            Box::new(BackgroundAlertSink::spawn(CommandAlertSink::new(player))?)
        }
    };
    Ok(sink)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertState {
    Idle,
    Latched,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResetPolicy {
    /// Re-arm after every evaluated height, so every height above the
    /// threshold fires.
    Always,
    /// Re-arm once the height falls below `threshold - margin`.
    Hysteresis { margin: f64 },
}

impl ResetPolicy {
    pub fn from_config(config: &AlertConfig) -> Self {
        match config.reset {
            ResetMode::Always => ResetPolicy::Always,
            ResetMode::Hysteresis => ResetPolicy::Hysteresis {
                margin: config.hysteresis_margin,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertDecision {
    pub fired: bool,
    pub sink_failed: bool,
    pub state: AlertState,
}

pub struct AlertController {
    threshold: f64,
    policy: ResetPolicy,
    sound: String,
    state: AlertState,
    sink: Box<dyn AlertSink>,
}

impl AlertController {
    pub fn new(config: &AlertConfig, sink: Box<dyn AlertSink>) -> Self {
        Self {
            threshold: config.threshold,
            policy: ResetPolicy::from_config(config),
            sound: config.sound_path.clone(),
            state: AlertState::Idle,
            sink,
        }
    }

    pub fn state(&self) -> AlertState {
        self.state
    }

    /// Feed one newly measured height.
    pub fn evaluate(&mut self, height: f64) -> AlertDecision {
        let mut fired = false;
        let mut sink_failed = false;

        if height > self.threshold && self.state == AlertState::Idle {
            warn!(
                "🚨 Level rising: height {:.1} above {:.1}, sounding alert",
                height, self.threshold
            );
            if let Err(e) = self.sink.trigger(&self.sound) {
                warn!("Error playing alert sound: {}", e);
                sink_failed = true;
            }
            fired = true;
            self.state = AlertState::Latched;
        }

        match self.policy {
            ResetPolicy::Always => self.state = AlertState::Idle,
            ResetPolicy::Hysteresis { margin } => {
                if self.state == AlertState::Latched && height < self.threshold - margin {
                    debug!("Alert re-armed at height {:.1}", height);
                    self.state = AlertState::Idle;
                }
            }
        }

        AlertDecision {
            fired,
            sink_failed,
            state: self.state,
        }
    }
}
