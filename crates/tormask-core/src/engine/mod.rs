//! Rotation scheduler
//!
//! The RotationScheduler is responsible for:
//! - Rotating the identity on a fixed interval
//! - Resolving and recording the identity after each rotation
//! - Handling interactive commands between rotations
//! - Converging every shutdown path onto one stop sequence
//!
//! ## Architecture
//!
//! ```text
//!  timer tick ──────┐
//!  Command stream ──┼──▶ select! ──▶ RotationScheduler ──▶ SchedulerEvent
//!  ShutdownRequest ─┘                       │
//!                      ┌────────────┬───────┴──────┬─────────────┐
//!                      ▼            ▼              ▼             ▼
//!               CookieSource  ControlChannel  IdentitySource  ChangeLog
//! ```
//!
//! ## Rotation Cycle
//!
//! 1. Load a fresh cookie
//! 2. `ControlChannel::rotate()`
//! 3. `IdentitySource::resolve()`
//! 4. `ChangeLog::append()`
//! 5. Emit `RotationSucceeded`
//!
//! A failure in steps 1-3 skips the rest of the cycle. A failed append is
//! reported but still counts as a rotation.
//!
//! ## State Machine
//!
//! `Stopped -> Running -> Stopped`. Quit commands and shutdown requests are
//! the only ways out of `Running`; no cycle error stops the loop.

pub mod command;

use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::traits::{
    ChangeLog, ChangeLogEntry, ControlChannel, CookieSource, DaemonControl, IdentitySource,
};

pub use command::{Command, ShutdownRequest};

/// Stream of interactive commands fed to the scheduler
pub type CommandStream = Pin<Box<dyn Stream<Item = Command> + Send + 'static>>;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Running,
}

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The user typed the quit command
    Quit,
    /// A shutdown request arrived (signal name or other source)
    Shutdown(String),
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Quit => write!(f, "quit command"),
            StopReason::Shutdown(source) => write!(f, "{}", source),
        }
    }
}

/// Step of a rotation cycle that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationStage {
    /// Loading the auth cookie
    Cookie,
    /// Authenticating or signalling over the control channel
    Control,
    /// Learning the new identity
    Identity,
}

impl std::fmt::Display for RotationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RotationStage::Cookie => "cookie",
            RotationStage::Control => "control",
            RotationStage::Identity => "identity",
        };
        f.write_str(name)
    }
}

/// Snapshot of session counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    /// Wall-clock session start
    pub started: DateTime<Local>,
    /// Time since the session started
    pub elapsed: Duration,
    /// Successful rotations (identity resolved)
    pub rotations: u64,
    /// Cycles that failed before an identity was resolved
    pub failed_rotations: u64,
    /// Rotations whose log append failed
    pub log_write_failures: u64,
}

impl SessionSummary {
    /// Elapsed time as `HH:MM:SS`
    pub fn elapsed_hms(&self) -> String {
        let secs = self.elapsed.as_secs();
        format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// Counters owned by the scheduler task
#[derive(Debug, Clone)]
struct SessionStats {
    started_at: Instant,
    started: DateTime<Local>,
    rotations: u64,
    failed_rotations: u64,
    log_write_failures: u64,
}

impl SessionStats {
    fn start() -> Self {
        Self {
            started_at: Instant::now(),
            started: Local::now(),
            rotations: 0,
            failed_rotations: 0,
            log_write_failures: 0,
        }
    }

    fn summary(&self) -> SessionSummary {
        SessionSummary {
            started: self.started,
            elapsed: self.started_at.elapsed(),
            rotations: self.rotations,
            failed_rotations: self.failed_rotations,
            log_write_failures: self.log_write_failures,
        }
    }
}

/// Events emitted by the RotationScheduler
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    /// Session started
    Started {
        interval: Duration,
        log_location: String,
    },

    /// Identity changed and was resolved
    RotationSucceeded {
        entry: ChangeLogEntry,
        rotations: u64,
    },

    /// A cycle was skipped
    RotationFailed {
        stage: RotationStage,
        error: String,
    },

    /// The change could not be written to the log
    LogWriteFailed {
        error: String,
    },

    /// Reply to the statistics command
    Statistics(SessionSummary),

    /// Reply to the recent-log command
    RecentLog {
        location: String,
        lines: Vec<String>,
    },

    /// The recent-log command could not read the log
    RecentLogFailed {
        error: String,
    },

    /// Reply to the help command
    Help,

    /// Session stopped; final statistics
    Stopped {
        reason: StopReason,
        summary: SessionSummary,
    },

    /// The daemon-stop collaborator failed
    DaemonStopFailed {
        error: String,
    },
}

/// Collaborators the scheduler drives
pub struct SchedulerComponents {
    pub cookies: Box<dyn CookieSource>,
    pub control: Box<dyn ControlChannel>,
    pub identity: Box<dyn IdentitySource>,
    pub change_log: Box<dyn ChangeLog>,
    pub daemon: Box<dyn DaemonControl>,
}

/// Timed identity rotation loop
///
/// ## Lifecycle
///
/// 1. Create with [`RotationScheduler::new()`]
/// 2. Start with [`RotationScheduler::run()`], which consumes the scheduler
/// 3. Runs until a quit command or shutdown request
/// 4. Returns the final [`SessionSummary`]
///
/// ## Threading
///
/// Timer, commands and shutdown requests are multiplexed on one task, so
/// exactly one of {rotation, command, shutdown} is handled at a time and the
/// counters need no locking.
pub struct RotationScheduler {
    cookies: Box<dyn CookieSource>,
    control: Box<dyn ControlChannel>,
    identity: Box<dyn IdentitySource>,
    change_log: Box<dyn ChangeLog>,
    daemon: Box<dyn DaemonControl>,

    /// Time between the end of one cycle and the start of the next
    interval: Duration,

    /// Lines returned by the recent-log command
    recent_log_lines: usize,

    state: SessionState,
    stop_reason: Option<StopReason>,
    stats: SessionStats,

    /// Event sender for the display
    event_tx: mpsc::Sender<SchedulerEvent>,
}

impl RotationScheduler {
    /// Create a new scheduler
    ///
    /// # Returns
    ///
    /// A tuple of (scheduler, event_receiver) where event_receiver yields scheduler events
    pub fn new(
        components: SchedulerComponents,
        config: &SchedulerConfig,
    ) -> Result<(Self, mpsc::Receiver<SchedulerEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let scheduler = Self {
            cookies: components.cookies,
            control: components.control,
            identity: components.identity,
            change_log: components.change_log,
            daemon: components.daemon,
            interval: Duration::from_secs(config.interval_secs),
            recent_log_lines: config.recent_log_lines,
            state: SessionState::Stopped,
            stop_reason: None,
            stats: SessionStats::start(),
            event_tx: tx,
        };

        Ok((scheduler, rx))
    }

    /// Run the session
    ///
    /// Performs one rotation immediately, then one per interval, until a
    /// quit command or a shutdown request arrives. A closed command stream
    /// only disables interactive commands.
    ///
    /// # Returns
    ///
    /// - `Ok(SessionSummary)`: clean stop; final statistics
    pub async fn run(
        mut self,
        mut commands: CommandStream,
        mut shutdown_rx: mpsc::Receiver<ShutdownRequest>,
    ) -> Result<SessionSummary> {
        self.state = SessionState::Running;
        self.stats = SessionStats::start();

        info!(
            "Rotation session started (interval {:?}, control {}, log {})",
            self.interval,
            self.control.endpoint(),
            self.change_log.location()
        );
        self.emit_event(SchedulerEvent::Started {
            interval: self.interval,
            log_location: self.change_log.location(),
        });

        self.rotation_cycle(&mut shutdown_rx).await;

        let mut next_tick = Instant::now() + self.interval;
        let mut commands_open = true;
        let mut shutdown_open = true;

        while self.state == SessionState::Running {
            tokio::select! {
                _ = tokio::time::sleep_until(next_tick) => {
                    self.rotation_cycle(&mut shutdown_rx).await;
                    next_tick = Instant::now() + self.interval;
                }

                command = commands.next(), if commands_open => {
                    match command {
                        Some(Command::Quit) => self.request_stop(StopReason::Quit),
                        Some(command) => self.handle_command(command).await,
                        None => {
                            debug!("Command stream closed, continuing without interactive commands");
                            commands_open = false;
                        }
                    }
                }

                request = shutdown_rx.recv(), if shutdown_open => {
                    match request {
                        Some(request) => {
                            info!("Shutdown requested by {}", request.source);
                            self.request_stop(StopReason::Shutdown(request.source));
                        }
                        None => {
                            debug!("Shutdown channel closed");
                            shutdown_open = false;
                        }
                    }
                }
            }
        }

        self.finish().await
    }

    /// One rotation cycle
    ///
    /// Checks for a pending shutdown after every blocking step and abandons
    /// the remaining steps if one arrived.
    async fn rotation_cycle(&mut self, shutdown_rx: &mut mpsc::Receiver<ShutdownRequest>) {
        let cookie = match self.cookies.load().await {
            Ok(cookie) => cookie,
            Err(e) => {
                self.record_failure(RotationStage::Cookie, e);
                return;
            }
        };

        let rotated = self.control.rotate(&cookie).await;
        drop(cookie);

        if let Err(e) = rotated {
            self.record_failure(RotationStage::Control, e);
            self.poll_shutdown(shutdown_rx);
            return;
        }
        debug!("Daemon accepted rotation signal");

        if !self.poll_shutdown(shutdown_rx) {
            info!("Shutdown pending, skipping identity check");
            return;
        }

        let identity = match self.identity.resolve().await {
            Ok(identity) => identity,
            Err(e) => {
                self.record_failure(RotationStage::Identity, e);
                self.poll_shutdown(shutdown_rx);
                return;
            }
        };

        if !self.poll_shutdown(shutdown_rx) {
            info!("Shutdown pending, not logging identity {}", identity.address);
            return;
        }

        let entry = ChangeLogEntry::now(identity);
        self.stats.rotations += 1;
        info!(
            "New identity {} ({}, {})",
            entry.identity.address, entry.identity.country, entry.identity.city
        );

        if let Err(e) = self.change_log.append(&entry).await {
            error!("Failed to record identity change: {}", e);
            self.stats.log_write_failures += 1;
            self.emit_event(SchedulerEvent::LogWriteFailed {
                error: e.to_string(),
            });
        }

        self.emit_event(SchedulerEvent::RotationSucceeded {
            entry,
            rotations: self.stats.rotations,
        });

        self.poll_shutdown(shutdown_rx);
    }

    /// Handle a non-quit command
    async fn handle_command(&mut self, command: Command) {
        debug!("Handling command {:?}", command);
        match command {
            Command::Statistics => {
                self.emit_event(SchedulerEvent::Statistics(self.stats.summary()));
            }
            Command::RecentLog => match self.change_log.recent(self.recent_log_lines).await {
                Ok(lines) => self.emit_event(SchedulerEvent::RecentLog {
                    location: self.change_log.location(),
                    lines,
                }),
                Err(e) => {
                    warn!("Failed to read change log: {}", e);
                    self.emit_event(SchedulerEvent::RecentLogFailed {
                        error: e.to_string(),
                    });
                }
            },
            Command::Help => self.emit_event(SchedulerEvent::Help),
            Command::Quit => self.request_stop(StopReason::Quit),
        }
    }

    /// Count and report a skipped cycle
    fn record_failure(&mut self, stage: RotationStage, error: crate::Error) {
        warn!("Rotation failed at {} stage: {}", stage, error);
        self.stats.failed_rotations += 1;
        self.emit_event(SchedulerEvent::RotationFailed {
            stage,
            error: error.to_string(),
        });
    }

    /// Pick up a shutdown request that arrived during a blocking step
    ///
    /// Returns whether the session is still running.
    fn poll_shutdown(&mut self, shutdown_rx: &mut mpsc::Receiver<ShutdownRequest>) -> bool {
        if let Ok(request) = shutdown_rx.try_recv() {
            info!("Shutdown requested by {} during rotation", request.source);
            self.request_stop(StopReason::Shutdown(request.source));
        }
        self.state == SessionState::Running
    }

    /// Running -> Stopped; the first reason wins
    fn request_stop(&mut self, reason: StopReason) {
        if self.state == SessionState::Running {
            self.state = SessionState::Stopped;
            self.stop_reason = Some(reason);
        }
    }

    /// Stop sequence shared by every shutdown path
    async fn finish(mut self) -> Result<SessionSummary> {
        self.state = SessionState::Stopped;
        let reason = self.stop_reason.take().unwrap_or(StopReason::Quit);
        let summary = self.stats.summary();

        info!(
            "Rotation session stopped ({}): {} rotation(s) in {}",
            reason,
            summary.rotations,
            summary.elapsed_hms()
        );
        self.emit_event(SchedulerEvent::Stopped {
            reason,
            summary: summary.clone(),
        });

        if let Err(e) = self.daemon.stop().await {
            warn!("Failed to stop daemon: {}", e);
            self.emit_event(SchedulerEvent::DaemonStopFailed {
                error: e.to_string(),
            });
        }

        Ok(summary)
    }

    /// Emit a scheduler event
    fn emit_event(&self, event: SchedulerEvent) {
        // A full channel means the display is not keeping up; drop rather than block rotation
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}
