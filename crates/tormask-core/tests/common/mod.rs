//! Test doubles and common utilities for scheduler contract tests
//!
//! Each double counts its calls through shared atomics so a test can keep a
//! handle after the scheduler takes ownership of the boxed original.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;

use tormask_core::config::SchedulerConfig;
use tormask_core::error::{Error, Result};
use tormask_core::traits::{
    AuthCookie, ChangeLog, ChangeLogEntry, ControlChannel, CookieSource, DaemonControl,
    IdentityRecord, IdentitySource,
};
use tormask_core::{
    Command, MemoryChangeLog, RotationScheduler, SchedulerComponents, SchedulerEvent,
    SessionSummary, ShutdownRequest,
};

/// Cookie source returning a fixed cookie, or failing
#[derive(Clone)]
pub struct MockCookieSource {
    calls: Arc<AtomicUsize>,
    missing: bool,
}

impl MockCookieSource {
    pub fn present() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            missing: false,
        }
    }

    pub fn missing() -> Self {
        Self {
            missing: true,
            ..Self::present()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CookieSource for MockCookieSource {
    async fn load(&self) -> Result<AuthCookie> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.missing {
            return Err(Error::cookie_not_found("no cookie at /nonexistent"));
        }
        AuthCookie::new(vec![0xab; 32]).ok_or_else(|| Error::cookie_not_found("empty cookie"))
    }
}

/// How the mock control channel answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlBehavior {
    Accept,
    RejectAuth,
    RejectSignal,
    Unreachable,
}

/// Control channel double with an optional artificial delay
#[derive(Clone)]
pub struct MockControlChannel {
    calls: Arc<AtomicUsize>,
    behavior: ControlBehavior,
    delay: Option<Duration>,
}

impl MockControlChannel {
    pub fn new(behavior: ControlBehavior) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            behavior,
            delay: None,
        }
    }

    pub fn accepting() -> Self {
        Self::new(ControlBehavior::Accept)
    }

    /// Every rotate takes `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ControlChannel for MockControlChannel {
    async fn rotate(&self, cookie: &AuthCookie) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(!cookie.is_empty());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.behavior {
            ControlBehavior::Accept => Ok(()),
            ControlBehavior::RejectAuth => {
                Err(Error::auth("515 Authentication failed: Wrong length on authentication cookie."))
            }
            ControlBehavior::RejectSignal => {
                Err(Error::signal_rejected("552 Unrecognized signal code \"BOGUS\""))
            }
            ControlBehavior::Unreachable => Err(Error::transport("connection refused")),
        }
    }

    fn endpoint(&self) -> String {
        "mock:9051".to_string()
    }
}

/// Identity source handing out a fresh address on every call
#[derive(Clone)]
pub struct MockIdentitySource {
    calls: Arc<AtomicUsize>,
    unavailable: bool,
}

impl MockIdentitySource {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            unavailable: false,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::new()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentitySource for MockIdentitySource {
    async fn resolve(&self) -> Result<IdentityRecord> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(Error::identity_unavailable("check endpoint timed out"));
        }
        Ok(IdentityRecord {
            address: format!("203.0.113.{}", n + 1),
            country: "Germany".to_string(),
            city: "Frankfurt am Main".to_string(),
            region: "Hesse".to_string(),
            isp: "Example Hosting".to_string(),
            timezone: "Europe/Berlin".to_string(),
            latitude: 50.11,
            longitude: 8.68,
        })
    }
}

/// Change log whose appends always fail
#[derive(Clone, Default)]
pub struct FailingChangeLog {
    attempts: Arc<AtomicUsize>,
}

impl FailingChangeLog {
    pub fn attempt_count(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChangeLog for FailingChangeLog {
    async fn append(&self, _entry: &ChangeLogEntry) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(Error::log_write("disk full"))
    }

    async fn recent(&self, _limit: usize) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn location(&self) -> String {
        "/full/disk/log.txt".to_string()
    }
}

/// Daemon control that records stop calls
#[derive(Clone, Default)]
pub struct RecordingDaemon {
    stops: Arc<AtomicUsize>,
    fail: Arc<AtomicBool>,
}

impl RecordingDaemon {
    pub fn failing() -> Self {
        let daemon = Self::default();
        daemon.fail.store(true, Ordering::SeqCst);
        daemon
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DaemonControl for RecordingDaemon {
    async fn stop(&self) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::daemon_control("systemctl exited with status 1"));
        }
        Ok(())
    }
}

/// Test-side handles for a running scheduler
pub struct Session {
    pub commands: mpsc::UnboundedSender<Command>,
    pub shutdown: mpsc::Sender<ShutdownRequest>,
    pub events: mpsc::Receiver<SchedulerEvent>,
    pub handle: JoinHandle<Result<SessionSummary>>,
}

impl Session {
    /// Send a command; panics if the scheduler dropped the stream
    pub fn command(&self, command: Command) {
        self.commands.send(command).expect("command stream open");
    }

    /// Drop the command sender so the scheduler sees end-of-input
    pub fn close_commands(&mut self) {
        let (closed, _) = mpsc::unbounded_channel();
        self.commands = closed;
    }

    /// Ask the scheduler to stop
    pub async fn request_shutdown(&self, source: &str) {
        self.shutdown
            .send(ShutdownRequest::new(source))
            .await
            .expect("shutdown channel open");
    }

    /// Wait for the scheduler to return
    pub async fn join(self) -> (SessionSummary, Vec<SchedulerEvent>) {
        let Session {
            commands,
            shutdown,
            mut events,
            handle,
        } = self;
        let summary = tokio::time::timeout(Duration::from_secs(60), handle)
            .await
            .expect("scheduler terminates")
            .expect("scheduler task does not panic")
            .expect("scheduler returns Ok");
        drop(commands);
        drop(shutdown);

        let mut rest = Vec::new();
        while let Ok(event) = events.try_recv() {
            rest.push(event);
        }
        (summary, rest)
    }

    /// Wait for the first event matching `pred`, discarding the others
    pub async fn wait_for<F>(&mut self, mut pred: F) -> SchedulerEvent
    where
        F: FnMut(&SchedulerEvent) -> bool,
    {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(60), self.events.recv())
                .await
                .expect("event arrives")
                .expect("event channel open");
            if pred(&event) {
                return event;
            }
        }
    }

    /// Ask for statistics and wait for the reply
    pub async fn statistics(&mut self) -> SessionSummary {
        self.command(Command::Statistics);
        match self
            .wait_for(|e| matches!(e, SchedulerEvent::Statistics(_)))
            .await
        {
            SchedulerEvent::Statistics(summary) => summary,
            _ => unreachable!(),
        }
    }
}

/// Scheduler config with the given interval
pub fn scheduler_config(interval_secs: u64) -> SchedulerConfig {
    SchedulerConfig {
        interval_secs,
        recent_log_lines: 5,
        event_channel_capacity: 1024,
    }
}

/// Spawn a scheduler over `components`
pub fn start(components: SchedulerComponents, interval_secs: u64) -> Session {
    let (scheduler, events) = RotationScheduler::new(components, &scheduler_config(interval_secs))
        .expect("scheduler construction succeeds");

    let (commands, command_rx) = mpsc::unbounded_channel();
    let (shutdown, shutdown_rx) = mpsc::channel(4);

    let stream = Box::pin(UnboundedReceiverStream::new(command_rx));
    let handle = tokio::spawn(scheduler.run(stream, shutdown_rx));

    Session {
        commands,
        shutdown,
        events,
        handle,
    }
}

/// Handles to the doubles behind a default component set
pub struct Doubles {
    pub cookies: MockCookieSource,
    pub control: MockControlChannel,
    pub identity: MockIdentitySource,
    pub log: MemoryChangeLog,
    pub daemon: RecordingDaemon,
}

impl Doubles {
    pub fn new() -> Self {
        Self {
            cookies: MockCookieSource::present(),
            control: MockControlChannel::accepting(),
            identity: MockIdentitySource::new(),
            log: MemoryChangeLog::new(),
            daemon: RecordingDaemon::default(),
        }
    }

    /// Boxed clones sharing this set's counters
    pub fn components(&self) -> SchedulerComponents {
        SchedulerComponents {
            cookies: Box::new(self.cookies.clone()),
            control: Box::new(self.control.clone()),
            identity: Box::new(self.identity.clone()),
            change_log: Box::new(self.log.clone()),
            daemon: Box::new(self.daemon.clone()),
        }
    }
}
