// # tormaskd - Interactive Tor identity rotator
//
// The tormaskd binary is responsible for:
// 1. Reading configuration from environment variables (and the interval prompt)
// 2. Initializing logging and the runtime
// 3. Wiring the control, probe and change-log components into the scheduler
// 4. Feeding stdin commands and termination signals to the scheduler
// 5. Printing scheduler events
//
// All rotation logic lives in tormask-core.
//
// ## Configuration
//
// ### Control port
// - `TORMASK_CONTROL_HOST`: Control-port host (default 127.0.0.1)
// - `TORMASK_CONTROL_PORT`: Control-port port (default 9051)
// - `TORMASK_CONTROL_TIMEOUT_SECS`: Whole-exchange timeout (default 5)
// - `TORMASK_SIGNAL`: Signal sent after authentication (default NEWNYM)
// - `TORMASK_COOKIE_PATHS`: Colon-separated cookie candidates
//
// ### Identity probe
// - `TORMASK_SOCKS_PROXY`: Proxy for the identity check (default socks5h://127.0.0.1:9050)
// - `TORMASK_IDENTITY_URL`: Identity check endpoint
//
// ### Change log
// - `TORMASK_LOG_TYPE`: file or memory (default file)
// - `TORMASK_LOG_PATH`: Log file (default $HOME/Desktop/tor_ip_changed_log.txt)
// - `TORMASK_RECENT_LINES`: Lines shown by the `l` command (default 5)
//
// ### Session
// - `TORMASK_INTERVAL_SECS`: Seconds between rotations (prompted when unset)
// - `TORMASK_STOP_DAEMON`: Stop the daemon on exit (default true)
// - `TORMASK_DAEMON_UNIT`: Service unit to stop (default tor)
// - `TORMASK_LOG_LEVEL`: trace, debug, info, warn, error (default warn)
//
// ## Example
//
// ```bash
// export TORMASK_INTERVAL_SECS=30
// export TORMASK_LOG_TYPE=memory
// export TORMASK_STOP_DAEMON=false
//
// tormaskd
// ```

mod display;
mod systemctl;

use anyhow::{Context, Result};
use std::env;
use std::io::{BufRead, Write};
use std::process::ExitCode;
use std::str::FromStr;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use tormask_core::config::{ChangeLogConfig, DEFAULT_INTERVAL_SECS, TormaskConfig, parse_interval};
use tormask_core::traits::{ChangeLog, DaemonControl, KeepRunning};
use tormask_core::{
    Command, FileChangeLog, MemoryChangeLog, RotationScheduler, SchedulerComponents,
    SchedulerEvent, ShutdownRequest,
};

use crate::systemctl::SystemctlDaemon;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum TormaskExitCode {
    /// Clean shutdown (quit command or signal)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<TormaskExitCode> for ExitCode {
    fn from(code: TormaskExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Default log file name, placed on the user's desktop
const DEFAULT_LOG_FILE: &str = "tor_ip_changed_log.txt";

/// Read and parse an optional environment variable
fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{} '{}' is not valid: {}", name, raw, e)),
        Err(_) => Ok(None),
    }
}

fn default_log_path() -> String {
    match env::var("HOME") {
        Ok(home) if !home.is_empty() => format!("{}/Desktop/{}", home, DEFAULT_LOG_FILE),
        _ => DEFAULT_LOG_FILE.to_string(),
    }
}

/// Ask for the rotation interval on stdin
fn prompt_interval() -> Result<u64> {
    print!("Rotation interval in seconds [{}]: ", DEFAULT_INTERVAL_SECS);
    std::io::stdout().flush().context("Failed to write prompt")?;

    let mut input = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut input)
        .context("Failed to read interval")?;
    Ok(parse_interval(&input))
}

/// Build the configuration from environment variables
fn config_from_env() -> Result<(TormaskConfig, String)> {
    let mut config = TormaskConfig::new();

    if let Ok(host) = env::var("TORMASK_CONTROL_HOST") {
        config.control.host = host;
    }
    if let Some(port) = env_parse("TORMASK_CONTROL_PORT")? {
        config.control.port = port;
    }
    if let Some(timeout) = env_parse("TORMASK_CONTROL_TIMEOUT_SECS")? {
        config.control.timeout_secs = timeout;
    }
    if let Ok(signal) = env::var("TORMASK_SIGNAL") {
        config.control.signal = signal.trim().to_uppercase();
    }
    if let Ok(paths) = env::var("TORMASK_COOKIE_PATHS") {
        config.control.cookie_paths = paths
            .split(':')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }

    if let Ok(proxy) = env::var("TORMASK_SOCKS_PROXY") {
        config.probe.socks_proxy = proxy;
    }
    if let Ok(url) = env::var("TORMASK_IDENTITY_URL") {
        config.probe.identity_url = url;
    }

    let log_type = env::var("TORMASK_LOG_TYPE").unwrap_or_else(|_| "file".to_string());
    config.change_log = match log_type.to_lowercase().as_str() {
        "file" => ChangeLogConfig::File {
            path: env::var("TORMASK_LOG_PATH").unwrap_or_else(|_| default_log_path()),
        },
        "memory" => ChangeLogConfig::Memory,
        other => anyhow::bail!(
            "TORMASK_LOG_TYPE '{}' is not supported. Supported types: file, memory",
            other
        ),
    };
    if let Some(lines) = env_parse("TORMASK_RECENT_LINES")? {
        config.scheduler.recent_log_lines = lines;
    }

    config.scheduler.interval_secs = match env::var("TORMASK_INTERVAL_SECS") {
        Ok(raw) => parse_interval(&raw),
        Err(_) => prompt_interval()?,
    };

    if let Some(stop) = env_parse("TORMASK_STOP_DAEMON")? {
        config.daemon.stop_on_exit = stop;
    }
    if let Ok(unit) = env::var("TORMASK_DAEMON_UNIT") {
        config.daemon.unit = unit;
    }

    let log_level = env::var("TORMASK_LOG_LEVEL").unwrap_or_else(|_| "warn".to_string());
    Ok((config, log_level))
}

fn parse_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "TORMASK_LOG_LEVEL '{}' is not valid. Valid levels: trace, debug, info, warn, error",
            level
        ),
    }
}

/// Assemble the scheduler collaborators
fn build_components(config: &TormaskConfig) -> Result<SchedulerComponents> {
    let (cookies, control) = tormask_control::from_config(&config.control);
    let identity = tormask_probe_http::identity_probe(&config.probe)?;

    let change_log: Box<dyn ChangeLog> = match &config.change_log {
        ChangeLogConfig::File { path } => Box::new(FileChangeLog::new(path)),
        ChangeLogConfig::Memory => Box::new(MemoryChangeLog::new()),
    };

    let daemon: Box<dyn DaemonControl> = if config.daemon.stop_on_exit {
        Box::new(SystemctlDaemon::new(&config.daemon.unit))
    } else {
        Box::new(KeepRunning)
    };

    Ok(SchedulerComponents {
        cookies: Box::new(cookies),
        control: Box::new(control),
        identity: Box::new(identity),
        change_log,
        daemon,
    })
}

fn main() -> ExitCode {
    // Load configuration from environment
    let (config, log_level) = match config_from_env() {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return TormaskExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return TormaskExitCode::ConfigError.into();
    }

    let log_level = match parse_level(&log_level) {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration validation error: {}", e);
            return TormaskExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return TormaskExitCode::ConfigError.into();
    }

    info!("Starting tormaskd");

    let components = match build_components(&config) {
        Ok(components) => components,
        Err(e) => {
            error!("Startup error: {}", e);
            eprintln!("Startup error: {}", e);
            return TormaskExitCode::ConfigError.into();
        }
    };

    let (scheduler, event_rx) = match RotationScheduler::new(components, &config.scheduler) {
        Ok(created) => created,
        Err(e) => {
            eprintln!("Startup error: {}", e);
            return TormaskExitCode::ConfigError.into();
        }
    };

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return TormaskExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(scheduler, event_rx).await {
            error!("Daemon error: {}", e);
            eprintln!("Error: {}", e);
            TormaskExitCode::RuntimeError
        } else {
            TormaskExitCode::CleanShutdown
        }
    });

    // The stdin thread may still be blocked on a read
    rt.shutdown_background();

    result.into()
}

/// Run the session until quit or a termination signal
async fn run_daemon(
    scheduler: RotationScheduler,
    mut event_rx: mpsc::Receiver<SchedulerEvent>,
) -> Result<()> {
    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            for line in display::render(&event) {
                println!("{}", line);
            }
        }
    });

    let (shutdown_tx, shutdown_rx) = mpsc::channel(4);
    let signals = tokio::spawn(forward_signals(shutdown_tx));

    let commands = Box::pin(UnboundedReceiverStream::new(spawn_stdin_reader()));
    let summary = scheduler.run(commands, shutdown_rx).await?;

    signals.abort();
    // The scheduler dropped its event sender; the printer drains and exits
    printer.await.context("Event printer panicked")?;

    info!(
        "Session ended: {} rotation(s) in {}",
        summary.rotations,
        summary.elapsed_hms()
    );
    Ok(())
}

/// Read command lines on a dedicated thread
///
/// The thread ends at end of input, which closes the command stream.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<Command> {
    let (tx, rx) = mpsc::unbounded_channel();

    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    debug!("Stopped reading stdin: {}", e);
                    break;
                }
            };

            match Command::parse(&line) {
                Some(command) => {
                    if tx.send(command).is_err() {
                        break;
                    }
                }
                None if line.trim().is_empty() => {}
                None => println!("Unknown command '{}', type h for help", line.trim()),
            }
        }
        debug!("Command input closed");
    });

    rx
}

/// Post a shutdown request on SIGINT or SIGTERM
#[cfg(unix)]
async fn forward_signals(shutdown_tx: mpsc::Sender<ShutdownRequest>) {
    let (mut sigterm, mut sigint) =
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                warn!("Failed to install signal handlers: {}", e);
                return;
            }
        };

    let name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };

    info!("Received {}", name);
    let _ = shutdown_tx.send(ShutdownRequest::new(name)).await;
}

/// Post a shutdown request on Ctrl-C
#[cfg(not(unix))]
async fn forward_signals(shutdown_tx: mpsc::Sender<ShutdownRequest>) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Received Ctrl-C");
            let _ = shutdown_tx.send(ShutdownRequest::new("SIGINT")).await;
        }
        Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
    }
}
