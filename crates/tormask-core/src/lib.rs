// # tormask-core
//
// Core library for timed Tor identity rotation.
//
// ## Architecture Overview
//
// This library provides the core functionality for rotating and recording
// the anonymized exit identity:
// - **CookieSource**: Trait for loading the control-port auth cookie
// - **ControlChannel**: Trait for authenticating and signalling the daemon
// - **IdentitySource**: Trait for learning the current exit identity
// - **ChangeLog**: Trait for recording identity changes
// - **RotationScheduler**: Timed loop that drives the rotate, resolve, record flow
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from the wire and HTTP implementations
// 2. **Failure Isolation**: A failed cycle is reported and the next one runs on schedule
// 3. **Single Owner**: Session counters live on the scheduler task only
// 4. **Library-First**: All core functionality can be used as a library

pub mod traits;
pub mod engine;
pub mod config;
pub mod error;
pub mod probe;
pub mod changelog;

// Re-export core types for convenience
pub use traits::{ChangeLog, ControlChannel, CookieSource, DaemonControl, IdentitySource};
pub use engine::{
    Command, CommandStream, RotationScheduler, SchedulerComponents, SchedulerEvent,
    SessionSummary, ShutdownRequest, StopReason,
};
pub use config::{ChangeLogConfig, ControlConfig, ProbeConfig, SchedulerConfig, TormaskConfig};
pub use error::{Error, Result};
pub use probe::IdentityProbe;
pub use changelog::{FileChangeLog, MemoryChangeLog};
