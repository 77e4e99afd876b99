//! Core traits for the tormask system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`CookieSource`]: Load the daemon's authentication cookie
//! - [`ControlChannel`]: Authenticate and signal the daemon
//! - [`IdentitySource`]: Learn the externally visible identity
//! - [`HttpFetcher`]: Opaque JSON-over-HTTP transport
//! - [`ChangeLog`]: Append-only record of identity changes
//! - [`DaemonControl`]: Stop the daemon when the session ends

pub mod control_channel;
pub mod identity_source;
pub mod change_log;
pub mod daemon;

pub use control_channel::{AuthCookie, ControlChannel, CookieSource};
pub use identity_source::{
    HttpFetcher, IdentityRecord, IdentitySource, Route, UNKNOWN, clean_field,
};
pub use change_log::{ChangeLog, ChangeLogEntry, TIMESTAMP_FORMAT};
pub use daemon::{DaemonControl, KeepRunning};
