// # Change Log Trait
//
// Defines the interface for recording successful identity changes.
//
// ## Purpose
//
// Every successful rotation produces one entry. Entries are never mutated
// or deleted; ordering is the order of `append` calls.
//
// ## Implementations
//
// - File-based append-only text log (`FileChangeLog`)
// - In-memory (`MemoryChangeLog`) for tests and non-persistent runs

use async_trait::async_trait;
use chrono::{DateTime, Local};

use super::identity_source::{IdentityRecord, clean_field};

/// Timestamp format used in log lines and on screen
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One successful identity change
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeLogEntry {
    /// Local wall-clock time of the change
    pub timestamp: DateTime<Local>,
    /// Identity observed after the change
    pub identity: IdentityRecord,
}

impl ChangeLogEntry {
    /// Create an entry stamped with the current time
    pub fn now(identity: IdentityRecord) -> Self {
        Self {
            timestamp: Local::now(),
            identity,
        }
    }

    /// Render as a single log line (no trailing newline)
    ///
    /// Format: `<timestamp> | <address> | <country> | <city> | <isp>`.
    /// Fields are passed through [`clean_field`], so one entry is always
    /// exactly one line with five fields.
    pub fn to_line(&self) -> String {
        format!(
            "{} | {} | {} | {} | {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            clean_field(&self.identity.address),
            clean_field(&self.identity.country),
            clean_field(&self.identity.city),
            clean_field(&self.identity.isp)
        )
    }
}

/// Trait for change log implementations
///
/// # Trust Level: Trusted (Core Component)
///
/// ## Allowed Capabilities
/// - ✅ Perform I/O on its own log container
/// - ✅ Serialize concurrent appends internally
///
/// ## Forbidden Capabilities
/// - ❌ Holding the log open between calls
/// - ❌ Rewriting or truncating existing entries
/// - ❌ Deciding when a change happened (owned by `RotationScheduler`)
#[async_trait]
pub trait ChangeLog: Send + Sync {
    /// Append one entry
    ///
    /// # Returns
    ///
    /// - `Ok(())`: the entry is flushed
    /// - `Err(Error::LogWrite)`: I/O failure
    async fn append(&self, entry: &ChangeLogEntry) -> Result<(), crate::Error>;

    /// The last `limit` data lines, oldest first
    async fn recent(&self, limit: usize) -> Result<Vec<String>, crate::Error>;

    /// Where the log lives, for display
    fn location(&self) -> String;
}
