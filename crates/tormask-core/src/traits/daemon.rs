//! Daemon lifecycle collaborator
//!
//! The scheduler stops the anonymizing daemon when the session ends.
//! How that happens (service manager, signal, nothing at all) belongs to
//! the embedding binary.

use async_trait::async_trait;

/// Stops the anonymizing daemon at the end of a session
#[async_trait]
pub trait DaemonControl: Send + Sync {
    /// Stop the daemon
    ///
    /// Failure is reported by the scheduler but never changes the
    /// session outcome.
    async fn stop(&self) -> Result<(), crate::Error>;
}

/// Leaves the daemon running
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepRunning;

#[async_trait]
impl DaemonControl for KeepRunning {
    async fn stop(&self) -> Result<(), crate::Error> {
        tracing::debug!("Leaving daemon running");
        Ok(())
    }
}
