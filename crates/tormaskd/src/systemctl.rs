//! Service-manager backed daemon stop

use async_trait::async_trait;
use tracing::{debug, info};

use tormask_core::traits::DaemonControl;
use tormask_core::{Error, Result};

/// Stops the daemon with `systemctl stop <unit>`
#[derive(Debug, Clone)]
pub struct SystemctlDaemon {
    program: String,
    unit: String,
}

impl SystemctlDaemon {
    pub fn new(unit: impl Into<String>) -> Self {
        Self {
            program: "systemctl".to_string(),
            unit: unit.into(),
        }
    }

    /// Use a different service-manager executable
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl DaemonControl for SystemctlDaemon {
    async fn stop(&self) -> Result<()> {
        debug!("Running {} stop {}", self.program, self.unit);

        let status = tokio::process::Command::new(&self.program)
            .arg("stop")
            .arg(&self.unit)
            .status()
            .await
            .map_err(|e| {
                Error::daemon_control(format!("Failed to run {}: {}", self.program, e))
            })?;

        if !status.success() {
            return Err(Error::daemon_control(format!(
                "{} stop {} exited with {}",
                self.program, self.unit, status
            )));
        }

        info!("Stopped {}", self.unit);
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn successful_exit_is_ok() {
        let daemon = SystemctlDaemon::new("tor").with_program("true");
        assert!(daemon.stop().await.is_ok());
    }

    #[tokio::test]
    async fn failing_exit_is_daemon_control_error() {
        let daemon = SystemctlDaemon::new("tor").with_program("false");
        let err = daemon.stop().await.unwrap_err();
        assert!(matches!(err, Error::DaemonControl(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn missing_program_is_daemon_control_error() {
        let daemon = SystemctlDaemon::new("tor").with_program("/nonexistent/systemctl");
        let err = daemon.stop().await.unwrap_err();
        assert!(matches!(err, Error::DaemonControl(_)), "{:?}", err);
    }
}
