//! Control session: authenticate, signal, quit

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, trace};

use tormask_core::config::ControlConfig;
use tormask_core::traits::{AuthCookie, ControlChannel};
use tormask_core::{Error, Result};

use crate::reply::{Reply, ReplyReader};

/// Default control-port timeout (5 seconds)
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// One connection per rotation
///
/// The whole exchange (connect, write, three replies) runs under a single
/// timeout. A timed-out or refused connection is a transport error; a
/// non-2xx answer to AUTHENTICATE or SIGNAL maps to its own error kind.
#[derive(Debug, Clone)]
pub struct ControlSession {
    address: String,
    signal: String,
    timeout: Duration,
}

impl ControlSession {
    pub fn new(address: impl Into<String>, signal: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            signal: signal.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn from_config(config: &ControlConfig) -> Self {
        Self::new(config.address(), config.signal.clone())
            .with_timeout(Duration::from_secs(config.timeout_secs))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn exchange(&self, cookie: &AuthCookie) -> Result<()> {
        let stream = TcpStream::connect(&self.address).await.map_err(|e| {
            Error::transport(format!("Failed to connect to {}: {}", self.address, e))
        })?;
        let (read_half, mut write_half) = stream.into_split();

        let request = command_batch(cookie, &self.signal);
        write_half
            .write_all(request.as_bytes())
            .await
            .map_err(|e| Error::transport(format!("Failed to send commands: {}", e)))?;
        write_half
            .flush()
            .await
            .map_err(|e| Error::transport(format!("Failed to send commands: {}", e)))?;
        trace!("Sent AUTHENTICATE, SIGNAL {} and QUIT", self.signal);

        let mut replies = ReplyReader::new(read_half);

        let auth = expect_reply(&mut replies, "AUTHENTICATE").await?;
        if !auth.is_ok() {
            return Err(Error::auth(format!("Daemon rejected cookie: {}", auth)));
        }

        let signal = expect_reply(&mut replies, "SIGNAL").await?;
        if !signal.is_ok() {
            return Err(Error::signal_rejected(format!(
                "Daemon rejected SIGNAL {}: {}",
                self.signal, signal
            )));
        }

        // The rotation already happened; a missing QUIT reply changes nothing
        match replies.next_reply().await {
            Ok(Some(reply)) => trace!("QUIT answered with {}", reply),
            Ok(None) => trace!("Connection closed before QUIT reply"),
            Err(e) => debug!("Ignoring QUIT reply error: {}", e),
        }

        Ok(())
    }
}

#[async_trait]
impl ControlChannel for ControlSession {
    async fn rotate(&self, cookie: &AuthCookie) -> Result<()> {
        match tokio::time::timeout(self.timeout, self.exchange(cookie)).await {
            Ok(result) => result,
            Err(_) => Err(Error::transport(format!(
                "Control exchange with {} timed out after {:?}",
                self.address, self.timeout
            ))),
        }
    }

    fn endpoint(&self) -> String {
        self.address.clone()
    }
}

/// AUTHENTICATE, SIGNAL and QUIT as one write
fn command_batch(cookie: &AuthCookie, signal: &str) -> String {
    let cookie_hex = data_encoding::HEXLOWER.encode(cookie.as_bytes());
    format!(
        "AUTHENTICATE {}\r\nSIGNAL {}\r\nQUIT\r\n",
        cookie_hex, signal
    )
}

async fn expect_reply<R>(replies: &mut ReplyReader<R>, command: &str) -> Result<Reply>
where
    R: tokio::io::AsyncRead + Unpin,
{
    replies.next_reply().await?.ok_or_else(|| {
        Error::transport(format!("Connection closed before {} reply", command))
    })
}
