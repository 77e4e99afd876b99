// # Control Channel Traits
//
// Defines the interfaces for authenticating to the local Tor daemon and
// asking it for a new identity.
//
// ## Implementations
//
// - Cookie files and the TCP control port: `tormask-control` crate
//
// ## Usage
//
// ```rust,ignore
// use tormask_core::{ControlChannel, CookieSource};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let cookies = /* CookieSource implementation */;
//     let control = /* ControlChannel implementation */;
//
//     // Fresh cookie per rotation, dropped afterwards
//     let cookie = cookies.load().await?;
//     control.rotate(&cookie).await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

/// Authentication cookie read from the daemon's cookie file
///
/// The bytes are opaque. A cookie is loaded for a single rotation and
/// dropped afterwards, because the daemon may rewrite the file at any time.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthCookie(Vec<u8>);

impl AuthCookie {
    /// Wrap raw cookie bytes
    ///
    /// Returns `None` for an empty sequence; an empty file is not a cookie.
    pub fn new(bytes: Vec<u8>) -> Option<Self> {
        if bytes.is_empty() {
            None
        } else {
            Some(Self(bytes))
        }
    }

    /// Raw cookie bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Cookie length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// The cookie is a credential; never print it
impl std::fmt::Debug for AuthCookie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthCookie")
            .field("len", &self.0.len())
            .field("bytes", &"<REDACTED>")
            .finish()
    }
}

/// Source of authentication cookies
///
/// # Contract
///
/// - Read-only: never creates or modifies cookie files
/// - Returns the first readable, non-empty candidate
/// - Fails with `Error::CookieNotFound` when no candidate qualifies
/// - Does not validate the cookie length; the daemon decides
#[async_trait]
pub trait CookieSource: Send + Sync {
    /// Load the current cookie
    async fn load(&self) -> Result<AuthCookie, crate::Error>;
}

/// Control channel to the anonymizing daemon
///
/// # Contract
///
/// One call is one self-contained exchange: connect, AUTHENTICATE, SIGNAL,
/// QUIT, close. There is no persistent session, so concurrent callers can
/// never share a half-used connection.
///
/// ## Forbidden
/// - ❌ Retrying internally (the scheduler's next tick is the retry)
/// - ❌ Caching the cookie
/// - ❌ Blocking past the configured exchange timeout
#[async_trait]
pub trait ControlChannel: Send + Sync {
    /// Ask the daemon for a new identity
    ///
    /// # Returns
    ///
    /// - `Ok(())`: authentication and signal both acknowledged with 2xx
    /// - `Err(Error::AuthenticationFailed)`: the AUTHENTICATE reply was not 2xx
    /// - `Err(Error::SignalRejected)`: the SIGNAL reply was not 2xx
    /// - `Err(Error::Transport)`: connect, I/O or timeout failure
    async fn rotate(&self, cookie: &AuthCookie) -> Result<(), crate::Error>;

    /// Human-readable endpoint description for logs
    fn endpoint(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cookie_is_rejected() {
        assert!(AuthCookie::new(Vec::new()).is_none());
        assert_eq!(AuthCookie::new(vec![1, 2, 3]).map(|c| c.len()), Some(3));
    }

    #[test]
    fn debug_output_hides_bytes() {
        let cookie = AuthCookie::new(vec![0xde, 0xad, 0xbe, 0xef]).unwrap();
        let printed = format!("{:?}", cookie);
        assert!(printed.contains("REDACTED"));
        assert!(!printed.contains("222"));
        assert!(!printed.to_lowercase().contains("dead"));
    }
}
