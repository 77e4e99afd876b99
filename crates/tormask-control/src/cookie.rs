//! Auth cookie discovery

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use tormask_core::traits::{AuthCookie, CookieSource};
use tormask_core::{Error, Result};

/// Length of a cookie written by the daemon
pub const EXPECTED_COOKIE_LEN: usize = 32;

/// Reads the auth cookie from the first readable, non-empty candidate path
///
/// Paths are tried in order on every load, so a daemon restart that moves
/// or rewrites the cookie is picked up on the next rotation.
#[derive(Debug, Clone)]
pub struct FileCookieStore {
    paths: Vec<PathBuf>,
}

impl FileCookieStore {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self {
            paths: paths.into_iter().map(|p| p.as_ref().to_path_buf()).collect(),
        }
    }
}

#[async_trait]
impl CookieSource for FileCookieStore {
    async fn load(&self) -> Result<AuthCookie> {
        for path in &self.paths {
            let bytes = match tokio::fs::read(path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    debug!("Cookie not readable at {}: {}", path.display(), e);
                    continue;
                }
            };

            let Some(cookie) = AuthCookie::new(bytes) else {
                debug!("Cookie file {} is empty", path.display());
                continue;
            };

            if cookie.len() != EXPECTED_COOKIE_LEN {
                debug!(
                    "Cookie at {} is {} bytes, expected {}",
                    path.display(),
                    cookie.len(),
                    EXPECTED_COOKIE_LEN
                );
            }
            debug!("Loaded auth cookie from {}", path.display());
            return Ok(cookie);
        }

        let tried = self
            .paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(Error::cookie_not_found(format!(
            "No readable auth cookie (tried: {})",
            tried
        )))
    }
}
