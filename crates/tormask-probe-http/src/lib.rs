// # HTTP Probe Transport
//
// This crate provides the reqwest-backed `HttpFetcher` for tormask.
//
// ## Routes
//
// - `Route::Anonymized`: every request goes through the SOCKS proxy
//   (`socks5h://` so name resolution also happens on the far side)
// - `Route::Direct`: no proxy at all, environment proxy variables included
//
// ## Architecture
//
// The fetcher is a dumb transport: one GET per call, JSON decode, status
// check. Timeouts per lookup and the fallback order are owned by
// `IdentityProbe` in tormask-core.

use async_trait::async_trait;
use std::time::Duration;
use tracing::trace;

use tormask_core::config::ProbeConfig;
use tormask_core::probe::IdentityProbe;
use tormask_core::traits::{HttpFetcher, Route};
use tormask_core::{Error, Result};

/// Client-level timeout, a backstop behind the per-lookup timeouts
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// User agent sent with every request
const USER_AGENT: &str = concat!("tormask/", env!("CARGO_PKG_VERSION"));

/// reqwest transport with one client per route
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    anonymized: reqwest::Client,
    direct: reqwest::Client,
}

impl ReqwestFetcher {
    /// Create a fetcher whose anonymized route uses `socks_proxy`
    ///
    /// # Errors
    ///
    /// `Error::Config` if the proxy URL is invalid or a client cannot be built.
    pub fn new(socks_proxy: &str) -> Result<Self> {
        let proxy = reqwest::Proxy::all(socks_proxy).map_err(|e| {
            Error::config(format!("Invalid SOCKS proxy {}: {}", socks_proxy, e))
        })?;

        let anonymized = reqwest::Client::builder()
            .proxy(proxy)
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build proxied HTTP client: {}", e)))?;

        let direct = reqwest::Client::builder()
            .no_proxy()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build direct HTTP client: {}", e)))?;

        Ok(Self { anonymized, direct })
    }

    pub fn from_config(config: &ProbeConfig) -> Result<Self> {
        Self::new(&config.socks_proxy)
    }

    fn client(&self, route: Route) -> &reqwest::Client {
        match route {
            Route::Anonymized => &self.anonymized,
            Route::Direct => &self.direct,
        }
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get_json(&self, url: &str, route: Route) -> Result<serde_json::Value> {
        trace!("GET {} ({:?})", url, route);

        let response = self
            .client(route)
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| Error::http(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::http(format!("{} returned HTTP {}", url, status)));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| Error::http(format!("Invalid JSON from {}: {}", url, e)))
    }
}

/// Identity probe over the reqwest transport
pub fn identity_probe(config: &ProbeConfig) -> Result<IdentityProbe> {
    let fetcher = ReqwestFetcher::from_config(config)?;
    Ok(IdentityProbe::from_config(Box::new(fetcher), config))
}
