//! Identity probe
//!
//! Learns the externally visible identity after a rotation:
//!
//! 1. **Identity check** (hard): GET through the anonymizing proxy, read the
//!    address. Any failure here fails the whole probe.
//! 2. **Geolocation** (soft): walk the provider list with direct requests,
//!    first accepted response wins. If every provider fails the record keeps
//!    its address and reports everything else as `Unknown`.
//!
//! Every request runs under its own timeout.

pub mod providers;

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ProbeConfig;
use crate::error::{Error, Result};
use crate::traits::{HttpFetcher, IdentityRecord, IdentitySource, Route};

pub use providers::{Acceptance, FieldMap, GeoProvider, default_providers};

/// Identity check endpoint and the pointers into its JSON body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityEndpoint {
    /// Endpoint URL, fetched through the proxy
    pub url: String,
    /// JSON pointer to the address
    pub address_pointer: String,
    /// JSON pointer to a "traffic is anonymized" flag, if the endpoint has one
    pub anonymized_pointer: Option<String>,
}

impl IdentityEndpoint {
    /// The Tor Project's check endpoint (`{"IsTor":true,"IP":"..."}`)
    pub fn tor_check(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            address_pointer: "/IP".to_string(),
            anonymized_pointer: Some("/IsTor".to_string()),
        }
    }
}

/// Identity check + geolocation fallback chain
pub struct IdentityProbe {
    fetcher: Box<dyn HttpFetcher>,
    endpoint: IdentityEndpoint,
    providers: Vec<GeoProvider>,
    identity_timeout: Duration,
    geo_timeout: Duration,
}

impl IdentityProbe {
    /// Create a probe with explicit endpoint, providers and timeouts
    pub fn new(
        fetcher: Box<dyn HttpFetcher>,
        endpoint: IdentityEndpoint,
        providers: Vec<GeoProvider>,
        identity_timeout: Duration,
        geo_timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            endpoint,
            providers,
            identity_timeout,
            geo_timeout,
        }
    }

    /// Create a probe from configuration with the default provider list
    pub fn from_config(fetcher: Box<dyn HttpFetcher>, config: &ProbeConfig) -> Self {
        Self::new(
            fetcher,
            IdentityEndpoint::tor_check(config.identity_url.clone()),
            default_providers(),
            Duration::from_secs(config.identity_timeout_secs),
            Duration::from_secs(config.geo_timeout_secs),
        )
    }

    /// Step 1: the address as seen through the proxy
    async fn check_identity(&self) -> Result<String> {
        let request = self.fetcher.get_json(&self.endpoint.url, Route::Anonymized);

        let body = tokio::time::timeout(self.identity_timeout, request)
            .await
            .map_err(|_| {
                Error::identity_unavailable(format!(
                    "identity check timed out after {:?}",
                    self.identity_timeout
                ))
            })?
            .map_err(|e| Error::identity_unavailable(format!("identity check failed: {}", e)))?;

        if let Some(pointer) = &self.endpoint.anonymized_pointer {
            if body.pointer(pointer).and_then(Value::as_bool) == Some(false) {
                warn!("Identity check reports traffic is not anonymized");
            }
        }

        let raw = body
            .pointer(&self.endpoint.address_pointer)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| {
                Error::identity_unavailable(format!(
                    "identity check response has no address at {}",
                    self.endpoint.address_pointer
                ))
            })?;

        let address: IpAddr = raw.parse().map_err(|_| {
            Error::identity_unavailable(format!(
                "identity check returned {:?}, not an IP address",
                raw
            ))
        })?;
        Ok(address.to_string())
    }

    /// Step 2: first provider that answers wins
    async fn geolocate(&self, address: &str) -> IdentityRecord {
        for provider in &self.providers {
            let url = provider.url_for(address);
            let request = self.fetcher.get_json(&url, Route::Direct);

            match tokio::time::timeout(self.geo_timeout, request).await {
                Ok(Ok(body)) if provider.acceptance.accepts(&body) => {
                    debug!("Geolocation resolved by {}", provider.name);
                    return provider.normalize(address, &body);
                }
                Ok(Ok(_)) => {
                    debug!("Geolocation provider {} rejected the lookup", provider.name);
                }
                Ok(Err(e)) => {
                    debug!("Geolocation provider {} failed: {}", provider.name, e);
                }
                Err(_) => {
                    debug!(
                        "Geolocation provider {} timed out after {:?}",
                        provider.name, self.geo_timeout
                    );
                }
            }
        }

        info!("No geolocation provider answered for {}", address);
        IdentityRecord::unresolved(address)
    }
}

#[async_trait]
impl IdentitySource for IdentityProbe {
    async fn resolve(&self) -> Result<IdentityRecord> {
        let address = self.check_identity().await?;
        debug!("Identity check returned {}", address);
        Ok(self.geolocate(&address).await)
    }
}
