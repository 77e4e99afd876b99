// # Identity Source Traits
//
// Defines the interface for learning the externally visible identity
// after a rotation, and the opaque HTTP transport it is built on.
//
// ## Implementations
//
// - `IdentityProbe` (this crate): identity check + geolocation fallback chain
// - `HttpFetcher` over reqwest: `tormask-probe-http` crate

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Placeholder for any string field a lookup could not resolve
pub const UNKNOWN: &str = "Unknown";

/// Make untrusted text safe for a single ` | `-separated log field
///
/// Control characters (line breaks included) and `|` become spaces, then
/// whitespace runs collapse to one space.
pub fn clean_field(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_control() || c == '|' { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Externally observed identity
///
/// Always fully populated: unresolved strings are [`UNKNOWN`] and
/// unresolved coordinates are `0.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub address: String,
    pub country: String,
    pub city: String,
    pub region: String,
    pub isp: String,
    pub timezone: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl IdentityRecord {
    /// Record with only the address known
    pub fn unresolved(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            country: UNKNOWN.to_string(),
            city: UNKNOWN.to_string(),
            region: UNKNOWN.to_string(),
            isp: UNKNOWN.to_string(),
            timezone: UNKNOWN.to_string(),
            latitude: 0.0,
            longitude: 0.0,
        }
    }

    /// Whether any geolocation field was resolved
    pub fn is_geolocated(&self) -> bool {
        self.country != UNKNOWN
            || self.city != UNKNOWN
            || self.region != UNKNOWN
            || self.isp != UNKNOWN
            || self.timezone != UNKNOWN
            || self.latitude != 0.0
            || self.longitude != 0.0
    }
}

/// Source of the current external identity
#[async_trait]
pub trait IdentitySource: Send + Sync {
    /// Resolve the current identity
    ///
    /// # Returns
    ///
    /// - `Ok(IdentityRecord)`: address known; geolocation may be `Unknown`
    /// - `Err(Error::IdentityUnavailable)`: the address could not be learned
    async fn resolve(&self) -> Result<IdentityRecord, crate::Error>;
}

/// Network path for an HTTP request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Through the anonymizing SOCKS proxy
    Anonymized,
    /// Straight from this host
    Direct,
}

/// Opaque JSON-over-HTTP GET
///
/// # Contract
///
/// - One request per call, no retries, no caching
/// - Non-success HTTP status is an error
/// - The body is decoded as JSON; an undecodable body is an error
///
/// Callers enforce their own timeouts around each call.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// GET `url` over `route` and decode the body as JSON
    async fn get_json(&self, url: &str, route: Route) -> Result<serde_json::Value, crate::Error>;
}
