// # Geolocation Providers
//
// Each provider is a data entry: an endpoint template, a rule deciding
// whether a response body counts as success, and a JSON-pointer mapping
// from the provider's field names onto `IdentityRecord`. All providers go
// through the same evaluation code; there are no per-provider branches.
//
// ## Response Shapes
//
// ```text
// ip-api.com  {"status":"success","country":..,"regionName":..,"city":..,
//              "isp":..,"timezone":..,"lat":..,"lon":..}
// ipwho.is    {"success":true,"country":..,"region":..,"city":..,
//              "connection":{"isp":..},"timezone":{"id":..},"latitude":..,"longitude":..}
// ipapi.co    {"country_name":..,"region":..,"city":..,"org":..,
//              "timezone":..,"latitude":..,"longitude":..}   ({"error":true,..} on failure)
// ```

use serde_json::Value;

use crate::traits::{IdentityRecord, UNKNOWN, clean_field};

/// Placeholder replaced with the address in endpoint templates
pub const ADDRESS_PLACEHOLDER: &str = "{address}";

/// Rule deciding whether a decoded body is a successful lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// Any decoded body is accepted
    Always,
    /// String field at `pointer` must equal `value`
    FieldEquals {
        pointer: &'static str,
        value: &'static str,
    },
    /// Boolean field at `pointer` must be `true`
    FlagSet { pointer: &'static str },
    /// Boolean field at `pointer` must be absent or `false`
    FlagUnset { pointer: &'static str },
}

impl Acceptance {
    /// Evaluate the rule against a response body
    pub fn accepts(&self, body: &Value) -> bool {
        match *self {
            Acceptance::Always => true,
            Acceptance::FieldEquals { pointer, value } => {
                body.pointer(pointer).and_then(Value::as_str) == Some(value)
            }
            Acceptance::FlagSet { pointer } => {
                body.pointer(pointer).and_then(Value::as_bool) == Some(true)
            }
            Acceptance::FlagUnset { pointer } => {
                body.pointer(pointer).and_then(Value::as_bool) != Some(true)
            }
        }
    }
}

/// JSON pointers for each geolocation field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMap {
    pub country: &'static str,
    pub city: &'static str,
    pub region: &'static str,
    pub isp: &'static str,
    pub timezone: &'static str,
    pub latitude: &'static str,
    pub longitude: &'static str,
}

/// One geolocation provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeoProvider {
    /// Short name for logs
    pub name: &'static str,
    /// Endpoint with an `{address}` placeholder
    pub url_template: &'static str,
    /// Success rule
    pub acceptance: Acceptance,
    /// Field mapping
    pub fields: FieldMap,
}

impl GeoProvider {
    /// ip-api.com (plain HTTP on the free tier)
    pub const IP_API: GeoProvider = GeoProvider {
        name: "ip-api",
        url_template: "http://ip-api.com/json/{address}",
        acceptance: Acceptance::FieldEquals {
            pointer: "/status",
            value: "success",
        },
        fields: FieldMap {
            country: "/country",
            city: "/city",
            region: "/regionName",
            isp: "/isp",
            timezone: "/timezone",
            latitude: "/lat",
            longitude: "/lon",
        },
    };

    /// ipwho.is
    pub const IPWHO_IS: GeoProvider = GeoProvider {
        name: "ipwho.is",
        url_template: "https://ipwho.is/{address}",
        acceptance: Acceptance::FlagSet {
            pointer: "/success",
        },
        fields: FieldMap {
            country: "/country",
            city: "/city",
            region: "/region",
            isp: "/connection/isp",
            timezone: "/timezone/id",
            latitude: "/latitude",
            longitude: "/longitude",
        },
    };

    /// ipapi.co
    pub const IPAPI_CO: GeoProvider = GeoProvider {
        name: "ipapi.co",
        url_template: "https://ipapi.co/{address}/json/",
        acceptance: Acceptance::FlagUnset { pointer: "/error" },
        fields: FieldMap {
            country: "/country_name",
            city: "/city",
            region: "/region",
            isp: "/org",
            timezone: "/timezone",
            latitude: "/latitude",
            longitude: "/longitude",
        },
    };

    /// Endpoint for a specific address
    pub fn url_for(&self, address: &str) -> String {
        self.url_template.replace(ADDRESS_PLACEHOLDER, address)
    }

    /// Map an accepted body onto a record for `address`
    pub fn normalize(&self, address: &str, body: &Value) -> IdentityRecord {
        IdentityRecord {
            address: address.to_string(),
            country: string_at(body, self.fields.country),
            city: string_at(body, self.fields.city),
            region: string_at(body, self.fields.region),
            isp: string_at(body, self.fields.isp),
            timezone: string_at(body, self.fields.timezone),
            latitude: number_at(body, self.fields.latitude),
            longitude: number_at(body, self.fields.longitude),
        }
    }
}

/// Default provider order
pub fn default_providers() -> Vec<GeoProvider> {
    vec![GeoProvider::IP_API, GeoProvider::IPWHO_IS, GeoProvider::IPAPI_CO]
}

/// Cleaned string field, or `Unknown` when absent/empty
fn string_at(body: &Value, pointer: &str) -> String {
    let cleaned = match body.pointer(pointer) {
        Some(Value::String(s)) => clean_field(s),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    if cleaned.is_empty() {
        UNKNOWN.to_string()
    } else {
        cleaned
    }
}

/// Numeric field, or `0.0` when absent/unparseable
fn number_at(body: &Value, pointer: &str) -> f64 {
    match body.pointer(pointer) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}
