//! IP geolocation
//!
//! Lookups go through the [`GeoLookup`] trait so handlers can be driven by
//! the ipstack client in production and by anything else in tests.

pub mod ipstack;
pub mod models;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

pub use ipstack::IpStackClient;
pub use models::LocationInfo;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("geolocation request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("unexpected response status: {0}")]
    Status(StatusCode),
    #[error("failed to decode geolocation response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("geolocation API error {code} ({kind}): {info}")]
    Api { code: u32, kind: String, info: String },
}

// The request URL carries the access key, never keep it in the error.
impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        LookupError::Transport(err.without_url())
    }
}

#[async_trait]
pub trait GeoLookup: Send + Sync {
    /// Resolve `ip` to a location. The address is forwarded as-is.
    async fn lookup(&self, ip: &str) -> Result<LocationInfo, LookupError>;
}
