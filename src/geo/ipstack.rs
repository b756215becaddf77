use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::models::IpStackResponse;
use super::{GeoLookup, LocationInfo, LookupError};
use crate::config::IpStackConfig;

/// ipstack.com geolocation client
#[derive(Clone)]
pub struct IpStackClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl IpStackClient {
    pub fn from_config(config: &IpStackConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("visit-tracker/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client for ipstack")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn lookup_url(&self, ip: &str) -> String {
        format!("{}/{}?access_key={}", self.base_url, ip, self.api_key)
    }
}

#[async_trait]
impl GeoLookup for IpStackClient {
    async fn lookup(&self, ip: &str) -> Result<LocationInfo, LookupError> {
        let response = self.client.get(self.lookup_url(ip)).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(LookupError::Status(status));
        }

        let body = response.bytes().await?;
        let location = serde_json::from_slice::<IpStackResponse>(&body)?.into_location()?;

        debug!(ip, country = %location.country_name, "resolved location");
        Ok(location)
    }
}
