use anyhow::{bail, Context};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

pub const DEFAULT_IPSTACK_API_URL: &str = "http://api.ipstack.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub ipstack: IpStackConfig,
    pub client_ip: ClientIpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct IpStackConfig {
    pub api_key: String,
    /// Base URL of the ipstack API, without a trailing path
    pub base_url: String,
}

// Keep the access key out of `{:?}` output.
impl std::fmt::Debug for IpStackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpStackConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrustedProxyMode {
    /// X-Forwarded-For / X-Real-IP / Forwarded
    #[default]
    Standard,
    /// CF-Connecting-IP
    Cloudflare,
    /// Socket peer address only
    None,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientIpConfig {
    pub trusted_proxy_mode: TrustedProxyMode,
    /// Proxies allowed to set forwarding headers; empty means every peer is trusted
    #[serde(default)]
    pub trusted_proxies: Vec<IpNet>,
    /// Number of proxy hops to skip from the right of X-Forwarded-For
    #[serde(default)]
    pub num_trusted_proxies: Option<usize>,
}

impl ClientIpConfig {
    pub fn is_trusted_proxy(&self, ip: IpAddr) -> bool {
        self.trusted_proxies.is_empty() || self.trusted_proxies.iter().any(|net| net.contains(&ip))
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_vars<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = var("IPSTACK_API_KEY").unwrap_or_default();
        if api_key.trim().is_empty() {
            bail!("IPSTACK_API_KEY not set");
        }

        let base_url = var("IPSTACK_API_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_IPSTACK_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = var("PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse::<u16>()
            .context("PORT must be a valid port number")?;

        let trusted_proxy_mode = match var("TRUSTED_PROXY_MODE")
            .unwrap_or_else(|| "standard".to_string())
            .to_lowercase()
            .as_str()
        {
            "standard" => TrustedProxyMode::Standard,
            "cloudflare" => TrustedProxyMode::Cloudflare,
            "none" => TrustedProxyMode::None,
            other => {
                tracing::warn!(
                    "Unknown TRUSTED_PROXY_MODE '{other}', falling back to 'standard'. Supported values: standard, cloudflare, none"
                );
                TrustedProxyMode::Standard
            }
        };

        let trusted_proxies = match var("TRUSTED_PROXIES") {
            Some(list) => parse_trusted_proxies(&list)?,
            None => Vec::new(),
        };

        let num_trusted_proxies = var("NUM_TRUSTED_PROXIES")
            .map(|v| v.trim().parse::<usize>())
            .transpose()
            .context("NUM_TRUSTED_PROXIES must be a non-negative integer")?;

        Ok(Config {
            server: ServerConfig { host, port },
            ipstack: IpStackConfig { api_key, base_url },
            client_ip: ClientIpConfig {
                trusted_proxy_mode,
                trusted_proxies,
                num_trusted_proxies,
            },
        })
    }
}

/// Parse a comma-separated list of CIDRs; bare addresses become host routes.
fn parse_trusted_proxies(list: &str) -> anyhow::Result<Vec<IpNet>> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .parse::<IpNet>()
                .or_else(|_| entry.parse::<IpAddr>().map(IpNet::from))
                .with_context(|| format!("invalid TRUSTED_PROXIES entry '{entry}'"))
        })
        .collect()
}
