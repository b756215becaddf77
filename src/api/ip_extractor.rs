//! Client IP extraction from HTTP headers with trust validation
//!
//! - `Standard` mode reads X-Forwarded-For, then X-Real-IP, then Forwarded,
//!   walking proxy chains right to left past trusted hops
//! - `Cloudflare` mode reads CF-Connecting-IP
//! - Falls back to the socket remote address when headers are absent,
//!   unparsable or sent by an untrusted peer

use axum::http::HeaderMap;
use std::net::IpAddr;
use tracing::warn;

use crate::config::{ClientIpConfig, TrustedProxyMode};

/// Extract the client IP address for a request
///
/// # Arguments
/// * `headers` - HTTP request headers
/// * `socket_addr` - The socket remote address (fallback)
/// * `config` - Proxy trust settings
pub fn extract_client_ip(headers: &HeaderMap, socket_addr: IpAddr, config: &ClientIpConfig) -> IpAddr {
    match config.trusted_proxy_mode {
        TrustedProxyMode::Cloudflare => extract_cloudflare_ip(headers).unwrap_or_else(|| {
            warn!("CF-Connecting-IP header missing in Cloudflare mode, using socket address");
            socket_addr
        }),
        TrustedProxyMode::Standard => {
            if !config.is_trusted_proxy(socket_addr) {
                return socket_addr;
            }
            extract_standard_ip(headers, config).unwrap_or(socket_addr)
        }
        TrustedProxyMode::None => socket_addr,
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|h| h.to_str().ok())
}

fn extract_cloudflare_ip(headers: &HeaderMap) -> Option<IpAddr> {
    header_str(headers, "cf-connecting-ip").and_then(|s| s.trim().parse::<IpAddr>().ok())
}

fn extract_standard_ip(headers: &HeaderMap, config: &ClientIpConfig) -> Option<IpAddr> {
    extract_from_x_forwarded_for(headers, config)
        .or_else(|| extract_from_x_real_ip(headers))
        .or_else(|| extract_from_forwarded(headers, config))
}

/// Parse X-Forwarded-For with right-to-left trust validation
fn extract_from_x_forwarded_for(headers: &HeaderMap, config: &ClientIpConfig) -> Option<IpAddr> {
    let ips: Vec<IpAddr> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(','))
        .filter_map(|s| s.trim().parse::<IpAddr>().ok())
        .collect();

    select_from_chain(&ips, config)
}

fn extract_from_x_real_ip(headers: &HeaderMap) -> Option<IpAddr> {
    header_str(headers, "x-real-ip").and_then(|s| s.trim().parse::<IpAddr>().ok())
}

/// Parse RFC 7239 Forwarded header: `for=192.0.2.60;proto=http, for="[2001:db8::1]:4711"`
fn extract_from_forwarded(headers: &HeaderMap, config: &ClientIpConfig) -> Option<IpAddr> {
    let forwarded = header_str(headers, "forwarded")?;

    let ips: Vec<IpAddr> = forwarded
        .split(',')
        .filter_map(|element| {
            element.split(';').find_map(|param| {
                let param = param.trim();
                let (key, value) = param.split_once('=')?;
                if !key.eq_ignore_ascii_case("for") {
                    return None;
                }
                parse_forwarded_node(value)
            })
        })
        .collect();

    select_from_chain(&ips, config)
}

fn parse_forwarded_node(value: &str) -> Option<IpAddr> {
    let value = value.trim().trim_matches('"');

    if let Some(rest) = value.strip_prefix('[') {
        // [v6] or [v6]:port
        return rest.split(']').next()?.parse().ok();
    }

    // Bare v4, v4:port, or an unbracketed v6
    value
        .parse()
        .ok()
        .or_else(|| value.rsplit_once(':').and_then(|(host, _)| host.parse().ok()))
}

/// Pick the client from a proxy chain ordered client-first
fn select_from_chain(ips: &[IpAddr], config: &ClientIpConfig) -> Option<IpAddr> {
    if ips.is_empty() {
        return None;
    }

    // Skip a fixed number of hops from the right
    if let Some(num_trusted) = config.num_trusted_proxies {
        if ips.len() > num_trusted {
            return Some(ips[ips.len() - num_trusted - 1]);
        }
        return ips.first().copied();
    }

    // No trust list: every hop is trusted
    if config.trusted_proxies.is_empty() {
        return ips.first().copied();
    }

    ips.iter()
        .rev()
        .find(|ip| !config.is_trusted_proxy(**ip))
        .or_else(|| ips.first())
        .copied()
}
