//! Client address resolution behind reverse proxies.

use crate::constants::TRUSTED_PROXY_COUNT;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{request::Parts, HeaderMap};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

/// Caller address as seen through [`TRUSTED_PROXY_COUNT`] proxies.
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let socket = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientIp(client_ip(
            &parts.headers,
            socket.as_ref(),
            TRUSTED_PROXY_COUNT,
        )))
    }
}

/// Resolve the caller's address.
///
/// With `trusted_proxies` proxies in front, the last `trusted_proxies` entries of
/// `X-Forwarded-For` were appended by them and the entry just before is the client.
/// Falls back to `X-Real-IP`, then the socket address, then `"unknown"`.
pub fn client_ip(headers: &HeaderMap, socket: Option<&SocketAddr>, trusted_proxies: usize) -> String {
    if let Some(ip) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| from_forwarded_for(v, trusted_proxies))
    {
        return ip;
    }

    if let Some(ip) = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| v.parse::<IpAddr>().is_ok())
    {
        return ip.to_string();
    }

    socket
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn from_forwarded_for(value: &str, trusted_proxies: usize) -> Option<String> {
    let chain: Vec<&str> = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    // A chain no longer than the proxy count was not built by our proxies alone.
    let candidate = if trusted_proxies == 0 || chain.len() <= trusted_proxies {
        chain.last()?
    } else {
        chain.get(chain.len() - trusted_proxies - 1)?
    };

    candidate
        .parse::<IpAddr>()
        .ok()
        .map(|ip| ip.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(name: &'static str, value: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(name, HeaderValue::from_str(value).unwrap());
        map
    }

    #[test]
    fn test_skips_trusted_proxies() {
        let h = headers("x-forwarded-for", "203.0.113.7, 10.0.0.2");
        assert_eq!(client_ip(&h, None, 1), "203.0.113.7");
    }

    #[test]
    fn test_spoofed_prefix_is_ignored() {
        let h = headers("x-forwarded-for", "1.1.1.1, 203.0.113.7, 10.0.0.2");
        assert_eq!(client_ip(&h, None, 1), "203.0.113.7");
    }

    #[test]
    fn test_invalid_entry_falls_back_to_socket() {
        let h = headers("x-forwarded-for", "not-an-ip, 10.0.0.2");
        let socket: SocketAddr = "192.0.2.1:4000".parse().unwrap();
        assert_eq!(client_ip(&h, Some(&socket), 1), "192.0.2.1");
    }

    #[test]
    fn test_real_ip_header() {
        let h = headers("x-real-ip", " 198.51.100.4 ");
        assert_eq!(client_ip(&h, None, 1), "198.51.100.4");
    }

    #[test]
    fn test_unknown_without_any_source() {
        assert_eq!(client_ip(&HeaderMap::new(), None, 1), "unknown");
    }
}
