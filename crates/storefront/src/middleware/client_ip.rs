//! Client IP resolution behind CDN and platform proxies.
//!
//! Checks Cloudflare's `CF-Connecting-IP` header first, then falls back to
//! the standard proxy headers. Rate limiting keys on the resolved address.

use std::net::IpAddr;

use axum::http::HeaderMap;

/// Resolve the real client IP from proxy headers.
///
/// Order: `CF-Connecting-IP` (Cloudflare), `X-Forwarded-For` (first hop),
/// `X-Real-IP`, `Fly-Client-IP`. Returns `None` when no header yields a
/// parseable address (e.g., a direct local connection).
#[must_use]
pub fn extract_client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    // CF-Connecting-IP carries the real client IP when behind Cloudflare
    if let Some(ip) = header_ip(headers, "cf-connecting-ip") {
        return Some(ip);
    }

    // X-Forwarded-For: first IP in the chain is the original client
    if let Some(ip) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
    {
        return Some(ip);
    }

    if let Some(ip) = header_ip(headers, "x-real-ip") {
        return Some(ip);
    }

    header_ip(headers, "fly-client-ip")
}

fn header_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                axum::http::HeaderName::try_from(*name).expect("header name"),
                HeaderValue::from_str(value).expect("header value"),
            );
        }
        map
    }

    #[test]
    fn test_cloudflare_header_wins() {
        let map = headers(&[
            ("cf-connecting-ip", "1.2.3.4"),
            ("x-forwarded-for", "5.6.7.8"),
        ]);
        assert_eq!(extract_client_ip(&map), Some("1.2.3.4".parse().unwrap()));
    }

    #[test]
    fn test_forwarded_for_takes_first_hop() {
        let map = headers(&[("x-forwarded-for", "9.9.9.9, 10.0.0.1, 10.0.0.2")]);
        assert_eq!(extract_client_ip(&map), Some("9.9.9.9".parse().unwrap()));
    }

    #[test]
    fn test_real_ip_fallback() {
        let map = headers(&[("x-real-ip", " 2.2.2.2 ")]);
        assert_eq!(extract_client_ip(&map), Some("2.2.2.2".parse().unwrap()));
    }

    #[test]
    fn test_fly_client_ip_fallback() {
        let map = headers(&[("fly-client-ip", "3.3.3.3")]);
        assert_eq!(extract_client_ip(&map), Some("3.3.3.3".parse().unwrap()));
    }

    #[test]
    fn test_garbage_headers_yield_none() {
        let map = headers(&[("x-forwarded-for", "not-an-ip")]);
        assert_eq!(extract_client_ip(&map), None);
        assert_eq!(extract_client_ip(&HeaderMap::new()), None);
    }
}
