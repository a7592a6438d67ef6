//! Client identity resolution for per-client throttling.

use axum::extract::ConnectInfo;
use axum::http::{Extensions, HeaderMap};
use std::net::{IpAddr, SocketAddr};

/// Proxy chain header, client first.
pub const FORWARDED_FOR: &str = "x-forwarded-for";
/// Single-hop header set by a reverse proxy.
pub const REAL_IP: &str = "x-real-ip";

/// Peer string used when the transport address is not attached to the request.
pub const UNKNOWN_PEER: &str = "unknown";

/// Resolve the identity a request is counted under.
///
/// Priority: first valid address in `X-Forwarded-For`, then a valid
/// `X-Real-IP`, then the host part of `peer`. If `peer` cannot be split into
/// host and port it is returned unchanged, so resolution never fails.
pub fn client_identity(headers: &HeaderMap, peer: &str) -> String {
    if let Some(ip) = header_str(headers, FORWARDED_FOR)
        .and_then(|value| parse_forwarded_for(value).into_iter().next())
    {
        return ip.to_string();
    }

    if let Some(ip) = header_str(headers, REAL_IP).and_then(parse_ip) {
        return ip.to_string();
    }

    split_host(peer).unwrap_or(peer).to_string()
}

/// Valid addresses listed in an `X-Forwarded-For` value, in header order.
///
/// Entries that do not parse as IPv4 or IPv6 addresses are skipped.
pub fn parse_forwarded_for(value: &str) -> Vec<IpAddr> {
    value.split(',').filter_map(parse_ip).collect()
}

/// Host part of a `host:port` address, or `None` if it has no usable port
/// separator. Bracketed IPv6 (`[::1]:80`) is unwrapped; a bare IPv6 address
/// has too many colons and is rejected.
pub fn split_host(addr: &str) -> Option<&str> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        let port = tail.strip_prefix(':')?;
        if port.contains(':') || port.contains('[') || port.contains(']') {
            return None;
        }
        return Some(host);
    }

    let (host, port) = addr.rsplit_once(':')?;
    if host.contains(':') || host.contains('[') || host.contains(']') || port.contains(']') {
        return None;
    }
    Some(host)
}

/// Transport peer address attached by axum's `ConnectInfo`, as a string.
pub fn peer_address(extensions: &Extensions) -> String {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| UNKNOWN_PEER.to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
}

// IPv4-mapped IPv6 collapses to IPv4 so both spellings share a bucket.
fn parse_ip(candidate: &str) -> Option<IpAddr> {
    candidate
        .trim()
        .parse::<IpAddr>()
        .ok()
        .map(|ip| ip.to_canonical())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for &(name, value) in pairs {
            headers.insert(name, HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn test_forwarded_for_takes_first_hop() {
        let headers = headers(&[(FORWARDED_FOR, "203.0.113.1, 70.41.3.18")]);
        assert_eq!(client_identity(&headers, "10.0.0.1:4000"), "203.0.113.1");
    }

    #[test]
    fn test_forwarded_for_skips_invalid_entries() {
        let headers = headers(&[(FORWARDED_FOR, "unknown, , 2001:DB8::1 ,70.41.3.18")]);
        assert_eq!(client_identity(&headers, "10.0.0.1:4000"), "2001:db8::1");
    }

    #[test]
    fn test_forwarded_for_without_valid_entries_falls_through() {
        let headers = headers(&[
            (FORWARDED_FOR, "garbage, also-garbage"),
            (REAL_IP, "192.0.2.44"),
        ]);
        assert_eq!(client_identity(&headers, "10.0.0.1:4000"), "192.0.2.44");
    }

    #[test]
    fn test_forwarded_for_wins_over_real_ip() {
        let headers = headers(&[(FORWARDED_FOR, "203.0.113.1"), (REAL_IP, "192.0.2.44")]);
        assert_eq!(client_identity(&headers, "10.0.0.1:4000"), "203.0.113.1");
    }

    #[test]
    fn test_invalid_real_ip_uses_peer() {
        let headers = headers(&[(REAL_IP, "not-an-ip")]);
        assert_eq!(client_identity(&headers, "198.51.100.7:54321"), "198.51.100.7");
    }

    #[test]
    fn test_peer_port_is_stripped() {
        assert_eq!(client_identity(&HeaderMap::new(), "198.51.100.7:54321"), "198.51.100.7");
        assert_eq!(client_identity(&HeaderMap::new(), "[2001:db8::7]:443"), "2001:db8::7");
    }

    #[test]
    fn test_unsplittable_peer_is_returned_raw() {
        assert_eq!(client_identity(&HeaderMap::new(), "peer-without-port"), "peer-without-port");
        assert_eq!(client_identity(&HeaderMap::new(), "2001:db8::7"), "2001:db8::7");
        assert_eq!(client_identity(&HeaderMap::new(), "[2001:db8::7]"), "[2001:db8::7]");
    }

    #[test]
    fn test_mapped_ipv6_is_canonicalized() {
        let headers = headers(&[(REAL_IP, "::ffff:192.0.2.10")]);
        assert_eq!(client_identity(&headers, "10.0.0.1:4000"), "192.0.2.10");
    }

    #[test]
    fn test_parse_forwarded_for_keeps_order() {
        let ips = parse_forwarded_for("203.0.113.1, 70.41.3.18, 150.172.238.178");
        let ips: Vec<String> = ips.iter().map(ToString::to_string).collect();
        assert_eq!(ips, ["203.0.113.1", "70.41.3.18", "150.172.238.178"]);
    }

    #[test]
    fn test_split_host() {
        assert_eq!(split_host("localhost:8080"), Some("localhost"));
        assert_eq!(split_host(":8080"), Some(""));
        assert_eq!(split_host("[::1]:80:90"), None);
        assert_eq!(split_host("no-port"), None);
    }

    #[test]
    fn test_peer_address_from_connect_info() {
        let mut extensions = Extensions::new();
        assert_eq!(peer_address(&extensions), UNKNOWN_PEER);

        let addr: SocketAddr = "198.51.100.7:54321".parse().unwrap();
        extensions.insert(ConnectInfo(addr));
        assert_eq!(peer_address(&extensions), "198.51.100.7:54321");
    }
}
