// src/web/client_ip.rs
use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use std::{
    convert::Infallible,
    net::{IpAddr, Ipv4Addr, SocketAddr},
};

/// Proxy headers consulted in order before falling back to the socket peer.
const FORWARDING_HEADERS: &[&str] = &["cf-connecting-ip", "x-forwarded-for", "x-real-ip", "forwarded-for"];

/// Best-effort address of the visitor, used to key the guest quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        Ok(ClientIp(resolve_client_ip(&parts.headers, peer)))
    }
}

pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<IpAddr>) -> IpAddr {
    FORWARDING_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name)?.to_str().ok())
        .filter_map(|value| value.split(',').next()?.trim().parse::<IpAddr>().ok())
        .find(is_public)
        .or(peer)
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Rejects private, loopback, link-local and reserved ranges.
fn is_public(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let first = v4.octets()[0];
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || first == 0
                || first >= 240)
        }
        IpAddr::V6(v6) => {
            let head = v6.segments()[0];
            !(v6.is_loopback()
                || v6.is_unspecified()
                || (head & 0xfe00) == 0xfc00
                || (head & 0xffc0) == 0xfe80)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn first_public_forwarded_address_wins() {
        let map = headers(&[("x-forwarded-for", "203.0.113.7, 10.0.0.1")]);
        assert_eq!(resolve_client_ip(&map, None).to_string(), "203.0.113.7");
    }

    #[test]
    fn cloudflare_header_has_priority() {
        let map = headers(&[("x-forwarded-for", "198.51.100.2"), ("cf-connecting-ip", "203.0.113.9")]);
        assert_eq!(resolve_client_ip(&map, None).to_string(), "203.0.113.9");
    }

    #[test]
    fn private_header_values_fall_back_to_peer() {
        let map = headers(&[("x-real-ip", "192.168.1.10"), ("x-forwarded-for", "not-an-ip")]);
        let peer: IpAddr = "10.1.2.3".parse().unwrap();
        assert_eq!(resolve_client_ip(&map, Some(peer)), peer);
    }

    #[test]
    fn nothing_known_means_localhost() {
        assert_eq!(resolve_client_ip(&HeaderMap::new(), None), IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn ipv6_ranges() {
        assert!(is_public(&"2001:db8::1".parse().unwrap()));
        assert!(!is_public(&"fd00::1".parse().unwrap()));
        assert!(!is_public(&"fe80::1".parse().unwrap()));
        assert!(!is_public(&"::1".parse().unwrap()));
    }
}
