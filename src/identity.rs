// Maps a request to the key the rate limiter buckets by.
// Callers behind one NAT share a bucket; unresolvable ones share "unknown".

use axum::extract::{ConnectInfo, Request};
use std::net::SocketAddr;

pub const UNKNOWN_IDENTITY: &str = "unknown";

pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, request: &Request) -> String;
}

impl<F> IdentityResolver for F
where
    F: Fn(&Request) -> String + Send + Sync,
{
    fn resolve(&self, request: &Request) -> String {
        self(request)
    }
}

// Needs into_make_service_with_connect_info::<SocketAddr>()
#[derive(Debug, Clone, Copy, Default)]
pub struct PeerAddr;

impl IdentityResolver for PeerAddr {
    fn resolve(&self, request: &Request) -> String {
        peer_ip(request).unwrap_or_else(|| UNKNOWN_IDENTITY.to_string())
    }
}

// X-Forwarded-For first hop, then X-Real-IP, then peer.
// Only safe behind a proxy that overwrites these headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardedFor;

impl IdentityResolver for ForwardedFor {
    fn resolve(&self, request: &Request) -> String {
        header_value(request, "x-forwarded-for")
            .and_then(|xff| xff.split(',').next().map(str::trim))
            .filter(|ip| !ip.is_empty())
            .map(str::to_string)
            .or_else(|| {
                header_value(request, "x-real-ip")
                    .map(str::trim)
                    .filter(|ip| !ip.is_empty())
                    .map(str::to_string)
            })
            .or_else(|| peer_ip(request))
            .unwrap_or_else(|| UNKNOWN_IDENTITY.to_string())
    }
}

fn header_value<'a>(request: &'a Request, name: &str) -> Option<&'a str> {
    request.headers().get(name)?.to_str().ok()
}

fn peer_ip(request: &Request) -> Option<String> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http;

    fn request() -> Request {
        http::Request::builder().uri("/api/products").body(Body::empty()).unwrap()
    }

    fn with_peer(mut request: Request, addr: &str) -> Request {
        let addr: SocketAddr = addr.parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    }

    #[test]
    fn peer_addr_uses_connect_info() {
        let request = with_peer(request(), "10.0.0.1:52100");
        assert_eq!(PeerAddr.resolve(&request), "10.0.0.1");
    }

    #[test]
    fn peer_addr_without_connect_info_is_unknown() {
        assert_eq!(PeerAddr.resolve(&request()), UNKNOWN_IDENTITY);
    }

    #[test]
    fn forwarded_for_takes_first_hop() {
        let request = http::Request::builder()
            .header("x-forwarded-for", " 203.0.113.7 , 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(ForwardedFor.resolve(&request), "203.0.113.7");
    }

    #[test]
    fn forwarded_for_falls_back_to_real_ip_then_peer() {
        let real_ip = http::Request::builder()
            .header("x-real-ip", "198.51.100.4")
            .body(Body::empty())
            .unwrap();
        assert_eq!(ForwardedFor.resolve(&real_ip), "198.51.100.4");

        let empty_header = http::Request::builder()
            .header("x-forwarded-for", "")
            .body(Body::empty())
            .unwrap();
        let empty_header = with_peer(empty_header, "[::1]:8080");
        assert_eq!(ForwardedFor.resolve(&empty_header), "::1");

        assert_eq!(ForwardedFor.resolve(&request()), UNKNOWN_IDENTITY);
    }

    #[test]
    fn closures_are_resolvers() {
        let resolver = |_: &Request| "synthetic".to_string();
        assert_eq!(resolver.resolve(&request()), "synthetic");
    }
}
