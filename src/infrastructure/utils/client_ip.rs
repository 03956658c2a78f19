use std::net::SocketAddr;

use actix_web::{http::header::HeaderMap, HttpRequest};

use crate::constants::UNKNOWN_IDENTIFIER;

/// Header Cloudflare sets to the connecting client's address.
pub const CDN_CLIENT_IP_HEADER: &str = "cf-connecting-ip";

/// How much of the request metadata is trusted to name the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityPolicy {
    /// Header the hosting platform sets with the real client address.
    pub platform_header: Option<String>,
    /// Whether `x-forwarded-for`, `x-real-ip` and the CDN header are consulted.
    pub trust_proxy_headers: bool,
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Resolves the rate-limit bucket key for a caller. Never fails: anything
/// unresolved lands in the shared `"unknown"` bucket.
pub fn resolve_identifier(
    headers: &HeaderMap,
    peer_addr: Option<SocketAddr>,
    policy: &IdentityPolicy,
) -> String {
    if let Some(ip) = policy
        .platform_header
        .as_deref()
        .and_then(|name| header_value(headers, name))
    {
        return ip.to_string();
    }

    if policy.trust_proxy_headers {
        let forwarded = header_value(headers, "x-forwarded-for")
            .and_then(|chain| chain.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());

        if let Some(ip) = forwarded
            .or_else(|| header_value(headers, "x-real-ip"))
            .or_else(|| header_value(headers, CDN_CLIENT_IP_HEADER))
        {
            return ip.to_string();
        }
    }

    peer_addr
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_IDENTIFIER.to_string())
}

pub fn get_client_ip(req: &HttpRequest, policy: &IdentityPolicy) -> String {
    resolve_identifier(req.headers(), req.peer_addr(), policy)
}
