//! Caller address resolution for proxied requests.

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};
use std::net::SocketAddr;

/// Identifier used when neither a proxy header nor a peer address is known.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Resolve the caller's IP address.
///
/// The first entry of `X-Forwarded-For` wins; otherwise the socket peer
/// address is used.
pub fn client_ip(headers: &HeaderMap, remote: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .or_else(|| remote.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Resolve the caller's IP address from a request.
pub fn request_client_ip<B>(req: &Request<B>) -> String {
    let remote = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    client_ip(req.headers(), remote)
}
