//! Request metadata and rate limiting for auth routes

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{Extensions, HeaderMap, Request, header, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::AppState;
use crate::error::AppError;
use crate::service::ClientInfo;

const UNKNOWN_CLIENT: &str = "unknown";
const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Client address behind `trusted_hops` reverse proxies
///
/// With no trusted proxy the socket peer is the client and
/// `X-Forwarded-For` is ignored. Each trusted proxy appends the address it
/// received the request from, so the client is the entry `trusted_hops`
/// from the right. Entries further left are written by the caller.
pub fn client_ip(
    headers: &HeaderMap,
    extensions: &Extensions,
    trusted_hops: usize,
) -> Option<String> {
    let peer = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());
    if trusted_hops == 0 {
        return peer;
    }

    let forwarded: Vec<&str> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .collect();

    match forwarded.len() {
        0 => peer,
        len => Some(forwarded[len.saturating_sub(trusted_hops)].to_owned()),
    }
}

/// Extractor for the caller's IP and user agent
#[derive(Debug, Clone)]
pub struct Client(pub ClientInfo);

#[async_trait]
impl FromRequestParts<AppState> for Client {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned);

        Ok(Client(ClientInfo {
            ip: client_ip(
                &parts.headers,
                &parts.extensions,
                state.config.trust_proxy_hops,
            ),
            user_agent,
        }))
    }
}

/// Middleware limiting sign-in and refresh attempts per client IP
///
/// # Usage
/// ```ignore
/// Router::new()
///     .route("/auth/refresh", post(refresh))
///     .route_layer(middleware::from_fn_with_state(state, limit_auth_requests));
/// ```
pub async fn limit_auth_requests(
    State(state): State<AppState>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    let key = client_ip(
        request.headers(),
        request.extensions(),
        state.config.trust_proxy_hops,
    )
    .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());

    state.auth_limiter.admit(&key).await?;

    Ok(next.run(request).await)
}
