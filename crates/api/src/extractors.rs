//! Request extractors.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use session_manager::{CookieJar, SessionContext};

/// Host recorded in new session ids when the client address is unknown.
const UNKNOWN_HOST: &str = "unknown";

/// Client IP address.
#[derive(Debug, Clone)]
pub struct ClientIp(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Proxied requests: first hop of X-Forwarded-For
        if let Some(xff) = parts.headers.get("X-Forwarded-For") {
            if let Ok(xff_str) = xff.to_str() {
                if let Some(ip) = xff_str.split(',').next().map(str::trim) {
                    if !ip.is_empty() {
                        return Ok(ClientIp(Some(ip.to_string())));
                    }
                }
            }
        }

        if let Some(real_ip) = parts.headers.get("X-Real-IP") {
            if let Ok(ip) = real_ip.to_str() {
                return Ok(ClientIp(Some(ip.trim().to_string())));
            }
        }

        Ok(ClientIp(None))
    }
}

/// Session context of the request: its cookies and client address.
#[derive(Debug, Clone)]
pub struct RequestSession(pub SessionContext);

#[async_trait]
impl<S> FromRequestParts<S> for RequestSession
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Browsers may split cookies over several headers.
        let cookies = parts
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect::<Vec<_>>()
            .join("; ");

        let ClientIp(ip) = ClientIp::from_request_parts(parts, state).await?;
        let host = ip.unwrap_or_else(|| UNKNOWN_HOST.to_string());

        Ok(RequestSession(SessionContext::new(
            CookieJar::from_header(&cookies),
            host,
        )))
    }
}
