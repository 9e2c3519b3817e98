//! Wires the framework-agnostic `flaregate-auth` crate into the HTTP
//! layer: header extraction, body buffering for HMAC signing, the
//! bypass list, and feature gating (C7).

use crate::error::GatewayError;
use crate::state::AppState;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::Response;
use flaregate_auth::{AuthError, Identity, SignedHeaders};

const BYPASS_PATHS: [&str; 8] = [
    "/health",
    "/healthz",
    "/livez",
    "/readyz",
    "/metrics",
    "/openapi.json",
    "/openapi.yaml",
    "/docs",
];

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn signed_headers_from(headers: &HeaderMap) -> Option<SignedHeaders> {
    Some(SignedHeaders {
        signature: header_str(headers, "x-refyne-signature")?.to_string(),
        timestamp: header_str(headers, "x-refyne-timestamp")?.to_string(),
        user_id: header_str(headers, "x-refyne-user-id")?.to_string(),
        tier: header_str(headers, "x-refyne-tier").map(str::to_string),
        features: header_str(headers, "x-refyne-features").map(str::to_string),
        email: header_str(headers, "x-refyne-email").map(str::to_string),
        job_id: header_str(headers, "x-refyne-job-id").map(str::to_string),
    })
}

fn bearer_token_from(headers: &HeaderMap) -> Option<String> {
    let raw = header_str(headers, "authorization")?;
    Some(raw.strip_prefix("Bearer ").unwrap_or(raw).to_string())
}

/// Resolves the caller's identity for a request that is not on the
/// bypass list, evaluating signed headers before Bearer JWT.
async fn authenticate(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<Identity, GatewayError> {
    if let Some(hmac) = &state.hmac {
        if let Some(signed) = signed_headers_from(headers) {
            return Ok(hmac.verify(&signed, body)?);
        }
    }

    if let Some(jwks) = &state.jwks {
        if let Some(token) = bearer_token_from(headers) {
            return Ok(jwks.verify(&token).await?);
        }
    }

    if state.allow_unauthenticated {
        return Err(AuthError::NotConfigured.into());
    }

    Err(AuthError::NotConfigured.into())
}

/// Axum middleware: bypasses health/docs/metrics endpoints, otherwise
/// authenticates the request and enforces feature gating before handing
/// off to the handler. Buffers the body so HMAC verification can see the
/// exact bytes the handler will later deserialize.
pub async fn require_identity(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, GatewayError> {
    let path = request.uri().path().to_string();
    if BYPASS_PATHS.iter().any(|p| *p == path) {
        return Ok(next.run(request).await);
    }

    if state.allow_unauthenticated && state.hmac.is_none() && state.jwks.is_none() {
        return Ok(next.run(request).await);
    }

    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|e| GatewayError::InvalidRequest(format!("failed to buffer request body: {e}")))?;

    let identity = authenticate(&state, &parts.headers, &bytes).await?;

    if let Some(required) = &state.required_feature {
        if !identity.has_feature(required) {
            return Err(GatewayError::Forbidden(format!("identity lacks required feature '{required}'")));
        }
    }

    let mut request = Request::from_parts(parts, Body::from(Bytes::from(bytes)));
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_prefix_is_stripped() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token_from(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn raw_token_without_prefix_is_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("abc.def.ghi"));
        assert_eq!(bearer_token_from(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn signed_headers_require_all_mandatory_fields() {
        let mut headers = HeaderMap::new();
        headers.insert("x-refyne-signature", HeaderValue::from_static("sig"));
        assert!(signed_headers_from(&headers).is_none());
        headers.insert("x-refyne-timestamp", HeaderValue::from_static("123"));
        headers.insert("x-refyne-user-id", HeaderValue::from_static("u1"));
        assert!(signed_headers_from(&headers).is_some());
    }
}
