use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, HeaderValue, Request, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use companyhub_api::ApiError;
use companyhub_auth::AuthError;
use uuid::Uuid;

use crate::metrics;
use crate::server::AppState;

// =============================================================================
// Authentication Middleware
// =============================================================================

/// Validates `Authorization: Bearer <jwt>` and stores the claims in the
/// request extensions.
///
/// Public paths and deployments with authentication disabled pass through.
pub async fn authentication_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let Some(auth) = state.auth.as_ref() else {
        return next.run(req).await;
    };
    if should_skip_authentication(req.uri().path()) {
        return next.run(req).await;
    }

    let Some(header) = req.headers().get(AUTHORIZATION).and_then(|h| h.to_str().ok()) else {
        tracing::debug!(path = %req.uri().path(), "No Authorization header");
        return ApiError::unauthorized("Authentication required").into_response();
    };

    let token = match header.strip_prefix("Bearer ") {
        Some(t) if !t.is_empty() => t,
        _ => {
            return ApiError::unauthorized("Invalid Authorization header format").into_response();
        }
    };

    match auth.verify_access_token(token) {
        Ok(claims) => {
            tracing::debug!(subject = %claims.sub, "Token validated successfully");
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(AuthError::Jwt(e)) if e.is_validation_error() => {
            tracing::debug!(error = %e, "Token validation failed");
            ApiError::unauthorized(e.to_string()).into_response()
        }
        Err(e) => {
            tracing::debug!(error = %e, "Token validation failed");
            ApiError::unauthorized("Invalid access token").into_response()
        }
    }
}

fn should_skip_authentication(path: &str) -> bool {
    const PUBLIC_PATHS: [&str; 3] = ["/healthz", "/readyz", "/metrics"];
    PUBLIC_PATHS.contains(&path) || path.starts_with("/auth/")
}

// =============================================================================
// Other Middleware
// =============================================================================

/// Ensures each request has an `X-Request-Id` and mirrors it on the response.
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let header_name = HeaderName::from_static("x-request-id");

    let req_id_value = req
        .headers()
        .get(&header_name)
        .cloned()
        .or_else(|| HeaderValue::from_str(&Uuid::new_v4().to_string()).ok());

    if let Some(value) = &req_id_value {
        req.extensions_mut().insert(value.clone());
    }

    let mut res = next.run(req).await;

    if let Some(value) = req_id_value {
        res.headers_mut().insert(header_name, value);
    }
    res
}

/// Records request count and latency per normalized route.
pub async fn http_metrics(req: Request<Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let res = next.run(req).await;

    metrics::record_http_request(&method, &path, res.status().as_u16(), started.elapsed());
    res
}
