//! Request tracing, CORS and API key middleware.

use super::error::ApiError;
use super::AppState;
use crate::security::{ClientInfo, RateLimitDecision};
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::time::Instant;
use tracing::{debug, Instrument};

const MISSING_KEY: &str =
    "Missing API key. Include 'Authorization: Bearer your_api_key' header.";
const INVALID_KEY: &str = "Invalid or inactive API key.";

/// Request id from the incoming `x-request-id` header, or a fresh one.
pub(crate) fn request_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(ToString::to_string)
        .unwrap_or_else(|| format!("req-{}", uuid::Uuid::new_v4().simple()))
}

/// Run each request in an `http.request` span and stamp the request id and
/// processing time on the response.
pub(crate) async fn request_tracing_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let route = request.uri().path().to_string();
    let request_id = request_id(request.headers());

    let span = tracing::info_span!(
        "http.request",
        request_id = %request_id,
        method = %method,
        route = %route,
    );

    let mut response = next.run(request).instrument(span.clone()).await;
    let elapsed = start.elapsed().as_secs_f64();

    span.in_scope(|| {
        debug!(
            "{} {} -> {} in {:.3}s",
            method,
            route,
            response.status().as_u16(),
            elapsed
        )
    });

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!("{:.3}", elapsed)) {
        response.headers_mut().insert("x-process-time", value);
    }
    response
}

/// Answer preflight requests and add CORS headers to every response.
pub(crate) async fn cors_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let allowed = state.config.server.cors_allow_origin.clone();
    let origin = req
        .headers()
        .get("origin")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    let mut resp = if req.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(req).await
    };

    let allow_origin = if allowed == "*" {
        Some("*".to_string())
    } else {
        origin.filter(|o| allowed.split(',').map(str::trim).any(|a| a == o))
    };

    if let Some(origin_value) = allow_origin {
        let headers = resp.headers_mut();
        if let Ok(v) = HeaderValue::from_str(&origin_value) {
            headers.insert("access-control-allow-origin", v);
        }
        headers.insert(
            "access-control-allow-methods",
            HeaderValue::from_static("GET,POST,OPTIONS"),
        );
        headers.insert(
            "access-control-allow-headers",
            HeaderValue::from_static("authorization,content-type,x-request-id"),
        );
        headers.insert(
            "access-control-expose-headers",
            HeaderValue::from_static("x-request-id,x-process-time,retry-after"),
        );
        if allowed != "*" {
            headers.insert("vary", HeaderValue::from_static("origin"));
        }
    }
    resp
}

/// Resolve the calling client from the `Authorization` header.
pub(crate) async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<ClientInfo, ApiError> {
    let header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match header {
        Some(value) => state
            .keys
            .validate(value)
            .await
            .ok_or_else(|| ApiError::Unauthorized(INVALID_KEY.to_string())),
        None if state.config.general.debug && state.config.security.allow_anonymous_in_debug => {
            Ok(ClientInfo::anonymous())
        }
        None => Err(ApiError::Unauthorized(MISSING_KEY.to_string())),
    }
}

/// Authenticate and rate limit `/v1` requests; the client is stored in the
/// request extensions.
pub(crate) async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let client = match authenticate(&state, req.headers()).await {
        Ok(client) => client,
        Err(e) => return e.into_response(),
    };

    match state.limiter.check(&client.key_id, client.tier.limits()).await {
        RateLimitDecision::Allowed {
            remaining_minute, ..
        } => {
            debug!(
                "Client '{}' ({}) authorized, {} requests left this minute",
                client.name, client.tier, remaining_minute
            );
        }
        RateLimitDecision::Limited {
            window,
            retry_after,
        } => {
            debug!("Client '{}' hit the {} limit", client.name, window);
            return ApiError::RateLimited {
                window,
                retry_after,
            }
            .into_response();
        }
    }

    req.extensions_mut().insert(client);
    next.run(req).await
}
