use axum::{
    body::to_bytes,
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, header},
    response::{IntoResponse, Response},
};
use http_body_util::LengthLimitError;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::metrics::UPSTREAM_LATENCY;
use crate::models::ClientIdentity;
use crate::state::AppState;

// Request bodies bigger than this are refused before reaching a backend
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

// Connection-level headers that must not be forwarded
const HOP_HEADERS: [HeaderName; 4] = [
    header::HOST,
    header::CONNECTION,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
];

// Forwards an admitted /api request to a healthy backend and relays the answer
pub async fn proxy_handler(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Response, GatewayError> {
    let (parts, body) = request.into_parts();

    let body = to_bytes(body, MAX_BODY_BYTES).await.map_err(|e| {
        let inner = e.into_inner();
        if inner.is::<LengthLimitError>() {
            GatewayError::PayloadTooLarge(MAX_BODY_BYTES)
        } else {
            GatewayError::BadRequest(inner.to_string())
        }
    })?;

    let backend = state
        .load_balancer
        .get_backend()
        .ok_or(GatewayError::NoHealthyBackend)?;

    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = format!("{}{}", backend.url, path);

    let mut headers = HeaderMap::new();
    for (name, value) in parts.headers.iter() {
        if !HOP_HEADERS.contains(name) {
            headers.append(name.clone(), value.clone());
        }
    }
    if let Some(ClientIdentity(identity)) = parts.extensions.get::<ClientIdentity>() {
        if let Ok(value) = HeaderValue::from_str(identity) {
            headers.insert(HeaderName::from_static("x-forwarded-for"), value);
        }
    }

    debug!(method = %parts.method, url = %url, "Forwarding request");
    let start_time = Instant::now();

    let result = state
        .client
        .request(parts.method, &url)
        .headers(headers)
        .body(body)
        .send()
        .await;

    let upstream = match result {
        Ok(res) => res,
        Err(e) => {
            // take it out of rotation until the health checker sees it again
            backend.set_healthy(false);
            warn!(backend = %backend.url, error = %e, "Backend failed, marked unhealthy");
            return Err(GatewayError::Upstream(e));
        }
    };

    let status = upstream.status();
    let content_type = upstream.headers().get(header::CONTENT_TYPE).cloned();
    let bytes = upstream.bytes().await?;

    UPSTREAM_LATENCY.observe(start_time.elapsed().as_secs_f64());

    let mut response = (status, bytes).into_response();
    match content_type {
        Some(content_type) => {
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, content_type);
        }
        None => {
            response.headers_mut().remove(header::CONTENT_TYPE);
        }
    }

    Ok(response)
}
