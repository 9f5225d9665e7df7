use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::models::ErrorBody;
use crate::rate_limit::RateLimitExceeded;

/// Errors surfaced by the gateway, either at startup or while serving.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error(transparent)]
    RateLimited(#[from] RateLimitExceeded),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("No healthy backends available")]
    NoHealthyBackend,

    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::NoHealthyBackend => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::InvalidConfig(_) | GatewayError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody::new(self.to_string());
        let mut response = (status, Json(body)).into_response();

        if let GatewayError::RateLimited(exceeded) = &self {
            // whole seconds, rounded up, never zero
            let millis = exceeded.retry_after.as_millis().max(1);
            let secs = millis.div_ceil(1000) as u64;
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn exceeded(retry_after: Duration) -> GatewayError {
        GatewayError::RateLimited(RateLimitExceeded {
            identity: "10.0.0.1".to_string(),
            limit: 5,
            retry_after,
        })
    }

    #[test]
    fn rate_limited_maps_to_429_with_retry_after() {
        let response = exceeded(Duration::from_millis(500)).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(RETRY_AFTER).unwrap(), "1");
    }

    #[test]
    fn retry_after_rounds_up() {
        let response = exceeded(Duration::from_millis(1500)).into_response();
        assert_eq!(response.headers().get(RETRY_AFTER).unwrap(), "2");
    }

    #[test]
    fn retry_after_is_never_zero() {
        let response = exceeded(Duration::ZERO).into_response();
        assert_eq!(response.headers().get(RETRY_AFTER).unwrap(), "1");
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            GatewayError::NoHealthyBackend.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            GatewayError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::PayloadTooLarge(10).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            GatewayError::InvalidConfig("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
