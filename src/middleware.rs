use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::metrics::{REQUEST_TOTAL, REQUESTS_ADMITTED, REQUESTS_REJECTED};
use crate::models::ClientIdentity;
use crate::state::AppState;

pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

// Admission control in front of every /api route.
// `next` runs exactly once for an admitted request and never for a rejected one.
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    REQUEST_TOTAL.inc();

    let identity = state.identity.resolve(&request);

    let admission = match state.rate_limiter.check(&identity) {
        Ok(admission) => admission,
        Err(exceeded) => {
            REQUESTS_REJECTED.inc();
            warn!(
                identity = %exceeded.identity,
                limit = exceeded.limit,
                retry_after = ?exceeded.retry_after,
                "Rate limit exceeded"
            );
            return Err(exceeded.into());
        }
    };

    REQUESTS_ADMITTED.inc();
    debug!(
        identity = %identity,
        count = admission.count,
        remaining = admission.remaining,
        "Request admitted"
    );

    request.extensions_mut().insert(ClientIdentity(identity));

    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert(RATE_LIMIT_LIMIT_HEADER, HeaderValue::from(admission.limit));
    headers.insert(
        RATE_LIMIT_REMAINING_HEADER,
        HeaderValue::from(admission.remaining),
    );

    Ok(response)
}
