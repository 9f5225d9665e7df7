use axum::{Json, extract::State};
use std::sync::Arc;

use crate::models::HealthResponse;
use crate::state::AppState;

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        tracked_clients: state.rate_limiter.len(),
        healthy_backends: state.load_balancer.healthy_count(),
        total_backends: state.load_balancer.all_backends().len(),
    })
}
