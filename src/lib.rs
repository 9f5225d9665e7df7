// Rate limiting gateway for the Twania Smart Bazaar API.
// Only /api is limited; /health and /metrics are served directly.

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{any, get},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod load_balancer;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod state;

use config::Args;
use error::GatewayError;
use handlers::{health_handler, metrics_handler, proxy_handler};
use identity::{ForwardedFor, IdentityResolver, PeerAddr};
use load_balancer::{LoadBalancer, health_checker};
use rate_limit::{RateLimiter, spawn_sweeper};
use state::AppState;

// Builds the router; the limiter only wraps the /api routes
pub fn app(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/api", any(proxy_handler))
        .route("/api/{*path}", any(proxy_handler))
        .route_layer(from_fn_with_state(state.clone(), middleware::rate_limit));

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .merge(api)
        .with_state(state)
}

pub fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    fmt().with_env_filter(filter).init();
}

pub async fn run(args: Args) -> Result<(), GatewayError> {
    let rate_config = args.rate_limit_config()?;
    let health_interval = args.health_interval()?;

    let client = reqwest::Client::new();
    let load_balancer = Arc::new(LoadBalancer::new(&args.backends)?);
    let rate_limiter = Arc::new(RateLimiter::new(rate_config));
    let identity: Arc<dyn IdentityResolver> = if args.trust_forwarded_for {
        Arc::new(ForwardedFor)
    } else {
        Arc::new(PeerAddr)
    };

    let state = AppState::new(
        client.clone(),
        Arc::clone(&load_balancer),
        Arc::clone(&rate_limiter),
        identity,
    );

    spawn_sweeper(Arc::clone(&rate_limiter));
    tokio::spawn(health_checker(
        load_balancer,
        client,
        health_interval,
        args.health_path.clone(),
    ));

    let address = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&address).await?;

    info!("Gateway running on http://{address}");
    info!(
        "Rate limit: {} requests per {} ms",
        rate_config.max_requests_per_window,
        rate_config.window.as_millis()
    );
    info!(trust_forwarded_for = args.trust_forwarded_for, "Identity resolution configured");

    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Gateway shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
