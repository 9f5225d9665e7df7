use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::time::{Duration, interval};
use tracing::{debug, info, warn};

use crate::error::GatewayError;

// Single upstream Bazaar API instance

#[derive(Debug)]
pub struct Backend {
    pub url: String,
    healthy: AtomicBool,
}

impl Backend {
    pub fn new(url: String) -> Self {
        Self {
            url,
            healthy: AtomicBool::new(true),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }
}

// Round-robin over the configured backends

#[derive(Debug)]
pub struct LoadBalancer {
    backends: Vec<Arc<Backend>>,
    current: AtomicUsize,
}

impl LoadBalancer {
    // Create from comma-separated urls "localhost:5000, localhost:5001"
    pub fn new(backends_str: &str) -> Result<Self, GatewayError> {
        let backends: Vec<Arc<Backend>> = backends_str
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|url| {
                let full_url = if url.starts_with("http://") || url.starts_with("https://") {
                    url.trim_end_matches('/').to_string()
                } else {
                    format!("http://{}", url.trim_end_matches('/'))
                };
                Arc::new(Backend::new(full_url))
            })
            .collect();

        if backends.is_empty() {
            return Err(GatewayError::InvalidConfig(
                "at least one backend required".to_string(),
            ));
        }

        info!(count = backends.len(), "Load balancer initialized");
        for (i, b) in backends.iter().enumerate() {
            info!("  [{}] {}", i + 1, b.url);
        }

        Ok(Self {
            backends,
            current: AtomicUsize::new(0),
        })
    }

    // Next healthy backend, round-robin
    pub fn get_backend(&self) -> Option<Arc<Backend>> {
        let len = self.backends.len();
        let start = self.current.fetch_add(1, Ordering::Relaxed) % len;

        (0..len)
            .map(|i| &self.backends[(start + i) % len])
            .find(|backend| backend.is_healthy())
            .map(Arc::clone)
    }

    pub fn all_backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    pub fn healthy_count(&self) -> usize {
        self.backends.iter().filter(|b| b.is_healthy()).count()
    }
}

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

// One pass over all backends, returns how many are healthy afterwards
pub async fn check_backends(
    load_balancer: &LoadBalancer,
    client: &reqwest::Client,
    health_path: &str,
) -> usize {
    for backend in load_balancer.all_backends() {
        let url = format!("{}{}", backend.url, health_path);

        let reachable = client
            .get(&url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .and_then(|res| res.error_for_status());

        let was_healthy = backend.is_healthy();
        backend.set_healthy(reachable.is_ok());

        match (was_healthy, reachable) {
            (false, Ok(_)) => info!(backend = %backend.url, "Backend recovered"),
            (true, Err(e)) => warn!(backend = %backend.url, error = %e, "Backend failed health check"),
            _ => {}
        }
    }

    load_balancer.healthy_count()
}

// Runs check_backends once per interval, first pass immediately
pub async fn health_checker(
    load_balancer: Arc<LoadBalancer>,
    client: reqwest::Client,
    check_interval: Duration,
    health_path: String,
) {
    let mut ticker = interval(check_interval);

    info!(interval = ?check_interval, path = %health_path, "Health checker started");

    loop {
        ticker.tick().await;
        let healthy = check_backends(&load_balancer, &client, &health_path).await;
        debug!(healthy, total = load_balancer.all_backends().len(), "Health check pass done");
    }
}
