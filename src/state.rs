use std::sync::Arc;
use crate::identity::IdentityResolver;
use crate::load_balancer::LoadBalancer;
use crate::rate_limit::RateLimiter;
// app's shared state, built once in the composition root

pub struct AppState {
    pub client: reqwest::Client,
    pub load_balancer: Arc<LoadBalancer>,
    pub rate_limiter: Arc<RateLimiter>,
    pub identity: Arc<dyn IdentityResolver>, // how callers are told apart
}

impl AppState {
    pub fn new(
        client: reqwest::Client,
        load_balancer: Arc<LoadBalancer>,
        rate_limiter: Arc<RateLimiter>,
        identity: Arc<dyn IdentityResolver>,
    ) -> Arc<Self> {
        Arc::new(Self {
            client,
            load_balancer,
            rate_limiter,
            identity,
        })
    }
}
