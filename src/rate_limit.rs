// Fixed-window rate limiting keyed by client identity.
//
// The registry is a DashMap: a check holds its identity's shard write lock for
// the whole reset-increment-compare sequence, and the sweep's retain takes each
// shard lock in turn. Nothing here awaits. The ceiling is per process.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, info};

use crate::error::GatewayError;
use crate::metrics::{SWEPT_ENTRIES, TRACKED_CLIENTS};

pub const DEFAULT_WINDOW: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_REQUESTS_PER_WINDOW: u32 = 5;
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(60);

pub const RATE_LIMIT_MESSAGE: &str = "Too many requests, please try again later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests_per_window: u32,
    pub sweep_interval: Duration,
    pub stale_after: Duration,
}

impl RateLimitConfig {
    pub fn new(window: Duration, max_requests_per_window: u32) -> Result<Self, GatewayError> {
        if window.is_zero() {
            return Err(GatewayError::InvalidConfig(
                "rate limit window must be positive".to_string(),
            ));
        }
        if max_requests_per_window == 0 {
            return Err(GatewayError::InvalidConfig(
                "max requests per window must be positive".to_string(),
            ));
        }

        Ok(Self {
            window,
            max_requests_per_window,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            stale_after: DEFAULT_STALE_AFTER,
        })
    }

    pub fn with_sweep(
        mut self,
        sweep_interval: Duration,
        stale_after: Duration,
    ) -> Result<Self, GatewayError> {
        // tokio's interval panics on a zero period
        if sweep_interval.is_zero() {
            return Err(GatewayError::InvalidConfig(
                "sweep interval must be positive".to_string(),
            ));
        }
        // a zero age would drop windows that are still running
        if stale_after.is_zero() {
            return Err(GatewayError::InvalidConfig(
                "stale-after must be positive".to_string(),
            ));
        }
        self.sweep_interval = sweep_interval;
        self.stale_after = stale_after;
        Ok(self)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            max_requests_per_window: DEFAULT_MAX_REQUESTS_PER_WINDOW,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            stale_after: DEFAULT_STALE_AFTER,
        }
    }
}

// Counter state of one client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientWindow {
    pub count: u32,
    pub window_end: Instant,
}

// Outcome of an admitted request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub count: u32,
    pub limit: u32,
    pub remaining: u32,
    pub window_end: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Too many requests, please try again later.")]
pub struct RateLimitExceeded {
    pub identity: String,
    pub limit: u32,
    pub retry_after: Duration,
}

// Registry of per-identity windows, one per service, shared behind an Arc
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    clients: DashMap<String, ClientWindow>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            clients: DashMap::new(),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn check(&self, identity: &str) -> Result<Admission, RateLimitExceeded> {
        self.check_at(identity, Instant::now())
    }

    // check with an explicit clock reading
    pub fn check_at(&self, identity: &str, now: Instant) -> Result<Admission, RateLimitExceeded> {
        let window = self.config.window;
        let limit = self.config.max_requests_per_window;

        // fast path skips the key allocation for known clients
        let mut entry = match self.clients.get_mut(identity) {
            Some(entry) => entry,
            None => self
                .clients
                .entry(identity.to_string())
                .or_insert_with(|| ClientWindow {
                    count: 0,
                    window_end: now + window,
                }),
        };

        if now > entry.window_end {
            entry.count = 0;
            entry.window_end = now + window;
        }

        entry.count = entry.count.saturating_add(1);

        if entry.count > limit {
            return Err(RateLimitExceeded {
                identity: identity.to_string(),
                limit,
                retry_after: entry.window_end.saturating_duration_since(now),
            });
        }

        Ok(Admission {
            count: entry.count,
            limit,
            remaining: limit - entry.count,
            window_end: entry.window_end,
        })
    }

    // Drops entries whose window ended at least stale_after ago, returns how many
    pub fn sweep_at(&self, now: Instant) -> usize {
        let stale_after = self.config.stale_after;
        let mut removed = 0;

        self.clients.retain(|_, client| {
            let keep = client.window_end >= now
                || now.saturating_duration_since(client.window_end) < stale_after;
            if !keep {
                removed += 1;
            }
            keep
        });

        removed
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn window_of(&self, identity: &str) -> Option<ClientWindow> {
        self.clients.get(identity).map(|entry| *entry)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

// Periodic cleanup - runs every sweep_interval, independent of traffic
pub async fn sweeper(limiter: Arc<RateLimiter>) {
    let period = limiter.config().sweep_interval;
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(interval = ?period, "Rate limit sweeper started");

    loop {
        ticker.tick().await;

        let removed = limiter.sweep();
        SWEPT_ENTRIES.inc_by(removed as f64);
        TRACKED_CLIENTS.set(limiter.len() as f64);

        if removed > 0 {
            debug!(removed, remaining = limiter.len(), "Swept stale rate limit entries");
        }
    }
}

pub fn spawn_sweeper(limiter: Arc<RateLimiter>) -> JoinHandle<()> {
    tokio::spawn(sweeper(limiter))
}
