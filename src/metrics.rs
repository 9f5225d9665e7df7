use lazy_static::lazy_static;
use prometheus::{Counter, Gauge, Histogram, register_counter, register_gauge, register_histogram};


lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("bazaar_requests_total", "Total number of API requests").unwrap();
    pub static ref REQUESTS_ADMITTED: Counter =
        register_counter!("bazaar_requests_admitted_total", "Requests admitted by the rate limiter").unwrap();
    pub static ref REQUESTS_REJECTED: Counter =
        register_counter!("bazaar_requests_rejected_total", "Requests rejected by the rate limiter").unwrap();
    pub static ref SWEPT_ENTRIES: Counter =
        register_counter!("bazaar_rate_limit_swept_total", "Stale rate limit entries removed").unwrap();
    pub static ref TRACKED_CLIENTS: Gauge =
        register_gauge!("bazaar_rate_limit_clients", "Current number of tracked client windows").unwrap();
    pub static ref UPSTREAM_LATENCY: Histogram = register_histogram!(
        "bazaar_upstream_latency_seconds",
        "Upstream request latency in seconds"
    )
    .unwrap();
}
