use bazaar_gateway::rate_limit::{RateLimitConfig, RateLimiter, spawn_sweeper};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_sweeper_purges_without_traffic() {
    let limiter = Arc::new(RateLimiter::new(RateLimitConfig::default()));
    limiter.check("10.0.0.2").unwrap();

    let handle = spawn_sweeper(Arc::clone(&limiter));

    // first tick at 60s finds the window only 59s stale
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(limiter.window_of("10.0.0.2").is_some());

    // second tick at 120s removes it
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(limiter.window_of("10.0.0.2").is_none());
    assert!(limiter.is_empty());

    handle.abort();
}

#[tokio::test(start_paused = true)]
async fn test_sweeper_respects_custom_interval() {
    let config = RateLimitConfig::default()
        .with_sweep(Duration::from_secs(5), Duration::from_secs(10))
        .unwrap();
    let limiter = Arc::new(RateLimiter::new(config));
    limiter.check("a").unwrap();

    let handle = spawn_sweeper(Arc::clone(&limiter));

    tokio::time::sleep(Duration::from_secs(9)).await;
    limiter.check("b").unwrap();
    assert_eq!(limiter.len(), 2);

    // window of "a" ended at 1s, so the tick at 15s drops it but keeps "b"
    tokio::time::sleep(Duration::from_secs(7)).await;
    assert!(limiter.window_of("a").is_none());
    assert!(limiter.window_of("b").is_some());

    handle.abort();
}
