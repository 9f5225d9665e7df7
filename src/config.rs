use clap::Parser;
use std::time::Duration;

use crate::error::GatewayError;
use crate::rate_limit::RateLimitConfig;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "bazaar-gateway")]
#[command(about = "Rate limiting gateway for the Twania Smart Bazaar API")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    // Upstream API servers (comma-separated)
    // Example: "localhost:5000,localhost:5001"
    #[arg(short, long, default_value = "localhost:5000")]
    pub backends: String,

    // Rate limit max requests per window
    #[arg(long, default_value_t = 5)]
    pub rate_limit: u32,

    // Rate limit window in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub rate_window_ms: u64,

    // How often stale client windows are swept, in seconds
    #[arg(long, default_value_t = 60)]
    pub sweep_interval: u64,

    // Age past window end after which a client window is dropped, in seconds
    #[arg(long, default_value_t = 60)]
    pub stale_after: u64,

    // Key clients by X-Forwarded-For / X-Real-IP instead of the peer address
    #[arg(long)]
    pub trust_forwarded_for: bool,

    // Health check interval in seconds
    #[arg(long, default_value_t = 30)]
    pub health_interval: u64,

    // Path probed on every backend by the health checker
    #[arg(long, default_value = "/api/health")]
    pub health_path: String,

    // Log level, RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn rate_limit_config(&self) -> Result<RateLimitConfig, GatewayError> {
        RateLimitConfig::new(Duration::from_millis(self.rate_window_ms), self.rate_limit)?
            .with_sweep(
                Duration::from_secs(self.sweep_interval),
                Duration::from_secs(self.stale_after),
            )
    }

    pub fn health_interval(&self) -> Result<Duration, GatewayError> {
        if self.health_interval == 0 {
            return Err(GatewayError::InvalidConfig(
                "health interval must be positive".to_string(),
            ));
        }
        Ok(Duration::from_secs(self.health_interval))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_storefront_limits() {
        let args = Args::parse_from(["bazaar-gateway"]);
        let config = args.rate_limit_config().unwrap();

        assert_eq!(config.window, Duration::from_millis(1000));
        assert_eq!(config.max_requests_per_window, 5);
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert_eq!(config.stale_after, Duration::from_secs(60));
        assert!(!args.trust_forwarded_for);
    }

    #[test]
    fn overrides_from_flags() {
        let args = Args::parse_from([
            "bazaar-gateway",
            "--rate-limit",
            "20",
            "--rate-window-ms",
            "250",
            "--trust-forwarded-for",
        ]);
        let config = args.rate_limit_config().unwrap();

        assert_eq!(config.window, Duration::from_millis(250));
        assert_eq!(config.max_requests_per_window, 20);
        assert!(args.trust_forwarded_for);
    }

    #[test]
    fn zero_values_are_rejected() {
        let args = Args::parse_from(["bazaar-gateway", "--rate-limit", "0"]);
        assert!(args.rate_limit_config().is_err());

        let args = Args::parse_from(["bazaar-gateway", "--rate-window-ms", "0"]);
        assert!(args.rate_limit_config().is_err());

        let args = Args::parse_from(["bazaar-gateway", "--stale-after", "0"]);
        assert!(args.rate_limit_config().is_err());

        let args = Args::parse_from(["bazaar-gateway", "--health-interval", "0"]);
        assert!(args.health_interval().is_err());
    }
}
