use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379/";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub redis_url: String,
    /// Prometheus scrape listener; unset disables the listener.
    pub metrics_addr: Option<SocketAddr>,
    /// Minimum seconds between bids from one user.
    pub bid_cooldown_secs: u64,
    pub cron: CronConfig,
}

/// Settlement job scheduling knobs.
#[derive(Debug, Clone)]
pub struct CronConfig {
    pub interval_secs: u64,
    pub finish_batch_size: usize,
    pub pick_winner_batch_size: usize,
    pub refund_batch_size: usize,
    pub pay_batch_size: usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.into()),
            metrics_addr: env::var("METRICS_ADDR").ok().and_then(|v| v.parse().ok()),
            bid_cooldown_secs: env_parse("BID_COOLDOWN_SECS", 5),
            cron: CronConfig {
                interval_secs: env_parse("SETTLEMENT_INTERVAL_SECS", 3),
                finish_batch_size: env_parse("FINISH_BATCH_SIZE", 10),
                pick_winner_batch_size: env_parse("PICK_WINNER_BATCH_SIZE", 10),
                refund_batch_size: env_parse("REFUND_BATCH_SIZE", 10),
                pay_batch_size: env_parse("PAY_BATCH_SIZE", 10),
            },
        })
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
