use std::sync::Arc;

use gavel::cache::RedisCache;
use gavel::config::AppConfig;
use gavel::db::{self, pg::PgLedger};
use gavel::metrics::init_metrics;
use gavel::services::scheduler::spawn_settlement_jobs;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;

    tracing::info!("Connecting to database...");
    let pool = db::init_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database connected");

    // The bid cooldown cache is part of this deployment; fail fast if it is
    // unreachable rather than on the first bid.
    RedisCache::connect(&config.redis_url)
        .await
        .map_err(|e| anyhow::anyhow!("failed to connect to redis: {}", e.chain()))?;
    tracing::info!("Cache connected");

    init_metrics(config.metrics_addr)?;
    if let Some(addr) = config.metrics_addr {
        tracing::info!(%addr, "Prometheus scrape listener up");
    }

    let ledger = Arc::new(PgLedger::new(pool));
    let jobs = spawn_settlement_jobs(ledger, &config.cron);
    tracing::info!(job_count = jobs.len(), "Settlement scheduler started");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();
}
