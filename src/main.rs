//! Bastion service entry point.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use bastion::cache::CacheRegistry;
use bastion::config::Config;
use bastion::database::{Database, GiveawayRepository, MuteRepository, OutboxRepository};
use bastion::expiry::TimedState;
use bastion::utils::format_duration;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // If RUST_LOG is not set, default to "info" level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bastion=info,mongodb=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Bastion...");

    let config = Config::from_env()?;
    info!(
        "Configuration loaded: cache capacity {}, sweep every {}, rearm policy {}",
        config.cache.max_size,
        format_duration(config.cache.sweep_interval),
        config.cache.rearm_policy.as_str()
    );

    info!("Connecting to MongoDB...");
    let db = Database::connect(&config.mongodb_uri, &config.mongodb_database).await?;
    db.ensure_indexes().await?;
    info!("Database connected");

    let registry = CacheRegistry::new(config.cache.clone());

    let mutes = Arc::new(MuteRepository::new(&db));
    let giveaways = Arc::new(GiveawayRepository::new(&db));
    let outbox = Arc::new(OutboxRepository::new(&db));

    let state = TimedState::new(&registry, mutes, giveaways, outbox.clone(), outbox)?;
    let report = state.rehydrate().await?;
    info!(
        "Tracking {} mutes and {} giveaways ({} failures)",
        state.mutes().len(),
        state.giveaways().len(),
        report.failures
    );

    let sweeper = registry.spawn_sweeper();

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    sweeper.stop();

    Ok(())
}
