use std::sync::Arc;

use marketfeed_core::{LogSummarySink, MarketStore, Schedule, Scheduler, TaskRunner};
use marketfeed_market_data::{
    AlphaVantageProvider, FallbackResolver, MarketDataProvider, YahooProvider,
};
use marketfeed_storage_sqlite::{db, MarketRepository};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{Config, LogFormat, ProviderKind};

pub struct AppState {
    pub db_path: String,
    pub runner: Arc<TaskRunner>,
    pub store: Arc<dyn MarketStore>,
}

pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init(),
    }
}

/// Open the database and apply pending migrations.
pub fn open_database(config: &Config) -> anyhow::Result<(Arc<db::DbPool>, Vec<String>)> {
    let db_path = db::init(&config.db_path)?;
    tracing::info!("Database path in use: {}", db_path);

    let pool = db::create_pool(&db_path, db::DEFAULT_POOL_SIZE)?;
    let applied = db::run_migrations(&pool)?;
    Ok((pool, applied))
}

fn build_providers(config: &Config) -> anyhow::Result<Vec<Arc<dyn MarketDataProvider>>> {
    let mut providers: Vec<Arc<dyn MarketDataProvider>> = Vec::new();
    for kind in &config.providers {
        match kind {
            ProviderKind::Yahoo => {
                providers.push(Arc::new(
                    YahooProvider::new()?.with_timeout(config.provider_timeout),
                ));
            }
            ProviderKind::AlphaVantage => {
                if let Some(key) = &config.alpha_vantage_key {
                    providers.push(Arc::new(AlphaVantageProvider::with_timeout(
                        key.clone(),
                        config.provider_timeout,
                    )));
                }
            }
        }
    }

    let chain: Vec<&str> = providers.iter().map(|p| p.id()).collect();
    tracing::info!("Provider chain: {}", chain.join(" -> "));
    Ok(providers)
}

pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let (pool, _) = open_database(config)?;
    let writer = db::spawn_writer((*pool).clone());
    let store: Arc<dyn MarketStore> = Arc::new(MarketRepository::new(pool.clone(), writer));

    let resolver = Arc::new(FallbackResolver::new(
        build_providers(config)?,
        config.retry.clone(),
    ));

    let runner = Arc::new(TaskRunner::new(
        config.calendar.clone(),
        resolver,
        store.clone(),
        Arc::new(LogSummarySink),
        config.runner.clone(),
    ));
    tracing::info!("Tracking {} symbols", runner.symbols().len());

    Ok(Arc::new(AppState {
        db_path: config.db_path.clone(),
        runner,
        store,
    }))
}

pub fn build_scheduler(state: &AppState, config: &Config) -> anyhow::Result<Scheduler> {
    let schedule = Schedule::new(&config.calendar, config.schedule.clone())?;
    Ok(Scheduler::new(state.runner.clone(), schedule))
}
