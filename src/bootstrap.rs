use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{sync::Arc, time::Duration};
use tracing::info;

use crate::{
    api::handlers::AppState,
    broadcast::Broadcaster,
    config::Config,
    error::AppResult,
    ledger::LedgerRepository,
    resolver::{
        sources::{CricScoreSource, FeedChannelSource, ResultSource, ScorewaveSource},
        Resolver,
    },
    settlement::{CommissionEngine, FancySettler, OutcomeApplier, SettlementOrchestrator},
};

pub async fn initialize_app_state(config: &Config) -> AppResult<AppState> {
    info!("initializing application components");

    let pool = initialize_database(&config.database_url).await?;
    let ledger = Arc::new(LedgerRepository::new(pool));

    // Result sources in priority order: stats provider, aggregator,
    // internal odds-feed side channel
    let sources: Vec<Arc<dyn ResultSource>> = vec![
        Arc::new(CricScoreSource::new(config.cricscore_api_url.clone())),
        Arc::new(ScorewaveSource::new(config.scorewave_api_url.clone())),
        Arc::new(FeedChannelSource::new(ledger.clone())),
    ];
    let resolver = Arc::new(Resolver::new(sources));

    let commissions = Arc::new(CommissionEngine::new(ledger.clone()));
    let applier = Arc::new(OutcomeApplier::new(ledger.clone(), commissions));
    let fancy = Arc::new(FancySettler::new(ledger.clone(), applier.clone()));

    let (broadcaster, hub, _forwarder) = Broadcaster::start(256);

    let orchestrator = Arc::new(SettlementOrchestrator::new(
        ledger.clone(),
        resolver,
        applier,
        fancy,
        broadcaster,
        config.sweeps.clone(),
    ));
    let _sweeps = orchestrator.start();
    info!("settlement sweeps started");

    Ok(AppState {
        ledger,
        orchestrator,
        hub,
    })
}

async fn initialize_database(database_url: &str) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;

    sqlx::migrate!().run(&pool).await?;
    info!("database pool ready, migrations applied");

    Ok(pool)
}
