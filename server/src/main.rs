mod dto;
mod error;
mod routes;
mod state;

use std::sync::Arc;

use anyhow::Context;

use agent::intents::{CrisisLexicon, IntentClassifier};
use agent::manager::SessionManager;
use agent::tools::ToolRouter;
use common::logger::init_tracing;
use engine::beds::BedRegistry;
use engine::chapel::ChapelSchedule;
use engine::config::AppConfig;
use engine::db::Db;
use engine::expiry::ExpirationSweeper;
use engine::metrics::Counters;
use engine::notify::ChangeNotifier;
use engine::service::ReservationService;
use engine::volunteers::VolunteerRegistry;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_tracing(is_production);

    tracing::info!("Starting shelter backend...");

    let cfg = Arc::new(AppConfig::from_env());
    cfg.validate().context("invalid configuration")?;

    // Storage + registry. A bed table that disagrees with the building is
    // fatal here; once serving, violations are loud but non-fatal.
    let db = Db::connect(&cfg.database_url)
        .await
        .context("database connection failed")?;
    db.migrate().await.context("schema migration failed")?;
    BedRegistry::initialize(&db.pool)
        .await
        .context("bed registry initialization failed")?;

    let counters = Counters::default();
    let notifier = ChangeNotifier::new(cfg.notifier_capacity);
    let service = Arc::new(ReservationService::new(
        db.pool.clone(),
        notifier.clone(),
        counters.clone(),
        &cfg,
    ));

    let violations = service
        .verify_coherence()
        .await
        .context("startup coherence check failed")?;
    if !violations.is_empty() {
        anyhow::bail!("bed/reservation coherence violated at startup: {violations:?}");
    }

    // Voice agent wiring.
    let tools = Arc::new(ToolRouter::new(
        service.clone(),
        Arc::new(ChapelSchedule::new(db.pool.clone())),
        Arc::new(VolunteerRegistry::new(db.pool.clone())),
        cfg.tool_call_deadline,
    ));
    let classifier = Arc::new(IntentClassifier::new(
        CrisisLexicon::from_env().context("crisis lexicon failed to load")?,
    ));
    let sessions = Arc::new(SessionManager::new(
        tools,
        classifier,
        cfg.max_call_sessions,
        cfg.idle_session_timeout,
        cfg.hold_duration.as_secs() / 3600,
    ));

    // Background tasks.
    let sweeper_shutdown =
        ExpirationSweeper::new(service.clone(), cfg.expiration_tick, counters.clone()).spawn();
    let reaper_shutdown = sessions.start_reaper();

    let app = routes::router(AppState {
        service,
        sessions,
        notifier,
        cfg: cfg.clone(),
    });

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.bind_addr))?;
    tracing::info!(addr = %cfg.bind_addr, "Backend started; serving until shutdown signal");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    tracing::info!("Shutdown signal received");
    let _ = sweeper_shutdown.send(true);
    let _ = reaper_shutdown.send(true);

    Ok(())
}
