//! `cmms-licensing` - the licensing service binary.
//!
//! Configuration comes from `CMMS_LICENSING__*` environment variables (and a
//! `.env` file in development). Without a `database` section every store is
//! in memory.

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use tokio::sync::watch;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cmms_licensing::adapters::events::{FanOutPublisher, TracingEventPublisher};
use cmms_licensing::adapters::http::{licensing_router, LicensingAppState};
use cmms_licensing::adapters::memory::{
    InMemoryLicenseStore, InMemoryRequestStore, InMemoryUsageStore,
};
use cmms_licensing::adapters::postgres::{
    run_migrations, PostgresAuditLog, PostgresLicenseStore, PostgresRequestStore,
    PostgresUsageStore,
};
use cmms_licensing::application::licensing::{
    EntitlementService, ExpirySweep, ExpirySweepConfig, LifecycleManager, RequestWorkflow,
    UsageTracker,
};
use cmms_licensing::config::{AppConfig, LogFormat, ServerConfig};
use cmms_licensing::ports::{
    Clock, EventPublisher, LicenseStore, RequestStore, SystemClock, UsageStore,
};

struct Stores {
    licenses: Arc<dyn LicenseStore>,
    requests: Arc<dyn RequestStore>,
    usage: Arc<dyn UsageStore>,
    event_publisher: Arc<dyn EventPublisher>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    let catalog = Arc::new(config.licensing.load_catalog()?);
    info!(
        modules = catalog.modules().len(),
        source = config.licensing.catalog_path.as_deref().unwrap_or("builtin"),
        "Module catalog loaded"
    );

    let stores = open_stores(&config).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let grace = config.licensing.grace_policy();

    let lifecycle = Arc::new(
        LifecycleManager::new(
            stores.licenses.clone(),
            stores.event_publisher.clone(),
            catalog.clone(),
            clock.clone(),
            grace,
        )
        .with_default_trial_days(config.licensing.default_trial_days),
    );
    let entitlements = Arc::new(EntitlementService::new(
        stores.licenses.clone(),
        catalog.clone(),
        clock.clone(),
        grace,
    ));
    let requests = Arc::new(
        RequestWorkflow::new(
            stores.requests.clone(),
            lifecycle.clone(),
            stores.event_publisher.clone(),
            clock.clone(),
        )
        .with_default_term_days(config.licensing.default_term_days),
    );
    let usage = Arc::new(
        UsageTracker::new(
            stores.usage.clone(),
            stores.licenses.clone(),
            catalog.clone(),
            clock.clone(),
        )
        .with_history_limit(config.licensing.usage_history_days as usize),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweep = Arc::new(ExpirySweep::with_config(
        stores.licenses.clone(),
        stores.event_publisher.clone(),
        clock.clone(),
        grace,
        ExpirySweepConfig::default()
            .with_interval(config.licensing.sweep_interval())
            .with_warning_days(config.licensing.warning_days()?),
    ));
    let sweep_task = if config.licensing.sweep_enabled {
        let sweep = sweep.clone();
        info!(
            interval_secs = config.licensing.sweep_interval_secs,
            "Expiry sweep started"
        );
        Some(tokio::spawn(async move { sweep.run(shutdown_rx).await }))
    } else {
        None
    };

    let state = LicensingAppState::new(lifecycle, entitlements, requests, usage, sweep, catalog);
    let app = licensing_router()
        .with_state(state)
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(CompressionLayer::new())
        .layer(cors_layer(&config.server))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, environment = ?config.server.environment, "Licensing service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The receiver may already be gone if the sweep task exited.
    let _ = shutdown_tx.send(true);
    if let Some(task) = sweep_task {
        if let Err(error) = task.await {
            warn!(error = %error, "Expiry sweep task ended abnormally");
        }
    }
    info!("Licensing service stopped");
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(server.log_level.as_str()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match server.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn open_stores(config: &AppConfig) -> anyhow::Result<Stores> {
    let tracing_publisher: Arc<dyn EventPublisher> = Arc::new(TracingEventPublisher::new());

    let Some(database) = &config.database else {
        warn!("No database configured; licenses are kept in memory");
        return Ok(Stores {
            licenses: Arc::new(InMemoryLicenseStore::new()),
            requests: Arc::new(InMemoryRequestStore::new()),
            usage: Arc::new(InMemoryUsageStore::new()),
            event_publisher: tracing_publisher,
        });
    };

    let pool = database.connect().await?;
    if database.run_migrations {
        run_migrations(&pool).await?;
        info!("Database migrations applied");
    }

    let event_publisher = FanOutPublisher::new()
        .with(tracing_publisher)
        .with(Arc::new(PostgresAuditLog::new(pool.clone())));

    Ok(Stores {
        licenses: Arc::new(PostgresLicenseStore::new(pool.clone())),
        requests: Arc::new(PostgresRequestStore::new(pool.clone())),
        usage: Arc::new(PostgresUsageStore::new(pool)),
        event_publisher: Arc::new(event_publisher),
    })
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins_list()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() {
        if server.is_production() {
            CorsLayer::new()
        } else {
            CorsLayer::permissive()
        }
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any)
    }
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(error = %error, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
