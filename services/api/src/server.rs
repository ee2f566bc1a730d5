use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryServices};
use crate::routes::with_lifecycle_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Local;
use kost_core::config::AppConfig;
use kost_core::error::AppError;
use kost_core::lifecycle::{InMemoryStore, RecordingSink};
use kost_core::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryStore::default());
    let notifications = Arc::new(RecordingSink::default());
    let services = Arc::new(InMemoryServices::new(store, notifications, config.billing));

    spawn_sweeps(services.as_ref().clone(), config.billing.sweep_interval_secs);

    let app = with_lifecycle_routes(services)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "kost lifecycle service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Periodic expiry and overdue sweeps. Both are idempotent and
/// re-entrant, so a missed or doubled tick causes no harm.
fn spawn_sweeps(services: InMemoryServices, interval_secs: u64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            ticker.tick().await;
            let today = Local::now().date_naive();

            match services.tenancies.sweep_expired(today) {
                Ok(ended) if !ended.is_empty() => {
                    info!(count = ended.len(), "expired tenancies closed")
                }
                Ok(_) => {}
                Err(err) => warn!(%err, "expiry sweep failed; will retry next tick"),
            }

            match services.billing.sweep_overdue(today) {
                Ok(relabelled) if !relabelled.is_empty() => {
                    info!(count = relabelled.len(), "unpaid invoices marked overdue")
                }
                Ok(_) => {}
                Err(err) => warn!(%err, "overdue sweep failed; will retry next tick"),
            }
        }
    });
}
