use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_admissions_routes;
use admissions::allotment::{EnvCapacitySource, SeatAllotmentService};
use admissions::config::AppConfig;
use admissions::error::AppError;
use admissions::students::{SqliteCandidateStore, StudentService};
use admissions::telemetry::{self, LogTarget};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(database) = args.database.take() {
        config.storage.database_path = database;
    }

    telemetry::init(&config.telemetry, LogTarget::Stdout)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    if config.storage.is_in_memory() {
        warn!("APP_DATABASE_PATH not set; student records will not survive a restart");
    }
    let store = Arc::new(SqliteCandidateStore::open(&config.storage.database_path)?);
    let student_service = Arc::new(StudentService::new(store.clone()));
    let allotment_service = Arc::new(SeatAllotmentService::new(
        store,
        Arc::new(EnvCapacitySource),
    ));

    let app = with_admissions_routes(student_service, allotment_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        database = %config.storage.database_path,
        "admissions service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
