use crate::cli::ServeArgs;
use crate::infra::{AppState, BackOffice, LiveBackend};
use crate::routes::with_backoffice_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;
use vbudget::config::AppConfig;
use vbudget::documents::LocalDocumentStore;
use vbudget::error::AppError;
use vbudget::notify::TracingNotifier;
use vbudget::store::MemoryRepository;
use vbudget::telemetry;

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

    let office = BackOffice::<LiveBackend>::new(
        Arc::new(MemoryRepository::new()),
        Arc::new(TracingNotifier),
        Arc::new(LocalDocumentStore::new(config.storage.uploads_dir.clone())),
        &config.auth,
        config.otp,
        config.debug_mode,
    );
    let admin = office
        .onboarding
        .seed_admin(&config.auth.admin_email, &config.auth.admin_password)?;
    info!(user_id = %admin.id, email = %admin.email, "administrator account ready");

    let app = with_backoffice_routes(Arc::new(office))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        debug_mode = config.debug_mode,
        uploads = %config.storage.uploads_dir.display(),
        "v-budget back office ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
