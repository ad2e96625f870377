use crate::cli::ServeArgs;
use crate::infra::{build_service, AppState, LoggingLeadHook, LoggingNotifier};
use crate::routes::with_assessment_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use ipo_readiness::assessment::TemplateRegistry;
use ipo_readiness::config::AppConfig;
use ipo_readiness::error::AppError;
use ipo_readiness::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry, config.environment)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let templates = Arc::new(TemplateRegistry::standard());
    let assessment_service = Arc::new(build_service(
        templates,
        Arc::new(LoggingNotifier),
        Arc::new(LoggingLeadHook),
    ));

    let app = with_assessment_routes(assessment_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "ipo readiness assessment service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
