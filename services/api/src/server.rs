use crate::cli::ServeArgs;
use crate::infra::{identity_from_config, AppState};
use crate::routes::with_placement_routes;
use axum::{Extension, Router};
use axum_prometheus::PrometheusMetricLayer;
use placement_portal::config::AppConfig;
use placement_portal::error::AppError;
use placement_portal::telemetry;
use placement_portal::workflows::placement::{
    InMemoryPlacementRepository, LocalDocumentStore, PlacementRepository, PlacementService,
    SqlitePlacementRepository,
};
use std::sync::atomic::{AtomicBool, Ordering};
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
    if let Some(database) = args.database.take() {
        config.storage.database_path = Some(database);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));

    let (app, storage) = match config.storage.database_path.as_deref() {
        Some(path) => {
            info!(path = %path.display(), "opening sqlite placement store");
            let repository = SqlitePlacementRepository::open(path)?;
            (placement_app(repository, &config), "sqlite")
        }
        None => {
            info!("no database configured; placement records live in memory");
            (
                placement_app(InMemoryPlacementRepository::default(), &config),
                "memory",
            )
        }
    };

    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        storage,
    };
    let app = app.layer(Extension(app_state)).layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, storage, "placement portal ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn placement_app<R>(repository: R, config: &AppConfig) -> Router
where
    R: PlacementRepository + 'static,
{
    let service = Arc::new(PlacementService::new(Arc::new(repository)));
    let identity = Arc::new(identity_from_config(&config.admins));
    let documents = Arc::new(LocalDocumentStore::new(config.storage.upload_dir.clone()));
    with_placement_routes(service, identity, documents)
}
