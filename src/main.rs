use aih_billing_matcher::{api, create_pool, db, AppConfig, PipelineService, ReferenceCatalog};
use axum::{routing::{get, post}, Router};
use std::path::Path;
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging with local timestamps
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    // 1. configuration
    let config = AppConfig::load()?;
    info!("Starting server with config: {:?}", config);

    // 2. catalog snapshot, loaded once
    let catalog = load_catalog(&config).await?;
    match &catalog {
        Some(c) => info!(
            "Catalog {} ready: {} procedures",
            c.version().unwrap_or("<unversioned>"),
            c.len()
        ),
        None => warn!("No catalog source configured; analysis requests will fail"),
    }

    let service = Arc::new(PipelineService::new(&config, catalog));

    // 3. routes
    let app = Router::new()
        .route("/health", get(api::health_check))
        .route("/api/aih/parse", post(api::parse))
        .route("/api/aih/analyze", post(api::analyze))
        .route("/api/aih/analyze/csv", post(api::analyze_csv))
        .with_state(service)
        .layer(ServiceBuilder::new());

    // 4. serve
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST /api/aih/parse        - split, extract, validate");
    info!("  POST /api/aih/analyze      - full pipeline (JSON)");
    info!("  POST /api/aih/analyze/csv  - full pipeline (CSV)");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Postgres when a database URL is configured, else the CSV export, else none.
async fn load_catalog(config: &AppConfig) -> Result<Option<Arc<ReferenceCatalog>>, Box<dyn std::error::Error>> {
    if let Some(url) = config.database.url.as_deref() {
        let pool = create_pool(url, &config.database).await?;
        info!("Database pool created");
        let catalog = db::load_active_catalog(&pool).await?;
        return Ok(Some(Arc::new(catalog)));
    }

    if let Some(path) = config.catalog.csv_path.as_deref() {
        let catalog = db::load_catalog_csv(Path::new(path), config.catalog.version.clone())?;
        return Ok(Some(Arc::new(catalog)));
    }

    Ok(None)
}
