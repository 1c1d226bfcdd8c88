use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer};

use realty_crm_api::config::Config;
use realty_crm_api::db::Database;
use realty_crm_api::handlers::AppState;
use realty_crm_api::{obs, routes};

/// Main entry point for the application.
///
/// Initializes tracing, configuration, the database pool (applying embedded
/// migrations unless disabled), identity verification and the HTTP routes
/// with their middleware, then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    obs::init_tracing();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize database connection pool
    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    if config.run_migrations {
        db.migrate().await?;
    } else {
        tracing::info!("RUN_MIGRATIONS disabled, skipping schema migrations");
    }

    // Build application state
    let port = config.port;
    let app_state = Arc::new(AppState::new(db.pool.clone(), config)?);
    tracing::info!("Identity verification initialized (5 min cache, circuit breaker)");

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    let api = routes::api_routes().layer(
        ServiceBuilder::new()
            // Request size limit: 1MB max payload
            .layer(RequestBodyLimitLayer::new(1024 * 1024))
            // Rate limiting: 10 req/sec per IP, burst of 20
            .layer(GovernorLayer {
                config: governor_conf,
            }),
    );

    // /health bypasses rate limiting
    let app = routes::app(app_state, api).layer(TimeoutLayer::new(Duration::from_secs(30)));

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
