use axum::{
    routing::{get, post},
    Router,
};
use ch7_calculator_client::{
    backend::BackendClient,
    config::Config,
    handlers::{self, AppState},
    identity::IdentityStore,
    lifecycle::Calculator,
    option_store::open_option_store,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the calculator host.
///
/// Initializes logging, configuration and the option store, dispatches the
/// startup event (registration) and then serves the widget endpoints.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ch7_calculator_client=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let options = open_option_store(config.database_url.as_deref()).await?;
    let identities = Arc::new(IdentityStore::new(options));

    let backend = BackendClient::new(config.backend_url.clone(), config.api_key.clone())
        .map_err(|e| anyhow::anyhow!("Failed to initialize backend client: {}", e))?;
    tracing::info!("✓ Backend client initialized: {}", backend.base_url());

    let calculator = Arc::new(Calculator::new(
        backend,
        identities,
        config.site_profile(),
        config.settings_cache_ttl(),
    ));

    match calculator.on_startup().await {
        Some(identity) => tracing::info!("Calculator connected as {}", identity.app_id),
        None => tracing::warn!("Calculator not connected to backend, serving default settings"),
    }

    let app_state = Arc::new(AppState { calculator });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    let protected_routes = Router::new()
        .route("/api/v1/calculator/settings", get(handlers::get_settings))
        .route(
            "/api/v1/calculator/submissions",
            post(handlers::submit_calculation),
        )
        .route("/api/v1/status", get(handlers::status))
        .route("/api/v1/register", post(handlers::register))
        .layer(
            ServiceBuilder::new()
                // Request size limit: 1MB max payload
                .layer(RequestBodyLimitLayer::new(1024 * 1024))
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // SmartIpKeyExtractor falls back to the peer address
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
