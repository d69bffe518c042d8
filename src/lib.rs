pub mod api;
pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod store;

// Export API types
pub use api::handlers;
pub use api::routes;

pub use error::{OptimadeError, Result};

// Export logic types
pub use logic::strategies::{DliteParseStrategy, FilterStrategy, ParseStrategy, ResourceParseStrategy};
pub use logic::{classify, disambiguate, flatten, resolve, resolve_or_success, unflatten};

// Export all model types
pub use model::*;

// Export store types
pub use store::{DataCache, HttpResponse, HttpTransport, InMemoryStore, InstanceStore, Transport};

/// Shared state for the HTTP surface: in-memory instances, the data cache and an HTTP transport.
pub fn app_state(
    config: &crate::config::AppConfig,
) -> anyhow::Result<api::handlers::AppState<InMemoryStore>> {
    use std::sync::Arc;

    let transport = HttpTransport::new(config.http.timeout_secs, &config.http.user_agent)?;
    let cache = DataCache::with_settings(config.cache.default_expire_time, &config.cache.tag);
    Ok(Arc::new(api::handlers::ServiceState::new(
        InMemoryStore::new(),
        cache,
        Arc::new(transport),
    )))
}

// Function for integration testing
pub async fn run_server() -> anyhow::Result<()> {
    use axum::serve;
    use tokio::net::TcpListener;

    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    // Initialize logging with INFO level only (suppress DEBUG logs)
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();

    let config = crate::config::AppConfig::load()?;
    let app = crate::api::routes::create_router().with_state(app_state(&config)?);

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;

    serve(listener, app).await?;

    Ok(())
}
