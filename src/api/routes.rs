use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::api::handlers::{self, AppState};
use crate::store::InstanceStore;

pub fn create_router<S: InstanceStore + 'static>() -> Router<AppState<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Strategies
        .route("/filter/initialize", post(handlers::filter_initialize))
        .route("/parse/get", post(handlers::parse_get::<S>))
        .route("/parse/dlite/initialize", post(handlers::dlite_initialize::<S>))
        .route("/parse/dlite/get", post(handlers::dlite_get::<S>))
        .route(
            "/parse/resources/initialize",
            post(handlers::resources_initialize::<S>),
        )
        .route("/parse/resources/get", post(handlers::resources_get::<S>))
        // Data cache
        .route("/cache", post(handlers::cache_put::<S>))
        // Collections
        .route("/collections/:collection_id", get(handlers::get_collection::<S>))
        .route(
            "/collections/:collection_id/instances/:label",
            get(handlers::get_collection_instance::<S>),
        )
        .route(
            "/collections/:collection_id/instances/:label/species",
            get(handlers::get_instance_species::<S>),
        )
        .route(
            "/collections/:collection_id/instances/:label/assemblies",
            get(handlers::get_instance_assemblies::<S>),
        )
        .layer(CorsLayer::permissive())
}
