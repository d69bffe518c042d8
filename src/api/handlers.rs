use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use log::error;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::OptimadeError;
use crate::logic::strategies::{DliteParseStrategy, FilterStrategy, ParseStrategy, ResourceParseStrategy};
use crate::logic::unflatten::{unflatten_instance, SubCollection};
use crate::model::{
    DliteSessionUpdate, FilterConfig, FilterResult, Id, ParseConfig, ParseResult,
    ResourceParseConfig, StoredInstance,
};
use crate::store::{DataCache, InstanceStore, Transport};

/// Collaborators shared by all handlers.
pub struct ServiceState<S> {
    pub store: S,
    pub cache: DataCache,
    pub transport: Arc<dyn Transport>,
}

impl<S: InstanceStore> ServiceState<S> {
    pub fn new(store: S, cache: DataCache, transport: Arc<dyn Transport>) -> Self {
        Self {
            store,
            cache,
            transport,
        }
    }
}

pub type AppState<S> = Arc<ServiceState<S>>;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
            details: None,
        }
    }
}

fn status_for(err: &OptimadeError) -> StatusCode {
    match err {
        OptimadeError::Configuration(_) | OptimadeError::InvalidUrl(_) | OptimadeError::Parse(_) => {
            StatusCode::BAD_REQUEST
        }
        OptimadeError::SchemaMismatch { .. }
        | OptimadeError::UnsupportedEntryType(_)
        | OptimadeError::SchemaInconsistency(_)
        | OptimadeError::MalformedRecord { .. }
        | OptimadeError::UnknownResourceType { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        OptimadeError::Request(_) => StatusCode::BAD_GATEWAY,
        OptimadeError::Store(_) | OptimadeError::Cache(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn details_for(err: &OptimadeError) -> Option<Value> {
    match err {
        OptimadeError::SchemaMismatch { attempted, reasons, .. } => {
            Some(json!({"attempted": attempted, "reasons": reasons}))
        }
        OptimadeError::UnknownResourceType { attempted, .. } => Some(json!({"attempted": attempted})),
        OptimadeError::MalformedRecord { entry_id, reason } => {
            Some(json!({"entry_id": entry_id, "reason": reason}))
        }
        _ => None,
    }
}

fn api_error(err: OptimadeError) -> (StatusCode, Json<ErrorResponse>) {
    let status = status_for(&err);
    if status.is_server_error() {
        error!("Request failed: {}", err);
    }
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            details: details_for(&err),
        }),
    )
}

fn not_found(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::NOT_FOUND, Json(ErrorResponse::new(message)))
}

pub async fn filter_initialize(Json(config): Json<FilterConfig>) -> ApiResult<FilterResult> {
    FilterStrategy::initialize(&config).map(Json).map_err(api_error)
}

pub async fn parse_get<S: InstanceStore + 'static>(
    State(state): State<AppState<S>>,
    Json(config): Json<ParseConfig>,
) -> ApiResult<ParseResult> {
    ParseStrategy::new(&state.cache, state.transport.as_ref())
        .get(&config)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn dlite_initialize<S: InstanceStore + 'static>(
    State(state): State<AppState<S>>,
    Json(config): Json<ParseConfig>,
) -> ApiResult<DliteSessionUpdate> {
    DliteParseStrategy::new(&state.cache, state.transport.as_ref(), &state.store)
        .initialize(&config)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn dlite_get<S: InstanceStore + 'static>(
    State(state): State<AppState<S>>,
    Json(config): Json<ParseConfig>,
) -> ApiResult<DliteSessionUpdate> {
    DliteParseStrategy::new(&state.cache, state.transport.as_ref(), &state.store)
        .get(&config)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn resources_initialize<S: InstanceStore + 'static>(
    State(state): State<AppState<S>>,
    Json(config): Json<ResourceParseConfig>,
) -> ApiResult<DliteSessionUpdate> {
    ResourceParseStrategy::new(&state.cache, state.transport.as_ref(), &state.store)
        .initialize(&config)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn resources_get<S: InstanceStore + 'static>(
    State(state): State<AppState<S>>,
    Json(config): Json<ResourceParseConfig>,
) -> ApiResult<DliteSessionUpdate> {
    ResourceParseStrategy::new(&state.cache, state.transport.as_ref(), &state.store)
        .get(&config)
        .await
        .map(Json)
        .map_err(api_error)
}

#[derive(Debug, Deserialize)]
pub struct CacheRequest {
    pub value: Value,
    /// Stored under the content hash of `value` when absent.
    pub key: Option<String>,
    #[serde(rename = "expireTime")]
    pub expire_time: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct CacheResponse {
    pub key: String,
}

pub async fn cache_put<S: InstanceStore + 'static>(
    State(state): State<AppState<S>>,
    Json(request): Json<CacheRequest>,
) -> ApiResult<CacheResponse> {
    let key = match request.key {
        Some(key) => {
            state.cache.put(&key, request.value, request.expire_time).await;
            key
        }
        None => state
            .cache
            .add(request.value, request.expire_time)
            .await
            .map_err(api_error)?,
    };
    Ok(Json(CacheResponse { key }))
}

#[derive(Debug, Serialize)]
pub struct CollectionResponse {
    pub collection_id: Id,
    pub labels: Vec<String>,
}

pub async fn get_collection<S: InstanceStore + 'static>(
    State(state): State<AppState<S>>,
    Path(collection_id): Path<Id>,
) -> ApiResult<CollectionResponse> {
    match state.store.labels(&collection_id).await {
        Ok(Some(labels)) => Ok(Json(CollectionResponse {
            collection_id,
            labels,
        })),
        Ok(None) => Err(not_found("Collection not found")),
        Err(e) => Err(api_error(e)),
    }
}

async fn labelled_instance<S: InstanceStore>(
    store: &S,
    collection_id: &Id,
    label: &str,
) -> Result<StoredInstance, (StatusCode, Json<ErrorResponse>)> {
    match store.get_labelled(collection_id, label).await {
        Ok(Some(instance)) => Ok(instance),
        Ok(None) => Err(not_found("Instance not found")),
        Err(e) => Err(api_error(e)),
    }
}

pub async fn get_collection_instance<S: InstanceStore + 'static>(
    State(state): State<AppState<S>>,
    Path((collection_id, label)): Path<(Id, String)>,
) -> ApiResult<StoredInstance> {
    labelled_instance(&state.store, &collection_id, &label)
        .await
        .map(Json)
}

pub async fn get_instance_species<S: InstanceStore + 'static>(
    State(state): State<AppState<S>>,
    Path((collection_id, label)): Path<(Id, String)>,
) -> ApiResult<Vec<Value>> {
    let instance = labelled_instance(&state.store, &collection_id, &label).await?;
    unflatten_instance(&instance, SubCollection::Species)
        .map(Json)
        .map_err(api_error)
}

pub async fn get_instance_assemblies<S: InstanceStore + 'static>(
    State(state): State<AppState<S>>,
    Path((collection_id, label)): Path<(Id, String)>,
) -> ApiResult<Vec<Value>> {
    let instance = labelled_instance(&state.store, &collection_id, &label).await?;
    unflatten_instance(&instance, SubCollection::Assemblies)
        .map(Json)
        .map_err(api_error)
}
