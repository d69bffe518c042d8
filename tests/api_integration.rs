use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use oteapi_optimade::api::handlers::ServiceState;
use oteapi_optimade::api::routes::create_router;
use oteapi_optimade::{
    DataCache, HttpResponse, InMemoryStore, Result, Transport, STRUCTURE_RESOURCE_ENTITY,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

// Answers every request with the same response and records the requested URLs
struct StubTransport {
    response: HttpResponse,
    requested: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl Transport for StubTransport {
    async fn fetch(&self, url: &str) -> Result<HttpResponse> {
        self.requested.lock().push(url.to_string());
        Ok(self.response.clone())
    }
}

fn structure(id: &str) -> Value {
    json!({
        "id": id,
        "type": "structures",
        "attributes": {
            "nelements": 2,
            "nsites": 2,
            "elements": ["O", "Si"],
            "species_at_sites": ["Si", "O"],
            "structure_features": [],
            "species": [
                {"name": "Si", "chemical_symbols": ["Si"], "concentration": [1.0]},
                {"name": "O", "chemical_symbols": ["O"], "concentration": [1.0]}
            ]
        }
    })
}

fn structures_response(data: Value) -> Value {
    json!({
        "meta": {"query": {"representation": "/structures"}, "api_version": "1.1.0", "more_data_available": false},
        "data": data
    })
}

fn app(status_code: u16, body: Value) -> (Router, Arc<StubTransport>) {
    let transport = Arc::new(StubTransport {
        response: HttpResponse {
            status_code,
            ok: (200..300).contains(&status_code),
            json: body,
        },
        requested: Mutex::new(Vec::new()),
    });
    let state = Arc::new(ServiceState::new(
        InMemoryStore::new(),
        DataCache::new(),
        transport.clone(),
    ));
    (create_router().with_state(state), transport)
}

async fn send(app: &Router, method: &str, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(path)
        .header("content-type", "application/json")
        .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health() {
    let (app, _) = app(200, json!({}));
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_filter_then_parse_then_store() {
    let (app, transport) = app(200, structures_response(json!([structure("s1"), structure("s2")])));

    let (status, filtered) = send(
        &app,
        "POST",
        "/filter/initialize",
        Some(json!({"filterType": "optimade", "query": "nelements=2", "limit": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(filtered["optimade_config"]["query_parameters"]["filter"], "nelements=2");

    let mut configuration = filtered["optimade_config"].clone();
    configuration["downloadUrl"] = json!("https://example.org");
    configuration["mediaType"] = json!("application/vnd.optimade+json");
    let (status, parsed) = send(
        &app,
        "POST",
        "/parse/get",
        Some(json!({"parserType": "parser/optimade", "configuration": configuration})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parsed["optimade_response"]["data"][1]["id"], "s2");
    assert_eq!(
        transport.requested.lock()[0],
        "https://example.org/v1/structures?filter=nelements%3D2&page_limit=2"
    );

    let (status, session) = send(
        &app,
        "POST",
        "/parse/dlite/initialize",
        Some(json!({"parserType": "parser/optimade/dlite", "entity": STRUCTURE_RESOURCE_ENTITY})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let collection_id = session["collection_id"].as_str().unwrap().to_string();

    configuration["mediaType"] = json!("application/vnd.optimade+dlite");
    configuration["collection_id"] = json!(collection_id);
    let (status, update) = send(
        &app,
        "POST",
        "/parse/dlite/get",
        Some(json!({
            "parserType": "parser/optimade/dlite",
            "entity": STRUCTURE_RESOURCE_ENTITY,
            "configuration": configuration
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(update["labels"], json!(["s1", "s2"]));
    // served from the cache
    assert_eq!(transport.requested.lock().len(), 1);

    let (status, collection) = send(&app, "GET", &format!("/collections/{}", collection_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(collection["labels"], json!(["s1", "s2"]));

    let (status, species) = send(
        &app,
        "GET",
        &format!("/collections/{}/instances/s1/species", collection_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(species[0]["name"], "Si");
    assert_eq!(species[1]["chemical_symbols"], json!(["O"]));
}

#[tokio::test]
async fn test_resources_from_seeded_cache() {
    let (app, transport) = app(500, json!({}));

    let (status, seeded) = send(
        &app,
        "POST",
        "/cache",
        Some(json!({"value": [structure("s1")]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let key = seeded["key"].as_str().unwrap().to_string();

    let (status, update) = send(
        &app,
        "POST",
        "/parse/resources/get",
        Some(json!({
            "parserType": "parser/optimade/resources/dlite",
            "entity": STRUCTURE_RESOURCE_ENTITY,
            "configuration": {"datacache_config": {"accessKey": key}}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(update["labels"], json!(["s1"]));
    assert!(transport.requested.lock().is_empty());

    let collection_id = update["collection_id"].as_str().unwrap();
    let (status, instance) = send(
        &app,
        "GET",
        &format!("/collections/{}/instances/s1", collection_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(instance["meta"], STRUCTURE_RESOURCE_ENTITY);
    assert_eq!(instance["dimensions"]["nspecies"], 2);
}

#[tokio::test]
async fn test_error_statuses() {
    let (app, _) = app(500, json!({"detail": "internal"}));

    let (status, _) = send(&app, "POST", "/filter/initialize", Some(json!({"filterType": "sql"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "POST",
        "/parse/get",
        Some(json!({
            "parserType": "parser/optimade",
            "configuration": {
                "downloadUrl": "https://example.org/v1/structures",
                "mediaType": "application/vnd.optimade+json"
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"]["attempted"], json!(["ErrorResponse"]));

    let (status, _) = send(&app, "GET", "/collections/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
