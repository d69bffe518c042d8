use log::{debug, error};
use serde_json::Value;

use crate::error::{OptimadeError, Result};
use crate::logic::resolve::{resolve, resolve_or_success};
use crate::model::{OptimadeConfig, OptimadeUrl, ParseConfig, ParseResult, ResponseSchema};
use crate::store::{DataCache, HttpResponse, Transport};

/// Read a cached value as a response. A bare value is taken to be the response body.
pub fn cached_response(value: Value) -> Result<HttpResponse> {
    let value = match value {
        Value::String(text) => serde_json::from_str(&text)?,
        other => other,
    };
    match value {
        Value::Object(mut map) if map.contains_key("json") => {
            let status_code = map
                .get("status_code")
                .and_then(Value::as_u64)
                .and_then(|code| u16::try_from(code).ok())
                .unwrap_or(200);
            let ok = map.get("ok").and_then(Value::as_bool).unwrap_or(true);
            let json = map.remove("json").unwrap_or(Value::Null);
            Ok(HttpResponse {
                status_code,
                ok,
                json,
            })
        }
        body => Ok(HttpResponse {
            status_code: 200,
            ok: true,
            json: body,
        }),
    }
}

/// The URL actually requested for `download_url`.
///
/// A bare base URL gets the configured version, endpoint and query; an endpoint URL
/// without a query gets the configured query parameters.
pub fn query_url(download_url: &OptimadeUrl, configuration: &OptimadeConfig) -> OptimadeUrl {
    match (&download_url.endpoint, &download_url.query) {
        (None, _) => OptimadeUrl::from_config(&download_url.base_url, configuration),
        (Some(_), None) if configuration.query_parameters.is_some() => OptimadeUrl {
            query: OptimadeUrl::from_config(&download_url.base_url, configuration).query,
            ..download_url.clone()
        },
        _ => download_url.clone(),
    }
}

/// Fetches an OPTIMADE response and validates it against the models its URL implies.
pub struct ParseStrategy<'a> {
    cache: &'a DataCache,
    transport: &'a dyn Transport,
}

impl<'a> ParseStrategy<'a> {
    pub fn new(cache: &'a DataCache, transport: &'a dyn Transport) -> Self {
        Self { cache, transport }
    }

    /// Cached under the download URL, then under the access key, then downloaded.
    async fn load(&self, download_url: &str, target: &OptimadeUrl, configuration: &OptimadeConfig) -> Result<HttpResponse> {
        if let Some(cached) = self.cache.get(download_url).await {
            debug!("Using cached response for {}", download_url);
            return cached_response(cached);
        }
        if let Some(access_key) = configuration.datacache_config.access_key.as_deref() {
            if let Some(cached) = self.cache.get(access_key).await {
                debug!("Using cached response under access key {}", access_key);
                return cached_response(cached);
            }
        }

        let response = self.transport.fetch(&target.to_string()).await?;
        self.cache
            .put(
                download_url,
                serde_json::to_value(&response)?,
                Some(configuration.datacache_config.expire_time),
            )
            .await;
        Ok(response)
    }

    pub async fn get(&self, config: &ParseConfig) -> Result<ParseResult> {
        config.validate()?;
        let configuration = &config.configuration;
        let download_url = match (&configuration.download_url, &configuration.media_type) {
            (Some(url), Some(_)) => url,
            _ => {
                return Err(OptimadeError::Configuration(
                    "Missing downloadUrl or mediaType in configuration.".to_string(),
                ))
            }
        };

        let target = query_url(&OptimadeUrl::parse(download_url)?, configuration);
        let response = self.load(download_url, &target, configuration).await?;

        let (_, schema) = if response.is_error() {
            resolve(&response.json, &[ResponseSchema::ErrorResponse]).map_err(|err| {
                error!(
                    "Could not validate an error response (status {}) from {}",
                    response.status_code, target
                );
                err
            })?
        } else {
            let models = target.response_models();
            debug!("response_models={:?}", models);
            resolve_or_success(&response.json, models.as_deref()).map_err(|err| {
                error!("Could not validate for an expected response model. URL={}", target);
                err
            })?
        };

        Ok(ParseResult {
            optimade_config: Some(configuration.clone()),
            optimade_response_model: Some(schema),
            optimade_response: Some(response.json),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ParserType, QueryParameters, MEDIA_TYPE_JSON};
    use parking_lot::Mutex;
    use serde_json::json;

    struct StubTransport {
        response: HttpResponse,
        requested: Mutex<Vec<String>>,
    }

    impl StubTransport {
        fn new(status_code: u16, json: Value) -> Self {
            Self {
                response: HttpResponse {
                    status_code,
                    ok: (200..300).contains(&status_code),
                    json,
                },
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl Transport for StubTransport {
        async fn fetch(&self, url: &str) -> Result<HttpResponse> {
            self.requested.lock().push(url.to_string());
            Ok(self.response.clone())
        }
    }

    fn meta() -> Value {
        json!({"query": {"representation": "/structures"}, "api_version": "1.1.0", "more_data_available": false})
    }

    fn parse_config(url: &str) -> ParseConfig {
        ParseConfig::new(
            ParserType::Optimade,
            OptimadeConfig {
                download_url: Some(url.to_string()),
                media_type: Some(MEDIA_TYPE_JSON.to_string()),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_structures_response_is_validated_and_cached() {
        let body = json!({
            "meta": meta(),
            "data": [{"id": "mpf_1", "type": "structures", "attributes": {"structure_features": []}}]
        });
        let transport = StubTransport::new(200, body.clone());
        let cache = DataCache::new();
        let strategy = ParseStrategy::new(&cache, &transport);
        let url = "https://example.org/v1/structures?filter=nelements%3D2";

        let result = strategy.get(&parse_config(url)).await.unwrap();
        assert_eq!(result.optimade_response_model, Some(ResponseSchema::StructureResponseMany));
        assert_eq!(result.optimade_response, Some(body));

        strategy.get(&parse_config(url)).await.unwrap();
        assert_eq!(transport.requested.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_error_response() {
        let transport = StubTransport::new(
            400,
            json!({"meta": meta(), "errors": [{"status": "400", "detail": "bad filter"}]}),
        );
        let cache = DataCache::new();
        let result = ParseStrategy::new(&cache, &transport)
            .get(&parse_config("https://example.org/v1/structures"))
            .await
            .unwrap();
        assert_eq!(result.optimade_response_model, Some(ResponseSchema::ErrorResponse));
    }

    #[tokio::test]
    async fn test_unvalidated_error_response_is_a_mismatch() {
        let transport = StubTransport::new(500, json!({"detail": "internal"}));
        let cache = DataCache::new();
        let result = ParseStrategy::new(&cache, &transport)
            .get(&parse_config("https://example.org/v1/structures"))
            .await;
        assert!(matches!(result, Err(OptimadeError::SchemaMismatch { .. })));
    }

    #[tokio::test]
    async fn test_cached_access_key_is_used() {
        let transport = StubTransport::new(500, json!({}));
        let cache = DataCache::new();
        cache
            .put(
                "seeded",
                json!({"meta": meta(), "data": {"id": "mpf_1", "type": "structures", "attributes": {"structure_features": []}}}),
                None,
            )
            .await;
        let mut config = parse_config("https://example.org/v1/structures/mpf_1");
        config.configuration.datacache_config.access_key = Some("seeded".to_string());

        let result = ParseStrategy::new(&cache, &transport).get(&config).await.unwrap();
        assert_eq!(result.optimade_response_model, Some(ResponseSchema::StructureResponseOne));
        assert!(transport.requested.lock().is_empty());
    }

    #[tokio::test]
    async fn test_missing_download_url() {
        let transport = StubTransport::new(200, json!({}));
        let cache = DataCache::new();
        let config = ParseConfig::new(ParserType::Optimade, OptimadeConfig::default());
        assert!(matches!(
            ParseStrategy::new(&cache, &transport).get(&config).await,
            Err(OptimadeError::Configuration(_))
        ));
    }

    #[test]
    fn test_query_url_from_layered_configuration() {
        let configuration = OptimadeConfig {
            query_parameters: Some(QueryParameters {
                filter: Some("elements HAS \"Si\"".to_string()),
                page_limit: Some(5),
                ..Default::default()
            }),
            ..Default::default()
        };
        let base = OptimadeUrl::parse("https://example.org").unwrap();
        assert_eq!(
            query_url(&base, &configuration).to_string(),
            "https://example.org/v1/structures?filter=elements%20HAS%20%22Si%22&page_limit=5"
        );

        let with_query = OptimadeUrl::parse("https://example.org/v1/references?page_limit=1").unwrap();
        assert_eq!(query_url(&with_query, &configuration), with_query);
    }

    #[test]
    fn test_cached_response_shapes() {
        let wrapped = cached_response(json!({"status_code": 404, "ok": false, "json": {"errors": []}})).unwrap();
        assert_eq!(wrapped.status_code, 404);
        assert!(!wrapped.ok);

        let bare = cached_response(json!("{\"data\": []}")).unwrap();
        assert_eq!(bare.json, json!({"data": []}));
        assert!(bare.ok);
    }
}
