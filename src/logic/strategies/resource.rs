use log::{debug, error, warn};
use serde_json::Value;

use crate::error::{OptimadeError, Result};
use crate::logic::disambiguate::{disambiguate, ResourceType, RESOURCE_CANDIDATES};
use crate::logic::strategies::dlite::{shape_for, store_structures};
use crate::logic::strategies::parse::cached_response;
use crate::model::{DliteSessionUpdate, ResourceConfiguration, ResourceParseConfig};
use crate::store::{DataCache, InstanceStore, Transport};

/// Entries of a resource payload: a list, a single resource or a response wrapping them in `data`.
fn entries_of(data: Value) -> Result<Vec<Value>> {
    let data = match data {
        Value::String(text) => serde_json::from_str(&text)?,
        other => other,
    };
    match data {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) if map.contains_key("data") && !map.contains_key("type") => {
            match map.remove("data").unwrap_or(Value::Null) {
                Value::Array(items) => Ok(items),
                Value::Null => Ok(Vec::new()),
                single => Ok(vec![single]),
            }
        }
        Value::Object(map) => Ok(vec![Value::Object(map)]),
        other => Err(OptimadeError::Parse(format!(
            "Expected data to be an object or a list, got {}",
            other
        ))),
    }
}

/// Parses cached or downloaded OPTIMADE entry resources into the semantic-instance store.
pub struct ResourceParseStrategy<'a, S: InstanceStore + ?Sized> {
    cache: &'a DataCache,
    transport: &'a dyn Transport,
    store: &'a S,
}

impl<'a, S: InstanceStore + ?Sized> ResourceParseStrategy<'a, S> {
    pub fn new(cache: &'a DataCache, transport: &'a dyn Transport, store: &'a S) -> Self {
        Self {
            cache,
            transport,
            store,
        }
    }

    pub async fn initialize(&self, config: &ResourceParseConfig) -> Result<DliteSessionUpdate> {
        let collection_id = self
            .store
            .create_collection(config.configuration.collection_id.clone())
            .await?;
        Ok(DliteSessionUpdate::new(collection_id))
    }

    /// Cached under the access key, then under the download URL, then downloaded.
    async fn load(&self, configuration: &ResourceConfiguration) -> Result<Value> {
        if let Some(access_key) = configuration.datacache_config.access_key.as_deref() {
            if let Some(cached) = self.cache.get(access_key).await {
                debug!("Using cached data under access key {}", access_key);
                return Ok(cached_response(cached)?.json);
            }
        }
        let download_url = configuration.download_url.as_deref().ok_or_else(|| {
            OptimadeError::Configuration(
                "No download URL provided and could not find data in the cache.".to_string(),
            )
        })?;
        if let Some(cached) = self.cache.get(download_url).await {
            debug!("Using cached data for {}", download_url);
            return Ok(cached_response(cached)?.json);
        }

        let response = self.transport.fetch(download_url).await?;
        if response.is_error() {
            error!("Downloading {} failed with status {}", download_url, response.status_code);
            return Err(OptimadeError::Request(format!(
                "{} answered with status {}",
                download_url, response.status_code
            )));
        }
        self.cache
            .put(
                download_url,
                serde_json::to_value(&response)?,
                Some(configuration.datacache_config.expire_time),
            )
            .await;
        Ok(response.json)
    }

    pub async fn get(&self, config: &ResourceParseConfig) -> Result<DliteSessionUpdate> {
        config.validate()?;
        let configuration = &config.configuration;

        let entries = entries_of(self.load(configuration).await?)?;
        if entries.is_empty() {
            warn!("No data found in the response.");
            return Ok(DliteSessionUpdate {
                collection_id: configuration.collection_id.clone(),
                ..Default::default()
            });
        }

        let hint = config.parser_type.resource_hint().and_then(ResourceType::from_name);
        let resource_type = disambiguate(&entries[0], &RESOURCE_CANDIDATES, hint)?;
        if resource_type != ResourceType::Structures {
            error!(
                "Currently only 'structures' resources are supported. Got {}.",
                resource_type.name()
            );
            return Err(OptimadeError::UnsupportedEntryType(
                resource_type.name().to_string(),
            ));
        }

        let shape = shape_for(self.store, &config.entity).await?;
        let collection_id = self
            .store
            .create_collection(configuration.collection_id.clone())
            .await?;
        let update = store_structures(
            self.store,
            &collection_id,
            &entries,
            &shape,
            configuration.allow_partial,
        )
        .await?;

        self.cache
            .put(
                &configuration.parsed_data_key,
                Value::Array(entries),
                Some(configuration.datacache_config.expire_time),
            )
            .await;
        Ok(update)
    }
}
