use log::{debug, error, warn};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{OptimadeError, Result};
use crate::logic::classify::classify;
use crate::logic::flatten::flatten;
use crate::logic::resolve::resolve;
use crate::logic::strategies::parse::ParseStrategy;
use crate::logic::validate::validate_structure;
use crate::model::{
    DliteSessionUpdate, EntityShape, EntryFailure, EntryKind, FlattenedStructure, Id,
    InstanceHandle, ParseConfig, ParserType, ShapeDescriptor, SubRecord,
};
use crate::store::{DataCache, InstanceStore, Transport};

/// Target shape for `entity`, with the nested mapping computed by the store.
pub async fn shape_for<S: InstanceStore + ?Sized>(store: &S, entity: &str) -> Result<ShapeDescriptor> {
    let shape = EntityShape::from_uri(entity)?;
    let descriptor = store.get_type(entity).await?.ok_or_else(|| {
        OptimadeError::Configuration(format!("Entity {} is not known to the instance store", entity))
    })?;
    match shape {
        EntityShape::SingleEntity => Ok(ShapeDescriptor::single(descriptor)),
        EntityShape::MultiEntity => {
            let nested = store.nested_mapping(&descriptor).await?;
            debug!("Nested entities of {}: {:?}", descriptor.name(), nested.paths());
            Ok(ShapeDescriptor::multi(descriptor, nested))
        }
    }
}

async fn construct_sub<S: InstanceStore + ?Sized>(store: &S, record: &SubRecord, properties: Map<String, Value>) -> Result<InstanceHandle> {
    store
        .construct(&record.entity, record.dimensions.clone(), properties)
        .await
}

async fn construct_all<S: InstanceStore + ?Sized>(store: &S, records: &[SubRecord]) -> Result<Value> {
    let mut uuids = Vec::with_capacity(records.len());
    for record in records {
        let handle = construct_sub(store, record, record.properties.clone()).await?;
        uuids.push(Value::String(handle.uuid));
    }
    Ok(Value::Array(uuids))
}

/// Construct the store instances of one flattened structure, innermost first.
pub async fn materialise<S: InstanceStore + ?Sized>(
    store: &S,
    flattened: &FlattenedStructure,
    shape: &ShapeDescriptor,
) -> Result<InstanceHandle> {
    match flattened {
        FlattenedStructure::Flat(record) => {
            store
                .construct(&shape.entity, record.dimensions.to_map(), record.properties())
                .await
        }
        FlattenedStructure::Nested(record) => {
            let species = construct_all(store, &record.species).await?;
            let assemblies = construct_all(store, &record.assemblies).await?;

            let mut properties = record.attributes.properties.clone();
            properties.insert("species".to_string(), species);
            properties.insert("assemblies".to_string(), assemblies);
            let attributes = construct_sub(store, &record.attributes, properties).await?;

            let mut root = Map::new();
            root.insert("id".to_string(), Value::String(record.id.clone()));
            root.insert("type".to_string(), Value::String(record.resource_type.clone()));
            root.insert("attributes".to_string(), Value::String(attributes.uuid));
            store.construct(&record.entity, BTreeMap::new(), root).await
        }
    }
}

fn entry_label(entry: &Value, index: usize) -> String {
    entry
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("data[{}]", index))
}

async fn store_structure<S: InstanceStore + ?Sized>(
    store: &S,
    entry: &Value,
    index: usize,
    shape: &ShapeDescriptor,
) -> Result<(String, InstanceHandle)> {
    let label = entry_label(entry, index);
    let structure = validate_structure("StructureResource", entry)
        .map_err(|failure| OptimadeError::malformed(&label, failure.summary()))?;
    let flattened = flatten(&structure, shape)?;
    let handle = materialise(store, &flattened, shape).await.map_err(|err| match err {
        OptimadeError::Store(reason) => OptimadeError::malformed(&label, reason),
        other => other,
    })?;
    Ok((structure.id, handle))
}

/// Flatten and store every structure entry, then append them to the collection as one batch.
///
/// Per-entry failures abort the whole batch unless `allow_partial` is set, in which case
/// they are reported in the returned update.
pub async fn store_structures<S: InstanceStore + ?Sized>(
    store: &S,
    collection_id: &Id,
    entries: &[Value],
    shape: &ShapeDescriptor,
    allow_partial: bool,
) -> Result<DliteSessionUpdate> {
    let mut update = DliteSessionUpdate::new(collection_id.clone());
    if entries.is_empty() {
        warn!("No structures to add to collection {}", collection_id);
        return Ok(update);
    }

    let mut batch = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        match store_structure(store, entry, index, shape).await {
            Ok(item) => batch.push(item),
            Err(err) if err.is_per_entry() && allow_partial => {
                warn!("Skipping entry {}: {}", entry_label(entry, index), err);
                let (entry_id, reason) = match err {
                    OptimadeError::MalformedRecord { entry_id, reason } => (entry_id, reason),
                    other => (entry_label(entry, index), other.to_string()),
                };
                update.failures.push(EntryFailure { entry_id, reason });
            }
            Err(err) => {
                error!("Could not store entry {}: {}", entry_label(entry, index), err);
                return Err(err);
            }
        }
    }

    if !update.failures.is_empty() {
        warn!(
            "Adding {} of {} structures to collection {}",
            batch.len(),
            entries.len(),
            collection_id
        );
    }
    update.labels = batch.iter().map(|(label, _)| label.clone()).collect();
    store.add_batch(collection_id, batch).await?;
    Ok(update)
}

/// Parses an OPTIMADE response into instances of the semantic-instance store.
pub struct DliteParseStrategy<'a, S: InstanceStore + ?Sized> {
    cache: &'a DataCache,
    transport: &'a dyn Transport,
    store: &'a S,
}

impl<'a, S: InstanceStore + ?Sized> DliteParseStrategy<'a, S> {
    pub fn new(cache: &'a DataCache, transport: &'a dyn Transport, store: &'a S) -> Self {
        Self {
            cache,
            transport,
            store,
        }
    }

    pub async fn initialize(&self, config: &ParseConfig) -> Result<DliteSessionUpdate> {
        let collection_id = self
            .store
            .create_collection(config.configuration.collection_id.clone())
            .await?;
        Ok(DliteSessionUpdate::new(collection_id))
    }

    pub async fn get(&self, config: &ParseConfig) -> Result<DliteSessionUpdate> {
        config.validate()?;

        let mut generic = config.clone();
        generic.parser_type = ParserType::Optimade;
        generic.configuration.media_type = config
            .configuration
            .media_type()
            .map(|media_type| media_type.replace("+dlite", "+json"));
        let parsed = ParseStrategy::new(self.cache, self.transport)
            .get(&generic)
            .await?;

        let (schema, response) = match (parsed.optimade_response_model, parsed.optimade_response) {
            (Some(schema), Some(response)) => (schema, response),
            _ => {
                error!("Could not retrieve response from OPTIMADE parse strategy.");
                return Err(OptimadeError::Parse(
                    "Could not retrieve response from OPTIMADE parse strategy.".to_string(),
                ));
            }
        };

        let (envelope, _) = resolve(&response, &[schema])?;
        let classified = classify(&envelope)?;
        if classified.kind != EntryKind::Structure {
            error!(
                "Got currently unsupported response type {}. Only structures are supported.",
                schema
            );
            return Err(OptimadeError::UnsupportedEntryType(
                classified.kind.as_str().to_string(),
            ));
        }

        let shape = shape_for(self.store, &config.entity).await?;
        let collection_id = self
            .store
            .create_collection(config.configuration.collection_id.clone())
            .await?;
        store_structures(
            self.store,
            &collection_id,
            &classified.entries,
            &shape,
            config.configuration.allow_partial,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::unflatten::{unflatten_instance, SubCollection};
    use crate::model::{OptimadeConfig, STRUCTURE_ENTITY, STRUCTURE_RESOURCE_ENTITY, MEDIA_TYPE_DLITE};
    use crate::store::{HttpResponse, InMemoryStore};
    use serde_json::json;

    struct FixedTransport(Value);

    #[async_trait::async_trait]
    impl Transport for FixedTransport {
        async fn fetch(&self, _url: &str) -> Result<HttpResponse> {
            Ok(HttpResponse {
                status_code: 200,
                ok: true,
                json: self.0.clone(),
            })
        }
    }

    fn response(data: Value) -> Value {
        json!({
            "meta": {"query": {"representation": "/structures"}, "api_version": "1.1.0", "more_data_available": false},
            "data": data
        })
    }

    fn good(id: &str) -> Value {
        json!({
            "id": id,
            "type": "structures",
            "attributes": {
                "nelements": 2,
                "nsites": 2,
                "elements": ["O", "Si"],
                "species_at_sites": ["A", "B"],
                "structure_features": ["assemblies"],
                "species": [
                    {"name": "A", "chemical_symbols": ["Si"], "concentration": [1.0]},
                    {"name": "B", "chemical_symbols": ["O"], "concentration": [1.0], "attached": ["H"], "nattached": [1]}
                ],
                "assemblies": [{"sites_in_groups": [[0], [1]], "group_probabilities": [0.5, 0.5]}]
            }
        })
    }

    fn bad(id: &str) -> Value {
        json!({
            "id": id,
            "type": "structures",
            "attributes": {
                "structure_features": [],
                "species": [{"name": "A", "chemical_symbols": ["Si", "O"], "concentration": [1.0]}]
            }
        })
    }

    fn dlite_config(entity: &str, allow_partial: bool) -> ParseConfig {
        let mut config = ParseConfig::new(
            ParserType::OptimadeDlite,
            OptimadeConfig {
                download_url: Some("https://example.org/v1/structures".to_string()),
                media_type: Some(MEDIA_TYPE_DLITE.to_string()),
                allow_partial,
                ..Default::default()
            },
        );
        config.entity = entity.to_string();
        config
    }

    #[tokio::test]
    async fn test_nested_structures_are_stored() {
        let store = InMemoryStore::new();
        let cache = DataCache::new();
        let transport = FixedTransport(response(json!([good("s1"), good("s2")])));
        let strategy = DliteParseStrategy::new(&cache, &transport, &store);

        let config = dlite_config(STRUCTURE_ENTITY, false);
        let session = strategy.initialize(&config).await.unwrap();
        let mut config = config;
        config.configuration.collection_id = session.collection_id.clone();

        let update = strategy.get(&config).await.unwrap();
        assert_eq!(update.labels, vec!["s1", "s2"]);
        assert!(update.failures.is_empty());

        let collection = session.collection_id.unwrap();
        let root = store.get_labelled(&collection, "s1").await.unwrap().unwrap();
        assert_eq!(root.properties["id"], "s1");
        let attributes_uuid = root.properties["attributes"].as_str().unwrap().to_string();
        let attributes = store.get_instance(&attributes_uuid).await.unwrap().unwrap();
        assert_eq!(attributes.dimensions["nspecies"], 2);
        assert_eq!(attributes.properties["species"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_flat_structures_round_trip_through_the_store() {
        let store = InMemoryStore::new();
        let cache = DataCache::new();
        let transport = FixedTransport(response(good("s1")));
        let strategy = DliteParseStrategy::new(&cache, &transport, &store);

        let update = strategy
            .get(&dlite_config(STRUCTURE_RESOURCE_ENTITY, false))
            .await
            .unwrap();
        let collection = update.collection_id.unwrap();
        let stored = store.get_labelled(&collection, "s1").await.unwrap().unwrap();
        assert_eq!(stored.dimensions["nspecies"], 2);

        let species = unflatten_instance(&stored, SubCollection::Species).unwrap();
        assert_eq!(species[1], json!({"name": "B", "chemical_symbols": ["O"], "concentration": [1.0], "attached": ["H"], "nattached": [1]}));
    }

    #[tokio::test]
    async fn test_malformed_entry_aborts_the_batch() {
        let store = InMemoryStore::new();
        let cache = DataCache::new();
        let transport = FixedTransport(response(json!([good("s1"), bad("s2")])));
        let strategy = DliteParseStrategy::new(&cache, &transport, &store);

        let mut config = dlite_config(STRUCTURE_ENTITY, false);
        config.configuration.collection_id = Some("c1".to_string());
        let result = strategy.get(&config).await;
        assert!(matches!(result, Err(OptimadeError::MalformedRecord { .. })));
        assert_eq!(store.labels(&"c1".to_string()).await.unwrap(), Some(vec![]));
    }

    #[tokio::test]
    async fn test_partial_results_report_failures() {
        let store = InMemoryStore::new();
        let cache = DataCache::new();
        let transport = FixedTransport(response(json!([good("s1"), bad("s2")])));
        let strategy = DliteParseStrategy::new(&cache, &transport, &store);

        let update = strategy.get(&dlite_config(STRUCTURE_ENTITY, true)).await.unwrap();
        assert_eq!(update.labels, vec!["s1"]);
        assert_eq!(update.failures.len(), 1);
        assert_eq!(update.failures[0].entry_id, "s2");
    }

    #[tokio::test]
    async fn test_references_are_rejected() {
        let store = InMemoryStore::new();
        let cache = DataCache::new();
        let transport = FixedTransport(response(json!([{"id": "r1", "type": "references", "attributes": {}}])));
        let strategy = DliteParseStrategy::new(&cache, &transport, &store);

        let mut config = dlite_config(STRUCTURE_ENTITY, false);
        config.configuration.download_url = Some("https://example.org/v1/references".to_string());
        assert!(matches!(
            strategy.get(&config).await,
            Err(OptimadeError::UnsupportedEntryType(_))
        ));
    }
}
