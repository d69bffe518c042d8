use log::{debug, warn};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

use crate::error::{OptimadeError, Result};
use crate::model::{
    generate_id, Id, InstanceHandle, NestedEntityMapping, PropertyKind, StoredInstance,
    TypeDescriptor,
};
use crate::store::entities::builtin_registry;
use crate::store::traits::InstanceStore;

/// Labelled instance references, kept in insertion order.
#[derive(Debug, Default, Clone)]
struct Collection {
    members: Vec<(String, Id)>,
}

impl Collection {
    fn insert(&mut self, label: String, uuid: Id) {
        match self.members.iter_mut().find(|(existing, _)| *existing == label) {
            Some(member) => {
                warn!("Replacing instance labelled '{}'", label);
                member.1 = uuid;
            }
            None => self.members.push((label, uuid)),
        }
    }

    fn get(&self, label: &str) -> Option<&Id> {
        self.members.iter().find(|(existing, _)| existing == label).map(|(_, uuid)| uuid)
    }
}

/// Instance store held in process memory.
pub struct InMemoryStore {
    types: RwLock<BTreeMap<String, TypeDescriptor>>,
    instances: RwLock<HashMap<Id, StoredInstance>>,
    collections: RwLock<HashMap<Id, Collection>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            types: RwLock::new(builtin_registry()),
            instances: RwLock::new(HashMap::new()),
            collections: RwLock::new(HashMap::new()),
        }
    }

    fn check_dimensions(descriptor: &TypeDescriptor, dimensions: &BTreeMap<String, usize>) -> Result<()> {
        for name in &descriptor.dimensions {
            if !dimensions.contains_key(name) {
                return Err(OptimadeError::Store(format!(
                    "{} requires dimension '{}'",
                    descriptor.name(),
                    name
                )));
            }
        }
        if let Some(extra) = dimensions.keys().find(|name| !descriptor.dimensions.contains(name)) {
            return Err(OptimadeError::Store(format!(
                "{} has no dimension '{}'",
                descriptor.name(),
                extra
            )));
        }
        Ok(())
    }

    fn check_properties(
        &self,
        descriptor: &TypeDescriptor,
        dimensions: &BTreeMap<String, usize>,
        properties: &Map<String, Value>,
    ) -> Result<()> {
        let instances = self.instances.read();
        for (name, value) in properties {
            let Some(property) = descriptor.property(name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }

            if let [dimension] = property.shape.as_slice() {
                let expected = dimensions.get(dimension).copied().unwrap_or_default();
                match value.as_array() {
                    Some(items) if items.len() == expected => {}
                    Some(items) => {
                        return Err(OptimadeError::Store(format!(
                            "{}.{} has {} items but dimension '{}' is {}",
                            descriptor.name(),
                            name,
                            items.len(),
                            dimension,
                            expected
                        )))
                    }
                    None => {
                        return Err(OptimadeError::Store(format!(
                            "{}.{} must be an array shaped by '{}'",
                            descriptor.name(),
                            name,
                            dimension
                        )))
                    }
                }
            }

            if property.kind == PropertyKind::Ref {
                let uuids: Vec<&Value> = match value {
                    Value::Array(items) => items.iter().collect(),
                    single => vec![single],
                };
                for uuid in uuids {
                    let known = uuid.as_str().map_or(false, |uuid| instances.contains_key(uuid));
                    if !known {
                        return Err(OptimadeError::Store(format!(
                            "{}.{} refers to unknown instance {}",
                            descriptor.name(),
                            name,
                            uuid
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl InstanceStore for InMemoryStore {
    async fn create_collection(&self, collection_id: Option<Id>) -> Result<Id> {
        let mut collections = self.collections.write();
        let id = collection_id.unwrap_or_else(generate_id);
        if !collections.contains_key(&id) {
            debug!("Creating collection {}", id);
            collections.insert(id.clone(), Collection::default());
        }
        Ok(id)
    }

    async fn construct(
        &self,
        descriptor: &TypeDescriptor,
        dimensions: BTreeMap<String, usize>,
        properties: Map<String, Value>,
    ) -> Result<InstanceHandle> {
        Self::check_dimensions(descriptor, &dimensions)?;
        self.check_properties(descriptor, &dimensions, &properties)?;

        self.types
            .write()
            .entry(descriptor.uri.clone())
            .or_insert_with(|| descriptor.clone());

        let instance = StoredInstance {
            uuid: generate_id(),
            meta: descriptor.uri.clone(),
            dimensions,
            properties,
        };
        let handle = InstanceHandle {
            uuid: instance.uuid.clone(),
            meta: instance.meta.clone(),
        };
        self.instances.write().insert(instance.uuid.clone(), instance);
        Ok(handle)
    }

    async fn add_to_collection(&self, collection_id: &Id, label: &str, handle: &InstanceHandle) -> Result<()> {
        self.add_batch(collection_id, vec![(label.to_string(), handle.clone())])
            .await
    }

    async fn add_batch(&self, collection_id: &Id, items: Vec<(String, InstanceHandle)>) -> Result<()> {
        let instances = self.instances.read();
        if let Some((label, handle)) = items.iter().find(|(_, h)| !instances.contains_key(&h.uuid)) {
            return Err(OptimadeError::Store(format!(
                "Cannot add '{}': unknown instance {}",
                label, handle.uuid
            )));
        }

        let mut collections = self.collections.write();
        let collection = collections
            .get_mut(collection_id)
            .ok_or_else(|| OptimadeError::Store(format!("Collection {} not found", collection_id)))?;
        debug!("Adding {} instances to collection {}", items.len(), collection_id);
        for (label, handle) in items {
            collection.insert(label, handle.uuid);
        }
        Ok(())
    }

    async fn get_instance(&self, uuid: &Id) -> Result<Option<StoredInstance>> {
        Ok(self.instances.read().get(uuid).cloned())
    }

    async fn get_labelled(&self, collection_id: &Id, label: &str) -> Result<Option<StoredInstance>> {
        let uuid = match self.collections.read().get(collection_id).and_then(|c| c.get(label)) {
            Some(uuid) => uuid.clone(),
            None => return Ok(None),
        };
        self.get_instance(&uuid).await
    }

    async fn labels(&self, collection_id: &Id) -> Result<Option<Vec<String>>> {
        Ok(self
            .collections
            .read()
            .get(collection_id)
            .map(|c| c.members.iter().map(|(label, _)| label.clone()).collect()))
    }

    async fn get_type(&self, uri: &str) -> Result<Option<TypeDescriptor>> {
        Ok(self.types.read().get(uri).cloned())
    }

    async fn resolve_nested_type(&self, parent: &TypeDescriptor, path: &str) -> Result<Option<TypeDescriptor>> {
        let types = self.types.read();
        let mut current = parent.clone();
        for segment in path.split('.') {
            let next = current
                .property(segment)
                .and_then(|p| p.reference.as_ref())
                .and_then(|uri| types.get(uri));
            match next {
                Some(descriptor) => current = descriptor.clone(),
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    async fn nested_mapping(&self, root: &TypeDescriptor) -> Result<NestedEntityMapping> {
        Ok(NestedEntityMapping::build(root, &self.types.read()))
    }
}
