use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::model::{Id, InstanceHandle, NestedEntityMapping, StoredInstance, TypeDescriptor};

/// Outcome of one HTTP GET against an OPTIMADE server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status_code: u16,
    pub ok: bool,
    pub json: Value,
}

impl HttpResponse {
    /// True when the transport, the status code or the body signals an error.
    pub fn is_error(&self) -> bool {
        !self.ok
            || !(200..300).contains(&self.status_code)
            || self.json.get("errors").map_or(false, |errors| !errors.is_null())
    }
}

/// Fetches JSON documents over the network.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<HttpResponse>;
}

/// Semantic-instance store: typed instances grouped in labelled collections.
#[async_trait::async_trait]
pub trait InstanceStore: Send + Sync {
    /// Return `collection_id` if it exists, create it (or a fresh one) otherwise.
    async fn create_collection(&self, collection_id: Option<Id>) -> Result<Id>;

    /// Build an instance of `descriptor`. Reference properties hold instance UUIDs.
    async fn construct(
        &self,
        descriptor: &TypeDescriptor,
        dimensions: BTreeMap<String, usize>,
        properties: Map<String, Value>,
    ) -> Result<InstanceHandle>;

    async fn add_to_collection(&self, collection_id: &Id, label: &str, handle: &InstanceHandle) -> Result<()>;

    /// Append all labelled instances or none of them.
    async fn add_batch(&self, collection_id: &Id, items: Vec<(String, InstanceHandle)>) -> Result<()>;

    async fn get_instance(&self, uuid: &Id) -> Result<Option<StoredInstance>>;

    async fn get_labelled(&self, collection_id: &Id, label: &str) -> Result<Option<StoredInstance>>;

    /// Labels in insertion order, `None` for an unknown collection.
    async fn labels(&self, collection_id: &Id) -> Result<Option<Vec<String>>>;

    async fn get_type(&self, uri: &str) -> Result<Option<TypeDescriptor>>;

    /// Descriptor of the type the `path` property of `parent` refers to.
    async fn resolve_nested_type(&self, parent: &TypeDescriptor, path: &str) -> Result<Option<TypeDescriptor>>;

    async fn nested_mapping(&self, root: &TypeDescriptor) -> Result<NestedEntityMapping>;
}
