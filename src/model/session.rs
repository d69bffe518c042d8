use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{Id, OptimadeConfig, ResponseSchema};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimade_config: Option<OptimadeConfig>,
}

/// Result of the parse strategy: the validated response and the schema it validated against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimade_config: Option<OptimadeConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimade_response_model: Option<ResponseSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimade_response: Option<Value>,
}

/// An entry that could not be flattened and was left out of the collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryFailure {
    pub entry_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DliteSessionUpdate {
    pub collection_id: Option<Id>,
    /// Labels added to the collection by this call.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<EntryFailure>,
}

impl DliteSessionUpdate {
    pub fn new(collection_id: Id) -> Self {
        Self {
            collection_id: Some(collection_id),
            ..Default::default()
        }
    }
}
