use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::{
    BaseInfoResource, EntryInfoResource, EntryResource, LinksResource, ReferenceResource,
    StructureResource,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetaQuery {
    pub representation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub query: ResponseMetaQuery,
    pub api_version: String,
    pub more_data_available: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single error object of an error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub meta: ResponseMeta,
    pub errors: Vec<ErrorObject>,
}

/// Any successful response. `errors` is captured only to reject mixed payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Success {
    pub meta: ResponseMeta,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub included: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Value>,
}

/// Successful response carrying `data` of a concrete type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub meta: ResponseMeta,
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub included: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Value>,
}

pub type StructureResponseOne = DataResponse<StructureResource>;
pub type StructureResponseMany = DataResponse<Vec<StructureResource>>;
pub type ReferenceResponseOne = DataResponse<ReferenceResource>;
pub type ReferenceResponseMany = DataResponse<Vec<ReferenceResource>>;
pub type EntryResponseOne = DataResponse<EntryResource>;
pub type EntryResponseMany = DataResponse<Vec<EntryResource>>;
pub type InfoResponse = DataResponse<BaseInfoResource>;
pub type EntryInfoResponse = DataResponse<EntryInfoResource>;
pub type LinksResponse = DataResponse<Vec<LinksResource>>;

/// The known response models a raw payload may be validated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseSchema {
    ErrorResponse,
    StructureResponseOne,
    StructureResponseMany,
    ReferenceResponseOne,
    ReferenceResponseMany,
    EntryResponseOne,
    EntryResponseMany,
    InfoResponse,
    EntryInfoResponse,
    LinksResponse,
    Success,
}

impl ResponseSchema {
    pub const ALL: [ResponseSchema; 11] = [
        ResponseSchema::ErrorResponse,
        ResponseSchema::StructureResponseOne,
        ResponseSchema::StructureResponseMany,
        ResponseSchema::ReferenceResponseOne,
        ResponseSchema::ReferenceResponseMany,
        ResponseSchema::EntryResponseOne,
        ResponseSchema::EntryResponseMany,
        ResponseSchema::InfoResponse,
        ResponseSchema::EntryInfoResponse,
        ResponseSchema::LinksResponse,
        ResponseSchema::Success,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ResponseSchema::ErrorResponse => "ErrorResponse",
            ResponseSchema::StructureResponseOne => "StructureResponseOne",
            ResponseSchema::StructureResponseMany => "StructureResponseMany",
            ResponseSchema::ReferenceResponseOne => "ReferenceResponseOne",
            ResponseSchema::ReferenceResponseMany => "ReferenceResponseMany",
            ResponseSchema::EntryResponseOne => "EntryResponseOne",
            ResponseSchema::EntryResponseMany => "EntryResponseMany",
            ResponseSchema::InfoResponse => "InfoResponse",
            ResponseSchema::EntryInfoResponse => "EntryInfoResponse",
            ResponseSchema::LinksResponse => "LinksResponse",
            ResponseSchema::Success => "Success",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|schema| schema.name() == name)
    }
}

impl std::fmt::Display for ResponseSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A validated response. Exactly one variant is active, decided during validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEnvelope {
    ErrorList(Vec<ErrorObject>),
    OneReference(Box<ReferenceResource>),
    ManyReferences(Vec<ReferenceResource>),
    OneStructure(Box<StructureResource>),
    ManyStructures(Vec<StructureResource>),
    /// `declared_type` is the entry type the validating schema implies, if any.
    GenericSuccess {
        data: Value,
        declared_type: Option<String>,
    },
}

impl ResponseEnvelope {
    pub fn variant_name(&self) -> &'static str {
        match self {
            ResponseEnvelope::ErrorList(_) => "ErrorList",
            ResponseEnvelope::OneReference(_) => "OneReference",
            ResponseEnvelope::ManyReferences(_) => "ManyReferences",
            ResponseEnvelope::OneStructure(_) => "OneStructure",
            ResponseEnvelope::ManyStructures(_) => "ManyStructures",
            ResponseEnvelope::GenericSuccess { .. } => "GenericSuccess",
        }
    }
}
