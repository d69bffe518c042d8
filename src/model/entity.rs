use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{OptimadeError, Result};
use crate::model::Id;

/// Flat single-entity structure type.
pub const STRUCTURE_RESOURCE_ENTITY: &str = "http://onto-ns.com/meta/1.0/OPTIMADEStructureResource";
/// Root of the nested multi-entity structure family.
pub const STRUCTURE_ENTITY: &str = "http://onto-ns.com/meta/1.0.1/OPTIMADEStructure";
pub const STRUCTURE_ATTRIBUTES_ENTITY: &str =
    "http://onto-ns.com/meta/1.0.1/OPTIMADEStructureAttributes";
pub const STRUCTURE_SPECIES_ENTITY: &str = "http://onto-ns.com/meta/1.0.1/OPTIMADEStructureSpecies";
pub const STRUCTURE_ASSEMBLY_ENTITY: &str =
    "http://onto-ns.com/meta/1.0.1/OPTIMADEStructureAssembly";

/// Entities a structure can be parsed into. The first one is the default.
pub const SUPPORTED_ENTITIES: [&str; 2] = [STRUCTURE_ENTITY, STRUCTURE_RESOURCE_ENTITY];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    String,
    Float,
    Int,
    Bool,
    /// Reference to an instance of another type.
    Ref,
    /// Free-form JSON value.
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PropertyKind,
    /// Dimension names the property is shaped by, outermost first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shape: Vec<String>,
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PropertyDescriptor {
    pub fn new(name: &str, kind: PropertyKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            shape: Vec::new(),
            reference: None,
            description: None,
        }
    }

    pub fn shaped(mut self, dims: &[&str]) -> Self {
        self.shape = dims.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn referencing(mut self, uri: &str) -> Self {
        self.kind = PropertyKind::Ref;
        self.reference = Some(uri.to_string());
        self
    }
}

/// Type descriptor of a semantic instance: its URI, dimensions and properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub dimensions: Vec<String>,
    pub properties: Vec<PropertyDescriptor>,
}

impl TypeDescriptor {
    /// Final path segment of the URI, e.g. `OPTIMADEStructure`.
    pub fn name(&self) -> &str {
        entity_name(&self.uri)
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn references(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties.iter().filter_map(|p| match (&p.kind, &p.reference) {
            (PropertyKind::Ref, Some(uri)) => Some((p.name.as_str(), uri.as_str())),
            _ => None,
        })
    }
}

/// Strip trailing `/` and `#` and return the last URI path segment.
pub fn entity_name(uri: &str) -> &str {
    let trimmed = uri.trim_end_matches(['/', '#']);
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Target encoding selected by the entity URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityShape {
    /// One self-contained record with parallel-array encoded sub-collections.
    SingleEntity,
    /// Linked sub-instances for attributes, species and assemblies.
    MultiEntity,
}

impl EntityShape {
    pub fn from_uri(uri: &str) -> Result<Self> {
        match entity_name(uri) {
            "OPTIMADEStructureResource" => Ok(EntityShape::SingleEntity),
            "OPTIMADEStructure" => Ok(EntityShape::MultiEntity),
            other => Err(OptimadeError::Configuration(format!(
                "Unsupported entity '{}' ({}). Supported entities: {}",
                other,
                uri,
                SUPPORTED_ENTITIES.join(", ")
            ))),
        }
    }
}

/// Dotted property path (e.g. `attributes.species`) to the descriptor of the nested type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NestedEntityMapping(pub BTreeMap<String, TypeDescriptor>);

impl NestedEntityMapping {
    pub fn get(&self, path: &str) -> Option<&TypeDescriptor> {
        self.0.get(path)
    }

    pub fn insert(&mut self, path: String, descriptor: TypeDescriptor) {
        self.0.insert(path, descriptor);
    }

    pub fn paths(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    /// Walk the `ref` properties of `root` and record every reachable nested type.
    ///
    /// References missing from `registry` are skipped. A type already on the
    /// current path is not entered again.
    pub fn build(root: &TypeDescriptor, registry: &BTreeMap<String, TypeDescriptor>) -> Self {
        let mut mapping = Self::default();
        let mut visiting = vec![root.uri.clone()];
        mapping.collect(root, "", registry, &mut visiting);
        mapping
    }

    fn collect(
        &mut self,
        parent: &TypeDescriptor,
        prefix: &str,
        registry: &BTreeMap<String, TypeDescriptor>,
        visiting: &mut Vec<String>,
    ) {
        for (name, uri) in parent.references() {
            let Some(descriptor) = registry.get(uri) else {
                continue;
            };
            if visiting.iter().any(|seen| seen == uri) {
                continue;
            }
            let path = if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{}.{}", prefix, name)
            };
            self.insert(path.clone(), descriptor.clone());
            visiting.push(uri.to_string());
            self.collect(descriptor, &path, registry, visiting);
            visiting.pop();
        }
    }
}

/// The entity descriptor plus everything the flattener needs to produce its shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeDescriptor {
    pub shape: EntityShape,
    pub entity: TypeDescriptor,
    pub nested: NestedEntityMapping,
}

impl ShapeDescriptor {
    pub fn single(entity: TypeDescriptor) -> Self {
        Self {
            shape: EntityShape::SingleEntity,
            entity,
            nested: NestedEntityMapping::default(),
        }
    }

    pub fn multi(entity: TypeDescriptor, nested: NestedEntityMapping) -> Self {
        Self {
            shape: EntityShape::MultiEntity,
            entity,
            nested,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceHandle {
    pub uuid: Id,
    pub meta: String,
}

/// An instance as held by the semantic-instance store. Reference properties hold UUIDs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredInstance {
    pub uuid: Id,
    pub meta: String,
    pub dimensions: BTreeMap<String, usize>,
    pub properties: Map<String, Value>,
}
