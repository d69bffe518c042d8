use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::error::{OptimadeError, Result};
use crate::model::{Id, StoredInstance, TypeDescriptor};

/// Dimension block of the single-entity structure record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatDimensions {
    pub nelements: usize,
    pub dimensionality: usize,
    pub nsites: usize,
    pub nstructure_features: usize,
    pub nassemblies: usize,
    pub nspecies: usize,
}

impl FlatDimensions {
    pub fn to_map(&self) -> BTreeMap<String, usize> {
        BTreeMap::from([
            ("nelements".to_string(), self.nelements),
            ("dimensionality".to_string(), self.dimensionality),
            ("nsites".to_string(), self.nsites),
            ("nstructure_features".to_string(), self.nstructure_features),
            ("nassemblies".to_string(), self.nassemblies),
            ("nspecies".to_string(), self.nspecies),
        ])
    }
}

/// Species transposed into parallel sequences indexed by species position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatSpecies {
    pub name: Vec<String>,
    pub chemical_symbols: Vec<String>,
    pub concentration: Vec<String>,
    pub mass: Vec<String>,
    pub original_name: Vec<String>,
    pub attached: Vec<String>,
    pub nattached: Vec<String>,
}

impl FlatSpecies {
    pub const FIELDS: [&'static str; 7] = [
        "species_name",
        "species_chemical_symbols",
        "species_concentration",
        "species_mass",
        "species_original_name",
        "species_attached",
        "species_nattached",
    ];

    fn columns(&self) -> [&Vec<String>; 7] {
        [
            &self.name,
            &self.chemical_symbols,
            &self.concentration,
            &self.mass,
            &self.original_name,
            &self.attached,
            &self.nattached,
        ]
    }

    pub fn len(&self) -> usize {
        self.name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

/// Assemblies transposed into parallel sequences indexed by assembly position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatAssemblies {
    pub sites_in_groups: Vec<String>,
    pub group_probabilities: Vec<String>,
}

impl FlatAssemblies {
    pub const FIELDS: [&'static str; 2] = [
        "assemblies_sites_in_groups",
        "assemblies_group_probabilities",
    ];

    pub fn len(&self) -> usize {
        self.sites_in_groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites_in_groups.is_empty()
    }
}

/// A structure encoded as one self-contained record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatStructureRecord {
    pub id: Id,
    pub resource_type: String,
    pub dimensions: FlatDimensions,
    pub species: FlatSpecies,
    pub assemblies: FlatAssemblies,
    /// Remaining scalar attributes, `structure_features` as string tokens.
    pub attributes: Map<String, Value>,
}

fn is_flat_entity(meta: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^http://onto-ns\.com/meta/[0-9]+(\.[0-9]+)?(\.[0-9]+)?/OPTIMADEStructureResource")
            .ok()
    })
    .as_ref()
    .map_or(false, |re| re.is_match(meta))
}

impl FlatStructureRecord {
    /// Property mapping as handed to the semantic-instance store.
    pub fn properties(&self) -> Map<String, Value> {
        let mut properties = self.attributes.clone();
        properties.insert("id".to_string(), Value::String(self.id.clone()));
        properties.insert("type".to_string(), Value::String(self.resource_type.clone()));

        for (field, column) in FlatSpecies::FIELDS.iter().zip(self.species.columns()) {
            properties.insert(field.to_string(), string_array(column));
        }
        properties.insert(
            FlatAssemblies::FIELDS[0].to_string(),
            string_array(&self.assemblies.sites_in_groups),
        );
        properties.insert(
            FlatAssemblies::FIELDS[1].to_string(),
            string_array(&self.assemblies.group_probabilities),
        );
        properties
    }

    /// Rebuild the record from a stored single-entity instance.
    pub fn from_instance(instance: &StoredInstance) -> Result<Self> {
        if !is_flat_entity(&instance.meta) {
            return Err(OptimadeError::Configuration(format!(
                "Instance {} is not an OPTIMADEStructureResource instance (meta: {})",
                instance.uuid, instance.meta
            )));
        }

        let dimension = |name: &str| -> Result<usize> {
            instance.dimensions.get(name).copied().ok_or_else(|| {
                OptimadeError::Configuration(format!(
                    "Instance {} lacks the '{}' dimension",
                    instance.uuid, name
                ))
            })
        };
        let column = |name: &str| -> Result<Vec<String>> {
            match instance.properties.get(name) {
                None | Some(Value::Null) => Ok(Vec::new()),
                Some(value) => serde_json::from_value(value.clone()).map_err(|err| {
                    OptimadeError::Parse(format!("property '{}' is not a string array: {}", name, err))
                }),
            }
        };

        let dimensions = FlatDimensions {
            nelements: dimension("nelements")?,
            dimensionality: dimension("dimensionality")?,
            nsites: dimension("nsites")?,
            nstructure_features: dimension("nstructure_features")?,
            nassemblies: dimension("nassemblies")?,
            nspecies: dimension("nspecies")?,
        };

        let species = FlatSpecies {
            name: column("species_name")?,
            chemical_symbols: column("species_chemical_symbols")?,
            concentration: column("species_concentration")?,
            mass: column("species_mass")?,
            original_name: column("species_original_name")?,
            attached: column("species_attached")?,
            nattached: column("species_nattached")?,
        };
        let assemblies = FlatAssemblies {
            sites_in_groups: column("assemblies_sites_in_groups")?,
            group_probabilities: column("assemblies_group_probabilities")?,
        };

        let mut attributes = instance.properties.clone();
        attributes.retain(|key, _| {
            key != "id"
                && key != "type"
                && !FlatSpecies::FIELDS.contains(&key.as_str())
                && !FlatAssemblies::FIELDS.contains(&key.as_str())
        });

        let text = |name: &str| {
            instance
                .properties
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Ok(Self {
            id: text("id"),
            resource_type: text("type"),
            dimensions,
            species,
            assemblies,
            attributes,
        })
    }
}

fn string_array(values: &[String]) -> Value {
    Value::Array(values.iter().cloned().map(Value::String).collect())
}

/// One instance-to-be of the nested shape.
#[derive(Debug, Clone, PartialEq)]
pub struct SubRecord {
    pub entity: TypeDescriptor,
    pub dimensions: BTreeMap<String, usize>,
    pub properties: Map<String, Value>,
}

/// A structure encoded as linked sub-instances: root → attributes → species/assemblies.
#[derive(Debug, Clone, PartialEq)]
pub struct NestedStructureRecord {
    pub id: Id,
    pub resource_type: String,
    pub entity: TypeDescriptor,
    /// `species` and `assemblies` are held in the fields below, not in these properties.
    pub attributes: SubRecord,
    pub species: Vec<SubRecord>,
    pub assemblies: Vec<SubRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlattenedStructure {
    Flat(FlatStructureRecord),
    Nested(NestedStructureRecord),
}

impl FlattenedStructure {
    pub fn id(&self) -> &str {
        match self {
            FlattenedStructure::Flat(record) => &record.id,
            FlattenedStructure::Nested(record) => &record.id,
        }
    }
}
