use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::Id;

/// Flags describing which optional structure features an entry makes use of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureFeature {
    Disorder,
    ImplicitAtoms,
    SiteAttachments,
    Assemblies,
}

impl StructureFeature {
    /// Canonical string token as used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            StructureFeature::Disorder => "disorder",
            StructureFeature::ImplicitAtoms => "implicit_atoms",
            StructureFeature::SiteAttachments => "site_attachments",
            StructureFeature::Assemblies => "assemblies",
        }
    }
}

/// One chemical species occupying sites in a structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Species {
    pub name: String,
    pub chemical_symbols: Vec<String>,
    pub concentration: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mass: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attached: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nattached: Option<Vec<u64>>,
}

impl Species {
    pub fn nelements(&self) -> usize {
        self.chemical_symbols.len()
    }

    pub fn nattached_elements(&self) -> usize {
        self.attached.as_ref().map_or(0, Vec::len)
    }

    /// Check the length relationships between the species fields.
    pub fn check(&self) -> Result<(), String> {
        if self.chemical_symbols.is_empty() {
            return Err(format!("species '{}' has no chemical_symbols", self.name));
        }
        if self.concentration.len() != self.chemical_symbols.len() {
            return Err(format!(
                "species '{}' has {} concentration values for {} chemical_symbols",
                self.name,
                self.concentration.len(),
                self.chemical_symbols.len()
            ));
        }
        if let Some(mass) = &self.mass {
            if mass.len() != self.chemical_symbols.len() {
                return Err(format!(
                    "species '{}' has {} mass values for {} chemical_symbols",
                    self.name,
                    mass.len(),
                    self.chemical_symbols.len()
                ));
            }
        }
        match (&self.attached, &self.nattached) {
            (Some(attached), Some(nattached)) if attached.len() != nattached.len() => {
                Err(format!(
                    "species '{}' has {} nattached values for {} attached elements",
                    self.name,
                    nattached.len(),
                    attached.len()
                ))
            }
            (Some(_), None) => Err(format!(
                "species '{}' sets attached without nattached",
                self.name
            )),
            (None, Some(_)) => Err(format!(
                "species '{}' sets nattached without attached",
                self.name
            )),
            _ => Ok(()),
        }
    }
}

/// Probabilistic grouping of sites among disordered species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assembly {
    pub sites_in_groups: Vec<Vec<u64>>,
    pub group_probabilities: Vec<f64>,
}

impl Assembly {
    pub fn ngroups(&self) -> usize {
        self.group_probabilities.len()
    }

    pub fn nsites(&self) -> usize {
        self.sites_in_groups.len()
    }

    pub fn check(&self) -> Result<(), String> {
        if self.group_probabilities.len() != self.sites_in_groups.len() {
            return Err(format!(
                "assembly has {} group_probabilities for {} sites_in_groups",
                self.group_probabilities.len(),
                self.sites_in_groups.len()
            ));
        }
        // Neither an assembly without groups nor an empty group has a delimited
        // encoding that survives the round trip.
        if self.sites_in_groups.is_empty() {
            return Err("assembly has no site groups".to_string());
        }
        if self.sites_in_groups.iter().any(Vec::is_empty) {
            return Err("assembly contains an empty site group".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub immutable_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elements: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nelements: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elements_ratios: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chemical_formula_descriptive: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chemical_formula_reduced: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chemical_formula_hill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chemical_formula_anonymous: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension_types: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nperiodic_dimensions: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lattice_vectors: Option<Vec<Vec<Option<f64>>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_group_symmetry_operations_xyz: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_group_symbol_hall: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_group_symbol_hermann_mauguin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_group_symbol_hermann_mauguin_extended: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_group_it_number: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cartesian_site_positions: Option<Vec<Vec<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nsites: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub species_at_sites: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub species: Option<Vec<Species>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assemblies: Option<Vec<Assembly>>,
    pub structure_features: Vec<StructureFeature>,
    /// Provider-specific and otherwise undeclared attributes.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StructureAttributes {
    pub fn species(&self) -> &[Species] {
        self.species.as_deref().unwrap_or_default()
    }

    pub fn assemblies(&self) -> &[Assembly] {
        self.assemblies.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureResource {
    pub id: Id,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub attributes: StructureAttributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firstname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastname: Option<String>,
}

/// Bibliographic attributes of a reference entry; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub immutable_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<Person>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editors: Option<Vec<Person>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annote: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booktitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crossref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub howpublished: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bib_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceResource {
    pub id: Id,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub attributes: ReferenceAttributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Value>,
}

/// Any entry resource, with untyped attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryResource {
    pub id: Id,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    Child,
    Root,
    External,
    Providers,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinksAttributes {
    pub name: String,
    pub description: String,
    /// Either a plain URL string or a JSON:API link object.
    #[serde(default)]
    pub base_url: Option<Value>,
    #[serde(default)]
    pub homepage: Option<Value>,
    pub link_type: LinkType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_aggregate_reason: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinksResource {
    pub id: Id,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub attributes: LinksAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableApiVersion {
    pub url: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseInfoAttributes {
    pub api_version: String,
    pub available_api_versions: Vec<AvailableApiVersion>,
    #[serde(default)]
    pub formats: Vec<String>,
    pub available_endpoints: Vec<String>,
    pub entry_types_by_format: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_index: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseInfoResource {
    pub id: Id,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub attributes: BaseInfoAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryInfoResource {
    #[serde(default)]
    pub formats: Vec<String>,
    pub description: String,
    pub properties: Map<String, Value>,
    pub output_fields_by_format: Map<String, Value>,
}
