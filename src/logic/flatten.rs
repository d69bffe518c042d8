use itertools::Itertools;
use log::{debug, error};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{OptimadeError, Result};
use crate::model::{
    is_internal_field, Assembly, EntityShape, FlatAssemblies, FlatDimensions, FlatSpecies,
    FlatStructureRecord, FlattenedStructure, NestedEntityMapping, NestedStructureRecord,
    ShapeDescriptor, Species, StructureAttributes, StructureResource, SubRecord, TypeDescriptor,
    DIMENSIONALITY,
};

/// Separates list items inside one encoded field.
pub const ITEM_SEPARATOR: &str = ",";
/// Separates the site groups of one assembly.
pub const GROUP_SEPARATOR: &str = ";";

/// Attributes that are held elsewhere in the target record.
const EXCLUDED_ATTRIBUTES: [&str; 4] = ["species", "assemblies", "nelements", "nsites"];

pub const ATTRIBUTES_PATH: &str = "attributes";
pub const SPECIES_PATH: &str = "attributes.species";
pub const ASSEMBLIES_PATH: &str = "attributes.assemblies";

/// Flatten one structure into the shape selected by `shape`.
pub fn flatten(entry: &StructureResource, shape: &ShapeDescriptor) -> Result<FlattenedStructure> {
    match shape.shape {
        EntityShape::SingleEntity => flatten_single(entry).map(FlattenedStructure::Flat),
        EntityShape::MultiEntity => {
            flatten_nested(entry, &shape.entity, &shape.nested).map(FlattenedStructure::Nested)
        }
    }
}

/// Fail on broken length relationships before anything is encoded.
pub fn check_collections(entry: &StructureResource) -> Result<()> {
    let attributes = &entry.attributes;
    if let (Some(nsites), Some(sites)) = (attributes.nsites, attributes.species_at_sites.as_ref()) {
        if sites.len() as u64 != nsites {
            return Err(OptimadeError::malformed(
                &entry.id,
                format!("{} species_at_sites for nsites = {}", sites.len(), nsites),
            ));
        }
    }
    for (index, species) in entry.attributes.species().iter().enumerate() {
        species.check().map_err(|reason| {
            OptimadeError::malformed(&entry.id, format!("species[{}]: {}", index, reason))
        })?;
    }
    for (index, assembly) in entry.attributes.assemblies().iter().enumerate() {
        assembly.check().map_err(|reason| {
            OptimadeError::malformed(&entry.id, format!("assemblies[{}]: {}", index, reason))
        })?;
    }
    Ok(())
}

fn nelements(attributes: &StructureAttributes) -> usize {
    attributes
        .nelements
        .map(|n| n as usize)
        .or_else(|| attributes.elements.as_ref().map(Vec::len))
        .unwrap_or(0)
}

fn nsites(attributes: &StructureAttributes) -> usize {
    attributes
        .nsites
        .map(|n| n as usize)
        .or_else(|| attributes.species_at_sites.as_ref().map(Vec::len))
        .or_else(|| attributes.cartesian_site_positions.as_ref().map(Vec::len))
        .unwrap_or(0)
}

/// Scalar attributes copied verbatim: no sub-collections, no recomputed counts, no internal fields.
pub fn scalar_attributes(attributes: &StructureAttributes) -> Result<Map<String, Value>> {
    let mut properties = match serde_json::to_value(attributes)? {
        Value::Object(map) => map,
        other => {
            return Err(OptimadeError::Parse(format!(
                "structure attributes serialised to a non-object: {}",
                other
            )))
        }
    };
    properties.retain(|key, value| {
        !EXCLUDED_ATTRIBUTES.contains(&key.as_str()) && !is_internal_field(key) && !value.is_null()
    });
    properties.insert(
        "structure_features".to_string(),
        Value::Array(
            attributes
                .structure_features
                .iter()
                .map(|feature| Value::String(feature.as_str().to_string()))
                .collect(),
        ),
    );
    Ok(properties)
}

fn join_floats(values: &[f64]) -> String {
    values.iter().join(ITEM_SEPARATOR)
}

pub fn encode_species(species: &[Species]) -> FlatSpecies {
    let mut flat = FlatSpecies::default();
    for item in species {
        flat.name.push(item.name.clone());
        flat.chemical_symbols.push(item.chemical_symbols.join(ITEM_SEPARATOR));
        flat.concentration.push(join_floats(&item.concentration));
        flat.mass.push(item.mass.as_deref().map(join_floats).unwrap_or_default());
        flat.original_name.push(item.original_name.clone().unwrap_or_default());
        flat.attached.push(
            item.attached
                .as_ref()
                .map(|attached| attached.join(ITEM_SEPARATOR))
                .unwrap_or_default(),
        );
        flat.nattached.push(
            item.nattached
                .as_ref()
                .map(|nattached| nattached.iter().join(ITEM_SEPARATOR))
                .unwrap_or_default(),
        );
    }
    flat
}

pub fn encode_assemblies(assemblies: &[Assembly]) -> FlatAssemblies {
    let mut flat = FlatAssemblies::default();
    for assembly in assemblies {
        flat.sites_in_groups.push(
            assembly
                .sites_in_groups
                .iter()
                .map(|group| group.iter().join(ITEM_SEPARATOR))
                .join(GROUP_SEPARATOR),
        );
        flat.group_probabilities
            .push(join_floats(&assembly.group_probabilities));
    }
    flat
}

/// Single self-contained record with species and assemblies as parallel sequences.
pub fn flatten_single(entry: &StructureResource) -> Result<FlatStructureRecord> {
    check_collections(entry)?;
    let attributes = &entry.attributes;
    let species = encode_species(attributes.species());
    let assemblies = encode_assemblies(attributes.assemblies());

    let dimensions = FlatDimensions {
        nelements: nelements(attributes),
        dimensionality: DIMENSIONALITY,
        nsites: nsites(attributes),
        nstructure_features: attributes.structure_features.len(),
        nassemblies: assemblies.len(),
        nspecies: species.len(),
    };
    debug!("Flattened structure {} with dimensions {:?}", entry.id, dimensions);

    Ok(FlatStructureRecord {
        id: entry.id.clone(),
        resource_type: entry.resource_type.clone(),
        dimensions,
        species,
        assemblies,
        attributes: scalar_attributes(attributes)?,
    })
}

fn nested_descriptor<'a>(
    nested: &'a NestedEntityMapping,
    path: &str,
    entry_id: &str,
) -> Result<&'a TypeDescriptor> {
    nested.get(path).ok_or_else(|| {
        error!(
            "No entity for '{}' while flattening {}; known paths: {:?}",
            path,
            entry_id,
            nested.paths()
        );
        OptimadeError::SchemaInconsistency(format!("Could not find entity for '{}'", path))
    })
}

/// Linked sub-records: root → attributes → species and assemblies.
pub fn flatten_nested(
    entry: &StructureResource,
    entity: &TypeDescriptor,
    nested: &NestedEntityMapping,
) -> Result<NestedStructureRecord> {
    check_collections(entry)?;
    let attributes = &entry.attributes;

    let species = if attributes.species().is_empty() {
        Vec::new()
    } else {
        let descriptor = nested_descriptor(nested, SPECIES_PATH, &entry.id)?;
        attributes
            .species()
            .iter()
            .map(|item| {
                Ok(SubRecord {
                    entity: descriptor.clone(),
                    dimensions: BTreeMap::from([
                        ("nelements".to_string(), item.nelements()),
                        ("nattached_elements".to_string(), item.nattached_elements()),
                    ]),
                    properties: object(serde_json::to_value(item)?),
                })
            })
            .collect::<Result<Vec<_>>>()?
    };

    let assemblies = if attributes.assemblies().is_empty() {
        Vec::new()
    } else {
        let descriptor = nested_descriptor(nested, ASSEMBLIES_PATH, &entry.id)?;
        attributes
            .assemblies()
            .iter()
            .map(|assembly| {
                Ok(SubRecord {
                    entity: descriptor.clone(),
                    dimensions: BTreeMap::from([
                        ("ngroups".to_string(), assembly.ngroups()),
                        ("nsites".to_string(), assembly.nsites()),
                    ]),
                    properties: object(serde_json::to_value(assembly)?),
                })
            })
            .collect::<Result<Vec<_>>>()?
    };

    let attributes_descriptor = nested_descriptor(nested, ATTRIBUTES_PATH, &entry.id)?;
    let attributes_record = SubRecord {
        entity: attributes_descriptor.clone(),
        dimensions: BTreeMap::from([
            ("nelements".to_string(), nelements(attributes)),
            ("dimensionality".to_string(), DIMENSIONALITY),
            ("nsites".to_string(), nsites(attributes)),
            ("nspecies".to_string(), species.len()),
            ("nassemblies".to_string(), assemblies.len()),
            (
                "nstructure_features".to_string(),
                attributes.structure_features.len(),
            ),
        ]),
        properties: scalar_attributes(attributes)?,
    };

    Ok(NestedStructureRecord {
        id: entry.id.clone(),
        resource_type: entry.resource_type.clone(),
        entity: entity.clone(),
        attributes: attributes_record,
        species,
        assemblies,
    })
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::entities::{builtin_registry, structure_descriptor};
    use serde_json::json;

    fn structure(value: Value) -> StructureResource {
        serde_json::from_value(value).unwrap()
    }

    fn disordered() -> StructureResource {
        structure(json!({
            "id": "mpf_2",
            "type": "structures",
            "attributes": {
                "nelements": 2,
                "nsites": 2,
                "elements": ["O", "Si"],
                "structure_features": ["disorder", "assemblies"],
                "_exmpl_band_gap": 1.2,
                "chemical_formula_reduced": "OSi",
                "species": [
                    {"name": "A", "chemical_symbols": ["Si", "O"], "concentration": [0.5, 0.5]},
                    {"name": "B", "chemical_symbols": ["O"], "concentration": [1.0],
                     "mass": [15.999], "original_name": "Ox", "attached": ["H"], "nattached": [2]}
                ],
                "assemblies": [
                    {"sites_in_groups": [[0], [1, 2]], "group_probabilities": [0.3, 0.7]}
                ]
            }
        }))
    }

    #[test]
    fn test_single_structure_without_sub_collections() {
        let entry = structure(json!({
            "id": "mpf_1",
            "type": "structures",
            "attributes": {"nelements": 2, "nsites": 4, "elements": ["Si", "O"], "structure_features": []}
        }));
        let record = flatten_single(&entry).unwrap();
        assert_eq!(
            record.dimensions,
            FlatDimensions {
                nelements: 2,
                dimensionality: 3,
                nsites: 4,
                nstructure_features: 0,
                nassemblies: 0,
                nspecies: 0,
            }
        );
        let properties = record.properties();
        assert_eq!(properties["species_name"], json!([]));
        assert_eq!(properties["assemblies_group_probabilities"], json!([]));
        assert_eq!(properties["elements"], json!(["Si", "O"]));
        assert!(!properties.contains_key("nelements"));
    }

    #[test]
    fn test_species_encoding() {
        let entry = structure(json!({
            "id": "mpf_3",
            "type": "structures",
            "attributes": {
                "structure_features": [],
                "species": [{"name": "A", "chemical_symbols": ["Si", "O"], "concentration": [0.5, 0.5]}]
            }
        }));
        let record = flatten_single(&entry).unwrap();
        assert_eq!(record.species.name, vec!["A"]);
        assert_eq!(record.species.chemical_symbols, vec!["Si,O"]);
        assert_eq!(record.species.concentration, vec!["0.5,0.5"]);
        assert_eq!(record.species.mass, vec![""]);
        assert_eq!(record.species.attached, vec![""]);
        assert_eq!(record.species.nattached, vec![""]);
        assert_eq!(record.dimensions.nspecies, 1);
    }

    #[test]
    fn test_assembly_and_feature_encoding() {
        let record = flatten_single(&disordered()).unwrap();
        assert_eq!(record.assemblies.sites_in_groups, vec!["0;1,2"]);
        assert_eq!(record.assemblies.group_probabilities, vec!["0.3,0.7"]);
        assert_eq!(record.species.nattached, vec!["", "2"]);
        assert_eq!(record.attributes["structure_features"], json!(["disorder", "assemblies"]));
        assert!(!record.attributes.contains_key("_exmpl_band_gap"));
        assert_eq!(record.dimensions.nstructure_features, 2);
    }

    #[test]
    fn test_dimension_consistency() {
        let record = flatten_single(&disordered()).unwrap();
        let properties = record.properties();
        assert_eq!(
            properties["species_name"].as_array().unwrap().len(),
            record.dimensions.nspecies
        );
        assert_eq!(
            properties["assemblies_sites_in_groups"].as_array().unwrap().len(),
            record.dimensions.nassemblies
        );
    }

    #[test]
    fn test_concentration_mismatch_is_malformed() {
        let entry = structure(json!({
            "id": "bad_1",
            "type": "structures",
            "attributes": {
                "structure_features": [],
                "species": [{"name": "A", "chemical_symbols": ["Si", "O"], "concentration": [1.0]}]
            }
        }));
        match flatten_single(&entry) {
            Err(OptimadeError::MalformedRecord { entry_id, reason }) => {
                assert_eq!(entry_id, "bad_1");
                assert!(reason.contains("concentration"));
            }
            other => panic!("expected MalformedRecord, got {:?}", other),
        }
    }

    #[test]
    fn test_attached_without_nattached_is_malformed() {
        let entry = structure(json!({
            "id": "bad_2",
            "type": "structures",
            "attributes": {
                "structure_features": ["site_attachments"],
                "species": [{"name": "C", "chemical_symbols": ["C"], "concentration": [1.0], "attached": ["H"]}]
            }
        }));
        assert!(matches!(
            flatten_single(&entry),
            Err(OptimadeError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_species_at_sites_must_match_nsites() {
        let entry = structure(json!({
            "id": "bad_3",
            "type": "structures",
            "attributes": {
                "nsites": 3,
                "species_at_sites": ["Si", "O"],
                "structure_features": [],
                "species": [
                    {"name": "Si", "chemical_symbols": ["Si"], "concentration": [1.0]},
                    {"name": "O", "chemical_symbols": ["O"], "concentration": [1.0]}
                ]
            }
        }));
        match flatten_single(&entry) {
            Err(OptimadeError::MalformedRecord { entry_id, reason }) => {
                assert_eq!(entry_id, "bad_3");
                assert!(reason.contains("species_at_sites"));
            }
            other => panic!("expected MalformedRecord, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_shape() {
        let registry = builtin_registry();
        let root = structure_descriptor();
        let shape = ShapeDescriptor::multi(root.clone(), NestedEntityMapping::build(&root, &registry));

        let nested = match flatten(&disordered(), &shape).unwrap() {
            FlattenedStructure::Nested(nested) => nested,
            other => panic!("expected nested record, got {:?}", other),
        };
        assert_eq!(nested.species.len(), 2);
        assert_eq!(nested.species[1].dimensions["nattached_elements"], 1);
        assert_eq!(nested.species[0].dimensions["nelements"], 2);
        assert_eq!(nested.assemblies[0].dimensions["ngroups"], 2);
        assert_eq!(nested.assemblies[0].dimensions["nsites"], 2);
        assert_eq!(nested.attributes.dimensions["nspecies"], 2);
        assert!(!nested.attributes.properties.contains_key("species"));
        assert!(!nested.species[0].properties.contains_key("mass"));
    }

    fn without_entity(path: &str) -> ShapeDescriptor {
        let registry = builtin_registry();
        let root = structure_descriptor();
        let mut mapping = NestedEntityMapping::build(&root, &registry);
        mapping.0.remove(path);
        ShapeDescriptor::multi(root, mapping)
    }

    fn inconsistency_path(shape: &ShapeDescriptor) -> String {
        match flatten(&disordered(), shape) {
            Err(OptimadeError::SchemaInconsistency(message)) => message,
            other => panic!("expected SchemaInconsistency, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_shape_without_species_entity() {
        assert!(inconsistency_path(&without_entity(SPECIES_PATH)).contains("'attributes.species'"));
    }

    #[test]
    fn test_nested_shape_without_assemblies_entity() {
        assert!(inconsistency_path(&without_entity(ASSEMBLIES_PATH)).contains("'attributes.assemblies'"));
    }

    #[test]
    fn test_nested_shape_without_attributes_entity() {
        assert!(inconsistency_path(&without_entity(ATTRIBUTES_PATH)).contains("'attributes'"));
    }
}
