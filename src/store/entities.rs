use std::collections::BTreeMap;

use crate::model::{
    PropertyDescriptor, PropertyKind, TypeDescriptor, STRUCTURE_ASSEMBLY_ENTITY,
    STRUCTURE_ATTRIBUTES_ENTITY, STRUCTURE_ENTITY, STRUCTURE_RESOURCE_ENTITY,
    STRUCTURE_SPECIES_ENTITY,
};

fn prop(name: &str, kind: PropertyKind) -> PropertyDescriptor {
    PropertyDescriptor::new(name, kind)
}

fn descriptor(uri: &str, description: &str, dimensions: &[&str], properties: Vec<PropertyDescriptor>) -> TypeDescriptor {
    TypeDescriptor {
        uri: uri.to_string(),
        description: Some(description.to_string()),
        dimensions: dimensions.iter().map(|d| d.to_string()).collect(),
        properties,
    }
}

/// Scalar structure attributes shared by the flat record and the nested attributes type.
fn structure_attribute_properties() -> Vec<PropertyDescriptor> {
    use PropertyKind::{Float, Int, String as Text};
    vec![
        prop("immutable_id", Text),
        prop("last_modified", Text),
        prop("elements", Text).shaped(&["nelements"]),
        prop("elements_ratios", Float).shaped(&["nelements"]),
        prop("chemical_formula_descriptive", Text),
        prop("chemical_formula_reduced", Text),
        prop("chemical_formula_hill", Text),
        prop("chemical_formula_anonymous", Text),
        prop("dimension_types", Int).shaped(&["dimensionality"]),
        prop("nperiodic_dimensions", Int),
        prop("lattice_vectors", Float).shaped(&["dimensionality", "dimensionality"]),
        prop("space_group_symmetry_operations_xyz", Text),
        prop("space_group_symbol_hall", Text),
        prop("space_group_symbol_hermann_mauguin", Text),
        prop("space_group_symbol_hermann_mauguin_extended", Text),
        prop("space_group_it_number", Int),
        prop("cartesian_site_positions", Float).shaped(&["nsites", "dimensionality"]),
        prop("species_at_sites", Text).shaped(&["nsites"]),
        prop("structure_features", Text).shaped(&["nstructure_features"]),
    ]
}

/// Single-entity structure type with species and assemblies held as parallel string arrays.
pub fn structure_resource_descriptor() -> TypeDescriptor {
    let mut properties = vec![prop("id", PropertyKind::String), prop("type", PropertyKind::String)];
    properties.extend(structure_attribute_properties());
    for field in [
        "species_name",
        "species_chemical_symbols",
        "species_concentration",
        "species_mass",
        "species_original_name",
        "species_attached",
        "species_nattached",
    ] {
        properties.push(prop(field, PropertyKind::String).shaped(&["nspecies"]));
    }
    for field in ["assemblies_sites_in_groups", "assemblies_group_probabilities"] {
        properties.push(prop(field, PropertyKind::String).shaped(&["nassemblies"]));
    }
    descriptor(
        STRUCTURE_RESOURCE_ENTITY,
        "An OPTIMADE structure resource as one self-contained record.",
        &[
            "nelements",
            "dimensionality",
            "nsites",
            "nstructure_features",
            "nassemblies",
            "nspecies",
        ],
        properties,
    )
}

/// Root of the nested structure family.
pub fn structure_descriptor() -> TypeDescriptor {
    descriptor(
        STRUCTURE_ENTITY,
        "An OPTIMADE structure resource.",
        &[],
        vec![
            prop("id", PropertyKind::String),
            prop("type", PropertyKind::String),
            prop("attributes", PropertyKind::Ref).referencing(STRUCTURE_ATTRIBUTES_ENTITY),
        ],
    )
}

pub fn structure_attributes_descriptor() -> TypeDescriptor {
    let mut properties = structure_attribute_properties();
    properties.push(
        prop("species", PropertyKind::Ref)
            .referencing(STRUCTURE_SPECIES_ENTITY)
            .shaped(&["nspecies"]),
    );
    properties.push(
        prop("assemblies", PropertyKind::Ref)
            .referencing(STRUCTURE_ASSEMBLY_ENTITY)
            .shaped(&["nassemblies"]),
    );
    descriptor(
        STRUCTURE_ATTRIBUTES_ENTITY,
        "Attributes of an OPTIMADE structure.",
        &[
            "nelements",
            "dimensionality",
            "nsites",
            "nspecies",
            "nassemblies",
            "nstructure_features",
        ],
        properties,
    )
}

pub fn structure_species_descriptor() -> TypeDescriptor {
    use PropertyKind::{Float, Int, String as Text};
    descriptor(
        STRUCTURE_SPECIES_ENTITY,
        "A species of an OPTIMADE structure.",
        &["nelements", "nattached_elements"],
        vec![
            prop("name", Text),
            prop("chemical_symbols", Text).shaped(&["nelements"]),
            prop("concentration", Float).shaped(&["nelements"]),
            prop("mass", Float).shaped(&["nelements"]),
            prop("original_name", Text),
            prop("attached", Text).shaped(&["nattached_elements"]),
            prop("nattached", Int).shaped(&["nattached_elements"]),
        ],
    )
}

pub fn structure_assembly_descriptor() -> TypeDescriptor {
    descriptor(
        STRUCTURE_ASSEMBLY_ENTITY,
        "An assembly of an OPTIMADE structure.",
        &["ngroups", "nsites"],
        vec![
            prop("sites_in_groups", PropertyKind::Json).shaped(&["nsites"]),
            prop("group_probabilities", PropertyKind::Float).shaped(&["ngroups"]),
        ],
    )
}

/// All built-in structure types keyed by URI.
pub fn builtin_registry() -> BTreeMap<String, TypeDescriptor> {
    [
        structure_resource_descriptor(),
        structure_descriptor(),
        structure_attributes_descriptor(),
        structure_species_descriptor(),
        structure_assembly_descriptor(),
    ]
    .into_iter()
    .map(|d| (d.uri.clone(), d))
    .collect()
}
