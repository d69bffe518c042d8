use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::error::{OptimadeError, Result};
use crate::logic::flatten::{GROUP_SEPARATOR, ITEM_SEPARATOR};
use crate::model::{Assembly, FlatStructureRecord, Species, StoredInstance};

/// Sub-collection recovered by the inverse parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubCollection {
    Species,
    Assemblies,
}

fn column<'a>(record: &'a FlatStructureRecord, name: &str, values: &'a [String], index: usize) -> Result<&'a str> {
    values.get(index).map(String::as_str).ok_or_else(|| {
        OptimadeError::malformed(
            &record.id,
            format!("{} has no value at position {}", name, index),
        )
    })
}

/// Optional columns may be shorter than the count; a missing position reads as empty.
fn optional_column(values: &[String], index: usize) -> &str {
    values.get(index).map(String::as_str).unwrap_or_default()
}

fn split_parse<T: FromStr>(record: &FlatStructureRecord, field: &str, encoded: &str) -> Result<Vec<T>>
where
    T::Err: std::fmt::Display,
{
    encoded
        .split(ITEM_SEPARATOR)
        .map(|item| {
            item.trim().parse::<T>().map_err(|err| {
                OptimadeError::malformed(
                    &record.id,
                    format!("{}: cannot parse '{}': {}", field, item, err),
                )
            })
        })
        .collect()
}

fn non_empty(encoded: &str) -> Option<&str> {
    Some(encoded).filter(|s| !s.is_empty())
}

/// Rebuild the species list from the parallel `species_*` sequences.
///
/// Empty optional fields decode to `None`, the inverse of how absent values are encoded.
pub fn unflatten_species(record: &FlatStructureRecord) -> Result<Vec<Species>> {
    let flat = &record.species;
    (0..record.dimensions.nspecies)
        .map(|index| {
            let name = column(record, "species_name", &flat.name, index)?;
            let symbols = column(record, "species_chemical_symbols", &flat.chemical_symbols, index)?;
            let concentration = column(record, "species_concentration", &flat.concentration, index)?;

            let attached = non_empty(optional_column(&flat.attached, index))
                .map(|encoded| encoded.split(ITEM_SEPARATOR).map(str::to_string).collect::<Vec<_>>());
            let nattached = match &attached {
                Some(_) => {
                    let encoded = column(record, "species_nattached", &flat.nattached, index)?;
                    Some(split_parse::<u64>(record, "species_nattached", encoded)?)
                }
                None => None,
            };

            let species = Species {
                name: name.to_string(),
                chemical_symbols: non_empty(symbols)
                    .map(|s| s.split(ITEM_SEPARATOR).map(str::to_string).collect())
                    .unwrap_or_default(),
                concentration: split_parse(record, "species_concentration", concentration)?,
                mass: non_empty(optional_column(&flat.mass, index))
                    .map(|encoded| split_parse(record, "species_mass", encoded))
                    .transpose()?,
                original_name: non_empty(optional_column(&flat.original_name, index))
                    .map(str::to_string),
                attached,
                nattached,
            };
            species.check().map_err(|reason| {
                OptimadeError::malformed(&record.id, format!("species[{}]: {}", index, reason))
            })?;
            Ok(species)
        })
        .collect()
}

/// Rebuild the assemblies list from the parallel `assemblies_*` sequences.
pub fn unflatten_assemblies(record: &FlatStructureRecord) -> Result<Vec<Assembly>> {
    let flat = &record.assemblies;
    (0..record.dimensions.nassemblies)
        .map(|index| {
            let groups = column(record, "assemblies_sites_in_groups", &flat.sites_in_groups, index)?;
            let probabilities = column(
                record,
                "assemblies_group_probabilities",
                &flat.group_probabilities,
                index,
            )?;
            let assembly = Assembly {
                sites_in_groups: groups
                    .split(GROUP_SEPARATOR)
                    .map(|group| split_parse(record, "assemblies_sites_in_groups", group))
                    .collect::<Result<Vec<_>>>()?,
                group_probabilities: split_parse(
                    record,
                    "assemblies_group_probabilities",
                    probabilities,
                )?,
            };
            assembly.check().map_err(|reason| {
                OptimadeError::malformed(&record.id, format!("assemblies[{}]: {}", index, reason))
            })?;
            Ok(assembly)
        })
        .collect()
}

/// Recover one sub-collection as plain JSON records.
pub fn unflatten(record: &FlatStructureRecord, kind: SubCollection) -> Result<Vec<Value>> {
    let values = match kind {
        SubCollection::Species => unflatten_species(record)?
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?,
        SubCollection::Assemblies => unflatten_assemblies(record)?
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?,
    };
    Ok(values)
}

/// Recover a sub-collection from a stored single-entity instance.
pub fn unflatten_instance(instance: &StoredInstance, kind: SubCollection) -> Result<Vec<Value>> {
    let record = FlatStructureRecord::from_instance(instance)?;
    unflatten(&record, kind)
}
