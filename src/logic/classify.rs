use log::error;
use serde::Serialize;
use serde_json::Value;

use crate::error::{OptimadeError, Result};
use crate::model::{EntryKind, ResponseEnvelope};

/// Entries of a classified response, each normalised to a plain JSON record.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedEntries {
    pub kind: EntryKind,
    pub entries: Vec<Value>,
}

fn to_records<T: Serialize>(items: &[T]) -> Result<Vec<Value>> {
    items
        .iter()
        .map(|item| serde_json::to_value(item).map_err(OptimadeError::from))
        .collect()
}

/// Decide the entry category of a validated response and extract its entries.
pub fn classify(envelope: &ResponseEnvelope) -> Result<ClassifiedEntries> {
    let (kind, entries) = match envelope {
        ResponseEnvelope::ErrorList(errors) => (EntryKind::Error, to_records(errors)?),
        ResponseEnvelope::OneReference(reference) => {
            (EntryKind::Reference, to_records(std::slice::from_ref(reference.as_ref()))?)
        }
        ResponseEnvelope::ManyReferences(references) => {
            (EntryKind::Reference, to_records(references)?)
        }
        ResponseEnvelope::OneStructure(structure) => {
            (EntryKind::Structure, to_records(std::slice::from_ref(structure.as_ref()))?)
        }
        ResponseEnvelope::ManyStructures(structures) => {
            (EntryKind::Structure, to_records(structures)?)
        }
        ResponseEnvelope::GenericSuccess {
            data,
            declared_type,
        } => {
            if let Some(declared) = declared_type.as_deref().filter(|t| *t != "structures") {
                error!("Cannot handle '{}' entries, only structures", declared);
                return Err(OptimadeError::UnsupportedEntryType(declared.to_string()));
            }
            let entries = match data {
                Value::Object(_) => vec![data.clone()],
                Value::Array(items) => items.clone(),
                other => {
                    error!("Response data is neither an object nor a list: {}", other);
                    return Err(OptimadeError::UnsupportedEntryType(format!(
                        "data of JSON type {}",
                        json_type(other)
                    )));
                }
            };
            (EntryKind::Structure, entries)
        }
    };
    Ok(ClassifiedEntries { kind, entries })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
