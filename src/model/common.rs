use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type Id = String;

/// Fields starting with this marker are provider/internal fields and never leave the parser.
pub const INTERNAL_FIELD_PREFIX: char = '_';

/// Structures handled by this crate are always periodic in three dimensions.
pub const DIMENSIONALITY: usize = 3;

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}

pub fn is_internal_field(name: &str) -> bool {
    name.starts_with(INTERNAL_FIELD_PREFIX)
}

/// Entry category decided by the record classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Error,
    Reference,
    Structure,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Error => "error",
            EntryKind::Reference => "reference",
            EntryKind::Structure => "structure",
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
