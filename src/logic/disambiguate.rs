use log::{debug, error};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{OptimadeError, Result};
use crate::logic::validate::{validate_reference, validate_structure, Validation};

/// OPTIMADE entry resource types an untyped entry can be validated as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    References,
    Structures,
}

/// Trial order used when the caller gives no explicit type.
pub const RESOURCE_CANDIDATES: [ResourceType; 2] =
    [ResourceType::References, ResourceType::Structures];

impl ResourceType {
    pub fn name(&self) -> &'static str {
        match self {
            ResourceType::References => "references",
            ResourceType::Structures => "structures",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "references" => Some(ResourceType::References),
            "structures" => Some(ResourceType::Structures),
            _ => None,
        }
    }

    pub fn validate(&self, entry: &Value) -> Validation<()> {
        match self {
            ResourceType::References => validate_reference("ReferenceResource", entry).map(|_| ()),
            ResourceType::Structures => validate_structure("StructureResource", entry).map(|_| ()),
        }
    }
}

/// Pick the resource type of `sample`. An explicit `hint` is trusted without any validation.
pub fn disambiguate(
    sample: &Value,
    candidates: &[ResourceType],
    hint: Option<ResourceType>,
) -> Result<ResourceType> {
    if let Some(hint) = hint {
        debug!("Using explicit resource type '{}'", hint.name());
        return Ok(hint);
    }

    for &candidate in candidates {
        match candidate.validate(sample) {
            Ok(()) => {
                debug!("Entry validated as '{}'", candidate.name());
                return Ok(candidate);
            }
            Err(failure) => debug!("Entry is not '{}': {}", candidate.name(), failure.summary()),
        }
    }

    error!("Could not determine resource type from data: {}", sample);
    Err(OptimadeError::UnknownResourceType {
        attempted: candidates.iter().map(|c| c.name().to_string()).collect(),
        sample: sample.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_structure_is_detected() {
        let entry = json!({"id": "mpf_1", "type": "structures", "attributes": {"structure_features": []}});
        assert_eq!(
            disambiguate(&entry, &RESOURCE_CANDIDATES, None).unwrap(),
            ResourceType::Structures
        );
    }

    #[test]
    fn test_reference_is_detected() {
        let entry = json!({"id": "dijkstra1968", "type": "references", "attributes": {"year": "1968"}});
        assert_eq!(
            disambiguate(&entry, &RESOURCE_CANDIDATES, None).unwrap(),
            ResourceType::References
        );
    }

    #[test]
    fn test_hint_skips_validation() {
        let entry = json!({"not": "a resource"});
        assert_eq!(
            disambiguate(&entry, &RESOURCE_CANDIDATES, Some(ResourceType::Structures)).unwrap(),
            ResourceType::Structures
        );
    }

    #[test]
    fn test_unknown_resource_type() {
        let entry = json!({"id": "c1", "type": "calculations", "attributes": {}});
        match disambiguate(&entry, &RESOURCE_CANDIDATES, None) {
            Err(OptimadeError::UnknownResourceType { attempted, sample }) => {
                assert_eq!(attempted, vec!["references", "structures"]);
                assert_eq!(sample, entry);
            }
            other => panic!("expected UnknownResourceType, got {:?}", other),
        }
    }
}
