use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{
    DataResponse, EntryResource, ErrorResponse, ReferenceResource, ResponseEnvelope,
    ResponseSchema, StructureResource, Success,
};
use crate::model::{
    EntryInfoResponse, EntryResponseMany, EntryResponseOne, InfoResponse, LinksResponse,
    ReferenceResponseMany, ReferenceResponseOne, StructureResponseMany, StructureResponseOne,
};

/// Why a payload was rejected by one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub candidate: String,
    pub messages: Vec<String>,
}

impl ValidationFailure {
    pub fn new(candidate: &str, message: impl Into<String>) -> Self {
        Self {
            candidate: candidate.to_string(),
            messages: vec![message.into()],
        }
    }

    /// Single-line summary, `<candidate>: <message>; <message>`.
    pub fn summary(&self) -> String {
        format!("{}: {}", self.candidate, self.messages.join("; "))
    }
}

pub type Validation<T> = std::result::Result<T, ValidationFailure>;

/// Structural validation by deserialising into the typed model.
pub fn validate_as<T: DeserializeOwned>(candidate: &str, raw: &Value) -> Validation<T> {
    T::deserialize(raw).map_err(|err| ValidationFailure::new(candidate, err.to_string()))
}

fn expect_type(candidate: &str, found: &str, expected: &str) -> Validation<()> {
    if found == expected {
        Ok(())
    } else {
        Err(ValidationFailure::new(
            candidate,
            format!("type must be '{}', found '{}'", expected, found),
        ))
    }
}

/// Successful responses must not carry `errors` alongside `data`.
fn reject_errors(candidate: &str, errors: &Option<Value>) -> Validation<()> {
    match errors {
        None | Some(Value::Null) => Ok(()),
        Some(_) => Err(ValidationFailure::new(
            candidate,
            "errors must not be present in a successful response",
        )),
    }
}

fn data_response<T: DeserializeOwned>(candidate: &str, raw: &Value) -> Validation<DataResponse<T>> {
    let response: DataResponse<T> = validate_as(candidate, raw)?;
    reject_errors(candidate, &response.errors)?;
    Ok(response)
}

pub fn validate_structure(candidate: &str, raw: &Value) -> Validation<StructureResource> {
    let resource: StructureResource = validate_as(candidate, raw)?;
    expect_type(candidate, &resource.resource_type, "structures")?;
    Ok(resource)
}

pub fn validate_reference(candidate: &str, raw: &Value) -> Validation<ReferenceResource> {
    let resource: ReferenceResource = validate_as(candidate, raw)?;
    expect_type(candidate, &resource.resource_type, "references")?;
    Ok(resource)
}

fn each<T>(
    candidate: &str,
    items: &[T],
    check: impl Fn(&T) -> Validation<()>,
) -> Validation<()> {
    for (index, item) in items.iter().enumerate() {
        check(item).map_err(|mut failure| {
            failure.messages = failure
                .messages
                .into_iter()
                .map(|m| format!("data[{}]: {}", index, m))
                .collect();
            failure.candidate = candidate.to_string();
            failure
        })?;
    }
    Ok(())
}

/// Validate `raw` against one response schema and produce the matching envelope variant.
pub fn validate_response(raw: &Value, schema: ResponseSchema) -> Validation<ResponseEnvelope> {
    let name = schema.name();
    match schema {
        ResponseSchema::ErrorResponse => {
            let response: ErrorResponse = validate_as(name, raw)?;
            if response.errors.is_empty() {
                return Err(ValidationFailure::new(name, "errors must not be empty"));
            }
            Ok(ResponseEnvelope::ErrorList(response.errors))
        }
        ResponseSchema::StructureResponseOne => {
            let response: StructureResponseOne = data_response(name, raw)?;
            expect_type(name, &response.data.resource_type, "structures")?;
            Ok(ResponseEnvelope::OneStructure(Box::new(response.data)))
        }
        ResponseSchema::StructureResponseMany => {
            let response: StructureResponseMany = data_response(name, raw)?;
            each(name, &response.data, |s| expect_type(name, &s.resource_type, "structures"))?;
            Ok(ResponseEnvelope::ManyStructures(response.data))
        }
        ResponseSchema::ReferenceResponseOne => {
            let response: ReferenceResponseOne = data_response(name, raw)?;
            expect_type(name, &response.data.resource_type, "references")?;
            Ok(ResponseEnvelope::OneReference(Box::new(response.data)))
        }
        ResponseSchema::ReferenceResponseMany => {
            let response: ReferenceResponseMany = data_response(name, raw)?;
            each(name, &response.data, |r| expect_type(name, &r.resource_type, "references"))?;
            Ok(ResponseEnvelope::ManyReferences(response.data))
        }
        ResponseSchema::EntryResponseOne => {
            let response: EntryResponseOne = data_response(name, raw)?;
            let declared_type = Some(response.data.resource_type.clone());
            generic(name, &response.data, declared_type)
        }
        ResponseSchema::EntryResponseMany => {
            let response: EntryResponseMany = data_response(name, raw)?;
            let declared_type = response
                .data
                .first()
                .map(|entry: &EntryResource| entry.resource_type.clone());
            generic(name, &response.data, declared_type)
        }
        ResponseSchema::InfoResponse => {
            let response: InfoResponse = data_response(name, raw)?;
            expect_type(name, &response.data.resource_type, "info")?;
            generic(name, &response.data, Some("info".to_string()))
        }
        ResponseSchema::EntryInfoResponse => {
            let response: EntryInfoResponse = data_response(name, raw)?;
            generic(name, &response.data, Some("info".to_string()))
        }
        ResponseSchema::LinksResponse => {
            let response: LinksResponse = data_response(name, raw)?;
            each(name, &response.data, |l| expect_type(name, &l.resource_type, "links"))?;
            generic(name, &response.data, Some("links".to_string()))
        }
        ResponseSchema::Success => {
            let response: Success = validate_as(name, raw)?;
            reject_errors(name, &response.errors)?;
            Ok(ResponseEnvelope::GenericSuccess {
                data: response.data,
                declared_type: None,
            })
        }
    }
}

fn generic<T: Serialize>(
    candidate: &str,
    data: &T,
    declared_type: Option<String>,
) -> Validation<ResponseEnvelope> {
    let data = serde_json::to_value(data).map_err(|err| {
        ValidationFailure::new(candidate, format!("data cannot be re-encoded: {}", err))
    })?;
    Ok(ResponseEnvelope::GenericSuccess {
        data,
        declared_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta() -> Value {
        json!({
            "query": {"representation": "/structures"},
            "api_version": "1.1.0",
            "more_data_available": false
        })
    }

    #[test]
    fn test_error_response_needs_errors() {
        let raw = json!({"meta": meta(), "errors": []});
        let failure = validate_response(&raw, ResponseSchema::ErrorResponse).unwrap_err();
        assert_eq!(failure.candidate, "ErrorResponse");

        let raw = json!({"meta": meta(), "errors": [{"detail": "Bad filter", "status": "400"}]});
        match validate_response(&raw, ResponseSchema::ErrorResponse).unwrap() {
            ResponseEnvelope::ErrorList(errors) => assert_eq!(errors[0].detail, "Bad filter"),
            other => panic!("unexpected envelope {:?}", other),
        }
    }

    #[test]
    fn test_structure_type_literal_is_enforced() {
        let raw = json!({
            "meta": meta(),
            "data": {"id": "ref_1", "type": "references", "attributes": {"structure_features": []}}
        });
        let failure = validate_response(&raw, ResponseSchema::StructureResponseOne).unwrap_err();
        assert!(failure.summary().contains("type must be 'structures'"));
    }

    #[test]
    fn test_success_rejects_errors_with_data() {
        let raw = json!({"meta": meta(), "data": [], "errors": [{"detail": "x"}]});
        assert!(validate_response(&raw, ResponseSchema::Success).is_err());
    }

    #[test]
    fn test_strict_number_types() {
        let raw = json!({
            "meta": meta(),
            "data": {"id": "s", "type": "structures", "attributes": {"nsites": "4", "structure_features": []}}
        });
        assert!(validate_response(&raw, ResponseSchema::StructureResponseOne).is_err());
    }

    #[test]
    fn test_many_structures_reports_index() {
        let raw = json!({
            "meta": meta(),
            "data": [
                {"id": "a", "type": "structures", "attributes": {"structure_features": []}},
                {"id": "b", "type": "structure", "attributes": {"structure_features": []}}
            ]
        });
        let failure = validate_response(&raw, ResponseSchema::StructureResponseMany).unwrap_err();
        assert!(failure.messages[0].starts_with("data[1]"));
    }

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("unsupported value"))
        }
    }

    #[test]
    fn test_generic_data_that_cannot_be_encoded_is_a_failure() {
        let failure = generic("InfoResponse", &Unencodable, Some("info".to_string())).unwrap_err();
        assert_eq!(failure.candidate, "InfoResponse");
        assert!(failure.messages[0].contains("unsupported value"));
    }
}
