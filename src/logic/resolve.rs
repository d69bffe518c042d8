use log::{debug, error};
use serde_json::Value;

use crate::error::{OptimadeError, Result};
use crate::logic::validate::{validate_response, ValidationFailure};
use crate::model::{ResponseEnvelope, ResponseSchema};

/// Try `candidates` strictly in order and return the first schema `raw` validates against.
///
/// Order is significant: a payload valid for both a specific schema and `Success`
/// resolves to whichever comes first.
pub fn resolve(
    raw: &Value,
    candidates: &[ResponseSchema],
) -> Result<(ResponseEnvelope, ResponseSchema)> {
    let mut failures: Vec<ValidationFailure> = Vec::with_capacity(candidates.len());

    for &candidate in candidates {
        match validate_response(raw, candidate) {
            Ok(envelope) => {
                debug!(
                    "Response validated as {} ({})",
                    candidate,
                    envelope.variant_name()
                );
                return Ok((envelope, candidate));
            }
            Err(failure) => {
                debug!("Response is not a {}: {}", candidate, failure.summary());
                failures.push(failure);
            }
        }
    }

    let attempted: Vec<String> = candidates.iter().map(|c| c.name().to_string()).collect();
    error!(
        "Could not validate response against any of [{}]",
        attempted.join(", ")
    );
    Err(OptimadeError::SchemaMismatch {
        attempted,
        payload: raw.clone(),
        reasons: failures.iter().map(ValidationFailure::summary).collect(),
    })
}

/// Like [`resolve`], falling back to `[Success]` when no candidates are given.
pub fn resolve_or_success(
    raw: &Value,
    candidates: Option<&[ResponseSchema]>,
) -> Result<(ResponseEnvelope, ResponseSchema)> {
    match candidates {
        Some(candidates) if !candidates.is_empty() => resolve(raw, candidates),
        _ => {
            debug!("No response models given, using Success");
            resolve(raw, &[ResponseSchema::Success])
        }
    }
}
