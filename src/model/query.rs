use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{OptimadeError, Result};

/// Everything but the RFC 3986 unreserved characters is percent-encoded.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const RESPONSE_FIELDS_PATTERN: &str = r"^([a-z_][a-z_0-9]*(,[a-z_][a-z_0-9]*)*)?$";
const SORT_PATTERN: &str = r"^(-?[a-z_][a-z_0-9]*(,-?[a-z_][a-z_0-9]*)*)?$";
const API_HINT_PATTERN: &str = r"^(v[0-9]+(\.[0-9]+)?)?$";
const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

/// Common OPTIMADE entry-listing query parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_fields: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_offset: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_cursor: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_above: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_below: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_hint: Option<String>,
}

fn is_match(pattern: &str, value: &str) -> Result<bool> {
    Regex::new(pattern)
        .map(|re| re.is_match(value))
        .map_err(|err| OptimadeError::Configuration(err.to_string()))
}

impl QueryParameters {
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("response_fields", RESPONSE_FIELDS_PATTERN, &self.response_fields),
            ("sort", SORT_PATTERN, &self.sort),
            ("api_hint", API_HINT_PATTERN, &self.api_hint),
            ("email_address", EMAIL_PATTERN, &self.email_address),
        ];
        for (name, pattern, value) in checks {
            if let Some(value) = value {
                if !is_match(pattern, value)? {
                    return Err(OptimadeError::Configuration(format!(
                        "Invalid value for query parameter '{}': {:?}",
                        name, value
                    )));
                }
            }
        }
        Ok(())
    }

    /// Set fields as `(name, value)` pairs in declaration order.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let text = [
            ("filter", &self.filter),
            ("response_format", &self.response_format),
            ("email_address", &self.email_address),
            ("response_fields", &self.response_fields),
            ("sort", &self.sort),
        ];
        let mut pairs: Vec<(&'static str, String)> = text
            .into_iter()
            .filter_map(|(name, value)| value.clone().map(|v| (name, v)))
            .collect();

        let unsigned = [
            ("page_limit", self.page_limit),
            ("page_offset", self.page_offset),
        ];
        pairs.extend(
            unsigned
                .into_iter()
                .filter_map(|(name, value)| value.map(|v| (name, v.to_string()))),
        );
        if let Some(number) = self.page_number {
            pairs.push(("page_number", number.to_string()));
        }
        if let Some(cursor) = self.page_cursor {
            pairs.push(("page_cursor", cursor.to_string()));
        }
        let signed = [("page_above", self.page_above), ("page_below", self.page_below)];
        pairs.extend(
            signed
                .into_iter()
                .filter_map(|(name, value)| value.map(|v| (name, v.to_string()))),
        );
        if let Some(include) = &self.include {
            pairs.push(("include", include.clone()));
        }
        if let Some(api_hint) = self.api_hint.as_ref().filter(|hint| !hint.is_empty()) {
            pairs.push(("api_hint", api_hint.clone()));
        }
        pairs
    }

    /// URL query string of the set fields. Values are decoded first so pre-encoded input is not double-encoded.
    pub fn generate_query_string(&self) -> String {
        self.pairs()
            .into_iter()
            .map(|(name, value)| {
                let decoded = percent_decode_str(&value).decode_utf8_lossy();
                format!("{}={}", name, utf8_percent_encode(&decoded, QUERY_VALUE))
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_query_string_encodes_filter() {
        let params = QueryParameters {
            filter: Some("elements HAS \"Si\"".to_string()),
            page_limit: Some(5),
            ..Default::default()
        };
        assert_eq!(
            params.generate_query_string(),
            "filter=elements%20HAS%20%22Si%22&page_limit=5"
        );
    }

    #[test]
    fn test_generate_query_string_does_not_double_encode() {
        let params = QueryParameters {
            filter: Some("nelements%3D2".to_string()),
            ..Default::default()
        };
        assert_eq!(params.generate_query_string(), "filter=nelements%3D2");
    }

    #[test]
    fn test_empty_parameters_give_empty_query() {
        assert_eq!(QueryParameters::default().generate_query_string(), "");
    }

    #[test]
    fn test_validate_patterns() {
        let mut params = QueryParameters {
            response_fields: Some("id,elements".to_string()),
            sort: Some("-nelements".to_string()),
            api_hint: Some("v1.1".to_string()),
            email_address: Some("user@example.org".to_string()),
            ..Default::default()
        };
        params.validate().unwrap();

        params.sort = Some("Bad Sort".to_string());
        assert!(matches!(params.validate(), Err(OptimadeError::Configuration(_))));
    }
}
