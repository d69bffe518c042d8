use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{OptimadeError, Result};

fn to_map<T: Serialize>(value: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(OptimadeError::Configuration(format!(
            "configuration must serialise to an object, got {}",
            other
        ))),
    }
}

/// Merge `overlay` into `base`.
///
/// A field of `overlay` replaces the one in `base` when it is set, differs from the
/// type's default and its serialised name is not listed in `exclude`.
pub fn merge_config<T>(base: &T, overlay: &T, exclude: &[&str]) -> Result<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    let mut merged = to_map(base)?;
    let defaults = to_map(&T::default())?;

    for (key, value) in to_map(overlay)? {
        if exclude.contains(&key.as_str()) || value.is_null() {
            continue;
        }
        if defaults.get(&key) == Some(&value) {
            continue;
        }
        merged.insert(key, value);
    }

    Ok(serde_json::from_value(Value::Object(merged))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Endpoint, OptimadeConfig, QueryParameters};

    #[test]
    fn test_overlay_values_replace_base() {
        let base = OptimadeConfig {
            download_url: Some("https://example.org".to_string()),
            ..Default::default()
        };
        let overlay = OptimadeConfig {
            endpoint: Endpoint::References,
            query_parameters: Some(QueryParameters {
                filter: Some("year=2000".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = merge_config(&base, &overlay, &[]).unwrap();
        assert_eq!(merged.endpoint, Endpoint::References);
        assert_eq!(merged.download_url.as_deref(), Some("https://example.org"));
        assert_eq!(
            merged.query_parameters.unwrap().filter.as_deref(),
            Some("year=2000")
        );
    }

    #[test]
    fn test_defaults_do_not_override() {
        let base = OptimadeConfig {
            version: "v1.1".to_string(),
            use_dlite: true,
            ..Default::default()
        };
        let merged = merge_config(&base, &OptimadeConfig::default(), &[]).unwrap();
        assert_eq!(merged.version, "v1.1");
        assert!(merged.use_dlite);
    }

    #[test]
    fn test_excluded_keys_are_kept_from_base() {
        let base = OptimadeConfig::default();
        let overlay = OptimadeConfig {
            download_url: Some("https://other.org".to_string()),
            media_type: Some("application/vnd.optimade+json".to_string()),
            collection_id: Some("c1".to_string()),
            ..Default::default()
        };
        let merged = merge_config(&base, &overlay, &["downloadUrl", "mediaType"]).unwrap();
        assert_eq!(merged.download_url, None);
        assert_eq!(merged.media_type, None);
        assert_eq!(merged.collection_id.as_deref(), Some("c1"));
    }
}
