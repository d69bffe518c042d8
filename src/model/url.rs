use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use url::Url;

use crate::error::{OptimadeError, Result};
use crate::model::{OptimadeConfig, ResponseSchema};

/// Longest URL accepted, matching common browser limits.
pub const MAX_URL_LENGTH: usize = 2083;

fn endpoint_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<prefix>.*?)(?:/(?P<version>v[0-9]+(?:\.[0-9]+){0,2}))?/(?P<endpoint>(?:info|links|versions|structures|references|calculations|extensions)(?:/[^\s?#]*)?)$",
        )
        .ok()
    })
    .as_ref()
}

/// A decomposed OPTIMADE URL: `<base>[/<version>]/<endpoint>[?<query>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimadeUrl {
    pub base_url: String,
    pub version: Option<String>,
    pub endpoint: Option<String>,
    pub query: Option<String>,
}

impl OptimadeUrl {
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.len() > MAX_URL_LENGTH {
            return Err(OptimadeError::InvalidUrl(format!(
                "URL exceeds {} characters",
                MAX_URL_LENGTH
            )));
        }
        let url = Url::parse(raw).map_err(|err| OptimadeError::InvalidUrl(format!("{}: {}", raw, err)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(OptimadeError::InvalidUrl(format!(
                "unsupported scheme '{}' in {}",
                url.scheme(),
                raw
            )));
        }
        let host = url
            .host_str()
            .ok_or_else(|| OptimadeError::InvalidUrl(format!("{} has no host", raw)))?;

        let mut base_url = format!("{}://", url.scheme());
        if !url.username().is_empty() {
            base_url.push_str(url.username());
            if let Some(password) = url.password() {
                base_url.push(':');
                base_url.push_str(password);
            }
            base_url.push('@');
        }
        base_url.push_str(host);
        // `Url::port` already hides the scheme's default port.
        if let Some(port) = url.port() {
            base_url.push_str(&format!(":{}", port));
        }

        let path = url.path().trim_end_matches('/');
        let captures = endpoint_regex().and_then(|re| re.captures(path));
        let (prefix, version, endpoint) = match &captures {
            Some(caps) => (
                caps.name("prefix").map_or("", |m| m.as_str()),
                caps.name("version").map(|m| m.as_str().to_string()),
                caps.name("endpoint").map(|m| m.as_str().to_string()),
            ),
            None => (path, None, None),
        };
        base_url.push_str(prefix);

        Ok(Self {
            base_url,
            version,
            endpoint,
            query: url.query().filter(|q| !q.is_empty()).map(str::to_string),
        })
    }

    /// Query URL from the configured version, endpoint and query parameters.
    pub fn from_config(base_url: &str, config: &OptimadeConfig) -> Self {
        let query = config
            .query_parameters
            .as_ref()
            .map(|params| params.generate_query_string())
            .filter(|q| !q.is_empty());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            version: Some(config.version.clone()),
            endpoint: Some(config.endpoint.as_str().to_string()),
            query,
        }
    }

    pub fn scheme(&self) -> &str {
        self.base_url.split("://").next().unwrap_or_default()
    }

    /// First path segment of the endpoint, e.g. `structures` for `structures/mpf_1`.
    pub fn endpoint_name(&self) -> Option<&str> {
        self.endpoint
            .as_deref()
            .and_then(|endpoint| endpoint.split('/').next())
    }

    /// Ordered candidate response schemas for this URL's endpoint.
    ///
    /// `None` when there is no endpoint or it is `versions`; callers then fall back to `Success`.
    pub fn response_models(&self) -> Option<Vec<ResponseSchema>> {
        let models = match self.endpoint_name()? {
            "versions" => return None,
            "info" => vec![ResponseSchema::InfoResponse, ResponseSchema::EntryInfoResponse],
            "links" => vec![ResponseSchema::LinksResponse],
            "structures" => vec![
                ResponseSchema::StructureResponseMany,
                ResponseSchema::StructureResponseOne,
            ],
            "references" => vec![
                ResponseSchema::ReferenceResponseMany,
                ResponseSchema::ReferenceResponseOne,
            ],
            "calculations" => vec![
                ResponseSchema::EntryResponseMany,
                ResponseSchema::EntryResponseOne,
            ],
            _ => vec![ResponseSchema::Success],
        };
        Some(models)
    }
}

impl fmt::Display for OptimadeUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base_url.trim_end_matches('/'))?;
        if let Some(version) = &self.version {
            write!(f, "/{}", version)?;
        }
        if let Some(endpoint) = &self.endpoint {
            write!(f, "/{}", endpoint)?;
        }
        if let Some(query) = &self.query {
            write!(f, "?{}", query)?;
        }
        Ok(())
    }
}

impl FromStr for OptimadeUrl {
    type Err = OptimadeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for OptimadeUrl {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for OptimadeUrl {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QueryParameters;

    #[test]
    fn test_parse_full_url() {
        let url = OptimadeUrl::parse(
            "https://optimade.materialsproject.org:443/v1/structures?filter=nelements%3D2",
        )
        .unwrap();
        assert_eq!(url.base_url, "https://optimade.materialsproject.org");
        assert_eq!(url.version.as_deref(), Some("v1"));
        assert_eq!(url.endpoint.as_deref(), Some("structures"));
        assert_eq!(url.query.as_deref(), Some("filter=nelements%3D2"));
        assert_eq!(url.scheme(), "https");
        assert_eq!(
            url.to_string(),
            "https://optimade.materialsproject.org/v1/structures?filter=nelements%3D2"
        );
    }

    #[test]
    fn test_parse_keeps_base_path_and_port() {
        let url = OptimadeUrl::parse("http://localhost:5000/optimade/v1.1/structures/mpf_1").unwrap();
        assert_eq!(url.base_url, "http://localhost:5000/optimade");
        assert_eq!(url.version.as_deref(), Some("v1.1"));
        assert_eq!(url.endpoint.as_deref(), Some("structures/mpf_1"));
        assert_eq!(url.endpoint_name(), Some("structures"));
    }

    #[test]
    fn test_version_without_endpoint_is_part_of_base() {
        let url = OptimadeUrl::parse("https://example.org/optimade/v1").unwrap();
        assert_eq!(url.base_url, "https://example.org/optimade/v1");
        assert_eq!(url.version, None);
        assert_eq!(url.endpoint, None);
        assert_eq!(url.response_models(), None);
    }

    #[test]
    fn test_response_models() {
        let models = |raw: &str| OptimadeUrl::parse(raw).unwrap().response_models();
        assert_eq!(
            models("https://example.org/v1/structures"),
            Some(vec![
                ResponseSchema::StructureResponseMany,
                ResponseSchema::StructureResponseOne
            ])
        );
        assert_eq!(
            models("https://example.org/v1/links"),
            Some(vec![ResponseSchema::LinksResponse])
        );
        assert_eq!(
            models("https://example.org/v1/extensions/properties"),
            Some(vec![ResponseSchema::Success])
        );
        assert_eq!(models("https://example.org/versions"), None);
    }

    #[test]
    fn test_rejects_non_http_schemes() {
        assert!(matches!(
            OptimadeUrl::parse("ftp://example.org/v1/structures"),
            Err(OptimadeError::InvalidUrl(_))
        ));
        assert!(OptimadeUrl::parse("not a url").is_err());
    }

    #[test]
    fn test_from_config() {
        let config = OptimadeConfig {
            query_parameters: Some(QueryParameters {
                filter: Some("nelements=2".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let url = OptimadeUrl::from_config("https://example.org/", &config);
        assert_eq!(
            url.to_string(),
            "https://example.org/v1/structures?filter=nelements%3D2"
        );
    }
}
