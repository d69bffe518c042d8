use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::{OptimadeError, Result};
use crate::model::{QueryParameters, SUPPORTED_ENTITIES};

pub const DEFAULT_EXPIRE_TIME: u64 = 60 * 60 * 24;
pub const DEFAULT_CACHE_TAG: &str = "optimade";
pub const DEFAULT_VERSION: &str = "v1";
pub const DEFAULT_PARSED_DATA_KEY: &str = "optimade_resources";

pub const MEDIA_TYPE_JSON: &str = "application/vnd.optimade+json";
pub const MEDIA_TYPE_PLAIN: &str = "application/vnd.optimade";
pub const MEDIA_TYPE_DLITE: &str = "application/vnd.optimade+dlite";

fn default_expire_time() -> u64 {
    DEFAULT_EXPIRE_TIME
}

fn default_cache_tag() -> String {
    DEFAULT_CACHE_TAG.to_string()
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

fn default_entity() -> String {
    SUPPORTED_ENTITIES[0].to_string()
}

fn default_parsed_data_key() -> String {
    DEFAULT_PARSED_DATA_KEY.to_string()
}

/// Settings for the local data cache. Unset fields fall back to the OPTIMADE defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataCacheConfig {
    #[serde(rename = "accessKey", default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    #[serde(rename = "expireTime", default = "default_expire_time")]
    pub expire_time: u64,
    #[serde(default = "default_cache_tag")]
    pub tag: String,
}

impl Default for DataCacheConfig {
    fn default() -> Self {
        Self {
            access_key: None,
            expire_time: DEFAULT_EXPIRE_TIME,
            tag: default_cache_tag(),
        }
    }
}

/// Entry endpoints an OPTIMADE query can target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    #[default]
    Structures,
    References,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Structures => "structures",
            Endpoint::References => "references",
        }
    }
}

/// OPTIMADE query configuration shared by all strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimadeConfig {
    #[serde(rename = "downloadUrl", default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(rename = "mediaType", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// A pre-existing configuration, merged in by the filter strategy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimade_config: Option<Box<OptimadeConfig>>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub endpoint: Endpoint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_parameters: Option<QueryParameters>,
    #[serde(default)]
    pub datacache_config: DataCacheConfig,
    #[serde(default)]
    pub use_dlite: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,
    /// Keep well-formed entries when some entries of a response are malformed.
    #[serde(default)]
    pub allow_partial: bool,
}

impl Default for OptimadeConfig {
    fn default() -> Self {
        Self {
            download_url: None,
            media_type: None,
            optimade_config: None,
            version: default_version(),
            endpoint: Endpoint::default(),
            query_parameters: None,
            datacache_config: DataCacheConfig::default(),
            use_dlite: false,
            collection_id: None,
            allow_partial: false,
        }
    }
}

fn version_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^v[0-9]+(\.[0-9]+){0,2}$").ok())
        .as_ref()
}

impl OptimadeConfig {
    /// Media type lower-cased, as it is compared case-insensitively.
    pub fn media_type(&self) -> Option<String> {
        self.media_type.as_deref().map(str::to_lowercase)
    }

    /// Check the version pattern and that the media type is one of `allowed_media_types`.
    pub fn validate(&self, allowed_media_types: &[&str]) -> Result<()> {
        if !version_regex().map_or(false, |re| re.is_match(&self.version)) {
            return Err(OptimadeError::Configuration(format!(
                "Invalid OPTIMADE version '{}'",
                self.version
            )));
        }
        if let Some(media_type) = self.media_type() {
            if !allowed_media_types.contains(&media_type.as_str()) {
                return Err(OptimadeError::Configuration(format!(
                    "Unsupported media type '{}'. Expected one of: {}",
                    media_type,
                    allowed_media_types.join(", ")
                )));
            }
        }
        if let Some(query_parameters) = &self.query_parameters {
            query_parameters.validate()?;
        }
        Ok(())
    }
}

/// Registered parser types. Matching is case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ParserType {
    Optimade,
    OptimadeDlite,
    ResourcesDlite,
    StructuresDlite,
    ReferencesDlite,
}

impl ParserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParserType::Optimade => "parser/optimade",
            ParserType::OptimadeDlite => "parser/optimade/dlite",
            ParserType::ResourcesDlite => "parser/optimade/resources/dlite",
            ParserType::StructuresDlite => "parser/optimade/structures/dlite",
            ParserType::ReferencesDlite => "parser/optimade/references/dlite",
        }
    }

    /// Resource type named by the parser type path, if it names one.
    pub fn resource_hint(&self) -> Option<&'static str> {
        match self {
            ParserType::StructuresDlite => Some("structures"),
            ParserType::ReferencesDlite => Some("references"),
            _ => None,
        }
    }

    pub fn is_resource_parser(&self) -> bool {
        matches!(
            self,
            ParserType::ResourcesDlite | ParserType::StructuresDlite | ParserType::ReferencesDlite
        )
    }
}

impl TryFrom<String> for ParserType {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "parser/optimade" => Ok(ParserType::Optimade),
            "parser/optimade/dlite" => Ok(ParserType::OptimadeDlite),
            "parser/optimade/resources/dlite" => Ok(ParserType::ResourcesDlite),
            "parser/optimade/structures/dlite" => Ok(ParserType::StructuresDlite),
            "parser/optimade/references/dlite" => Ok(ParserType::ReferencesDlite),
            _ => Err(format!("Unknown parserType '{}'", value)),
        }
    }
}

impl From<ParserType> for String {
    fn from(value: ParserType) -> Self {
        value.as_str().to_string()
    }
}

/// Parse strategy configuration for `parser/optimade` and `parser/optimade/dlite`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseConfig {
    #[serde(rename = "parserType")]
    pub parser_type: ParserType,
    #[serde(default = "default_entity")]
    pub entity: String,
    #[serde(default)]
    pub configuration: OptimadeConfig,
}

impl ParseConfig {
    pub fn new(parser_type: ParserType, configuration: OptimadeConfig) -> Self {
        Self {
            parser_type,
            entity: default_entity(),
            configuration,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let allowed: &[&str] = match self.parser_type {
            ParserType::Optimade => &[MEDIA_TYPE_JSON, MEDIA_TYPE_PLAIN],
            ParserType::OptimadeDlite => &[MEDIA_TYPE_DLITE],
            other => {
                return Err(OptimadeError::Configuration(format!(
                    "parserType '{}' is not handled by the parse strategy",
                    other.as_str()
                )))
            }
        };
        validate_entity(&self.entity)?;
        self.configuration.validate(allowed)
    }
}

/// Configuration of the resource parse strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfiguration {
    #[serde(rename = "downloadUrl", default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(rename = "mediaType", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default)]
    pub datacache_config: DataCacheConfig,
    #[serde(default = "default_parsed_data_key")]
    pub parsed_data_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,
    #[serde(default)]
    pub allow_partial: bool,
}

impl Default for ResourceConfiguration {
    fn default() -> Self {
        Self {
            download_url: None,
            media_type: None,
            datacache_config: DataCacheConfig::default(),
            parsed_data_key: default_parsed_data_key(),
            collection_id: None,
            allow_partial: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceParseConfig {
    #[serde(rename = "parserType")]
    pub parser_type: ParserType,
    #[serde(default = "default_entity")]
    pub entity: String,
    #[serde(default)]
    pub configuration: ResourceConfiguration,
}

impl ResourceParseConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.parser_type.is_resource_parser() {
            return Err(OptimadeError::Configuration(format!(
                "parserType '{}' is not a resource parser",
                self.parser_type.as_str()
            )));
        }
        if let Some(media_type) = &self.configuration.media_type {
            let media_type = media_type.to_lowercase();
            if ![MEDIA_TYPE_JSON, MEDIA_TYPE_PLAIN, "application/json"].contains(&media_type.as_str())
            {
                return Err(OptimadeError::Configuration(format!(
                    "Unsupported media type '{}'",
                    media_type
                )));
            }
        }
        validate_entity(&self.entity)
    }
}

fn validate_entity(entity: &str) -> Result<()> {
    if SUPPORTED_ENTITIES.contains(&entity) {
        Ok(())
    } else {
        Err(OptimadeError::Configuration(format!(
            "Unsupported entity: {}. Supported entities: {}",
            entity,
            SUPPORTED_ENTITIES.join(", ")
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(rename = "filterType")]
    pub filter_type: String,
    /// Takes precedence over `configuration.query_parameters.filter`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Takes precedence over `configuration.query_parameters.page_limit`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default)]
    pub configuration: OptimadeConfig,
}

impl FilterConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.filter_type.eq_ignore_ascii_case("optimade") {
            return Err(OptimadeError::Configuration(format!(
                "Unknown filterType '{}'",
                self.filter_type
            )));
        }
        Ok(())
    }
}
