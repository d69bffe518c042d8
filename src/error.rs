use serde_json::Value;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OptimadeError>;

#[derive(Error, Debug)]
pub enum OptimadeError {
    /// None of the candidate schemas accepted the payload.
    #[error("Could not validate payload against any of: {}", .attempted.join(", "))]
    SchemaMismatch {
        attempted: Vec<String>,
        payload: Value,
        reasons: Vec<String>,
    },

    #[error("Unsupported entry type: {0}")]
    UnsupportedEntryType(String),

    #[error("Schema inconsistency: {0}")]
    SchemaInconsistency(String),

    #[error("Malformed record '{entry_id}': {reason}")]
    MalformedRecord { entry_id: String, reason: String },

    #[error("Could not determine resource type from data")]
    UnknownResourceType { attempted: Vec<String>, sample: Value },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid OPTIMADE URL: {0}")]
    InvalidUrl(String),

    #[error("Request error: {0}")]
    Request(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Cache error: {0}")]
    Cache(String),
}

impl OptimadeError {
    pub fn malformed(entry_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            entry_id: entry_id.into(),
            reason: reason.into(),
        }
    }

    /// True for failures that only concern a single entry of a response.
    pub fn is_per_entry(&self) -> bool {
        matches!(self, Self::MalformedRecord { .. })
    }
}

impl From<serde_json::Error> for OptimadeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<reqwest::Error> for OptimadeError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.to_string())
    }
}
