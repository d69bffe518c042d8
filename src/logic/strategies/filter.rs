use log::debug;

use crate::error::Result;
use crate::logic::merge::merge_config;
use crate::model::{FilterConfig, FilterResult, OptimadeConfig};

/// Configuration keys never carried over from a nested configuration or into the result.
pub const MERGE_EXCLUDE: [&str; 3] = ["optimade_config", "downloadUrl", "mediaType"];

pub struct FilterStrategy;

impl FilterStrategy {
    /// Compile the OPTIMADE query configuration handed on to the parse strategies.
    pub fn initialize(config: &FilterConfig) -> Result<FilterResult> {
        config.validate()?;

        let mut optimade_config: OptimadeConfig = match &config.configuration.optimade_config {
            Some(nested) => merge_config(&config.configuration, nested.as_ref(), &MERGE_EXCLUDE)?,
            None => config.configuration.clone(),
        };

        let query_parameters = optimade_config
            .query_parameters
            .get_or_insert_with(Default::default);
        if let Some(query) = config.query.as_deref().filter(|q| !q.is_empty()) {
            debug!("Setting filter from query.");
            query_parameters.filter = Some(query.to_string());
        }
        if let Some(limit) = config.limit.filter(|limit| *limit > 0) {
            debug!("Setting page_limit from limit.");
            query_parameters.page_limit = Some(limit);
        }
        query_parameters.validate()?;

        optimade_config.optimade_config = None;
        optimade_config.download_url = None;
        optimade_config.media_type = None;

        Ok(FilterResult {
            optimade_config: Some(optimade_config),
        })
    }
}
