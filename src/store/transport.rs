use log::{debug, warn};
use serde_json::Value;
use std::time::Duration;

use crate::error::{OptimadeError, Result};
use crate::store::traits::{HttpResponse, Transport};

/// `Transport` backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str) -> Result<HttpResponse> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        let json = if body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&body).map_err(|err| {
                OptimadeError::Request(format!(
                    "{} returned a non-JSON body (status {}): {}",
                    url, status, err
                ))
            })?
        };
        if !status.is_success() {
            warn!("{} answered with status {}", url, status);
        }

        Ok(HttpResponse {
            status_code: status.as_u16(),
            ok: status.is_success(),
            json,
        })
    }
}
