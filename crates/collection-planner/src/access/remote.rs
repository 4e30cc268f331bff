//! HTTP client for an external access simulator
//!
//! `POST {base}/api/v1/access` with the strip, capability and window as
//! JSON; the service answers `{"windows": [CandidateWindow, ...]}`.

use super::{AccessOracle, OracleError};
use crate::model::{AssetCapability, CandidateWindow, Strip, TemporalWindow};
use crate::{PlannerError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
struct AccessRequest<'a> {
    strip: &'a Strip,
    capability: &'a AssetCapability,
    window: &'a TemporalWindow,
}

#[derive(Deserialize)]
struct AccessResponse {
    windows: Vec<CandidateWindow>,
}

pub struct RemoteAccessOracle {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl RemoteAccessOracle {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PlannerError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/v1/access", base_url.trim_end_matches('/')),
            api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn classify_status(status: StatusCode, endpoint: &str) -> OracleError {
    let message = format!("{} returned status {}", endpoint, status);
    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        OracleError::Transient(message)
    } else {
        OracleError::Permanent(message)
    }
}

fn classify_transport(err: reqwest::Error) -> OracleError {
    if err.is_timeout() {
        OracleError::Timeout
    } else {
        OracleError::Transient(err.to_string())
    }
}

#[async_trait]
impl AccessOracle for RemoteAccessOracle {
    fn name(&self) -> &str {
        "remote"
    }

    async fn passes(
        &self,
        strip: &Strip,
        capability: &AssetCapability,
        window: &TemporalWindow,
    ) -> std::result::Result<Vec<CandidateWindow>, OracleError> {
        let body = AccessRequest {
            strip,
            capability,
            window,
        };
        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(classify_transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, &self.endpoint));
        }

        let parsed: AccessResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Permanent(format!("malformed access response: {}", e)))?;
        debug!("{} returned {} windows for {}", self.endpoint, parsed.windows.len(), strip.id);
        Ok(parsed.windows)
    }
}
