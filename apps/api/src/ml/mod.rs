//! Prediction service client. The ML service is a black-box HTTP collaborator; every
//! caller treats it as optional and falls back when it errors or times out.
//!
//! `AppState` holds an `Arc<dyn PredictionService>` so handlers never depend on the
//! transport.

pub mod features;
pub mod handlers;
pub mod motivation;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum MlError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ML service returned {status}: {message}")]
    Api { status: u16, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MlEndpoint {
    PredictDropout,
    PredictEngagement,
    RecommendChallenge,
    GenerateMotivation,
    PredictCompare,
    PredictDropoutQuantum,
}

impl MlEndpoint {
    pub fn path(&self) -> &'static str {
        match self {
            MlEndpoint::PredictDropout => "/api/predict/dropout",
            MlEndpoint::PredictEngagement => "/api/predict/engagement",
            MlEndpoint::RecommendChallenge => "/api/recommend-challenge",
            MlEndpoint::GenerateMotivation => "/api/generate-motivation",
            MlEndpoint::PredictCompare => "/api/predict-compare",
            MlEndpoint::PredictDropoutQuantum => "/api/predict-dropout-quantum",
        }
    }
}

#[async_trait]
pub trait PredictionService: Send + Sync {
    /// POSTs `payload` as JSON to `endpoint` and returns the decoded JSON body.
    async fn call(&self, endpoint: MlEndpoint, payload: &Value) -> Result<Value, MlError>;
}

/// Default backend: JSON over HTTP with a per-request timeout.
pub struct HttpPredictionService {
    client: Client,
    base_url: String,
}

impl HttpPredictionService {
    pub fn new(base_url: &str, timeout_ms: u64) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PredictionService for HttpPredictionService {
    async fn call(&self, endpoint: MlEndpoint, payload: &Value) -> Result<Value, MlError> {
        let url = format!("{}{}", self.base_url, endpoint.path());
        let response = self.client.post(&url).json(payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MlError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response.json().await?;
        debug!("ML call {} succeeded", endpoint.path());
        Ok(body)
    }
}

#[cfg(test)]
pub mod testing {
    use std::collections::HashMap;

    use super::*;

    /// Canned responses per endpoint; unknown endpoints fail like an offline service.
    #[derive(Default)]
    pub struct StubPredictionService {
        pub responses: HashMap<&'static str, Value>,
    }

    impl StubPredictionService {
        pub fn offline() -> Self {
            Self::default()
        }

        pub fn with(mut self, endpoint: MlEndpoint, body: Value) -> Self {
            self.responses.insert(endpoint.path(), body);
            self
        }
    }

    #[async_trait]
    impl PredictionService for StubPredictionService {
        async fn call(&self, endpoint: MlEndpoint, _payload: &Value) -> Result<Value, MlError> {
            self.responses
                .get(endpoint.path())
                .cloned()
                .ok_or(MlError::Api {
                    status: 503,
                    message: "offline".to_string(),
                })
        }
    }
}
