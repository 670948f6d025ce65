//! Google OAuth and Fitness REST client.

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::config::GoogleFitConfig;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";
const FITNESS_AGGREGATE_URL: &str = "https://www.googleapis.com/fitness/v1/users/me/dataset:aggregate";
const REQUEST_TIMEOUT_SECS: u64 = 15;
const DAY_MILLIS: i64 = 86_400_000;

pub const SCOPES: [&str; 6] = [
    "https://www.googleapis.com/auth/fitness.activity.read",
    "https://www.googleapis.com/auth/fitness.body.read",
    "https://www.googleapis.com/auth/fitness.heart_rate.read",
    "https://www.googleapis.com/auth/fitness.sleep.read",
    "https://www.googleapis.com/auth/fitness.nutrition.read",
    "https://www.googleapis.com/auth/fitness.location.read",
];

#[derive(Debug, Error)]
pub enum GoogleFitError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Google API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("refresh token rejected")]
    InvalidGrant,

    #[error("Google Fit not connected")]
    NotConnected,

    #[error("invalid authorization URL: {0}")]
    Url(#[from] url::ParseError),
}

impl GoogleFitError {
    /// Whether the user has to go through the consent flow again.
    pub fn needs_reauth(&self) -> bool {
        match self {
            GoogleFitError::InvalidGrant | GoogleFitError::NotConnected => true,
            GoogleFitError::Api { status, .. } => *status == 401 || *status == 403,
            _ => false,
        }
    }
}

/// The datasets the insights page asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitDataKind {
    Activity,
    HeartRate,
    Sleep,
    Body,
}

impl FitDataKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "activity" => Some(FitDataKind::Activity),
            "heart_rate" => Some(FitDataKind::HeartRate),
            "sleep" => Some(FitDataKind::Sleep),
            "body" => Some(FitDataKind::Body),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FitDataKind::Activity => "activity",
            FitDataKind::HeartRate => "heart_rate",
            FitDataKind::Sleep => "sleep",
            FitDataKind::Body => "body",
        }
    }

    /// Aggregated data type names, in the order datasets come back.
    pub fn data_types(&self) -> &'static [&'static str] {
        match self {
            FitDataKind::Activity => &[
                "com.google.step_count.delta",
                "com.google.calories.expended",
                "com.google.distance.delta",
                "com.google.active_minutes",
            ],
            FitDataKind::HeartRate => &["com.google.heart_rate.bpm"],
            FitDataKind::Sleep => &["com.google.sleep.segment"],
            FitDataKind::Body => &[
                "com.google.weight",
                "com.google.height",
                "com.google.body.fat.percentage",
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    #[serde(default)]
    pub scope: String,
}

impl TokenResponse {
    pub fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::seconds(self.expires_in)
    }

    pub fn scopes(&self) -> Vec<String> {
        self.scope.split_whitespace().map(str::to_string).collect()
    }
}

#[derive(Debug, Deserialize)]
struct OAuthError {
    error: String,
}

/// Aggregate request body: one bucket per day over `[start, end)`.
pub fn aggregate_body(kind: FitDataKind, start: DateTime<Utc>, end: DateTime<Utc>) -> Value {
    let aggregate_by: Vec<Value> = kind
        .data_types()
        .iter()
        .map(|t| json!({ "dataTypeName": t }))
        .collect();
    json!({
        "aggregateBy": aggregate_by,
        "bucketByTime": { "durationMillis": DAY_MILLIS },
        "startTimeMillis": start.timestamp_millis(),
        "endTimeMillis": end.timestamp_millis(),
    })
}

#[derive(Clone)]
pub struct GoogleFitClient {
    http: Client,
    config: GoogleFitConfig,
}

impl GoogleFitClient {
    pub fn new(config: GoogleFitConfig) -> anyhow::Result<Self> {
        Ok(Self {
            http: Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()?,
            config,
        })
    }

    /// Consent URL requesting offline access so Google returns a refresh token.
    pub fn authorize_url(&self, state: &str) -> Result<Url, GoogleFitError> {
        let scope = SCOPES.join(" ");
        Ok(Url::parse_with_params(
            GOOGLE_AUTH_URL,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state),
            ],
        )?)
    }

    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, GoogleFitError> {
        self.token_request(&[
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ])
        .await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, GoogleFitError> {
        self.token_request(&[
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .await
    }

    /// Best effort; failures are logged and otherwise ignored.
    pub async fn revoke(&self, token: &str) {
        let result = self
            .http
            .post(GOOGLE_REVOKE_URL)
            .form(&[("token", token)])
            .send()
            .await;
        match result {
            Ok(r) if r.status().is_success() => {}
            Ok(r) => warn!("Google token revoke returned {}", r.status()),
            Err(e) => warn!("Google token revoke failed: {e}"),
        }
    }

    pub async fn aggregate(
        &self,
        access_token: &str,
        kind: FitDataKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Value, GoogleFitError> {
        let response = self
            .http
            .post(FITNESS_AGGREGATE_URL)
            .bearer_auth(access_token)
            .json(&aggregate_body(kind, start, end))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GoogleFitError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json().await?)
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, GoogleFitError> {
        let response = self.http.post(GOOGLE_TOKEN_URL).form(form).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let code = serde_json::from_str::<OAuthError>(&body).map(|e| e.error).ok();
        if code.as_deref() == Some("invalid_grant") {
            return Err(GoogleFitError::InvalidGrant);
        }
        Err(GoogleFitError::Api {
            status: status.as_u16(),
            message: code.unwrap_or(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GoogleFitClient {
        GoogleFitClient::new(GoogleFitConfig {
            client_id: "client-123".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "http://localhost:8080/api/auth/callback/google-fit".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_authorize_url_carries_offline_consent_and_state() {
        let url = client().authorize_url("signed-state").unwrap();
        let params: std::collections::HashMap<String, String> =
            url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("accounts.google.com"));
        assert_eq!(params["client_id"], "client-123");
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["prompt"], "consent");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["state"], "signed-state");
        assert_eq!(params["scope"].split(' ').count(), SCOPES.len());
    }

    #[test]
    fn test_aggregate_body_buckets_by_day() {
        let end = Utc::now();
        let start = end - Duration::days(7);
        let body = aggregate_body(FitDataKind::Activity, start, end);
        assert_eq!(body["aggregateBy"].as_array().unwrap().len(), 4);
        assert_eq!(body["aggregateBy"][0]["dataTypeName"], "com.google.step_count.delta");
        assert_eq!(body["bucketByTime"]["durationMillis"], DAY_MILLIS);
        assert_eq!(body["endTimeMillis"], end.timestamp_millis());
    }

    #[test]
    fn test_data_kind_parse() {
        assert_eq!(FitDataKind::parse("heart_rate"), Some(FitDataKind::HeartRate));
        assert_eq!(FitDataKind::parse("nutrition"), None);
    }

    #[test]
    fn test_token_response_scopes() {
        let token: TokenResponse = serde_json::from_str(
            r#"{"access_token":"a","expires_in":3599,"scope":"s1 s2","token_type":"Bearer"}"#,
        )
        .unwrap();
        assert_eq!(token.scopes(), vec!["s1", "s2"]);
        assert!(token.refresh_token.is_none());
    }

    #[test]
    fn test_needs_reauth() {
        assert!(GoogleFitError::InvalidGrant.needs_reauth());
        assert!(GoogleFitError::Api { status: 401, message: String::new() }.needs_reauth());
        assert!(!GoogleFitError::Api { status: 500, message: String::new() }.needs_reauth());
    }
}
