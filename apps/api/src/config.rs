use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub session_secret: String,
    pub session_ttl_hours: i64,
    pub ml_api_url: String,
    pub ml_timeout_ms: u64,
    /// Front-end origin used for post-OAuth redirects.
    pub public_base_url: String,
    pub groq_api_key: Option<String>,
    pub google_fit: Option<GoogleFitConfig>,
    pub port: u16,
    pub rust_log: String,
}

/// OAuth client credentials for the Google Fit integration.
/// The integration is disabled unless all three variables are set.
#[derive(Debug, Clone)]
pub struct GoogleFitConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            session_secret: require_env("SESSION_SECRET")?,
            session_ttl_hours: parse_env("SESSION_TTL_HOURS", 720)?,
            ml_api_url: std::env::var("ML_API_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            ml_timeout_ms: parse_env("ML_TIMEOUT_MS", 3000)?,
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            groq_api_key: optional_env("GROQ_API_KEY"),
            google_fit: GoogleFitConfig::from_env(),
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

impl GoogleFitConfig {
    fn from_env() -> Option<Self> {
        Some(GoogleFitConfig {
            client_id: optional_env("GOOGLE_FIT_CLIENT_ID")?,
            client_secret: optional_env("GOOGLE_FIT_CLIENT_SECRET")?,
            redirect_uri: optional_env("GOOGLE_FIT_REDIRECT_URI")?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .ok()
            .with_context(|| format!("{key} must be a valid number")),
        Err(_) => Ok(default),
    }
}
