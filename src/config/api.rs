use anyhow::Result;
use std::env;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api";
pub const DEFAULT_PREVIEW_LIMIT: usize = 10;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout_secs: u64,
    pub preview_limit: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            timeout_secs: 30,
            preview_limit: DEFAULT_PREVIEW_LIMIT,
        }
    }
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(&base_url.into()),
            ..Default::default()
        }
    }

    /// Read `.env` (if present) and then the environment.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_env()
    }

    pub fn from_env() -> Result<Self> {
        let base_url = env::var("REPORTS_API_URL")
            .map(|s| normalize_base_url(&s))
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(anyhow::anyhow!(
                "REPORTS_API_URL must be an http(s) URL, got '{}'",
                base_url
            ));
        }

        let token = env::var("REPORTS_API_TOKEN")
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let timeout_secs = env::var("REPORTS_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let preview_limit: usize = env::var("REPORTS_PREVIEW_LIMIT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PREVIEW_LIMIT);

        if preview_limit == 0 {
            return Err(anyhow::anyhow!("REPORTS_PREVIEW_LIMIT must be > 0"));
        }

        Ok(Self {
            base_url,
            token,
            timeout_secs,
            preview_limit,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}
