//! Application configuration loaded from environment variables.
//!
//! Everything is read once at startup. The subscription id learned from
//! Strava is not part of this struct; it lives in the persisted state file
//! owned by the subscription manager.

use std::env;
use std::path::PathBuf;

/// Route Strava posts webhook events to (and probes during reconcile).
pub const WEBHOOK_PATH: &str = "/api/strava/webhook";

/// Strava returns at most this many activities per refresh cycle.
pub const MAX_NB_ACTIVITIES: u32 = 10;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Strava credentials ---
    /// Strava OAuth client ID
    pub strava_client_id: String,
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// Bearer token for the athlete
    pub strava_access_token: String,
    /// Refresh token; without it the access token is used until Strava rejects it
    pub strava_refresh_token: Option<String>,
    /// Access token expiry (Unix timestamp)
    pub strava_token_expires_at: i64,
    /// Token echoed by Strava during the subscription handshake
    pub webhook_verify_token: String,

    // --- Endpoints ---
    /// Public base URL of this instance (scheme + host, no trailing slash)
    pub public_url: String,
    pub strava_api_url: String,
    pub strava_oauth_token_url: String,
    pub geocode_url: String,
    /// Server port
    pub port: u16,

    // --- Refresh pipeline ---
    /// Number of latest activities fetched per cycle
    pub nb_activities: u32,
    /// Requested photo size in pixels
    pub img_size: u32,
    /// Image cache capacity
    pub max_images: usize,
    /// Seconds between image rotations (0 disables)
    pub img_rotate_interval_secs: u64,
    /// Seconds between scheduled refreshes (0 disables)
    pub refresh_interval_secs: u64,

    // --- Local state ---
    pub data_dir: PathBuf,
    /// Bearer token for the admin routes; `None` locks them
    pub admin_token: Option<String>,
    /// Delete the Strava subscription when the server shuts down
    pub unsubscribe_on_shutdown: bool,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            strava_client_id: "test_client_id".to_string(),
            strava_client_secret: "test_secret".to_string(),
            strava_access_token: "test_access_token".to_string(),
            strava_refresh_token: None,
            strava_token_expires_at: i64::MAX,
            webhook_verify_token: "test_verify_token".to_string(),
            public_url: "https://strava.example.com".to_string(),
            strava_api_url: "https://www.strava.com/api/v3".to_string(),
            strava_oauth_token_url: "https://www.strava.com/oauth/token".to_string(),
            geocode_url: "https://geocode.xyz".to_string(),
            port: 8080,
            nb_activities: 2,
            img_size: 512,
            max_images: 100,
            img_rotate_interval_secs: 0,
            refresh_interval_secs: 0,
            data_dir: env::temp_dir().join("strava-webhook-bridge-test"),
            admin_token: Some("test_admin_token".to_string()),
            unsubscribe_on_shutdown: false,
        }
    }
}

impl Config {
    /// Deterministic configuration for tests.
    pub fn test_default() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is honored for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let public_url = required("PUBLIC_URL")?.trim_end_matches('/').to_string();

        Ok(Self {
            strava_client_id: required("STRAVA_CLIENT_ID")?,
            strava_client_secret: required("STRAVA_CLIENT_SECRET")?,
            strava_access_token: required("STRAVA_ACCESS_TOKEN")?,
            strava_refresh_token: env::var("STRAVA_REFRESH_TOKEN")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            strava_token_expires_at: parsed("STRAVA_TOKEN_EXPIRES_AT", 0)?,
            webhook_verify_token: env::var("WEBHOOK_VERIFY_TOKEN")
                .map(|v| v.trim().to_string())
                .unwrap_or_else(|_| "STRAVA_BRIDGE".to_string()),
            public_url,
            strava_api_url: env::var("STRAVA_API_URL")
                .unwrap_or_else(|_| "https://www.strava.com/api/v3".to_string()),
            strava_oauth_token_url: env::var("STRAVA_OAUTH_TOKEN_URL")
                .unwrap_or_else(|_| "https://www.strava.com/oauth/token".to_string()),
            geocode_url: env::var("GEOCODE_URL")
                .unwrap_or_else(|_| "https://geocode.xyz".to_string()),
            port: parsed("PORT", 8080)?,
            nb_activities: parsed::<u32>("NB_ACTIVITIES", 2)?.clamp(1, MAX_NB_ACTIVITIES),
            img_size: parsed("IMG_SIZE", 512)?,
            max_images: parsed("MAX_IMAGES", 100)?,
            img_rotate_interval_secs: parsed("IMG_ROTATE_INTERVAL_SECS", 15)?,
            refresh_interval_secs: parsed("REFRESH_INTERVAL_SECS", 3600)?,
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            admin_token: env::var("ADMIN_TOKEN")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            unsubscribe_on_shutdown: parsed("UNSUBSCRIBE_ON_SHUTDOWN", false)?,
        })
    }

    /// Callback URL registered with Strava.
    pub fn callback_url(&self) -> String {
        format!("{}{}", self.public_url, WEBHOOK_PATH)
    }

    /// Host (and port, when explicit) of the public URL.
    pub fn public_host(&self) -> Option<String> {
        let url = reqwest::Url::parse(&self.public_url).ok()?;
        let host = url.host_str()?;
        Some(match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        })
    }

    pub fn subscription_state_path(&self) -> PathBuf {
        self.data_dir.join("subscription.json")
    }

    pub fn image_cache_path(&self) -> PathBuf {
        self.data_dir.join("image_cache.json")
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .map_err(|_| ConfigError::Missing(name))
}

fn parsed<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
