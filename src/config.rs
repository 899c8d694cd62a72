//! Run configuration.
//!
//! Two layers feed an import:
//!
//! - [`ImportOptions`] holds the per-run choices (credentials, source, tags,
//!   actions) that come from the command line.
//! - [`Config`] is an optional TOML file with endpoints and HTTP settings that
//!   rarely change between runs.
//!
//! ```toml
//! [endpoints]
//! token_url = "https://www.arcgis.com/sharing/oauth2/token"
//! trigger_api_url = "https://geotrigger.arcgis.com"
//!
//! [http]
//! timeout_secs = 30
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::error::ImportError;
use crate::models::{Direction, TrackingProfile};
use crate::template::Template;

pub const DEFAULT_BUFFER: f64 = 250.0;
pub const DEFAULT_CONCURRENCY: usize = 25;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EndpointsConfig {
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_trigger_api_url")]
    pub trigger_api_url: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            token_url: default_token_url(),
            trigger_api_url: default_trigger_api_url(),
        }
    }
}

fn default_token_url() -> String {
    "https://www.arcgis.com/sharing/oauth2/token".to_string()
}
fn default_trigger_api_url() -> String {
    "https://geotrigger.arcgis.com".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    concat!("fs2trigger/", env!("CARGO_PKG_VERSION")).to_string()
}

impl HttpConfig {
    /// Build the shared HTTP client for every outbound call.
    pub fn client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .user_agent(&self.user_agent)
            .build()
            .context("Failed to build HTTP client")
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.endpoints.token_url.trim().is_empty() {
        anyhow::bail!("endpoints.token_url must not be empty");
    }
    if config.endpoints.trigger_api_url.trim().is_empty() {
        anyhow::bail!("endpoints.trigger_api_url must not be empty");
    }
    if config.http.timeout_secs == 0 {
        anyhow::bail!("http.timeout_secs must be > 0");
    }

    Ok(config)
}

/// Everything one import run needs to know about what to create.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub client_id: String,
    pub client_secret: String,
    pub service_url: String,
    /// Tag templates, rendered per feature.
    pub tags: Vec<String>,
    /// Radius around point features, in meters.
    pub buffer: f64,
    pub direction: Direction,
    /// Send a token with every feature service call.
    pub authenticate: bool,
    pub concurrency: usize,
    pub callback_url: Option<String>,
    pub notification_template: Option<String>,
    pub tracking_profile: Option<TrackingProfile>,
    /// Reuse feature identifiers as trigger identifiers.
    pub use_feature_ids: bool,
}

impl ImportOptions {
    /// Options with every optional setting at its default.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        service_url: impl Into<String>,
        tags: Vec<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            service_url: service_url.into(),
            tags,
            buffer: DEFAULT_BUFFER,
            direction: Direction::default(),
            authenticate: false,
            concurrency: DEFAULT_CONCURRENCY,
            callback_url: None,
            notification_template: None,
            tracking_profile: None,
            use_feature_ids: false,
        }
    }

    /// Cross-field checks that run once, before any network call.
    pub fn validate(&self) -> Result<(), ImportError> {
        let has_callback = self
            .callback_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty());
        let has_notification = self.notification_template.is_some();
        if !has_callback && !has_notification && self.tracking_profile.is_none() {
            return Err(ImportError::Configuration(
                "At least one of --callback-url, --notification-template or --tracking-profile is required"
                    .to_string(),
            ));
        }
        if self.tags.is_empty() {
            return Err(ImportError::Configuration(
                "At least one --tag is required".to_string(),
            ));
        }
        if self.service_url.trim().is_empty() {
            return Err(ImportError::Configuration(
                "--service-url must not be empty".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(ImportError::Configuration(
                "--concurrency must be >= 1".to_string(),
            ));
        }
        if !self.buffer.is_finite() || self.buffer <= 0.0 {
            return Err(ImportError::Configuration(
                "--buffer must be a positive number of meters".to_string(),
            ));
        }
        for source in self.tags.iter().chain(&self.notification_template) {
            Template::parse(source)?;
        }
        Ok(())
    }

    /// Service URL without a trailing slash, ready for `/query` to be appended.
    pub fn service_base(&self) -> &str {
        self.service_url.trim_end_matches('/')
    }
}
