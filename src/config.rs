use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ScoutError;

/// Configuration for one exploration crawl
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// URL to start crawling from
    pub start_url: String,

    /// Maximum crawl depth from the start URL
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Global ceiling on the number of jobs a crawl may produce
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// How many detail-page variants of one canonical route to sample
    #[serde(default = "default_per_route_limit")]
    pub per_route_limit: usize,

    /// Maximum number of concurrent workers
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Whether the browser runs headless
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Login page URL, if the target requires authentication
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_url: Option<String>,

    /// Credentials for the login form
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Root directory for evidence, history and session artifacts
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Skip resume seeding and re-capture every route
    #[serde(default)]
    pub force_rescan: bool,

    /// Seed the frontier's seen-set from existing evidence metadata
    #[serde(default)]
    pub resume: bool,

    /// Path to a rescan list whose routes are re-queued at depth 1
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rescan_list: Option<String>,

    /// Fixed settle delay after each interaction, in milliseconds
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Timeout for any single command, in milliseconds
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,

    /// Retries per command before the interaction is skipped
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed delay between command retries, in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Reliability score at or above which a capture is a Golden Path
    /// candidate
    #[serde(default = "default_stability_threshold")]
    pub stability_threshold: u8,

    /// Interaction errors tolerated on one page before recovery kicks in
    #[serde(default = "default_page_error_threshold")]
    pub page_error_threshold: u32,

    /// Regex patterns for URLs to exclude from the crawl
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

fn default_max_depth() -> usize {
    2
}

fn default_max_pages() -> usize {
    50
}

fn default_per_route_limit() -> usize {
    3
}

fn default_max_concurrency() -> usize {
    4
}

fn default_headless() -> bool {
    true
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_output_dir() -> String {
    "data".to_string()
}

fn default_settle_delay_ms() -> u64 {
    600
}

fn default_command_timeout_ms() -> u64 {
    2000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_stability_threshold() -> u8 {
    70
}

fn default_page_error_threshold() -> u32 {
    5
}

impl CrawlConfig {
    /// Create a new configuration with default values
    pub fn new(start_url: &str) -> Self {
        Self {
            start_url: start_url.to_string(),
            max_depth: default_max_depth(),
            max_pages: default_max_pages(),
            per_route_limit: default_per_route_limit(),
            max_concurrency: default_max_concurrency(),
            headless: default_headless(),
            webdriver_url: default_webdriver_url(),
            login_url: None,
            username: None,
            password: None,
            output_dir: default_output_dir(),
            force_rescan: false,
            resume: false,
            rescan_list: None,
            settle_delay_ms: default_settle_delay_ms(),
            command_timeout_ms: default_command_timeout_ms(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            stability_threshold: default_stability_threshold(),
            page_error_threshold: default_page_error_threshold(),
            exclude_patterns: Vec::new(),
        }
    }

    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScoutError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ScoutError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the crawl cannot run with
    pub fn validate(&self) -> Result<(), ScoutError> {
        if url::Url::parse(&self.start_url).is_err() {
            return Err(ScoutError::Config(format!(
                "start_url is not a valid URL: {}",
                self.start_url
            )));
        }
        if self.max_concurrency == 0 {
            return Err(ScoutError::Config(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.username.is_some() != self.password.is_some() {
            return Err(ScoutError::Config(
                "username and password must be provided together".to_string(),
            ));
        }
        Ok(())
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Whether credentials were supplied for this crawl
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}
