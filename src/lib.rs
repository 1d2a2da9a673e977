// Re-export modules
pub mod canonical;
pub mod commands;
pub mod config;
pub mod crawler;
pub mod driver;
pub mod error;
pub mod events;
pub mod evidence;
pub mod explorers;
pub mod frontier;
pub mod history;
pub mod network;
pub mod pipeline;
pub mod results;
pub mod score;
pub mod session;

// Re-export commonly used types for convenience
pub use crawler::CrawlStats;
pub use error::ScoutError;
pub use results::ScrapeResult;

use config::CrawlConfig;

/// Main builder for an exploration crawl of a web application.
pub struct Crawl {
    config: CrawlConfig,
}

impl Crawl {
    /// Create a new crawl builder for the given start URL
    pub fn new(start_url: &str) -> Self {
        Self {
            config: CrawlConfig::new(start_url),
        }
    }

    /// Set the maximum crawl depth from the start URL
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.config.max_depth = max_depth;
        self
    }

    /// Set the global ceiling on pages explored
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.config.max_pages = max_pages;
        self
    }

    /// Set the number of concurrent workers
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.config.max_concurrency = max_concurrency;
        self
    }

    /// Set login credentials
    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.config.username = Some(username.to_string());
        self.config.password = Some(password.to_string());
        self
    }

    /// Replace the whole configuration
    pub fn with_config(mut self, config: CrawlConfig) -> Self {
        self.config = config;
        self
    }

    /// Load configuration from a JSON file
    pub fn with_config_file(
        self,
        path: impl AsRef<std::path::Path>,
    ) -> Result<Self, ScoutError> {
        let config = CrawlConfig::from_file(path)?;
        Ok(self.with_config(config))
    }

    /// Run the crawl to completion and return its statistics
    pub async fn run(mut self) -> Result<CrawlStats, ScoutError> {
        // Override the WebDriver URL with an environment variable if provided
        if let Ok(webdriver_url) = std::env::var("WEBDRIVER_URL") {
            if !webdriver_url.is_empty() {
                self.config.webdriver_url = webdriver_url;
            }
        }
        crawler::run_crawl(self.config).await
    }
}
