use clap::Parser;
use uiscout::config::CrawlConfig;

#[derive(Parser, Debug)]
#[command(name = "uiscout")]
#[command(about = "Autonomous UI explorer that maps and screenshots web applications")]
#[command(version)]
pub struct Args {
    /// URL to start exploring from
    pub url: String,

    /// Maximum crawl depth from the start URL [default: 2]
    #[arg(short, long)]
    pub depth: Option<usize>,

    /// Maximum number of pages to explore [default: 50]
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Number of concurrent workers [default: 4]
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Login page URL, when the target requires authentication
    #[arg(long)]
    pub login_url: Option<String>,

    /// Login username (password comes from UISCOUT_PASSWORD)
    #[arg(long)]
    pub username: Option<String>,

    /// Root directory for evidence, history and session artifacts
    /// [default: data]
    #[arg(short, long)]
    pub output_dir: Option<String>,

    /// Seed the crawl from existing evidence instead of starting fresh
    #[arg(long)]
    pub resume: bool,

    /// Ignore existing evidence and re-capture every route
    #[arg(long)]
    pub force_rescan: bool,

    /// Path to a rescan list of routes to re-queue
    #[arg(long)]
    pub rescan_list: Option<String>,

    /// Load full configuration from a JSON file (other flags override)
    #[arg(long)]
    pub config: Option<String>,
}

impl Args {
    /// Build the crawl configuration from the command line, layering
    /// the flags the user actually passed over an optional config file.
    pub fn into_config(self) -> Result<CrawlConfig, uiscout::ScoutError> {
        let mut config = match &self.config {
            Some(path) => CrawlConfig::from_file(path)?,
            None => CrawlConfig::new(&self.url),
        };
        config.start_url = self.url;
        if let Some(depth) = self.depth {
            config.max_depth = depth;
        }
        if let Some(max_pages) = self.max_pages {
            config.max_pages = max_pages;
        }
        if let Some(concurrency) = self.concurrency {
            config.max_concurrency = concurrency;
        }
        if let Some(output_dir) = self.output_dir {
            config.output_dir = output_dir;
        }
        if self.resume {
            config.resume = true;
        }
        if self.force_rescan {
            config.force_rescan = true;
        }
        if self.login_url.is_some() {
            config.login_url = self.login_url;
        }
        if self.username.is_some() {
            config.username = self.username;
            config.password = std::env::var("UISCOUT_PASSWORD").ok();
        }
        if self.rescan_list.is_some() {
            config.rescan_list = self.rescan_list;
        }
        config.validate()?;
        Ok(config)
    }
}
