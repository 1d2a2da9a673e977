use clap::Parser;
use uiscout::config::CrawlConfig;
use uiscout::{Crawl, ScoutError};

mod args;
use args::Args;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    let args = Args::parse();
    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            ::log::error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    println!("Note: exploration requires a WebDriver server (e.g., ChromeDriver).");
    println!(
        "Set WEBDRIVER_URL environment variable if not using the default http://localhost:4444"
    );

    ::log::info!("Starting exploration of {}", config.start_url);
    std::process::exit(run(config).await);
}

async fn run(config: CrawlConfig) -> i32 {
    let start_url = config.start_url.clone();
    match Crawl::new(&start_url).with_config(config).run().await {
        Ok(stats) => {
            println!(
                "Explored {} pages: {} links, {} modals, {} golden paths, {} contaminated",
                stats.pages_explored,
                stats.links_discovered,
                stats.modals_discovered,
                stats.golden_paths,
                stats.contaminated
            );
            0
        }
        Err(e @ ScoutError::Auth(_)) => {
            ::log::error!("Authentication failed: {}", e);
            2
        }
        Err(e) => {
            ::log::error!("Crawl failed: {}", e);
            1
        }
    }
}
