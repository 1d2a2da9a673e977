//! Settle phase: give the page time to finish rendering before
//! explorers start poking at it.

use tokio::time::sleep;

use crate::commands::ClickCommand;
use crate::error::ScoutError;

use super::ExplorationContext;

/// Consent banners that would otherwise sit over the page and eat
/// clicks.
const COOKIE_BANNER_SELECTORS: &[&str] = &[
    "#onetrust-accept-btn-handler",
    "button[id*='cookie'][id*='accept']",
    "[class*='cookie-banner'] button",
    "[class*='cookie-consent'] button",
    "button[aria-label*='ccept cookies']",
];

/// How many times the DOM is re-read while waiting for it to stop
/// changing.
const STABILITY_POLLS: u32 = 5;

/// Wait out initial rendering, dismiss consent banners, then poll the
/// DOM until it stops changing.
pub async fn settle(ctx: &mut ExplorationContext) -> Result<(), ScoutError> {
    sleep(ctx.config.settle_delay()).await;
    dismiss_cookie_banner(ctx).await;
    wait_for_stable_dom(ctx).await
}

async fn dismiss_cookie_banner(ctx: &mut ExplorationContext) {
    for selector in COOKIE_BANNER_SELECTORS {
        let elements = match ctx.driver.find_all(selector).await {
            Ok(elements) => elements,
            Err(e) => {
                ::log::debug!("Banner lookup '{}' failed: {}", selector, e);
                continue;
            }
        };
        for element in &elements {
            if !element.is_visible().await.unwrap_or(false) {
                continue;
            }
            let command = ClickCommand::for_element(selector, element.as_ref()).await;
            match ctx.executor.run(&command, &ctx.command_ctx()).await {
                Ok(()) => {
                    ::log::info!("Dismissed consent banner on {}", ctx.job.url);
                    sleep(ctx.config.settle_delay()).await;
                    return;
                }
                Err(e) => {
                    ::log::debug!("Banner dismissal failed on {}: {}", ctx.job.url, e);
                    ctx.page_errors += 1;
                }
            }
        }
    }
}

/// Poll the page source until two consecutive reads have the same
/// length, or the poll limit runs out.
async fn wait_for_stable_dom(ctx: &ExplorationContext) -> Result<(), ScoutError> {
    let mut previous: Option<usize> = None;
    for _ in 0..STABILITY_POLLS {
        let length = ctx.driver.source().await?.len();
        if previous == Some(length) {
            return Ok(());
        }
        previous = Some(length);
        sleep(ctx.config.settle_delay() / 2).await;
    }
    ::log::debug!("DOM on {} never settled; continuing anyway", ctx.job.url);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::canonical::UrlScope;
    use crate::config::CrawlConfig;
    use crate::driver::fake::{FakeDom, FakeElement, FakePage};
    use crate::evidence::EvidenceStore;
    use crate::results::ScrapeJob;

    fn context(page: FakePage) -> ExplorationContext {
        let config = Arc::new(CrawlConfig {
            settle_delay_ms: 1,
            retry_delay_ms: 1,
            ..CrawlConfig::new("https://app.example.com/")
        });
        let start = url::Url::parse("https://app.example.com/").unwrap();
        let scope = Arc::new(UrlScope::for_start_url(&start, &[]).unwrap());
        ExplorationContext::new(
            ScrapeJob::seed("https://app.example.com/"),
            config,
            scope,
            Arc::new(page),
            Arc::new(EvidenceStore::new("unused")),
        )
    }

    #[tokio::test]
    async fn consent_banner_is_clicked_and_recorded() {
        let page = FakePage::new("https://app.example.com/");
        page.add_route(
            "https://app.example.com/",
            FakeDom::new("Home", "<body>content</body>").with_element(
                "#onetrust-accept-btn-handler",
                FakeElement::new("Accept all"),
            ),
        );

        let mut ctx = context(page.clone());
        settle(&mut ctx).await.unwrap();

        assert_eq!(page.clicks(), vec!["Accept all".to_string()]);
        assert_eq!(ctx.chain.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn pages_without_banners_settle_quietly() {
        let page = FakePage::new("https://app.example.com/");
        page.add_route(
            "https://app.example.com/",
            FakeDom::new("Home", "<body>steady content</body>"),
        );

        let mut ctx = context(page.clone());
        settle(&mut ctx).await.unwrap();

        assert!(page.clicks().is_empty());
        assert_eq!(ctx.page_errors, 0);
    }
}
