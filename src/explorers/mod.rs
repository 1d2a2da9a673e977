//! Element-category explorers.
//!
//! Each explorer scans one category of interactive elements on the
//! current page and triggers a small, capped sample of them through
//! the command layer. Explorers never abort a page over a single bad
//! element; failures are counted and the next candidate is tried.

pub mod actions;
pub mod filters;
pub mod menu;
pub mod pagination;
pub mod rows;
pub mod sidebar;
pub mod tabs;

use async_trait::async_trait;
use scraper::{Html, Selector};
use tokio::time::sleep;

use crate::commands::{ClickCommand, Command, infer_label};
use crate::driver::ElementHandle;
use crate::error::ScoutError;
use crate::evidence::EvidenceStore;
use crate::pipeline::ExplorationContext;
use crate::results::ModalDiscovery;
use crate::score::{PageObservation, score};

/// Longest trigger text an element may carry and still be a click
/// candidate; longer text is content, not a control.
pub const MAX_TRIGGER_TEXT: usize = 20;

/// One element-category scanner.
#[async_trait]
pub trait Explorer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn scan(&self, ctx: &mut ExplorationContext) -> Result<(), ScoutError>;
}

/// The explorers every page runs, in order. Navigation-shaped
/// categories run before state-mutating ones so link discovery happens
/// against the page's initial state.
pub fn default_explorers() -> Vec<Box<dyn Explorer>> {
    vec![
        Box::new(menu::MenuExplorer),
        Box::new(sidebar::SidebarExplorer),
        Box::new(actions::GlobalActionExplorer),
        Box::new(rows::RowExplorer),
        Box::new(pagination::PaginationExplorer),
        Box::new(tabs::TabExplorer),
        Box::new(filters::FilterExplorer),
    ]
}

/// What a probed click did to the page.
#[derive(Debug, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The click navigated; the URL was recorded and the page restored.
    Navigated(String),
    /// The page stayed put (possibly with an overlay, since handled).
    SamePage,
    /// The command failed or the candidate was unusable.
    Skipped,
}

/// Whether an element is worth interacting with at all.
pub async fn usable(element: &dyn ElementHandle) -> bool {
    element.is_visible().await.unwrap_or(false) && element.is_enabled().await.unwrap_or(false)
}

/// Dedup label for a click candidate, or `None` when the element's
/// label is empty or too long to be a control.
pub async fn trigger_label(element: &dyn ElementHandle) -> Option<String> {
    let label = infer_label(element).await;
    let trimmed = label.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_TRIGGER_TEXT {
        return None;
    }
    Some(trimmed.to_string())
}

/// Click one element through the command layer, settle, and classify
/// the outcome. Navigations are recorded as discovered links and then
/// undone; same-page clicks get modal extraction and an Escape to
/// dismiss whatever opened.
pub async fn click_probe(
    ctx: &mut ExplorationContext,
    selector: &str,
    element: &dyn ElementHandle,
) -> ProbeOutcome {
    let before = match ctx.driver.current_url().await {
        Ok(url) => url,
        Err(e) => {
            ::log::debug!("Probe aborted, current URL unreadable: {}", e);
            ctx.page_errors += 1;
            return ProbeOutcome::Skipped;
        }
    };

    let command = ClickCommand::for_element(selector, element).await;
    let label = command.label().to_string();
    if let Err(e) = ctx.executor.run(&command, &ctx.command_ctx()).await {
        ::log::debug!("Skipping '{}' on {}: {}", label, before, e);
        ctx.page_errors += 1;
        return ProbeOutcome::Skipped;
    }
    sleep(ctx.config.settle_delay()).await;

    let after = ctx
        .driver
        .current_url()
        .await
        .unwrap_or_else(|_| before.clone());
    if after != before {
        ctx.record_link(&after, &label);
        // Put the original page back so remaining candidates stay
        // reachable.
        if let Err(e) = ctx.driver.goto(&before).await {
            ::log::warn!("Could not return to {} after probe: {}", before, e);
            ctx.page_errors += 1;
        }
        return ProbeOutcome::Navigated(after);
    }

    if let Some(modal) = extract_modal(ctx, &label).await {
        ::log::info!("Modal '{}' discovered behind '{}'", modal.modal_title, label);
        ctx.modals.push(modal);
    }
    let _ = ctx.driver.press_escape().await;
    ProbeOutcome::SamePage
}

/// Overlay containers checked after a same-page click.
const MODAL_SELECTORS: &[&str] = &[
    "[role='dialog']",
    ".modal",
    ".MuiDialog-root",
    ".ant-modal",
    "[class*='drawer']",
];

struct ModalContent {
    title: String,
    text: String,
    elements: Vec<String>,
    links: Vec<String>,
}

/// Extract an overlay from the current page source, deduplicated by a
/// hash of its rendered text.
async fn extract_modal(ctx: &mut ExplorationContext, trigger: &str) -> Option<ModalDiscovery> {
    let source = ctx.driver.source().await.ok()?;
    let content = parse_modal(&source)?;

    let content_hash = EvidenceStore::content_hash(content.text.as_bytes());
    if !ctx.visited.modal_hashes.insert(content_hash.clone()) {
        return None;
    }

    let resolved: Vec<String> = content
        .links
        .iter()
        .filter_map(|href| ctx.scope.resolve(&ctx.job.url, href))
        .map(|url| url.to_string())
        .collect();
    for url in &resolved {
        ctx.record_link(url, trigger);
    }

    let screenshot_path = capture_modal_evidence(ctx, &content.text).await;

    Some(ModalDiscovery {
        trigger_text: trigger.to_string(),
        modal_title: content.title,
        elements: content.elements,
        links: resolved,
        screenshot_path,
        content_hash,
    })
}

async fn capture_modal_evidence(ctx: &ExplorationContext, modal_text: &str) -> Option<String> {
    let png = ctx.driver.screenshot().await.ok()?;
    let url = ctx.driver.current_url().await.ok()?;
    let parsed = url::Url::parse(&url).ok()?;
    let route = ctx.scope.canonical_route(&parsed);
    let reliability = score(&PageObservation {
        body_text: modal_text.to_string(),
        ..Default::default()
    });
    match ctx
        .evidence
        .save(&parsed, &route, Some("modal"), &png, &reliability)
    {
        Ok((paths, _)) => Some(paths.image.display().to_string()),
        Err(e) => {
            ::log::debug!("Modal evidence not saved for {}: {}", url, e);
            None
        }
    }
}

/// Parse the first non-empty overlay out of a page source.
///
/// Kept synchronous: parsed documents must not be held across awaits.
fn parse_modal(source: &str) -> Option<ModalContent> {
    let document = Html::parse_document(source);
    let title_selector = Selector::parse("h1, h2, h3, [class*='title']").unwrap();
    let button_selector = Selector::parse("button").unwrap();
    let link_selector = Selector::parse("a[href]").unwrap();

    for selector in MODAL_SELECTORS {
        let Ok(modal_selector) = Selector::parse(selector) else {
            continue;
        };
        for modal in document.select(&modal_selector) {
            let text: String = modal
                .text()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            if text.is_empty() {
                continue;
            }

            let title = modal
                .select(&title_selector)
                .next()
                .map(|t| t.text().collect::<String>().trim().to_string())
                .unwrap_or_default();
            let elements: Vec<String> = modal
                .select(&button_selector)
                .map(|b| b.text().collect::<String>().trim().to_string())
                .filter(|t| !t.is_empty())
                .take(10)
                .collect();
            let links: Vec<String> = modal
                .select(&link_selector)
                .filter_map(|a| a.value().attr("href"))
                .map(|href| href.to_string())
                .take(10)
                .collect();

            return Some(ModalContent {
                title,
                text,
                elements,
                links,
            });
        }
    }
    None
}

/// Collect every in-source link into the discovery set. Each link is
/// attributed through its anchor text; the action that revealed it
/// sits on the context breadcrumb.
pub async fn harvest_links(ctx: &mut ExplorationContext) {
    let Ok(source) = ctx.driver.source().await else {
        return;
    };
    for (href, text) in parse_hrefs(&source) {
        if let Some(resolved) = ctx.scope.resolve(&ctx.job.url, &href) {
            ctx.record_link(resolved.as_str(), &text);
        }
    }
}

fn parse_hrefs(source: &str) -> Vec<(String, String)> {
    let document = Html::parse_document(source);
    let link_selector = Selector::parse("a[href]").unwrap();
    document
        .select(&link_selector)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            let text = a.text().collect::<String>().trim().to_string();
            Some((href.to_string(), text))
        })
        .take(30)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::canonical::UrlScope;
    use crate::config::CrawlConfig;
    use crate::driver::PageDriver;
    use crate::driver::fake::{FakeDom, FakeElement, FakePage};
    use crate::results::ScrapeJob;

    pub(crate) fn context(page: FakePage, start_url: &str) -> (ExplorationContext, tempfile::TempDir) {
        let config = Arc::new(CrawlConfig {
            settle_delay_ms: 1,
            retry_delay_ms: 1,
            max_retries: 0,
            ..CrawlConfig::new(start_url)
        });
        let start = url::Url::parse(start_url).unwrap();
        let scope = Arc::new(UrlScope::for_start_url(&start, &[]).unwrap());
        let dir = tempfile::tempdir().unwrap();
        let ctx = ExplorationContext::new(
            ScrapeJob::seed(start_url),
            config,
            scope,
            Arc::new(page),
            Arc::new(EvidenceStore::new(dir.path())),
        );
        (ctx, dir)
    }

    #[tokio::test]
    async fn probe_records_navigation_and_restores_the_page() {
        let page = FakePage::new("https://app.example.com/");
        page.add_route(
            "https://app.example.com/",
            FakeDom::new("Home", "<body></body>").with_element(
                "button",
                FakeElement::new("Orders").navigates_to("https://app.example.com/orders"),
            ),
        );

        let (mut ctx, _dir) = context(page.clone(), "https://app.example.com/");
        let elements = ctx.driver.find_all("button").await.unwrap();
        let outcome = click_probe(&mut ctx, "button", elements[0].as_ref()).await;

        assert_eq!(
            outcome,
            ProbeOutcome::Navigated("https://app.example.com/orders".to_string())
        );
        assert_eq!(ctx.links[0].url, "https://app.example.com/orders");
        assert_eq!(
            page.current_url().await.unwrap(),
            "https://app.example.com/"
        );
    }

    #[tokio::test]
    async fn probe_extracts_and_dedups_modals() {
        let overlay = "<div role='dialog'><h2>Confirm delete</h2>\
                       <button>Delete</button><a href='/help'>Help</a></div>";
        let page = FakePage::new("https://app.example.com/");
        page.add_route(
            "https://app.example.com/",
            FakeDom::new("Home", "<body></body>")
                .with_element("button", FakeElement::new("Delete").opens_overlay(overlay))
                .with_element("button", FakeElement::new("Delete").opens_overlay(overlay)),
        );

        let (mut ctx, _dir) = context(page.clone(), "https://app.example.com/");
        let elements = ctx.driver.find_all("button").await.unwrap();
        for element in &elements {
            click_probe(&mut ctx, "button", element.as_ref()).await;
        }

        // Same overlay twice, one discovery
        assert_eq!(ctx.modals.len(), 1);
        assert_eq!(ctx.modals[0].modal_title, "Confirm delete");
        assert_eq!(ctx.modals[0].elements, vec!["Delete"]);
        assert_eq!(ctx.modals[0].links, vec!["https://app.example.com/help"]);
        assert!(page.escape_presses() >= 2);
    }

    #[tokio::test]
    async fn failed_clicks_are_skipped_and_counted() {
        let page = FakePage::new("https://app.example.com/");
        page.add_route(
            "https://app.example.com/",
            FakeDom::new("Home", "<body></body>")
                .with_element("button", FakeElement::new("Broken").fails_on_click()),
        );

        let (mut ctx, _dir) = context(page, "https://app.example.com/");
        let elements = ctx.driver.find_all("button").await.unwrap();
        let outcome = click_probe(&mut ctx, "button", elements[0].as_ref()).await;

        assert_eq!(outcome, ProbeOutcome::Skipped);
        assert_eq!(ctx.page_errors, 1);
    }

    #[tokio::test]
    async fn over_length_trigger_text_disqualifies_an_element() {
        let page = FakePage::new("https://app.example.com/");
        page.add_route(
            "https://app.example.com/",
            FakeDom::new("Home", "<body></body>")
                .with_element("button", FakeElement::new("A label far too long to be a control"))
                .with_element("button", FakeElement::new(""))
                .with_element("button", FakeElement::new("Save")),
        );

        let (ctx, _dir) = context(page, "https://app.example.com/");
        let elements = ctx.driver.find_all("button").await.unwrap();
        assert!(trigger_label(elements[0].as_ref()).await.is_none());
        assert!(trigger_label(elements[1].as_ref()).await.is_none());
        assert_eq!(
            trigger_label(elements[2].as_ref()).await,
            Some("Save".to_string())
        );
    }
}
