//! Capture phase: score the final page state and persist its evidence.

use chrono::Utc;
use scraper::{Html, Selector};
use url::Url;

use crate::error::ScoutError;
use crate::events::{CaptureEvent, EventBus};
use crate::results::ScrapeResult;
use crate::score::{PageObservation, Reliability, score};

use super::ExplorationContext;

/// Error toasts and banners that contaminate a capture.
const ERROR_UI_SELECTORS: &[&str] = &[
    ".toast-error",
    ".error-banner",
    "[role='alert']",
    ".alert-danger",
    ".MuiAlert-standardError",
];

/// In-progress rendering signals.
const LOADING_SELECTORS: &[&str] = &[
    ".spinner",
    ".loading",
    "[class*='skeleton']",
    "[aria-busy='true']",
];

const BROKEN_IMAGE_SCRIPT: &str =
    "return Array.from(document.images).filter(i => i.complete && i.naturalWidth === 0).length;";

const ROUTE_LOG_SCRIPT: &str = "return window.__routeLog || [];";

/// A PNG shorter than this is a failed screenshot, not evidence.
const MIN_PNG_BYTES: usize = 8;

/// Capture the page: merge hooked route changes, score the state,
/// persist evidence, and publish the capture event.
pub async fn capture(
    ctx: &mut ExplorationContext,
    bus: &EventBus,
) -> Result<ScrapeResult, ScoutError> {
    merge_hooked_routes(ctx).await;

    let url = ctx
        .driver
        .current_url()
        .await
        .unwrap_or_else(|_| ctx.job.url.clone());
    let page_title = ctx.driver.title().await.unwrap_or_default();
    let source = ctx.driver.source().await?;

    let observation = observe(ctx, &source).await;
    let reliability = score(&observation);
    if !reliability.reasons.is_empty() {
        ::log::info!(
            "Contaminated capture of {} (score {}): {:?}",
            url,
            reliability.score,
            reliability.reason_names()
        );
    }

    let mut screenshot_path = None;
    let mut screenshot_hash = None;
    match ctx.driver.screenshot().await {
        Ok(png) if png.len() >= MIN_PNG_BYTES => {
            match save_evidence(ctx, &url, None, &png, &reliability) {
                Ok((path, hash)) => {
                    screenshot_path = Some(path);
                    screenshot_hash = Some(hash);
                }
                Err(e) => ::log::warn!("Failed to persist evidence for {}: {}", url, e),
            }
        }
        Ok(_) => ::log::warn!("Screenshot of {} was empty; skipping evidence", url),
        Err(e) => ::log::warn!("Screenshot of {} failed: {}", url, e),
    }

    let action_chain = ctx.chain.lock().await.clone();
    let action_label = action_chain
        .last()
        .map(|record| record.label.clone())
        .unwrap_or_else(|| "navigate".to_string());

    bus.publish(CaptureEvent {
        url: url.clone(),
        action_label,
        reliability_score: reliability.score,
        contamination_reasons: reliability.reason_names(),
        screenshot_hash,
        timestamp: Utc::now(),
    });

    let links = ctx.links.clone();
    let newly_discovered_count = links.len();
    Ok(ScrapeResult {
        url,
        page_title,
        elements: element_summary(&source),
        links,
        screenshot_path,
        modal_discoveries: ctx.modals.clone(),
        action_chain,
        reliability_score: reliability.score,
        contamination_reasons: reliability.reason_names(),
        newly_discovered_count,
        error: None,
    })
}

/// Best-effort capture of a transient UI state (filter/toggle
/// variants). Failures are logged, never propagated.
pub async fn capture_variant(ctx: &mut ExplorationContext, suffix: &str) {
    let url = ctx
        .driver
        .current_url()
        .await
        .unwrap_or_else(|_| ctx.job.url.clone());
    let source = match ctx.driver.source().await {
        Ok(source) => source,
        Err(e) => {
            ::log::debug!("Variant '{}' source read failed: {}", suffix, e);
            return;
        }
    };
    let reliability = score(&observe(ctx, &source).await);

    match ctx.driver.screenshot().await {
        Ok(png) if png.len() >= MIN_PNG_BYTES => {
            match save_evidence(ctx, &url, Some(suffix), &png, &reliability) {
                Ok((path, _)) => ctx.variant_paths.push(path),
                Err(e) => ::log::warn!("Variant '{}' evidence failed on {}: {}", suffix, url, e),
            }
        }
        Ok(_) => {}
        Err(e) => ::log::debug!("Variant '{}' screenshot failed: {}", suffix, e),
    }
}

/// Gather the page signals the scorer consumes.
pub async fn observe(ctx: &ExplorationContext, source: &str) -> PageObservation {
    let broken_image_count = match ctx.driver.evaluate(BROKEN_IMAGE_SCRIPT).await {
        Ok(value) => value.as_u64().unwrap_or(0) as u32,
        Err(e) => {
            ::log::debug!("Broken image probe failed: {}", e);
            0
        }
    };

    PageObservation {
        body_text: body_text(source),
        error_ui_visible: any_visible(ctx, ERROR_UI_SELECTORS).await,
        loading_visible: any_visible(ctx, LOADING_SELECTORS).await,
        broken_image_count,
    }
}

async fn any_visible(ctx: &ExplorationContext, selectors: &[&str]) -> bool {
    for selector in selectors {
        let Ok(elements) = ctx.driver.find_all(selector).await else {
            continue;
        };
        for element in &elements {
            if element.is_visible().await.unwrap_or(false) {
                return true;
            }
        }
    }
    false
}

/// Read back URLs the route hook recorded during exploration.
async fn merge_hooked_routes(ctx: &mut ExplorationContext) {
    let Ok(value) = ctx.driver.evaluate(ROUTE_LOG_SCRIPT).await else {
        return;
    };
    let Some(routes) = value.as_array() else {
        return;
    };
    for route in routes {
        if let Some(href) = route.as_str() {
            if let Some(resolved) = ctx.scope.resolve(&ctx.job.url, href) {
                ctx.record_link(resolved.as_str(), "route-change");
            }
        }
    }
}

fn save_evidence(
    ctx: &ExplorationContext,
    url: &str,
    variant: Option<&str>,
    png: &[u8],
    reliability: &Reliability,
) -> Result<(String, String), ScoutError> {
    let parsed = Url::parse(url).map_err(|e| ScoutError::Navigation {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    let route = ctx.scope.canonical_route(&parsed);
    let (paths, record) = ctx.evidence.save(&parsed, &route, variant, png, reliability)?;
    Ok((paths.image.display().to_string(), record.hash))
}

/// Visible text of the document body, whitespace-collapsed.
fn body_text(source: &str) -> String {
    let document = Html::parse_document(source);
    let body = Selector::parse("body").unwrap();
    let text: Vec<&str> = match document.select(&body).next() {
        Some(body) => body.text().map(str::trim).filter(|t| !t.is_empty()).collect(),
        None => Vec::new(),
    };
    text.join(" ")
}

/// Short labels of the interactive elements present in the source.
fn element_summary(source: &str) -> Vec<String> {
    let document = Html::parse_document(source);
    let interactive = Selector::parse("button, a[href], select, input").unwrap();
    let mut labels = Vec::new();
    for element in document.select(&interactive) {
        let text: String = element.text().collect::<Vec<_>>().join(" ");
        let text = text.trim();
        if !text.is_empty() && !labels.iter().any(|l| l == text) {
            labels.push(text.to_string());
        }
        if labels.len() >= 50 {
            break;
        }
    }
    labels
}
