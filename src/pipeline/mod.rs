//! Per-page exploration pipeline.
//!
//! Every job runs the same four phases in order: Navigate, Settle,
//! Explore, Capture. A failing phase degrades the result instead of
//! aborting it; whatever later phases can still produce is kept.

pub mod capture;
pub mod settle;

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::canonical::UrlScope;
use crate::commands::CommandContext;
use crate::commands::executor::CommandExecutor;
use crate::config::CrawlConfig;
use crate::driver::PageDriver;
use crate::error::ScoutError;
use crate::events::EventBus;
use crate::evidence::EvidenceStore;
use crate::explorers;
use crate::network::NetworkCorrelator;
use crate::results::{ActionRecord, DiscoveredLink, ModalDiscovery, ScrapeJob, ScrapeResult, VisitedSets};

/// Hook installed after navigation so client-side route changes leave
/// a trace the capture phase can read back.
const ROUTE_HOOK: &str = r#"
if (!window.__routeLog) {
    window.__routeLog = [];
    const record = function () { window.__routeLog.push(location.href); };
    const wrap = function (fn) {
        return function () {
            const result = fn.apply(this, arguments);
            record();
            return result;
        };
    };
    history.pushState = wrap(history.pushState);
    history.replaceState = wrap(history.replaceState);
    window.addEventListener('popstate', record);
}
return true;
"#;

/// Everything one exploration pass over one URL works with.
///
/// Owned by a single worker for the duration of the job; the action
/// chain and correlator are behind `Arc` only so command contexts can
/// share them.
pub struct ExplorationContext {
    pub job: ScrapeJob,
    pub config: Arc<CrawlConfig>,
    pub scope: Arc<UrlScope>,
    pub driver: Arc<dyn PageDriver>,
    pub executor: CommandExecutor,
    pub correlator: Arc<NetworkCorrelator>,
    pub chain: Arc<Mutex<Vec<ActionRecord>>>,
    pub evidence: Arc<EvidenceStore>,
    pub visited: VisitedSets,
    pub links: Vec<DiscoveredLink>,
    pub modals: Vec<ModalDiscovery>,
    /// Action labels leading to the state being explored.
    pub breadcrumb: Vec<String>,
    /// Interaction errors accumulated on this page.
    pub page_errors: u32,
    /// Evidence paths of variant captures (filter/toggle states).
    pub variant_paths: Vec<String>,
}

impl ExplorationContext {
    pub fn new(
        job: ScrapeJob,
        config: Arc<CrawlConfig>,
        scope: Arc<UrlScope>,
        driver: Arc<dyn PageDriver>,
        evidence: Arc<EvidenceStore>,
    ) -> Self {
        let executor = CommandExecutor::from_config(&config);
        Self {
            job,
            config,
            scope,
            driver,
            executor,
            correlator: Arc::new(NetworkCorrelator::new()),
            chain: Arc::new(Mutex::new(Vec::new())),
            evidence,
            visited: VisitedSets::default(),
            links: Vec::new(),
            modals: Vec::new(),
            breadcrumb: Vec::new(),
            page_errors: 0,
            variant_paths: Vec::new(),
        }
    }

    /// Command context sharing this page's chain and correlator.
    pub fn command_ctx(&self) -> CommandContext {
        CommandContext {
            driver: Arc::clone(&self.driver),
            chain: Arc::clone(&self.chain),
            correlator: Some(Arc::clone(&self.correlator)),
        }
    }

    /// Record a discovered link with the breadcrumb that led to it.
    /// Duplicate URLs within one pass are dropped.
    pub fn record_link(&mut self, url: &str, via: &str) {
        if self.links.iter().any(|l| l.url == url) {
            return;
        }
        let mut path = self.breadcrumb.clone();
        if !via.is_empty() {
            path.push(via.to_string());
        }
        self.links.push(DiscoveredLink {
            url: url.to_string(),
            path,
        });
    }
}

/// Run the full pipeline for one job and produce its result.
pub async fn run(mut ctx: ExplorationContext, bus: &EventBus) -> ScrapeResult {
    let mut phase_errors: Vec<String> = Vec::new();

    if let Err(e) = navigate(&ctx).await {
        ::log::warn!("Navigate failed for {}: {}", ctx.job.url, e);
        phase_errors.push(format!("navigate: {e}"));
    }

    if let Err(e) = settle::settle(&mut ctx).await {
        ::log::warn!("Settle failed for {}: {}", ctx.job.url, e);
        phase_errors.push(format!("settle: {e}"));
    }

    if let Err(e) = explore(&mut ctx).await {
        ::log::warn!("Explore failed for {}: {}", ctx.job.url, e);
        phase_errors.push(format!("explore: {e}"));
    }

    match capture::capture(&mut ctx, bus).await {
        Ok(mut result) => {
            if !phase_errors.is_empty() {
                result.error = Some(phase_errors.join("; "));
            }
            result
        }
        Err(e) => {
            ::log::warn!("Capture failed for {}: {}", ctx.job.url, e);
            phase_errors.push(format!("capture: {e}"));
            ScrapeResult {
                url: ctx.job.url.clone(),
                links: ctx.links.clone(),
                modal_discoveries: ctx.modals.clone(),
                action_chain: ctx.chain.lock().await.clone(),
                newly_discovered_count: ctx.links.len(),
                error: Some(phase_errors.join("; ")),
                ..Default::default()
            }
        }
    }
}

/// Navigate phase: load the job URL and install the route hook.
async fn navigate(ctx: &ExplorationContext) -> Result<(), ScoutError> {
    ctx.driver
        .goto(&ctx.job.url)
        .await
        .map_err(|e| ScoutError::Navigation {
            url: ctx.job.url.clone(),
            reason: e.to_string(),
        })?;
    ctx.driver
        .wait_for_load(ctx.config.command_timeout() * 5)
        .await?;

    // SPA frameworks swap routes without a document load; the hook
    // records those transitions for the capture phase.
    if let Err(e) = ctx.driver.evaluate(ROUTE_HOOK).await {
        ::log::debug!("Route hook not installed on {}: {}", ctx.job.url, e);
    }
    Ok(())
}

/// Explore phase: run every registered explorer in order.
///
/// Individual explorer failures are tolerated; once the per-page error
/// threshold is crossed the page is reloaded before continuing.
async fn explore(ctx: &mut ExplorationContext) -> Result<(), ScoutError> {
    for explorer in explorers::default_explorers() {
        if ctx.page_errors > ctx.config.page_error_threshold {
            ::log::warn!(
                "{} interaction errors on {}; reloading before continuing",
                ctx.page_errors,
                ctx.job.url
            );
            if let Err(e) = ctx.driver.goto(&ctx.job.url).await {
                return Err(ScoutError::Navigation {
                    url: ctx.job.url.clone(),
                    reason: e.to_string(),
                });
            }
            let _ = ctx
                .driver
                .wait_for_load(ctx.config.command_timeout() * 5)
                .await;
            ctx.page_errors = 0;
        }

        match explorer.scan(ctx).await {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                ::log::warn!(
                    "Explorer '{}' failed on {}: {}",
                    explorer.name(),
                    ctx.job.url,
                    e
                );
                ctx.page_errors += 1;
            }
        }
    }
    Ok(())
}
