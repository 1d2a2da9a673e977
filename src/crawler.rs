//! Crawl orchestration: session bootstrap, frontier seeding, the
//! worker pool, and the capture-event recorder.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, watch};

use crate::canonical::UrlScope;
use crate::config::CrawlConfig;
use crate::driver::webdriver::WebDriverFactory;
use crate::driver::DriverFactory;
use crate::error::ScoutError;
use crate::events::EventBus;
use crate::evidence::EvidenceStore;
use crate::frontier::Frontier;
use crate::history::{JsonMapStore, RescanList, RlHistory, RlState};
use crate::pipeline::{self, ExplorationContext};
use crate::results::ScrapeResult;
use crate::session::SessionManager;

/// Aggregate outcome of one crawl.
#[derive(Debug, Clone, Default)]
pub struct CrawlStats {
    pub pages_explored: usize,
    pub links_discovered: usize,
    pub modals_discovered: usize,
    /// Captures at or above the stability threshold.
    pub golden_paths: usize,
    /// Captures with at least one contamination reason.
    pub contaminated: usize,
    pub page_errors: usize,
}

/// Run a crawl against the WebDriver endpoint from the configuration.
pub async fn run_crawl(config: CrawlConfig) -> Result<CrawlStats, ScoutError> {
    let factory: Arc<dyn DriverFactory> =
        Arc::new(WebDriverFactory::new(&config.webdriver_url).with_headless(config.headless));
    let (_cancel_tx, cancel_rx) = watch::channel(false);
    run_crawl_with(config, factory, cancel_rx).await
}

/// Run a crawl with an explicit driver factory and cancellation signal.
pub async fn run_crawl_with(
    config: CrawlConfig,
    factory: Arc<dyn DriverFactory>,
    cancel: watch::Receiver<bool>,
) -> Result<CrawlStats, ScoutError> {
    config.validate()?;
    let started = Instant::now();
    let config = Arc::new(config);

    let start_url = url::Url::parse(&config.start_url)
        .map_err(|e| ScoutError::Config(format!("start_url: {e}")))?;
    let scope = Arc::new(
        UrlScope::for_start_url(&start_url, &config.exclude_patterns)
            .map_err(|e| ScoutError::Config(format!("exclude pattern: {e}")))?,
    );

    let evidence = Arc::new(EvidenceStore::new(&config.output_dir));
    let session = Arc::new(SessionManager::new(
        std::path::Path::new(&config.output_dir).join("session"),
    ));
    let history = Arc::new(RlHistory::new(
        std::path::Path::new(&config.output_dir).join("rl-history.json"),
    ));
    let bus = Arc::new(EventBus::new());
    let frontier = Arc::new(Frontier::new(
        Arc::clone(&scope),
        config.max_depth,
        config.max_pages,
        config.per_route_limit,
        cancel,
    ));

    // Authenticate up front with a dedicated page; workers then only
    // restore the persisted cookies. Auth failures are fatal.
    if config.has_credentials() {
        let driver = factory.create().await?;
        session.ensure_session(&driver, &config).await?;
    }

    frontier.enqueue(&config.start_url, 0, None).await;
    seed_frontier(&config, &evidence, &frontier).await?;

    let reasons = Arc::new(JsonMapStore::new(
        std::path::Path::new(&config.output_dir).join("reasons.json"),
    ));
    let recorder = spawn_recorder(&bus, Arc::clone(&history), reasons);
    let stats = Arc::new(Mutex::new(CrawlStats::default()));

    let mut workers = Vec::with_capacity(config.max_concurrency);
    for worker_id in 0..config.max_concurrency {
        workers.push(tokio::spawn(worker_loop(
            worker_id,
            Arc::clone(&config),
            Arc::clone(&scope),
            Arc::clone(&factory),
            Arc::clone(&frontier),
            Arc::clone(&evidence),
            Arc::clone(&session),
            Arc::clone(&bus),
            Arc::clone(&stats),
        )));
    }
    let mut worker_failure: Option<ScoutError> = None;
    for worker in workers {
        match worker.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                ::log::error!("Worker stopped: {}", e);
                if worker_failure.is_none() {
                    worker_failure = Some(e);
                }
            }
            Err(e) => ::log::error!("Worker task panicked: {}", e),
        }
    }

    // All publishers are gone once workers finish; the recorder drains
    // and exits when the channel closes.
    drop(bus);
    if let Err(e) = recorder.await {
        ::log::error!("Recorder task panicked: {}", e);
    }

    // A crawl that lost its workers to driver failures is a failed
    // crawl, not an empty success.
    if let Some(e) = worker_failure {
        return Err(e);
    }

    let stats = stats.lock().await.clone();
    ::log::info!(
        "Crawl finished in {:.1}s: {} pages, {} links, {} modals, {} golden, {} contaminated",
        started.elapsed().as_secs_f64(),
        stats.pages_explored,
        stats.links_discovered,
        stats.modals_discovered,
        stats.golden_paths,
        stats.contaminated
    );
    Ok(stats)
}

/// Seed the frontier beyond the start URL: resume marks from existing
/// evidence, and depth-1 jobs from the rescan list.
async fn seed_frontier(
    config: &CrawlConfig,
    evidence: &Arc<EvidenceStore>,
    frontier: &Arc<Frontier>,
) -> Result<(), ScoutError> {
    if config.resume && !config.force_rescan {
        let records = evidence.records()?;
        ::log::info!("Resuming: {} prior captures marked as seen", records.len());
        for record in records {
            frontier.mark_seen(&record.url).await;
        }
    }

    if let Some(path) = &config.rescan_list {
        let base = url::Url::parse(&config.start_url)
            .map_err(|e| ScoutError::Config(format!("start_url: {e}")))?;
        let jobs = RescanList::new(path).jobs(&base)?;
        ::log::info!("Rescan list adds {} routes", jobs.len());
        for job in jobs {
            frontier
                .enqueue(&job.url, job.depth, job.source_url.as_deref())
                .await;
        }
    }
    Ok(())
}

/// Subscribe to capture events, append them to the RL history, and
/// file contamination reasons where QA tooling reads them.
fn spawn_recorder(
    bus: &EventBus,
    history: Arc<RlHistory>,
    reasons: Arc<JsonMapStore>,
) -> tokio::task::JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if !event.contamination_reasons.is_empty() {
                        let key = match &event.screenshot_hash {
                            Some(hash) => format!("{}#{}", event.url, hash),
                            None => event.url.clone(),
                        };
                        if let Err(e) =
                            reasons.set(&key, &event.contamination_reasons.join(",")).await
                        {
                            ::log::warn!("Reason store update failed: {}", e);
                        }
                    }
                    let entry = RlState {
                        url: event.url,
                        action: event.action_label,
                        timestamp: event.timestamp,
                        reliability_score: event.reliability_score,
                        contamination_reasons: event.contamination_reasons,
                        screenshot_hash: event.screenshot_hash,
                    };
                    if let Err(e) = history.append(entry).await {
                        ::log::warn!("RL history append failed: {}", e);
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    ::log::warn!("RL recorder lagged; {} capture events dropped", missed);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Consecutive driver bring-up failures one worker tolerates before it
/// gives up and fails the crawl.
const MAX_DRIVER_FAILURES: u32 = 3;

#[allow(clippy::too_many_arguments)]
async fn worker_loop(
    worker_id: usize,
    config: Arc<CrawlConfig>,
    scope: Arc<UrlScope>,
    factory: Arc<dyn DriverFactory>,
    frontier: Arc<Frontier>,
    evidence: Arc<EvidenceStore>,
    session: Arc<SessionManager>,
    bus: Arc<EventBus>,
    stats: Arc<Mutex<CrawlStats>>,
) -> Result<(), ScoutError> {
    // The driver is created lazily so idle workers never open a page
    let mut driver = None;
    let mut driver_failures: u32 = 0;

    while let Some(job) = frontier.next_job(worker_id).await {
        let page = match &driver {
            Some(page) => Arc::clone(page),
            None => match factory.create().await {
                Ok(page) => {
                    if let Err(e) = session.ensure_session(&page, &config).await {
                        ::log::error!("Worker {} could not restore session: {}", worker_id, e);
                        frontier.requeue(job).await;
                        if e.is_fatal() {
                            return Err(e);
                        }
                        driver_failures += 1;
                        if driver_failures >= MAX_DRIVER_FAILURES {
                            return Err(e);
                        }
                        continue;
                    }
                    driver_failures = 0;
                    driver = Some(Arc::clone(&page));
                    page
                }
                Err(e) => {
                    ::log::error!("Worker {} has no driver: {}", worker_id, e);
                    // The job goes back so a healthier worker (or a
                    // recovered driver) can pick it up.
                    frontier.requeue(job).await;
                    driver_failures += 1;
                    if driver_failures >= MAX_DRIVER_FAILURES {
                        return Err(e.into());
                    }
                    continue;
                }
            },
        };

        ::log::info!(
            "Worker {} exploring {} (depth {})",
            worker_id,
            job.url,
            job.depth
        );
        let depth = job.depth;
        let ctx = ExplorationContext::new(
            job,
            Arc::clone(&config),
            Arc::clone(&scope),
            page,
            Arc::clone(&evidence),
        );
        let result = pipeline::run(ctx, &bus).await;

        // A mid-crawl bounce to the login page means the session died
        if result.url.contains("/login") && config.has_credentials() {
            ::log::warn!("Worker {} was redirected to login; invalidating session", worker_id);
            if let Err(e) = session.invalidate() {
                ::log::warn!("Session invalidation failed: {}", e);
            }
            driver = None;
        }

        record_stats(&stats, &config, &result).await;

        for link in &result.links {
            frontier
                .enqueue(&link.url, depth + 1, Some(&result.url))
                .await;
        }
        frontier.job_done().await;
    }
    ::log::debug!("Worker {} finished", worker_id);
    Ok(())
}

async fn record_stats(
    stats: &Arc<Mutex<CrawlStats>>,
    config: &CrawlConfig,
    result: &ScrapeResult,
) {
    let mut stats = stats.lock().await;
    stats.pages_explored += 1;
    stats.links_discovered += result.newly_discovered_count;
    stats.modals_discovered += result.modal_discoveries.len();
    if result.reliability_score >= config.stability_threshold {
        stats.golden_paths += 1;
    }
    if !result.contamination_reasons.is_empty() {
        stats.contaminated += 1;
    }
    if result.error.is_some() {
        stats.page_errors += 1;
    }
}
