//! Breadth-first crawl frontier keyed by canonical URL.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify, watch};
use url::Url;

use crate::canonical::UrlScope;
use crate::results::ScrapeJob;

/// Outcome of offering a URL to the frontier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    AlreadySeen,
    OutOfScope,
    TooDeep,
    LimitReached,
    RouteSaturated,
    Cancelled,
}

#[derive(Default)]
struct FrontierState {
    queue: VecDeque<ScrapeJob>,
    seen: HashSet<String>,
    route_counts: HashMap<String, usize>,
    total_enqueued: usize,
    in_flight: usize,
}

/// Bounded-depth, bounded-count BFS frontier of discovered URLs.
///
/// Safe for concurrent enqueue/dequeue; dedup is by canonical key so
/// detail-page variants of one logical route collapse together,
/// sampled up to a per-route ceiling.
pub struct Frontier {
    scope: Arc<UrlScope>,
    max_depth: usize,
    max_pages: usize,
    per_route_limit: usize,
    state: Mutex<FrontierState>,
    notify: Notify,
    cancel: watch::Receiver<bool>,
}

impl Frontier {
    pub fn new(
        scope: Arc<UrlScope>,
        max_depth: usize,
        max_pages: usize,
        per_route_limit: usize,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            scope,
            max_depth,
            max_pages,
            per_route_limit,
            state: Mutex::new(FrontierState::default()),
            notify: Notify::new(),
            cancel,
        }
    }

    pub fn scope(&self) -> &UrlScope {
        &self.scope
    }

    /// Offer a URL at a depth. No-op (with a reason) when the canonical
    /// key was already seen, the URL is out of scope, depth exceeds the
    /// maximum, the global ceiling is hit, or the route is saturated.
    pub async fn enqueue(
        &self,
        url: &str,
        depth: usize,
        source_url: Option<&str>,
    ) -> EnqueueOutcome {
        if *self.cancel.borrow() {
            return EnqueueOutcome::Cancelled;
        }
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(_) => return EnqueueOutcome::OutOfScope,
        };
        if !self.scope.should_visit(&parsed) {
            return EnqueueOutcome::OutOfScope;
        }
        if depth > self.max_depth {
            return EnqueueOutcome::TooDeep;
        }

        let key = self.scope.normalized_key(&parsed);
        let route = self.scope.canonical_route(&parsed);

        let mut state = self.state.lock().await;
        if state.seen.contains(&key) {
            return EnqueueOutcome::AlreadySeen;
        }
        if state.total_enqueued >= self.max_pages {
            return EnqueueOutcome::LimitReached;
        }
        let route_count = state.route_counts.get(&route).copied().unwrap_or(0);
        if route_count >= self.per_route_limit {
            return EnqueueOutcome::RouteSaturated;
        }

        state.seen.insert(key);
        *state.route_counts.entry(route).or_insert(0) += 1;
        state.total_enqueued += 1;
        state.queue.push_back(ScrapeJob {
            url: url.to_string(),
            depth,
            source_url: source_url.map(|s| s.to_string()),
        });
        drop(state);

        ::log::debug!("Queued for exploration: {} (depth {})", url, depth);
        self.notify.notify_one();
        EnqueueOutcome::Queued
    }

    /// Pre-mark a URL as seen without queueing it (resume).
    pub async fn mark_seen(&self, url: &str) {
        if let Ok(parsed) = Url::parse(url) {
            let key = self.scope.normalized_key(&parsed);
            let route = self.scope.canonical_route(&parsed);
            let mut state = self.state.lock().await;
            state.seen.insert(key);
            *state.route_counts.entry(route).or_insert(0) += 1;
        }
    }

    /// Pop the next job, waiting briefly for stragglers.
    ///
    /// Timeouts are staggered by worker id so shutdown is not one long
    /// serial wait: worker 0 keeps the longest patience.
    pub async fn next_job(&self, worker_id: usize) -> Option<ScrapeJob> {
        let base_timeout: u64 = 5;
        let patience =
            Duration::from_secs(base_timeout.saturating_sub(worker_id.min(4) as u64).max(1));

        loop {
            if *self.cancel.borrow() {
                ::log::info!("Worker {} stopping: crawl cancelled", worker_id);
                return None;
            }
            {
                let mut state = self.state.lock().await;
                if let Some(job) = state.queue.pop_front() {
                    state.in_flight += 1;
                    return Some(job);
                }
                if state.in_flight == 0 {
                    // Nothing queued and nothing running: no new work
                    // can appear.
                    return None;
                }
            }
            if tokio::time::timeout(patience, self.notify.notified())
                .await
                .is_err()
            {
                ::log::info!(
                    "Worker {} timed out waiting for new URLs, assuming no more work",
                    worker_id
                );
                return None;
            }
        }
    }

    /// Put a popped job back at the head of the queue; its worker could
    /// not run it. The job keeps its seen-set and counter slots.
    pub async fn requeue(&self, job: ScrapeJob) {
        let mut state = self.state.lock().await;
        state.queue.push_front(job);
        state.in_flight = state.in_flight.saturating_sub(1);
        drop(state);
        self.notify.notify_waiters();
    }

    /// Mark a popped job as finished so idle workers can wind down.
    pub async fn job_done(&self) {
        let mut state = self.state.lock().await;
        state.in_flight = state.in_flight.saturating_sub(1);
        drop(state);
        self.notify.notify_waiters();
    }

    /// Total jobs admitted over the life of the crawl.
    pub async fn total_enqueued(&self) -> usize {
        self.state.lock().await.total_enqueued
    }
}
