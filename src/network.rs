use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Correlates in-flight network requests with the UI action that
/// triggered them, and tracks rate-limit backoff state shared by all
/// command executions on one page.
///
/// The correlator does not sniff traffic itself; whoever observes
/// requests (a driver hook, a proxy, a page script) feeds URLs in via
/// [`NetworkCorrelator::observe`] while an action window is open.
#[derive(Default)]
pub struct NetworkCorrelator {
    inner: Mutex<CorrelatorState>,
}

#[derive(Default)]
struct CorrelatorState {
    current_action: Option<String>,
    matched: HashMap<String, Vec<String>>,
    backoff_until: Option<Instant>,
}

impl NetworkCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a correlation window for the named action. Any previously
    /// open window is closed implicitly.
    pub async fn begin_action(&self, label: &str) {
        let mut state = self.inner.lock().await;
        state.current_action = Some(label.to_string());
    }

    /// Close the current correlation window.
    pub async fn end_action(&self) {
        let mut state = self.inner.lock().await;
        state.current_action = None;
    }

    /// Record a request URL observed while an action window is open.
    /// Requests seen outside any window are dropped.
    pub async fn observe(&self, request_url: &str) {
        let mut state = self.inner.lock().await;
        let Some(label) = state.current_action.clone() else {
            ::log::trace!("Unattributed request: {}", request_url);
            return;
        };
        state
            .matched
            .entry(label)
            .or_default()
            .push(request_url.to_string());
    }

    /// Take the request URLs matched to an action, clearing them.
    pub async fn take_correlated(&self, label: &str) -> Vec<String> {
        let mut state = self.inner.lock().await;
        state.matched.remove(label).unwrap_or_default()
    }

    /// Note that the target application rate-limited us; executions
    /// should hold off for the given duration.
    pub async fn note_rate_limited(&self, backoff: Duration) {
        let mut state = self.inner.lock().await;
        let until = Instant::now() + backoff;
        // Never shorten an existing backoff
        state.backoff_until = Some(match state.backoff_until {
            Some(existing) if existing > until => existing,
            _ => until,
        });
        ::log::warn!("Rate limited; backing off for {:?}", backoff);
    }

    /// Remaining backoff, if any.
    pub async fn backoff_remaining(&self) -> Option<Duration> {
        let mut state = self.inner.lock().await;
        match state.backoff_until {
            Some(until) if until > Instant::now() => Some(until - Instant::now()),
            Some(_) => {
                state.backoff_until = None;
                None
            }
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn requests_attach_to_the_open_action_window() {
        let correlator = NetworkCorrelator::new();
        correlator.begin_action("Save").await;
        correlator.observe("https://api.example.com/orders").await;
        correlator.observe("https://api.example.com/audit").await;
        correlator.end_action().await;
        correlator.observe("https://api.example.com/stray").await;

        let matched = correlator.take_correlated("Save").await;
        assert_eq!(
            matched,
            vec![
                "https://api.example.com/orders".to_string(),
                "https://api.example.com/audit".to_string(),
            ]
        );
        // Taking clears the bucket
        assert!(correlator.take_correlated("Save").await.is_empty());
    }

    #[tokio::test]
    async fn stray_requests_are_dropped() {
        let correlator = NetworkCorrelator::new();
        correlator.observe("https://api.example.com/early").await;
        correlator.begin_action("Open").await;
        assert!(correlator.take_correlated("Open").await.is_empty());
    }

    #[tokio::test]
    async fn backoff_expires() {
        tokio::time::pause();
        let correlator = NetworkCorrelator::new();
        correlator
            .note_rate_limited(Duration::from_millis(200))
            .await;
        assert!(correlator.backoff_remaining().await.is_some());

        tokio::time::advance(Duration::from_millis(250)).await;
        assert!(correlator.backoff_remaining().await.is_none());
    }

    #[tokio::test]
    async fn backoff_never_shrinks() {
        tokio::time::pause();
        let correlator = NetworkCorrelator::new();
        correlator.note_rate_limited(Duration::from_secs(5)).await;
        correlator.note_rate_limited(Duration::from_millis(10)).await;

        tokio::time::advance(Duration::from_millis(50)).await;
        assert!(correlator.backoff_remaining().await.is_some());
    }
}
