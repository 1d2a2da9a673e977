use std::time::Duration;

use tokio::time::{sleep, timeout};

use super::{Command, CommandContext, exhausted};
use crate::config::CrawlConfig;
use crate::error::ScoutError;

/// Resource timing entries present before an action; entries appearing
/// past this index are attributed to the action.
const RESOURCE_COUNT_SCRIPT: &str = "return performance.getEntriesByType('resource').length;";

fn resource_slice_script(baseline: u64) -> String {
    format!(
        "return performance.getEntriesByType('resource').slice({baseline})\
         .map(function (e) {{ return e.name; }});"
    )
}

/// Runs commands with bounded retries and fixed backoff.
///
/// A command failing through every attempt is a recoverable failure
/// for that single interaction; callers skip the element and keep
/// exploring.
pub struct CommandExecutor {
    max_retries: u32,
    retry_delay: Duration,
    command_timeout: Duration,
}

impl CommandExecutor {
    pub fn new(max_retries: u32, retry_delay: Duration, command_timeout: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
            command_timeout,
        }
    }

    pub fn from_config(config: &CrawlConfig) -> Self {
        Self::new(
            config.max_retries,
            config.retry_delay(),
            config.command_timeout(),
        )
    }

    /// Execute a command, retrying up to the configured limit.
    ///
    /// The action record is appended to the chain before the first
    /// attempt, so the audit trail reflects intent even when execution
    /// ultimately fails. Exactly one record is appended per call.
    pub async fn run(&self, command: &dyn Command, ctx: &CommandContext) -> Result<(), ScoutError> {
        let url = ctx.driver.current_url().await.unwrap_or_default();
        let record_idx = {
            let mut chain = ctx.chain.lock().await;
            chain.push(command.to_record(&url));
            chain.len() - 1
        };

        let baseline = if ctx.correlator.is_some() {
            resource_baseline(ctx).await
        } else {
            0
        };
        if let Some(correlator) = &ctx.correlator {
            correlator.begin_action(command.label()).await;
        }

        let outcome = self.attempt_loop(command, ctx, &url).await;

        if let Some(correlator) = &ctx.correlator {
            feed_new_requests(ctx, baseline).await;
            correlator.end_action().await;
            let requests = correlator.take_correlated(command.label()).await;
            if !requests.is_empty() {
                let mut chain = ctx.chain.lock().await;
                if let Some(record) = chain.get_mut(record_idx) {
                    record.requests = requests;
                }
            }
        }

        outcome
    }

    async fn attempt_loop(
        &self,
        command: &dyn Command,
        ctx: &CommandContext,
        url: &str,
    ) -> Result<(), ScoutError> {
        let attempts = self.max_retries + 1;
        let mut last_err = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                sleep(self.retry_delay).await;
            }
            // Honor any rate-limit backoff before touching the page again
            if let Some(correlator) = &ctx.correlator {
                if let Some(remaining) = correlator.backoff_remaining().await {
                    sleep(remaining).await;
                }
            }

            if let Err(e) = command.validate(ctx).await {
                ::log::debug!(
                    "Command '{}' failed validation on {}: {}",
                    command.label(),
                    url,
                    e
                );
                last_err = Some(e);
                continue;
            }

            let attempt_result = timeout(self.command_timeout, command.execute(ctx)).await;
            match attempt_result {
                Ok(Ok(())) => {
                    ::log::debug!(
                        "Command '{}' succeeded on attempt {}/{}",
                        command.label(),
                        attempt,
                        attempts
                    );
                    return Ok(());
                }
                Ok(Err(e)) => {
                    ::log::warn!(
                        "Command '{}' failed on {} (attempt {}/{}): {}",
                        command.label(),
                        url,
                        attempt,
                        attempts,
                        e
                    );
                    last_err = Some(e);
                }
                Err(_) => {
                    ::log::warn!(
                        "Command '{}' timed out on {} (attempt {}/{})",
                        command.label(),
                        url,
                        attempt,
                        attempts
                    );
                    last_err = Some(crate::driver::DriverError::Timeout(format!(
                        "command '{}'",
                        command.label()
                    )));
                }
            }
        }

        let source = last_err
            .unwrap_or_else(|| crate::driver::DriverError::Command("no attempts made".to_string()));
        Err(exhausted(command.label(), attempts, source))
    }
}

/// Count of resource timing entries already on the page. Pages without
/// the Performance API just correlate nothing.
async fn resource_baseline(ctx: &CommandContext) -> u64 {
    match ctx.driver.evaluate(RESOURCE_COUNT_SCRIPT).await {
        Ok(value) => value.as_u64().unwrap_or(0),
        Err(e) => {
            ::log::trace!("Resource baseline unavailable: {}", e);
            0
        }
    }
}

/// Read the resource entries the action produced and feed them to the
/// correlator while its window is still open.
async fn feed_new_requests(ctx: &CommandContext, baseline: u64) {
    let Some(correlator) = &ctx.correlator else {
        return;
    };
    let value = match ctx.driver.evaluate(&resource_slice_script(baseline)).await {
        Ok(value) => value,
        Err(e) => {
            ::log::trace!("Resource entries unreadable: {}", e);
            return;
        }
    };
    if let Some(entries) = value.as_array() {
        for entry in entries {
            if let Some(request_url) = entry.as_str() {
                correlator.observe(request_url).await;
            }
        }
    }
}
