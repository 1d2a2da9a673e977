//! Advances pagination by exactly one step.
//!
//! One step is enough: the next page is recorded as a discovered link
//! and becomes its own frontier job, so deeper pages are reached
//! without hammering the paginator within a single pass.

use async_trait::async_trait;

use crate::error::ScoutError;
use crate::pipeline::ExplorationContext;

use super::{Explorer, click_probe, usable, ProbeOutcome};

const PAGINATION_SELECTORS: &[&str] = &[
    "a[rel='next']",
    "button[aria-label*='ext']",
    "[class*='pagination'] button",
];

pub struct PaginationExplorer;

#[async_trait]
impl Explorer for PaginationExplorer {
    fn name(&self) -> &'static str {
        "pagination"
    }

    async fn scan(&self, ctx: &mut ExplorationContext) -> Result<(), ScoutError> {
        for selector in PAGINATION_SELECTORS {
            let elements = ctx.driver.find_all(selector).await?;
            for element in &elements {
                if !usable(element.as_ref()).await {
                    continue;
                }
                if click_probe(ctx, selector, element.as_ref()).await != ProbeOutcome::Skipped {
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}
