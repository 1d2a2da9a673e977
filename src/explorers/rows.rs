//! Samples table rows, which usually navigate to detail pages.

use async_trait::async_trait;

use crate::commands::truncate_label;
use crate::error::ScoutError;
use crate::pipeline::ExplorationContext;

use super::{Explorer, click_probe, usable};

const ROW_SELECTOR: &str = "table tbody tr";
const ROW_FALLBACK_SELECTOR: &str = "table tr";

/// Rows sampled per page; detail pages of one table are near-clones,
/// the frontier's per-route ceiling dedups the rest.
const MAX_ROWS: usize = 5;

pub struct RowExplorer;

#[async_trait]
impl Explorer for RowExplorer {
    fn name(&self) -> &'static str {
        "rows"
    }

    async fn scan(&self, ctx: &mut ExplorationContext) -> Result<(), ScoutError> {
        let mut selector = ROW_SELECTOR;
        let mut total = ctx.driver.find_all(selector).await?.len();
        if total == 0 {
            selector = ROW_FALLBACK_SELECTOR;
            total = ctx.driver.find_all(selector).await?.len();
        }

        let mut clicked = 0;
        for index in 0..total {
            if clicked >= MAX_ROWS {
                break;
            }
            let elements = ctx.driver.find_all(selector).await?;
            let Some(element) = elements.get(index) else {
                break;
            };
            if !usable(element.as_ref()).await {
                continue;
            }

            // Rows carry long content text; the dedup key is its
            // truncated prefix, and empty rows are skipped.
            let text = element.inner_text().await.unwrap_or_default();
            let key = truncate_label(text.trim());
            if key.is_empty() || !ctx.visited.clicked_rows.insert(key) {
                continue;
            }

            click_probe(ctx, selector, element.as_ref()).await;
            clicked += 1;
        }
        Ok(())
    }
}
