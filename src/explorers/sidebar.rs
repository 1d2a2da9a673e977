//! Collects navigation links from sidebars and nav regions.
//!
//! Link elements carry their destination in `href`, so this explorer
//! reads instead of clicking.

use async_trait::async_trait;

use crate::commands::infer_label;
use crate::error::ScoutError;
use crate::pipeline::ExplorationContext;

use super::{Explorer, usable};

const SIDEBAR_SELECTORS: &[&str] = &[
    "nav a[href]",
    "aside a[href]",
    "[class*='sidebar'] a[href]",
];

pub struct SidebarExplorer;

#[async_trait]
impl Explorer for SidebarExplorer {
    fn name(&self) -> &'static str {
        "sidebar"
    }

    async fn scan(&self, ctx: &mut ExplorationContext) -> Result<(), ScoutError> {
        for selector in SIDEBAR_SELECTORS {
            let elements = ctx.driver.find_all(selector).await?;
            for element in &elements {
                if !usable(element.as_ref()).await {
                    continue;
                }
                let Ok(Some(href)) = element.attr("href").await else {
                    continue;
                };
                if !ctx.visited.sidebar_items.insert(href.clone()) {
                    continue;
                }
                let Some(resolved) = ctx.scope.resolve(&ctx.job.url, &href) else {
                    continue;
                };
                let label = infer_label(element.as_ref()).await;
                ctx.record_link(resolved.as_str(), &label);
            }
        }
        Ok(())
    }
}
