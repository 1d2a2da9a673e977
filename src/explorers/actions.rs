//! Probes global action buttons in headers and toolbars.
//!
//! These are the "New", "Export", "Invite" style controls that tend to
//! open modals, so the full click probe (with modal extraction) runs
//! for each.

use async_trait::async_trait;

use crate::error::ScoutError;
use crate::pipeline::ExplorationContext;

use super::{Explorer, click_probe, trigger_label, usable, ProbeOutcome};

const ACTION_SELECTORS: &[&str] = &[
    "header button",
    "[class*='toolbar'] button",
    "[class*='actions'] button",
];

/// Global actions triggered per page.
const MAX_ACTIONS: usize = 2;

pub struct GlobalActionExplorer;

#[async_trait]
impl Explorer for GlobalActionExplorer {
    fn name(&self) -> &'static str {
        "global-actions"
    }

    async fn scan(&self, ctx: &mut ExplorationContext) -> Result<(), ScoutError> {
        let mut triggered = 0;

        for selector in ACTION_SELECTORS {
            if triggered >= MAX_ACTIONS {
                break;
            }
            let total = ctx.driver.find_all(selector).await?.len();
            for index in 0..total {
                if triggered >= MAX_ACTIONS {
                    break;
                }
                let elements = ctx.driver.find_all(selector).await?;
                let Some(element) = elements.get(index) else {
                    break;
                };
                if !usable(element.as_ref()).await {
                    continue;
                }
                let Some(label) = trigger_label(element.as_ref()).await else {
                    continue;
                };
                if !ctx.visited.global_actions.insert(label) {
                    continue;
                }
                if click_probe(ctx, selector, element.as_ref()).await != ProbeOutcome::Skipped {
                    triggered += 1;
                }
            }
        }
        Ok(())
    }
}
