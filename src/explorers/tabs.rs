//! Switches through tab controls, leaving the page on whichever tab
//! was activated last.

use async_trait::async_trait;
use tokio::time::sleep;

use crate::commands::ClickCommand;
use crate::error::ScoutError;
use crate::pipeline::ExplorationContext;

use super::{Explorer, trigger_label, usable};

const TAB_SELECTOR: &str = "[role='tab']";

/// Tab switches per page.
const MAX_TABS: usize = 3;

pub struct TabExplorer;

#[async_trait]
impl Explorer for TabExplorer {
    fn name(&self) -> &'static str {
        "tabs"
    }

    async fn scan(&self, ctx: &mut ExplorationContext) -> Result<(), ScoutError> {
        let total = ctx.driver.find_all(TAB_SELECTOR).await?.len();
        let mut switched = 0;

        for index in 0..total {
            if switched >= MAX_TABS {
                break;
            }
            let elements = ctx.driver.find_all(TAB_SELECTOR).await?;
            let Some(element) = elements.get(index) else {
                break;
            };
            if !usable(element.as_ref()).await {
                continue;
            }
            // The active tab is already on screen
            if element
                .attr("aria-selected")
                .await
                .ok()
                .flatten()
                .is_some_and(|v| v == "true")
            {
                continue;
            }
            let Some(label) = trigger_label(element.as_ref()).await else {
                continue;
            };
            if !ctx.visited.switched_tabs.insert(label.clone()) {
                continue;
            }

            let before = ctx.driver.current_url().await.unwrap_or_default();
            let command = ClickCommand::for_element(TAB_SELECTOR, element.as_ref()).await;
            if let Err(e) = ctx.executor.run(&command, &ctx.command_ctx()).await {
                ::log::debug!("Tab '{}' would not switch: {}", label, e);
                ctx.page_errors += 1;
                continue;
            }
            sleep(ctx.config.settle_delay()).await;

            // URL-routed tab sets navigate; treat those as discoveries
            let after = ctx.driver.current_url().await.unwrap_or_default();
            if after != before && !after.is_empty() {
                ctx.record_link(&after, &label);
                if let Err(e) = ctx.driver.goto(&before).await {
                    ::log::warn!("Could not return to {} after tab switch: {}", before, e);
                    ctx.page_errors += 1;
                }
            }
            switched += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::context;
    use super::*;
    use crate::driver::PageDriver;
    use crate::driver::fake::{FakeDom, FakeElement, FakePage};

    #[tokio::test]
    async fn inactive_tabs_are_switched_up_to_the_cap() {
        let page = FakePage::new("https://app.example.com/settings");
        let mut dom = FakeDom::new("Settings", "<body></body>").with_element(
            TAB_SELECTOR,
            FakeElement::new("General").with_attr("aria-selected", "true"),
        );
        for (i, name) in ["Billing", "Members", "Security", "Advanced"].iter().enumerate() {
            dom = dom.with_element(
                TAB_SELECTOR,
                FakeElement::new(name)
                    .with_attr("aria-selected", "false")
                    .with_rect(150.0 + 120.0 * i as f64, 10.0, 100.0, 20.0),
            );
        }
        page.add_route("https://app.example.com/settings", dom);

        let (mut ctx, _dir) = context(page.clone(), "https://app.example.com/settings");
        TabExplorer.scan(&mut ctx).await.unwrap();

        // Active tab skipped, then three switches
        assert_eq!(
            page.clicks(),
            vec![
                "Billing".to_string(),
                "Members".to_string(),
                "Security".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn url_routed_tabs_become_links() {
        let page = FakePage::new("https://app.example.com/settings");
        page.add_route(
            "https://app.example.com/settings",
            FakeDom::new("Settings", "<body></body>").with_element(
                TAB_SELECTOR,
                FakeElement::new("Billing")
                    .navigates_to("https://app.example.com/settings/billing"),
            ),
        );

        let (mut ctx, _dir) = context(page.clone(), "https://app.example.com/settings");
        TabExplorer.scan(&mut ctx).await.unwrap();

        assert_eq!(ctx.links[0].url, "https://app.example.com/settings/billing");
        assert_eq!(
            page.current_url().await.unwrap(),
            "https://app.example.com/settings"
        );
    }
}
