//! Expands collapsed menus and harvests the links they reveal.

use async_trait::async_trait;
use tokio::time::sleep;

use crate::commands::ClickCommand;
use crate::error::ScoutError;
use crate::pipeline::ExplorationContext;

use super::{Explorer, harvest_links, trigger_label, usable};

const MENU_SELECTOR: &str = "button[aria-expanded='false']";

/// Menu expansions attempted per page.
const MAX_EXPANSIONS: usize = 3;

pub struct MenuExplorer;

#[async_trait]
impl Explorer for MenuExplorer {
    fn name(&self) -> &'static str {
        "menu"
    }

    async fn scan(&self, ctx: &mut ExplorationContext) -> Result<(), ScoutError> {
        let total = ctx.driver.find_all(MENU_SELECTOR).await?.len();
        let mut expanded = 0;

        for index in 0..total {
            if expanded >= MAX_EXPANSIONS {
                break;
            }
            // Re-resolve each round; expansion mutates the DOM.
            let elements = ctx.driver.find_all(MENU_SELECTOR).await?;
            let Some(element) = elements.get(index) else {
                break;
            };
            if !usable(element.as_ref()).await {
                continue;
            }
            let Some(label) = trigger_label(element.as_ref()).await else {
                continue;
            };
            if !ctx.visited.expanded_menus.insert(label.clone()) {
                continue;
            }

            let before = ctx.driver.current_url().await.unwrap_or_default();
            let command = ClickCommand::for_element(MENU_SELECTOR, element.as_ref()).await;
            if let Err(e) = ctx.executor.run(&command, &ctx.command_ctx()).await {
                ::log::debug!("Menu '{}' would not expand: {}", label, e);
                ctx.page_errors += 1;
                continue;
            }
            sleep(ctx.config.settle_delay()).await;

            let after = ctx.driver.current_url().await.unwrap_or_default();
            if after != before && !after.is_empty() {
                // Some "menus" are really nav buttons
                ctx.record_link(&after, &label);
                if let Err(e) = ctx.driver.goto(&before).await {
                    ::log::warn!("Could not return to {} after menu probe: {}", before, e);
                    ctx.page_errors += 1;
                }
            } else {
                // Links found while expanded trace back through the
                // expansion in their discovery path.
                ctx.breadcrumb.push(label.clone());
                harvest_links(ctx).await;
                ctx.breadcrumb.pop();
                // Collapse so the next expansion starts clean
                let _ = ctx.driver.press_escape().await;
            }
            expanded += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::context;
    use super::*;
    use crate::driver::fake::{FakeDom, FakeElement, FakePage};

    #[tokio::test]
    async fn expansion_reveals_links_and_collapses_after() {
        let page = FakePage::new("https://app.example.com/");
        page.add_route(
            "https://app.example.com/",
            FakeDom::new("Home", "<body></body>").with_element(
                MENU_SELECTOR,
                FakeElement::new("Reports").opens_overlay(
                    "<ul><li><a href='/reports/weekly'>Weekly</a></li>\
                     <li><a href='/reports/monthly'>Monthly</a></li></ul>",
                ),
            ),
        );

        let (mut ctx, _dir) = context(page.clone(), "https://app.example.com/");
        MenuExplorer.scan(&mut ctx).await.unwrap();

        let urls: Vec<&str> = ctx.links.iter().map(|l| l.url.as_str()).collect();
        assert!(urls.contains(&"https://app.example.com/reports/weekly"));
        assert!(urls.contains(&"https://app.example.com/reports/monthly"));
        assert_eq!(page.escape_presses(), 1);
        // Expansion label first, anchor text second
        assert_eq!(
            ctx.links[0].path,
            vec!["Reports".to_string(), "Weekly".to_string()]
        );
        assert_eq!(
            ctx.links[1].path,
            vec!["Reports".to_string(), "Monthly".to_string()]
        );
        // The breadcrumb is restored once the menu closes
        assert!(ctx.breadcrumb.is_empty());
    }

    #[tokio::test]
    async fn expansions_are_capped_and_deduped() {
        let page = FakePage::new("https://app.example.com/");
        let mut dom = FakeDom::new("Home", "<body></body>");
        for i in 0..5 {
            dom = dom.with_element(
                MENU_SELECTOR,
                FakeElement::new(&format!("Menu {i}"))
                    .with_rect(10.0 + 200.0 * i as f64, 10.0, 100.0, 20.0)
                    .opens_overlay("<a href='/x'>X</a>"),
            );
        }
        page.add_route("https://app.example.com/", dom);

        let (mut ctx, _dir) = context(page.clone(), "https://app.example.com/");
        MenuExplorer.scan(&mut ctx).await.unwrap();

        assert_eq!(
            page.clicks(),
            vec!["Menu 0".to_string(), "Menu 1".to_string(), "Menu 2".to_string()]
        );
        assert_eq!(ctx.visited.expanded_menus.len(), MAX_EXPANSIONS);
    }
}
