//! Exercises filter controls: select dropdowns and checkbox toggles.
//!
//! Toggled states are transient, so each checkbox-on state gets its
//! own variant capture before the box is flipped back.

use async_trait::async_trait;
use tokio::time::sleep;

use crate::commands::{CheckCommand, SelectCommand, infer_label};
use crate::error::ScoutError;
use crate::pipeline::{ExplorationContext, capture};

use super::{Explorer, usable};

const SELECT_SELECTOR: &str = "select";
const CHECKBOX_SELECTOR: &str = "input[type='checkbox']";

/// Options tried on the first select control.
const MAX_SELECT_OPTIONS: usize = 3;

/// Checkboxes toggled per page.
const MAX_TOGGLES: usize = 2;

pub struct FilterExplorer;

#[async_trait]
impl Explorer for FilterExplorer {
    fn name(&self) -> &'static str {
        "filters"
    }

    async fn scan(&self, ctx: &mut ExplorationContext) -> Result<(), ScoutError> {
        exercise_select(ctx).await?;
        exercise_checkboxes(ctx).await?;
        Ok(())
    }
}

/// Step the first usable select through its leading options, then put
/// the default back.
async fn exercise_select(ctx: &mut ExplorationContext) -> Result<(), ScoutError> {
    let elements = ctx.driver.find_all(SELECT_SELECTOR).await?;
    let Some(element) = elements.first() else {
        return Ok(());
    };
    if !usable(element.as_ref()).await {
        return Ok(());
    }
    let label = infer_label(element.as_ref()).await;
    if !ctx.visited.toggled_filters.insert(format!("select:{label}")) {
        return Ok(());
    }

    for index in 1..=MAX_SELECT_OPTIONS {
        let command = SelectCommand::new(SELECT_SELECTOR, &label, index);
        if let Err(e) = ctx.executor.run(&command, &ctx.command_ctx()).await {
            ::log::debug!("Select '{}' stopped at option {}: {}", label, index, e);
            ctx.page_errors += 1;
            break;
        }
        sleep(ctx.config.settle_delay()).await;
    }

    let restore = SelectCommand::new(SELECT_SELECTOR, &label, 0);
    if let Err(e) = ctx.executor.run(&restore, &ctx.command_ctx()).await {
        ::log::debug!("Select '{}' not restored to default: {}", label, e);
        ctx.page_errors += 1;
    }
    Ok(())
}

/// Toggle a sample of checkboxes on, capture the variant, and toggle
/// them back off.
async fn exercise_checkboxes(ctx: &mut ExplorationContext) -> Result<(), ScoutError> {
    let total = ctx.driver.find_all(CHECKBOX_SELECTOR).await?.len();
    let mut toggled = 0;

    for index in 0..total {
        if toggled >= MAX_TOGGLES {
            break;
        }
        let elements = ctx.driver.find_all(CHECKBOX_SELECTOR).await?;
        let Some(element) = elements.get(index) else {
            break;
        };
        if !usable(element.as_ref()).await {
            continue;
        }
        let mut label = infer_label(element.as_ref()).await;
        if label.is_empty() {
            label = format!("checkbox{index}");
        }
        if !ctx.visited.toggled_filters.insert(label.clone()) {
            continue;
        }

        let on = CheckCommand::for_element(CHECKBOX_SELECTOR, element.as_ref(), true).await;
        if let Err(e) = ctx.executor.run(&on, &ctx.command_ctx()).await {
            ::log::debug!("Checkbox '{}' would not toggle: {}", label, e);
            ctx.page_errors += 1;
            continue;
        }
        sleep(ctx.config.settle_delay()).await;

        capture::capture_variant(ctx, &format!("checkbox{toggled}-on")).await;

        let off = CheckCommand::for_element(CHECKBOX_SELECTOR, element.as_ref(), false).await;
        if let Err(e) = ctx.executor.run(&off, &ctx.command_ctx()).await {
            ::log::debug!("Checkbox '{}' left toggled on: {}", label, e);
            ctx.page_errors += 1;
        }
        toggled += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::tests::context;
    use super::*;
    use crate::driver::fake::{FakeDom, FakeElement, FakePage};

    #[tokio::test]
    async fn select_steps_through_options_and_restores_default() {
        let page = FakePage::new("https://app.example.com/orders");
        page.add_route(
            "https://app.example.com/orders",
            FakeDom::new(
                "Orders",
                "<body>Orders list with enough rendered content to look healthy</body>",
            )
            .with_element(
                SELECT_SELECTOR,
                FakeElement::new("Status").with_attr("id", "status-filter"),
            ),
        );

        let (mut ctx, _dir) = context(page.clone(), "https://app.example.com/orders");
        FilterExplorer.scan(&mut ctx).await.unwrap();

        let selections: Vec<String> = page.fills().into_iter().map(|(_, v)| v).collect();
        assert_eq!(
            selections,
            vec!["option:1", "option:2", "option:3", "option:0"]
        );
    }

    #[tokio::test]
    async fn checkbox_toggles_capture_a_variant_and_flip_back() {
        let page = FakePage::new("https://app.example.com/orders");
        page.add_route(
            "https://app.example.com/orders",
            FakeDom::new(
                "Orders",
                "<body>Orders list with enough rendered content to look healthy</body>",
            )
            .with_element(
                CHECKBOX_SELECTOR,
                FakeElement::new("Only overdue").with_rect(10.0, 10.0, 20.0, 20.0),
            ),
        );

        let (mut ctx, _dir) = context(page.clone(), "https://app.example.com/orders");
        FilterExplorer.scan(&mut ctx).await.unwrap();

        // On, then back off
        assert_eq!(page.clicks().len(), 2);
        assert_eq!(ctx.variant_paths.len(), 1);
        assert!(ctx.variant_paths[0].contains("checkbox0-on"));
        // Both toggles recorded on the chain with their states
        let chain = ctx.chain.lock().await;
        assert_eq!(chain[0].value.as_deref(), Some("on"));
        assert_eq!(chain[1].value.as_deref(), Some("off"));
    }

    #[tokio::test]
    async fn checkbox_sample_is_capped() {
        let page = FakePage::new("https://app.example.com/orders");
        let mut dom = FakeDom::new(
            "Orders",
            "<body>Orders list with enough rendered content to look healthy</body>",
        );
        for i in 0..4 {
            dom = dom.with_element(
                CHECKBOX_SELECTOR,
                FakeElement::new(&format!("Filter {i}"))
                    .with_rect(10.0, 30.0 * i as f64 + 10.0, 20.0, 20.0),
            );
        }
        page.add_route("https://app.example.com/orders", dom);

        let (mut ctx, _dir) = context(page.clone(), "https://app.example.com/orders");
        FilterExplorer.scan(&mut ctx).await.unwrap();

        // Two toggles, each on+off
        assert_eq!(page.clicks().len(), 2 * MAX_TOGGLES);
    }
}
