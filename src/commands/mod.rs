pub mod executor;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::driver::{DriverError, ElementHandle, PageDriver};
use crate::error::ScoutError;
use crate::network::NetworkCorrelator;
use crate::results::{ActionKind, ActionRecord};

/// Longest label kept for dedup keys and action records.
pub const MAX_LABEL_LEN: usize = 30;

/// Everything a command needs to run: the page, the shared action
/// chain, and an optional network correlator.
pub struct CommandContext {
    pub driver: Arc<dyn PageDriver>,
    pub chain: Arc<Mutex<Vec<ActionRecord>>>,
    pub correlator: Option<Arc<NetworkCorrelator>>,
}

/// One UI action as a value object that can execute itself and
/// serialize into an action record.
#[async_trait]
pub trait Command: Send + Sync {
    fn kind(&self) -> ActionKind;

    fn selector(&self) -> &str;

    fn label(&self) -> &str;

    fn value(&self) -> Option<&str> {
        None
    }

    /// Perform the underlying driver action once.
    async fn execute(&self, ctx: &CommandContext) -> Result<(), DriverError>;

    /// Optional precondition check; failure skips execution.
    async fn validate(&self, _ctx: &CommandContext) -> Result<(), DriverError> {
        Ok(())
    }

    /// Serialize this command into its audit record.
    fn to_record(&self, url: &str) -> ActionRecord {
        ActionRecord {
            kind: self.kind(),
            selector: self.selector().to_string(),
            label: self.label().to_string(),
            value: self.value().map(|v| v.to_string()),
            url: url.to_string(),
            timestamp: Utc::now(),
            requests: Vec::new(),
        }
    }
}

/// Infer a short human-readable label for an element.
///
/// Preference order: `id`, `aria-label`, `name`, visible text. The
/// result is truncated so labels stay usable as dedup keys.
pub async fn infer_label(element: &dyn ElementHandle) -> String {
    for attr in ["id", "aria-label", "name"] {
        if let Ok(Some(value)) = element.attr(attr).await {
            let value = value.trim();
            if !value.is_empty() {
                return truncate_label(value);
            }
        }
    }
    match element.inner_text().await {
        Ok(text) => truncate_label(text.trim()),
        Err(_) => String::new(),
    }
}

/// Truncate a label to [`MAX_LABEL_LEN`] characters on a char boundary.
pub fn truncate_label(label: &str) -> String {
    label.chars().take(MAX_LABEL_LEN).collect()
}

/// Click an element, preferring coordinate clicks over selector
/// re-resolution.
///
/// DOM structure can shift between element resolution and execution;
/// a stored center point survives that, a selector may not.
pub struct ClickCommand {
    selector: String,
    label: String,
    point: Option<(f64, f64)>,
}

impl ClickCommand {
    pub fn new(selector: &str, label: &str) -> Self {
        Self {
            selector: selector.to_string(),
            label: truncate_label(label),
            point: None,
        }
    }

    /// Build a click for an already-located element, inferring the
    /// label and capturing the element center when a box is available.
    pub async fn for_element(selector: &str, element: &dyn ElementHandle) -> Self {
        let label = infer_label(element).await;
        let point = element
            .bounding_box()
            .await
            .ok()
            .flatten()
            .map(|rect| rect.center());
        Self {
            selector: selector.to_string(),
            label,
            point,
        }
    }
}

#[async_trait]
impl Command for ClickCommand {
    fn kind(&self) -> ActionKind {
        ActionKind::Click
    }

    fn selector(&self) -> &str {
        &self.selector
    }

    fn label(&self) -> &str {
        &self.label
    }

    async fn execute(&self, ctx: &CommandContext) -> Result<(), DriverError> {
        if let Some((x, y)) = self.point {
            return ctx.driver.click_at(x, y).await;
        }
        let elements = ctx.driver.find_all(&self.selector).await?;
        let element = elements
            .first()
            .ok_or_else(|| DriverError::NotFound(self.selector.clone()))?;
        element.click().await
    }
}

/// Fill a text input.
pub struct FillCommand {
    selector: String,
    label: String,
    value: String,
}

impl FillCommand {
    pub fn new(selector: &str, label: &str, value: &str) -> Self {
        Self {
            selector: selector.to_string(),
            label: truncate_label(label),
            value: value.to_string(),
        }
    }
}

#[async_trait]
impl Command for FillCommand {
    fn kind(&self) -> ActionKind {
        ActionKind::Fill
    }

    fn selector(&self) -> &str {
        &self.selector
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn value(&self) -> Option<&str> {
        Some(&self.value)
    }

    async fn execute(&self, ctx: &CommandContext) -> Result<(), DriverError> {
        let elements = ctx.driver.find_all(&self.selector).await?;
        let element = elements
            .first()
            .ok_or_else(|| DriverError::NotFound(self.selector.clone()))?;
        element.fill(&self.value).await
    }
}

/// Choose an option of a `<select>` by index.
pub struct SelectCommand {
    selector: String,
    label: String,
    index: usize,
    value: String,
}

impl SelectCommand {
    pub fn new(selector: &str, label: &str, index: usize) -> Self {
        Self {
            selector: selector.to_string(),
            label: truncate_label(label),
            index,
            value: format!("option:{index}"),
        }
    }
}

#[async_trait]
impl Command for SelectCommand {
    fn kind(&self) -> ActionKind {
        ActionKind::Select
    }

    fn selector(&self) -> &str {
        &self.selector
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn value(&self) -> Option<&str> {
        Some(&self.value)
    }

    async fn execute(&self, ctx: &CommandContext) -> Result<(), DriverError> {
        let elements = ctx.driver.find_all(&self.selector).await?;
        let element = elements
            .first()
            .ok_or_else(|| DriverError::NotFound(self.selector.clone()))?;
        element.select_option(self.index).await
    }
}

/// Toggle a checkbox.
pub struct CheckCommand {
    selector: String,
    label: String,
    value: String,
    point: Option<(f64, f64)>,
}

impl CheckCommand {
    pub fn new(selector: &str, label: &str, on: bool) -> Self {
        Self {
            selector: selector.to_string(),
            label: truncate_label(label),
            value: if on { "on" } else { "off" }.to_string(),
            point: None,
        }
    }

    /// Build a toggle for an already-located checkbox, keeping its
    /// center point so the right box is hit even when the selector
    /// matches several.
    pub async fn for_element(selector: &str, element: &dyn ElementHandle, on: bool) -> Self {
        let label = infer_label(element).await;
        let point = element
            .bounding_box()
            .await
            .ok()
            .flatten()
            .map(|rect| rect.center());
        Self {
            selector: selector.to_string(),
            label,
            value: if on { "on" } else { "off" }.to_string(),
            point,
        }
    }
}

#[async_trait]
impl Command for CheckCommand {
    fn kind(&self) -> ActionKind {
        ActionKind::Check
    }

    fn selector(&self) -> &str {
        &self.selector
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn value(&self) -> Option<&str> {
        Some(&self.value)
    }

    async fn execute(&self, ctx: &CommandContext) -> Result<(), DriverError> {
        if let Some((x, y)) = self.point {
            return ctx.driver.click_at(x, y).await;
        }
        let elements = ctx.driver.find_all(&self.selector).await?;
        let element = elements
            .first()
            .ok_or_else(|| DriverError::NotFound(self.selector.clone()))?;
        element.click().await
    }
}

/// Recoverable outcome of running a command through the executor.
pub fn exhausted(label: &str, attempts: u32, source: DriverError) -> ScoutError {
    ScoutError::InteractionExhausted {
        label: label.to_string(),
        attempts,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::fake::{FakeDom, FakeElement, FakePage};

    fn context(page: &FakePage) -> CommandContext {
        CommandContext {
            driver: Arc::new(page.clone()),
            chain: Arc::new(Mutex::new(Vec::new())),
            correlator: None,
        }
    }

    #[tokio::test]
    async fn label_inference_prefers_id_over_text() {
        let page = FakePage::new("https://app.example.com/");
        page.add_route(
            "https://app.example.com/",
            FakeDom::new("Home", "<body></body>").with_element(
                "button",
                FakeElement::new("Long visible button text").with_attr("id", "save-btn"),
            ),
        );
        let elements = page.find_all("button").await.unwrap();
        assert_eq!(infer_label(elements[0].as_ref()).await, "save-btn");
    }

    #[tokio::test]
    async fn label_falls_back_to_truncated_text() {
        let page = FakePage::new("https://app.example.com/");
        page.add_route(
            "https://app.example.com/",
            FakeDom::new("Home", "<body></body>").with_element(
                "button",
                FakeElement::new("a very long button label that keeps going"),
            ),
        );
        let elements = page.find_all("button").await.unwrap();
        let label = infer_label(elements[0].as_ref()).await;
        assert_eq!(label.chars().count(), MAX_LABEL_LEN);
    }

    #[tokio::test]
    async fn click_prefers_coordinates_when_box_known() {
        let page = FakePage::new("https://app.example.com/");
        page.add_route(
            "https://app.example.com/",
            FakeDom::new("Home", "<body></body>").with_element(
                "button.save",
                FakeElement::new("Save").navigates_to("https://app.example.com/saved"),
            ),
        );
        let ctx = context(&page);
        let elements = page.find_all("button.save").await.unwrap();
        let cmd = ClickCommand::for_element("button.save", elements[0].as_ref()).await;
        cmd.execute(&ctx).await.unwrap();
        assert_eq!(
            page.current_url().await.unwrap(),
            "https://app.example.com/saved"
        );
    }

    #[tokio::test]
    async fn click_falls_back_to_selector_without_box() {
        let page = FakePage::new("https://app.example.com/");
        page.add_route(
            "https://app.example.com/",
            FakeDom::new("Home", "<body></body>")
                .with_element("button.save", FakeElement::new("Save").without_rect()),
        );
        let ctx = context(&page);
        let elements = page.find_all("button.save").await.unwrap();
        let cmd = ClickCommand::for_element("button.save", elements[0].as_ref()).await;
        cmd.execute(&ctx).await.unwrap();
        assert_eq!(page.clicks(), vec!["Save".to_string()]);
    }
}
