pub mod webdriver;

#[cfg(test)]
pub mod fake;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a browser driver implementation.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("failed to connect to driver at {0}")]
    Connect(String),

    #[error("browser session lost")]
    SessionLost,

    #[error("no element matched selector '{0}'")]
    NotFound(String),

    #[error("timed out {0}")]
    Timeout(String),

    #[error("script evaluation failed: {0}")]
    Eval(String),

    #[error("driver command failed: {0}")]
    Command(String),
}

/// Axis-aligned element rectangle in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Center point of the rectangle.
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Capability interface over one browser page.
///
/// The exploration engine depends only on this trait; concrete
/// automation engines (WebDriver, CDP, ...) are swappable adapters.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to a URL and wait for the document to load.
    async fn goto(&self, url: &str) -> Result<(), DriverError>;

    /// Current page URL as reported by the browser.
    async fn current_url(&self) -> Result<String, DriverError>;

    /// Document title.
    async fn title(&self) -> Result<String, DriverError>;

    /// Full rendered page source.
    async fn source(&self) -> Result<String, DriverError>;

    /// Locate all elements matching a CSS selector.
    async fn find_all(&self, selector: &str) -> Result<Vec<Box<dyn ElementHandle>>, DriverError>;

    /// Capture a PNG screenshot of the viewport.
    async fn screenshot(&self) -> Result<Vec<u8>, DriverError>;

    /// Evaluate a JavaScript snippet and return its JSON result.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, DriverError>;

    /// Click at absolute page coordinates.
    async fn click_at(&self, x: f64, y: f64) -> Result<(), DriverError>;

    /// Send an Escape keypress to the focused document.
    async fn press_escape(&self) -> Result<(), DriverError>;

    /// Wait until the document reports a complete ready state.
    async fn wait_for_load(&self, timeout: Duration) -> Result<(), DriverError>;

    /// All cookies of the current browsing context as JSON.
    async fn cookies(&self) -> Result<serde_json::Value, DriverError>;

    /// Restore previously captured cookies into the context.
    async fn set_cookies(&self, cookies: &serde_json::Value) -> Result<(), DriverError>;
}

/// Capability interface over one located element.
#[async_trait]
pub trait ElementHandle: Send + Sync {
    async fn is_visible(&self) -> Result<bool, DriverError>;

    async fn is_enabled(&self) -> Result<bool, DriverError>;

    async fn inner_text(&self) -> Result<String, DriverError>;

    async fn attr(&self, name: &str) -> Result<Option<String>, DriverError>;

    async fn click(&self) -> Result<(), DriverError>;

    async fn fill(&self, value: &str) -> Result<(), DriverError>;

    /// Select an option of a `<select>` element by index.
    async fn select_option(&self, index: usize) -> Result<(), DriverError>;

    /// Bounding box, if the element is rendered.
    async fn bounding_box(&self) -> Result<Option<Rect>, DriverError>;
}

/// Creates one driver/page per crawl worker.
///
/// Workers own their page for the duration of one job; the factory is
/// the only piece that knows how to reach the automation engine.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn create(&self) -> Result<std::sync::Arc<dyn PageDriver>, DriverError>;
}
