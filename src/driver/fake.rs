//! Scripted in-memory driver used by unit tests.
//!
//! Pages are described up front as routes with selectable elements;
//! clicking an element applies its scripted effect (navigation, an
//! overlay appearing, or a failure) so explorer and pipeline logic can
//! be exercised without a browser.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{DriverError, DriverFactory, ElementHandle, PageDriver, Rect};

/// Effect applied when a fake element is clicked.
#[derive(Debug, Clone)]
pub enum ClickEffect {
    /// Nothing observable happens.
    None,
    /// The browser navigates to a new URL.
    Navigate(String),
    /// An overlay fragment is appended to the page source.
    OpenOverlay(String),
    /// The click fails with a driver error.
    Fail,
}

/// One scripted element.
#[derive(Debug, Clone)]
pub struct FakeElement {
    pub text: String,
    pub attrs: HashMap<String, String>,
    pub visible: bool,
    pub enabled: bool,
    pub rect: Option<Rect>,
    pub effect: ClickEffect,
}

impl FakeElement {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            attrs: HashMap::new(),
            visible: true,
            enabled: true,
            rect: Some(Rect {
                x: 10.0,
                y: 10.0,
                width: 100.0,
                height: 20.0,
            }),
            effect: ClickEffect::None,
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn without_rect(mut self) -> Self {
        self.rect = None;
        self
    }

    pub fn with_rect(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.rect = Some(Rect {
            x,
            y,
            width,
            height,
        });
        self
    }

    pub fn navigates_to(mut self, url: &str) -> Self {
        self.effect = ClickEffect::Navigate(url.to_string());
        self
    }

    pub fn opens_overlay(mut self, fragment: &str) -> Self {
        self.effect = ClickEffect::OpenOverlay(fragment.to_string());
        self
    }

    pub fn fails_on_click(mut self) -> Self {
        self.effect = ClickEffect::Fail;
        self
    }
}

/// One scripted page.
#[derive(Debug, Clone, Default)]
pub struct FakeDom {
    pub title: String,
    pub source: String,
    pub elements: HashMap<String, Vec<FakeElement>>,
}

impl FakeDom {
    pub fn new(title: &str, source: &str) -> Self {
        Self {
            title: title.to_string(),
            source: source.to_string(),
            elements: HashMap::new(),
        }
    }

    pub fn with_element(mut self, selector: &str, element: FakeElement) -> Self {
        self.elements.entry(selector.to_string()).or_default().push(element);
        self
    }
}

#[derive(Debug, Default)]
struct FakeState {
    current_url: String,
    routes: HashMap<String, FakeDom>,
    overlay: Option<String>,
    clicks: Vec<String>,
    fills: Vec<(String, String)>,
    navigations: Vec<String>,
    escape_presses: u32,
    cookies: serde_json::Value,
    eval_responses: Vec<(String, serde_json::Value)>,
    screenshot: Vec<u8>,
}

/// Scripted page driver.
#[derive(Clone)]
pub struct FakePage {
    state: Arc<Mutex<FakeState>>,
}

impl FakePage {
    pub fn new(start_url: &str) -> Self {
        let mut state = FakeState {
            current_url: start_url.to_string(),
            screenshot: vec![0x89, 0x50, 0x4e, 0x47, 1, 2, 3, 4],
            cookies: serde_json::Value::Array(vec![]),
            ..Default::default()
        };
        state.routes.insert(start_url.to_string(), FakeDom::default());
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn add_route(&self, url: &str, dom: FakeDom) {
        self.state.lock().unwrap().routes.insert(url.to_string(), dom);
    }

    /// Register a canned result for any evaluated script containing the
    /// given fragment.
    pub fn on_eval(&self, script_fragment: &str, result: serde_json::Value) {
        self.state
            .lock()
            .unwrap()
            .eval_responses
            .push((script_fragment.to_string(), result));
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().unwrap().clicks.clone()
    }

    pub fn fills(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().fills.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }

    pub fn escape_presses(&self) -> u32 {
        self.state.lock().unwrap().escape_presses
    }

    fn apply_effect(state: &mut FakeState, text: &str, effect: &ClickEffect) -> Result<(), DriverError> {
        state.clicks.push(text.to_string());
        match effect {
            ClickEffect::None => Ok(()),
            ClickEffect::Navigate(url) => {
                state.current_url = url.clone();
                state.overlay = None;
                Ok(())
            }
            ClickEffect::OpenOverlay(fragment) => {
                state.overlay = Some(fragment.clone());
                Ok(())
            }
            ClickEffect::Fail => Err(DriverError::Command("scripted click failure".to_string())),
        }
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state.navigations.push(url.to_string());
        state.current_url = url.to_string();
        state.overlay = None;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.state.lock().unwrap().current_url.clone())
    }

    async fn title(&self) -> Result<String, DriverError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .routes
            .get(&state.current_url)
            .map(|dom| dom.title.clone())
            .unwrap_or_default())
    }

    async fn source(&self) -> Result<String, DriverError> {
        let state = self.state.lock().unwrap();
        let base = state
            .routes
            .get(&state.current_url)
            .map(|dom| dom.source.clone())
            .unwrap_or_default();
        Ok(match &state.overlay {
            Some(overlay) => format!("{}{}", base, overlay),
            None => base,
        })
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<Box<dyn ElementHandle>>, DriverError> {
        let state = self.state.lock().unwrap();
        let matched = state
            .routes
            .get(&state.current_url)
            .and_then(|dom| dom.elements.get(selector))
            .cloned()
            .unwrap_or_default();
        Ok(matched
            .into_iter()
            .map(|element| {
                Box::new(FakeElementHandle {
                    state: Arc::clone(&self.state),
                    element,
                }) as Box<dyn ElementHandle>
            })
            .collect())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        Ok(self.state.lock().unwrap().screenshot.clone())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, DriverError> {
        let state = self.state.lock().unwrap();
        for (fragment, result) in &state.eval_responses {
            if script.contains(fragment.as_str()) {
                return Ok(result.clone());
            }
        }
        if script.contains("readyState") {
            return Ok(serde_json::json!("complete"));
        }
        Ok(serde_json::Value::Null)
    }

    async fn click_at(&self, x: f64, y: f64) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        let current = state.current_url.clone();
        let hit = state.routes.get(&current).and_then(|dom| {
            dom.elements.values().flatten().find_map(|el| {
                el.rect.filter(|r| {
                    x >= r.x && x <= r.x + r.width && y >= r.y && y <= r.y + r.height
                })?;
                Some((el.text.clone(), el.effect.clone()))
            })
        });
        match hit {
            Some((text, effect)) => FakePage::apply_effect(&mut state, &text, &effect),
            None => Err(DriverError::NotFound(format!("point ({x}, {y})"))),
        }
    }

    async fn press_escape(&self) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state.escape_presses += 1;
        state.overlay = None;
        Ok(())
    }

    async fn wait_for_load(&self, _timeout: Duration) -> Result<(), DriverError> {
        Ok(())
    }

    async fn cookies(&self) -> Result<serde_json::Value, DriverError> {
        Ok(self.state.lock().unwrap().cookies.clone())
    }

    async fn set_cookies(&self, cookies: &serde_json::Value) -> Result<(), DriverError> {
        self.state.lock().unwrap().cookies = cookies.clone();
        Ok(())
    }
}

struct FakeElementHandle {
    state: Arc<Mutex<FakeState>>,
    element: FakeElement,
}

#[async_trait]
impl ElementHandle for FakeElementHandle {
    async fn is_visible(&self) -> Result<bool, DriverError> {
        Ok(self.element.visible)
    }

    async fn is_enabled(&self) -> Result<bool, DriverError> {
        Ok(self.element.enabled)
    }

    async fn inner_text(&self) -> Result<String, DriverError> {
        Ok(self.element.text.clone())
    }

    async fn attr(&self, name: &str) -> Result<Option<String>, DriverError> {
        Ok(self.element.attrs.get(name).cloned())
    }

    async fn click(&self) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        FakePage::apply_effect(&mut state, &self.element.text, &self.element.effect)
    }

    async fn fill(&self, value: &str) -> Result<(), DriverError> {
        self.state
            .lock()
            .unwrap()
            .fills
            .push((self.element.text.clone(), value.to_string()));
        Ok(())
    }

    async fn select_option(&self, index: usize) -> Result<(), DriverError> {
        self.state
            .lock()
            .unwrap()
            .fills
            .push((self.element.text.clone(), format!("option:{index}")));
        Ok(())
    }

    async fn bounding_box(&self) -> Result<Option<Rect>, DriverError> {
        Ok(self.element.rect)
    }
}

/// Factory handing every worker the same scripted page.
pub struct FakeFactory {
    page: FakePage,
}

impl FakeFactory {
    pub fn new(page: FakePage) -> Self {
        Self { page }
    }
}

#[async_trait]
impl DriverFactory for FakeFactory {
    async fn create(&self) -> Result<Arc<dyn PageDriver>, DriverError> {
        Ok(Arc::new(self.page.clone()))
    }
}
