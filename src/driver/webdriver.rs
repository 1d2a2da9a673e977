use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fantoccini::actions::{InputSource, KeyAction, KeyActions, MouseActions, PointerAction};
use fantoccini::elements::Element;
use fantoccini::key::Key;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;

use super::{DriverError, DriverFactory, ElementHandle, PageDriver, Rect};

/// WebDriver-backed implementation of the page capability interface.
pub struct WebDriverPage {
    client: Client,
}

/// Connects crawl workers to a WebDriver endpoint, falling back to the
/// usual local driver ports when the configured URL is unreachable.
pub struct WebDriverFactory {
    webdriver_url: String,
    headless: bool,
}

impl WebDriverFactory {
    pub fn new(webdriver_url: &str) -> Self {
        Self {
            webdriver_url: webdriver_url.to_string(),
            headless: true,
        }
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }
}

#[async_trait]
impl DriverFactory for WebDriverFactory {
    async fn create(&self) -> Result<Arc<dyn PageDriver>, DriverError> {
        let client = connect_with_fallback(&self.webdriver_url, capabilities(self.headless)).await?;
        Ok(Arc::new(WebDriverPage { client }))
    }
}

/// Browser capabilities for new sessions. Headless arguments are set
/// for Chrome and Firefox both; the driver only reads its own vendor
/// section.
fn capabilities(headless: bool) -> serde_json::Map<String, serde_json::Value> {
    let mut caps = serde_json::Map::new();
    if headless {
        caps.insert(
            "goog:chromeOptions".to_string(),
            json!({ "args": ["--headless=new", "--disable-gpu", "--window-size=1440,900"] }),
        );
        caps.insert(
            "moz:firefoxOptions".to_string(),
            json!({ "args": ["-headless"] }),
        );
    }
    caps
}

/// Tries the configured WebDriver URL first, then common alternatives.
async fn connect_with_fallback(
    webdriver_url: &str,
    caps: serde_json::Map<String, serde_json::Value>,
) -> Result<Client, DriverError> {
    match ClientBuilder::native()
        .capabilities(caps.clone())
        .connect(webdriver_url)
        .await
    {
        Ok(client) => {
            ::log::debug!("Connected to WebDriver at {}", webdriver_url);
            return Ok(client);
        }
        Err(e) => {
            ::log::error!("Failed to connect to WebDriver at {}: {}", webdriver_url, e);
        }
    }

    let fallback_urls = [
        "http://localhost:9515", // ChromeDriver default
        "http://localhost:4444", // Selenium / geckodriver default
        "http://127.0.0.1:4444", // Try with IP instead of localhost
    ];

    for url in fallback_urls.iter() {
        if *url == webdriver_url {
            continue;
        }
        ::log::info!("Trying fallback WebDriver URL: {}", url);
        if let Ok(client) = ClientBuilder::native()
            .capabilities(caps.clone())
            .connect(url)
            .await
        {
            ::log::debug!("Connected to fallback WebDriver at {}", url);
            return Ok(client);
        }
    }

    ::log::error!("Failed to connect to any WebDriver server");
    Err(DriverError::Connect(webdriver_url.to_string()))
}

/// Maps a fantoccini error onto the driver taxonomy, keeping the
/// lost-session case distinct so callers can reconnect.
fn map_err(e: fantoccini::error::CmdError) -> DriverError {
    let msg = e.to_string();
    if msg.contains("Unable to find session") {
        DriverError::SessionLost
    } else {
        DriverError::Command(msg)
    }
}

#[async_trait]
impl PageDriver for WebDriverPage {
    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        self.client.goto(url).await.map_err(map_err)
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        self.client
            .current_url()
            .await
            .map(|u| u.to_string())
            .map_err(map_err)
    }

    async fn title(&self) -> Result<String, DriverError> {
        let value = self
            .client
            .execute("return document.title;", vec![])
            .await
            .map_err(map_err)?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn source(&self) -> Result<String, DriverError> {
        self.client.source().await.map_err(map_err)
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<Box<dyn ElementHandle>>, DriverError> {
        let elements = self
            .client
            .find_all(Locator::Css(selector))
            .await
            .map_err(map_err)?;
        Ok(elements
            .into_iter()
            .map(|element| Box::new(WebDriverElement { element }) as Box<dyn ElementHandle>)
            .collect())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        self.client.screenshot().await.map_err(map_err)
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, DriverError> {
        self.client
            .execute(script, vec![])
            .await
            .map_err(|e| DriverError::Eval(e.to_string()))
    }

    async fn click_at(&self, x: f64, y: f64) -> Result<(), DriverError> {
        let mouse = MouseActions::new("mouse".to_string())
            .then(PointerAction::MoveTo {
                duration: Some(Duration::from_millis(50)),
                x: x as i64,
                y: y as i64,
            })
            .then(PointerAction::Down {
                button: fantoccini::actions::MOUSE_BUTTON_LEFT,
            })
            .then(PointerAction::Up {
                button: fantoccini::actions::MOUSE_BUTTON_LEFT,
            });
        self.client.perform_actions(mouse).await.map_err(map_err)
    }

    async fn press_escape(&self) -> Result<(), DriverError> {
        let keys = KeyActions::new("keyboard".to_string())
            .then(KeyAction::Down {
                value: Key::Escape.into(),
            })
            .then(KeyAction::Up {
                value: Key::Escape.into(),
            });
        self.client.perform_actions(keys).await.map_err(map_err)
    }

    async fn wait_for_load(&self, timeout: Duration) -> Result<(), DriverError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let state = self
                .client
                .execute("return document.readyState;", vec![])
                .await
                .map_err(map_err)?;
            if state.as_str() == Some("complete") {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(DriverError::Timeout("waiting for load state".to_string()));
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    async fn cookies(&self) -> Result<serde_json::Value, DriverError> {
        let cookies = self.client.get_all_cookies().await.map_err(map_err)?;
        let entries: Vec<serde_json::Value> = cookies
            .iter()
            .map(|c| {
                json!({
                    "name": c.name(),
                    "value": c.value(),
                    "domain": c.domain(),
                    "path": c.path(),
                    "secure": c.secure().unwrap_or(false),
                })
            })
            .collect();
        Ok(serde_json::Value::Array(entries))
    }

    async fn set_cookies(&self, cookies: &serde_json::Value) -> Result<(), DriverError> {
        let entries = match cookies.as_array() {
            Some(entries) => entries,
            None => return Ok(()),
        };
        for entry in entries {
            let name = entry["name"].as_str().unwrap_or_default().to_string();
            let value = entry["value"].as_str().unwrap_or_default().to_string();
            if name.is_empty() {
                continue;
            }
            let mut cookie = fantoccini::cookies::Cookie::new(name, value);
            if let Some(domain) = entry["domain"].as_str() {
                cookie.set_domain(domain.to_string());
            }
            if let Some(path) = entry["path"].as_str() {
                cookie.set_path(path.to_string());
            }
            if let Err(e) = self.client.add_cookie(cookie).await {
                ::log::warn!("Failed to restore cookie: {}", e);
            }
        }
        Ok(())
    }
}

/// WebDriver element wrapper.
pub struct WebDriverElement {
    element: Element,
}

#[async_trait]
impl ElementHandle for WebDriverElement {
    async fn is_visible(&self) -> Result<bool, DriverError> {
        self.element.is_displayed().await.map_err(map_err)
    }

    async fn is_enabled(&self) -> Result<bool, DriverError> {
        self.element.is_enabled().await.map_err(map_err)
    }

    async fn inner_text(&self) -> Result<String, DriverError> {
        self.element.text().await.map_err(map_err)
    }

    async fn attr(&self, name: &str) -> Result<Option<String>, DriverError> {
        self.element.attr(name).await.map_err(map_err)
    }

    async fn click(&self) -> Result<(), DriverError> {
        self.element.click().await.map_err(map_err)
    }

    async fn fill(&self, value: &str) -> Result<(), DriverError> {
        self.element.clear().await.map_err(map_err)?;
        self.element.send_keys(value).await.map_err(map_err)
    }

    async fn select_option(&self, index: usize) -> Result<(), DriverError> {
        self.element.select_by_index(index).await.map_err(map_err)
    }

    async fn bounding_box(&self) -> Result<Option<Rect>, DriverError> {
        match self.element.rectangle().await {
            Ok((x, y, width, height)) => Ok(Some(Rect {
                x,
                y,
                width,
                height,
            })),
            Err(e) => {
                // Detached or unrendered elements have no box; that is
                // not an interaction failure.
                ::log::debug!("No bounding box available: {}", e);
                Ok(None)
            }
        }
    }
}
