use crate::actions::{extract_domain, BrowserActions, ElementHandle, SessionFactory};
use crate::error::{BrowserError, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::stream::StreamExt;
use mailprobe_core::config::BrowserConfig as LaunchSettings;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

const IS_DISPLAYED_JS: &str =
    "function() { return !!(this.offsetWidth || this.offsetHeight || this.getClientRects().length); }";

const CLEAR_JS: &str = "function() { this.value = ''; \
     this.dispatchEvent(new Event('input', { bubbles: true })); }";

fn chromium_err(e: impl std::fmt::Display) -> BrowserError {
    BrowserError::ChromiumError(e.to_string())
}

/// Browser automation engine backed by a single Chromium tab.
pub struct BrowserEngine {
    browser: Mutex<Option<Browser>>,
    page: Page,
    handler: JoinHandle<()>,
}

impl BrowserEngine {
    /// Launch Chromium with the given settings and open a blank tab.
    pub async fn launch(settings: &LaunchSettings) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(settings.window_width, settings.window_height)
            .request_timeout(Duration::from_secs(settings.request_timeout_secs));
        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &settings.executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(BrowserError::LaunchError)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::LaunchError(e.to_string()))?;

        // Spawn browser handler
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::debug!("browser handler stopped: {:?}", event.err());
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::LaunchError(e.to_string()))?;

        tracing::debug!("browser session launched (headless: {})", settings.headless);

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            page,
            handler,
        })
    }

    async fn ensure_open(&self) -> Result<()> {
        if self.browser.lock().await.is_none() {
            return Err(BrowserError::SessionClosed);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl BrowserActions for BrowserEngine {
    type Element = ChromiumElement;

    async fn navigate(&self, url: &str) -> Result<()> {
        self.ensure_open().await?;
        let host = extract_domain(url)?;
        tracing::debug!("navigating to {}", host);
        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::NavigationError(format!("{url}: {e}")))?;
        Ok(())
    }

    async fn refresh(&self) -> Result<()> {
        self.ensure_open().await?;
        self.page
            .reload()
            .await
            .map_err(|e| BrowserError::NavigationError(format!("reload: {e}")))?;
        Ok(())
    }

    async fn find_element(&self, selector: &str) -> Result<Option<ChromiumElement>> {
        self.ensure_open().await?;
        // chromiumoxide reports a missing node as an error
        match self.page.find_element(selector).await {
            Ok(inner) => Ok(Some(ChromiumElement { inner })),
            Err(e) => {
                tracing::trace!("no element for {}: {}", selector, e);
                Ok(None)
            }
        }
    }

    async fn find_elements(&self, selector: &str) -> Result<Vec<ChromiumElement>> {
        self.ensure_open().await?;
        match self.page.find_elements(selector).await {
            Ok(found) => Ok(found
                .into_iter()
                .map(|inner| ChromiumElement { inner })
                .collect()),
            Err(e) => {
                tracing::trace!("no elements for {}: {}", selector, e);
                Ok(Vec::new())
            }
        }
    }

    async fn execute_script(&self, script: &str) -> Result<()> {
        self.ensure_open().await?;
        self.page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::ScriptError(e.to_string()))?;
        Ok(())
    }

    async fn page_source(&self) -> Result<String> {
        self.ensure_open().await?;
        self.page.content().await.map_err(chromium_err)
    }

    async fn quit(&self) -> Result<()> {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };
        let closed = browser.close().await.map_err(chromium_err);
        if let Err(e) = browser.wait().await {
            tracing::debug!("browser process did not exit cleanly: {}", e);
        }
        self.handler.abort();
        closed.map(|_| ())
    }
}

/// A located DOM node in a [`BrowserEngine`] tab.
pub struct ChromiumElement {
    inner: Element,
}

#[async_trait::async_trait]
impl ElementHandle for ChromiumElement {
    async fn is_displayed(&self) -> Result<bool> {
        let returns = self
            .inner
            .call_js_fn(IS_DISPLAYED_JS, false)
            .await
            .map_err(|e| BrowserError::ScriptError(e.to_string()))?;
        Ok(returns
            .result
            .value
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    async fn text(&self) -> Result<String> {
        let text = self.inner.inner_text().await.map_err(chromium_err)?;
        Ok(text.unwrap_or_default())
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        self.inner.attribute(name).await.map_err(chromium_err)
    }

    async fn click(&self) -> Result<()> {
        self.inner.click().await.map_err(chromium_err)?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.inner
            .call_js_fn(CLEAR_JS, false)
            .await
            .map_err(|e| BrowserError::ScriptError(e.to_string()))?;
        Ok(())
    }

    async fn send_keys(&self, text: &str) -> Result<()> {
        self.inner.type_str(text).await.map_err(chromium_err)?;
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        self.inner.press_key(key).await.map_err(chromium_err)?;
        Ok(())
    }
}

/// Launches a fresh [`BrowserEngine`] per session.
#[derive(Debug, Clone)]
pub struct ChromiumFactory {
    settings: LaunchSettings,
}

impl ChromiumFactory {
    /// Create a factory using the given launch settings.
    #[must_use]
    pub fn new(settings: LaunchSettings) -> Self {
        Self { settings }
    }
}

#[async_trait::async_trait]
impl SessionFactory for ChromiumFactory {
    type Session = BrowserEngine;

    async fn create(&self) -> Result<BrowserEngine> {
        BrowserEngine::launch(&self.settings).await
    }
}
