use crate::error::{BrowserError, Result};

/// Operations on one located page element.
#[async_trait::async_trait]
pub trait ElementHandle: Send + Sync {
    /// Whether the element is rendered with a non-empty box
    async fn is_displayed(&self) -> Result<bool>;

    /// Visible text, empty when the element has none
    async fn text(&self) -> Result<String>;

    /// Read an attribute
    async fn attribute(&self, name: &str) -> Result<Option<String>>;

    /// Click the element
    async fn click(&self) -> Result<()>;

    /// Clear an input's value
    async fn clear(&self) -> Result<()>;

    /// Type text into the element
    async fn send_keys(&self, text: &str) -> Result<()>;

    /// Press a single named key (e.g. `Backspace`)
    async fn press_key(&self, key: &str) -> Result<()>;
}

/// Browser actions for automation
#[async_trait::async_trait]
pub trait BrowserActions: Send + Sync {
    /// Element type returned by lookups
    type Element: ElementHandle;

    /// Navigate to a URL
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Reload the current page
    async fn refresh(&self) -> Result<()>;

    /// Find the first element matching a CSS selector
    async fn find_element(&self, selector: &str) -> Result<Option<Self::Element>>;

    /// Find every element matching a CSS selector
    async fn find_elements(&self, selector: &str) -> Result<Vec<Self::Element>>;

    /// Run a script in the page, discarding its value
    async fn execute_script(&self, script: &str) -> Result<()>;

    /// Current page HTML
    async fn page_source(&self) -> Result<String>;

    /// Close the session; later calls fail with `SessionClosed`
    async fn quit(&self) -> Result<()>;
}

/// Creates fresh browser sessions.
///
/// Workers recreate sessions to shed corrupted page state, so they hold a
/// factory rather than a single session.
#[async_trait::async_trait]
pub trait SessionFactory: Send + Sync {
    /// Session type produced
    type Session: BrowserActions;

    /// Launch a new session
    async fn create(&self) -> Result<Self::Session>;
}

/// Return the first element matching any of `selectors` that is displayed.
///
/// Lookup errors on individual selectors are treated as "not here".
pub async fn first_displayed<S: BrowserActions + ?Sized>(
    session: &S,
    selectors: &[String],
) -> Option<S::Element> {
    for selector in selectors {
        let Ok(Some(element)) = session.find_element(selector).await else {
            continue;
        };
        if element.is_displayed().await.unwrap_or(false) {
            return Some(element);
        }
    }
    None
}

/// Helper to extract domain from URL
pub fn extract_domain(url: &str) -> Result<String> {
    let url = url::Url::parse(url)
        .map_err(|e| BrowserError::NavigationError(format!("Invalid URL: {}", e)))?;

    url.host_str()
        .ok_or_else(|| BrowserError::NavigationError("No host in URL".to_string()))
        .map(|s| s.to_string())
}
