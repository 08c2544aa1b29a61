//! Reads the "identifier taken" signal off a live signup page.

use crate::classifier::SignalSampler;
use mailprobe_browser::{BrowserActions, ElementHandle};
use mailprobe_core::AvailabilityConfig;

/// Matches page text against the configured busy phrases and keywords.
#[derive(Debug, Clone)]
pub struct BusyMatcher {
    phrases: Vec<String>,
    keywords: Vec<String>,
}

impl BusyMatcher {
    #[must_use]
    pub fn new(phrases: &[String], keywords: &[String]) -> Self {
        let lower = |items: &[String]| items.iter().map(|s| s.to_lowercase()).collect();
        Self {
            phrases: lower(phrases),
            keywords: lower(keywords),
        }
    }

    /// Case-insensitive substring match on any phrase or keyword.
    #[must_use]
    pub fn is_busy(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.phrases
            .iter()
            .chain(self.keywords.iter())
            .any(|needle| text.contains(needle.as_str()))
    }
}

impl From<&AvailabilityConfig> for BusyMatcher {
    fn from(config: &AvailabilityConfig) -> Self {
        Self::new(&config.busy_phrases, &config.busy_keywords)
    }
}

/// Samples the provider's error elements on each tick.
///
/// An element counts only when it is displayed and carries more than two
/// characters of trimmed text. Lookup failures read as "no signal".
pub struct PageSignalSampler<'a, S: BrowserActions> {
    session: &'a S,
    selectors: &'a [String],
    matcher: &'a BusyMatcher,
}

impl<'a, S: BrowserActions> PageSignalSampler<'a, S> {
    pub fn new(session: &'a S, selectors: &'a [String], matcher: &'a BusyMatcher) -> Self {
        Self {
            session,
            selectors,
            matcher,
        }
    }
}

#[async_trait::async_trait]
impl<'a, S: BrowserActions> SignalSampler for PageSignalSampler<'a, S> {
    async fn sample(&mut self) -> Option<String> {
        for selector in self.selectors {
            let Ok(elements) = self.session.find_elements(selector).await else {
                continue;
            };
            for element in elements {
                if !element.is_displayed().await.unwrap_or(false) {
                    continue;
                }
                let Ok(text) = element.text().await else {
                    continue;
                };
                let text = text.trim();
                if text.chars().count() > 2 && self.matcher.is_busy(text) {
                    return Some(text.to_string());
                }
            }
        }
        None
    }
}
