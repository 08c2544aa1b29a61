//! Scripted browser sessions and reputation gauges for scanner tests.

#![allow(dead_code)]

use mailprobe_browser::{BrowserActions, BrowserError, ElementHandle, SessionFactory};
use mailprobe_core::{AppConfig, ProbeTarget, ProviderConfig};
use mailprobe_scanner::{GaugeReading, ReputationGauge, ScanError};
use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub const INPUT_SELECTOR: &str = "#user";
pub const ERROR_SELECTOR: &str = "#user-error";
pub const TAKEN_TEXT: &str = "This email address is not available for sign up";

/// Config pointing every file at `dir` and every provider at the mock page.
pub fn test_config(dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.general.pending_file = dir.join("mail.txt");
    config.general.availability_cache = dir.join("checked_cache.txt");
    config.general.reputation_cache = dir.join("reputation_cache.txt");
    config.general.output_root = dir.to_path_buf();
    config.providers = ["yahoo.com", "aol.com"]
        .iter()
        .map(|domain| ProviderConfig {
            domain: (*domain).to_string(),
            signup_url: format!("https://signup.test/{domain}"),
            input_selectors: vec![INPUT_SELECTOR.to_string()],
            error_selectors: vec![ERROR_SELECTOR.to_string()],
        })
        .collect();
    config
}

pub fn target(address: &str) -> ProbeTarget {
    ProbeTarget::parse(address).expect("valid address")
}

/// State shared by every session a [`MockFactory`] hands out.
#[derive(Debug, Default)]
pub struct PageState {
    /// Current value of the username input
    pub typed: String,
    /// Local-parts the page reports as taken
    pub busy: HashSet<String>,
    /// Calls made on any session
    pub interactions: usize,
    pub launches: usize,
    pub quits: usize,
    /// Fail this many upcoming navigations
    pub fail_navigations: usize,
    /// Every launch fails
    pub launch_error: bool,
}

pub type SharedPage = Arc<Mutex<PageState>>;

pub fn page_with_busy(busy: &[&str]) -> SharedPage {
    Arc::new(Mutex::new(PageState {
        busy: busy.iter().map(|s| (*s).to_string()).collect(),
        ..PageState::default()
    }))
}

pub struct MockFactory {
    pub page: SharedPage,
}

#[async_trait::async_trait]
impl SessionFactory for MockFactory {
    type Session = MockSession;

    async fn create(&self) -> mailprobe_browser::Result<MockSession> {
        let mut page = self.page.lock().expect("page lock");
        page.launches += 1;
        if page.launch_error {
            return Err(BrowserError::LaunchError("no browser binary".to_string()));
        }
        Ok(MockSession {
            page: Arc::clone(&self.page),
        })
    }
}

pub struct MockSession {
    page: SharedPage,
}

impl MockSession {
    fn touch(&self) -> std::sync::MutexGuard<'_, PageState> {
        let mut page = self.page.lock().expect("page lock");
        page.interactions += 1;
        page
    }

    fn lookup(&self, selector: &str) -> Option<MockElement> {
        let page = self.touch();
        match selector {
            INPUT_SELECTOR => Some(MockElement::Input(Arc::clone(&self.page))),
            ERROR_SELECTOR if page.busy.contains(page.typed.trim()) => {
                Some(MockElement::Error(TAKEN_TEXT.to_string()))
            }
            _ => None,
        }
    }
}

#[async_trait::async_trait]
impl BrowserActions for MockSession {
    type Element = MockElement;

    async fn navigate(&self, url: &str) -> mailprobe_browser::Result<()> {
        let mut page = self.touch();
        if page.fail_navigations > 0 {
            page.fail_navigations -= 1;
            return Err(BrowserError::NavigationError(format!("{url}: net::ERR_FAILED")));
        }
        page.typed.clear();
        Ok(())
    }

    async fn refresh(&self) -> mailprobe_browser::Result<()> {
        self.touch();
        Ok(())
    }

    async fn find_element(&self, selector: &str) -> mailprobe_browser::Result<Option<MockElement>> {
        Ok(self.lookup(selector))
    }

    async fn find_elements(&self, selector: &str) -> mailprobe_browser::Result<Vec<MockElement>> {
        Ok(self.lookup(selector).into_iter().collect())
    }

    async fn execute_script(&self, _script: &str) -> mailprobe_browser::Result<()> {
        self.touch();
        Ok(())
    }

    async fn page_source(&self) -> mailprobe_browser::Result<String> {
        self.touch();
        Ok(String::new())
    }

    async fn quit(&self) -> mailprobe_browser::Result<()> {
        self.page.lock().expect("page lock").quits += 1;
        Ok(())
    }
}

pub enum MockElement {
    Input(SharedPage),
    Error(String),
}

#[async_trait::async_trait]
impl ElementHandle for MockElement {
    async fn is_displayed(&self) -> mailprobe_browser::Result<bool> {
        Ok(true)
    }

    async fn text(&self) -> mailprobe_browser::Result<String> {
        Ok(match self {
            Self::Input(_) => String::new(),
            Self::Error(text) => text.clone(),
        })
    }

    async fn attribute(&self, _name: &str) -> mailprobe_browser::Result<Option<String>> {
        Ok(None)
    }

    async fn click(&self) -> mailprobe_browser::Result<()> {
        Ok(())
    }

    async fn clear(&self) -> mailprobe_browser::Result<()> {
        if let Self::Input(page) = self {
            page.lock().expect("page lock").typed.clear();
        }
        Ok(())
    }

    async fn send_keys(&self, text: &str) -> mailprobe_browser::Result<()> {
        if let Self::Input(page) = self {
            page.lock().expect("page lock").typed.push_str(text);
        }
        Ok(())
    }

    async fn press_key(&self, key: &str) -> mailprobe_browser::Result<()> {
        if let Self::Input(page) = self {
            if key == "Backspace" {
                page.lock().expect("page lock").typed.pop();
            }
        }
        Ok(())
    }
}

/// Reputation gauge replaying one script of readings per submit.
///
/// Reads cycle through the current script. Once the scripts run out the
/// last one is reused for every further submit.
#[derive(Debug, Default)]
pub struct ScriptedGauge {
    pub scripts: VecDeque<Vec<GaugeReading>>,
    current: Vec<GaugeReading>,
    cursor: usize,
    /// Fail this many upcoming submits with a navigation error
    pub submit_failures: usize,
    /// Every submit fails as if the browser could not launch
    pub launch_error: bool,
    pub submitted: Vec<ProbeTarget>,
    pub refreshes: usize,
    pub recreates: usize,
    pub closes: usize,
}

impl ScriptedGauge {
    pub fn new(scripts: Vec<Vec<GaugeReading>>) -> Self {
        Self {
            scripts: scripts.into(),
            ..Self::default()
        }
    }

    pub fn submits(&self) -> usize {
        self.submitted.len()
    }
}

#[async_trait::async_trait]
impl ReputationGauge for ScriptedGauge {
    async fn submit(&mut self, target: &ProbeTarget) -> mailprobe_scanner::Result<()> {
        self.submitted.push(target.clone());
        if self.launch_error {
            return Err(ScanError::Browser(BrowserError::LaunchError(
                "no browser binary".to_string(),
            )));
        }
        if self.submit_failures > 0 {
            self.submit_failures -= 1;
            return Err(ScanError::Browser(BrowserError::NavigationError(
                "net::ERR_CONNECTION_RESET".to_string(),
            )));
        }
        if let Some(next) = self.scripts.pop_front() {
            self.current = next;
        }
        self.cursor = 0;
        Ok(())
    }

    async fn read(&mut self) -> mailprobe_scanner::Result<GaugeReading> {
        if self.current.is_empty() {
            return Ok(GaugeReading::Pending);
        }
        let reading = self.current[self.cursor % self.current.len()];
        self.cursor += 1;
        Ok(reading)
    }

    async fn refresh(&mut self) -> mailprobe_scanner::Result<()> {
        self.refreshes += 1;
        Ok(())
    }

    async fn recreate(&mut self) -> mailprobe_scanner::Result<()> {
        self.recreates += 1;
        Ok(())
    }

    async fn close(&mut self) -> mailprobe_scanner::Result<()> {
        self.closes += 1;
        Ok(())
    }
}
