//! Configuration management for mailprobe.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides. Provider selectors and busy phrases are
//! configuration data so they can be updated without touching the prober.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration.
///
/// This is loaded from `~/.config/mailprobe/config.toml` (or platform
/// equivalent). If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// File locations and batching
    pub general: GeneralConfig,
    /// Signup-form availability probing
    pub availability: AvailabilityConfig,
    /// Reputation scoring
    pub reputation: ReputationConfig,
    /// Browser launch settings
    pub browser: BrowserConfig,
    /// Signup providers in priority order
    pub providers: Vec<ProviderConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            availability: AvailabilityConfig::default(),
            reputation: ReputationConfig::default(),
            browser: BrowserConfig::default(),
            providers: ProviderConfig::defaults(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path, falling back to defaults
    /// if the file does not exist.
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit path. The file must exist.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            });
        }
        tracing::debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `MAILPROBE_HEADLESS`: browser headless mode (true/false)
    /// - `MAILPROBE_BATCH_SIZE`: candidates per batch
    /// - `MAILPROBE_PENDING_FILE`: path of the pending-work list
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("MAILPROBE_HEADLESS") {
            if let Ok(headless) = val.parse() {
                self.browser.headless = headless;
                tracing::debug!("Override browser.headless from env: {}", headless);
            }
        }

        if let Ok(val) = std::env::var("MAILPROBE_BATCH_SIZE") {
            if let Ok(size) = val.parse() {
                self.general.batch_size = size;
                tracing::debug!("Override general.batch_size from env: {}", size);
            }
        }

        if let Ok(val) = std::env::var("MAILPROBE_PENDING_FILE") {
            tracing::debug!("Override general.pending_file from env: {}", val);
            self.general.pending_file = PathBuf::from(val);
        }

        self
    }

    /// Save configuration to disk, creating the parent directory.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        tracing::debug!("Saving config to {}", path.display());
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/mailprobe/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "mailprobe", "mailprobe").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.general.batch_size == 0 {
            return Err(ConfigError::invalid(
                "general.batch_size",
                "must be greater than zero",
            ));
        }
        if self.general.password_length == 0 {
            return Err(ConfigError::invalid(
                "general.password_length",
                "must be greater than zero",
            ));
        }

        let avail = &self.availability;
        if avail.attempts == 0 {
            return Err(ConfigError::invalid(
                "availability.attempts",
                "must be at least 1",
            ));
        }
        if avail.poll_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "availability.poll_interval_ms",
                "must be greater than zero",
            ));
        }
        if avail.stable_window_ms > avail.timeout_ms {
            return Err(ConfigError::invalid(
                "availability.stable_window_ms",
                "cannot exceed availability.timeout_ms",
            ));
        }

        let rep = &self.reputation;
        if rep.max_attempts == 0 {
            return Err(ConfigError::invalid(
                "reputation.max_attempts",
                "must be at least 1",
            ));
        }
        if rep.unable_cap == 0 {
            return Err(ConfigError::invalid(
                "reputation.unable_cap",
                "must be at least 1",
            ));
        }
        if rep.backoff_secs.is_empty() {
            return Err(ConfigError::invalid(
                "reputation.backoff_secs",
                "needs at least one entry",
            ));
        }
        if rep.poll_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "reputation.poll_interval_ms",
                "must be greater than zero",
            ));
        }
        check_secs_range("reputation.cooldown_secs", rep.cooldown_secs)?;
        check_secs_range("reputation.pacing_secs", rep.pacing_secs)?;
        url::Url::parse(&rep.url)
            .map_err(|e| ConfigError::invalid("reputation.url", e.to_string()))?;

        if self.providers.is_empty() {
            return Err(ConfigError::invalid(
                "providers",
                "at least one provider is required",
            ));
        }
        let mut seen = HashSet::new();
        for provider in &self.providers {
            let domain = provider.domain.trim().to_lowercase();
            if domain.is_empty() || domain.contains('@') {
                return Err(ConfigError::invalid(
                    "providers.domain",
                    format!("'{}' is not a bare domain", provider.domain),
                ));
            }
            if !seen.insert(domain) {
                return Err(ConfigError::invalid(
                    "providers.domain",
                    format!("'{}' is listed twice", provider.domain),
                ));
            }
            url::Url::parse(&provider.signup_url).map_err(|e| {
                ConfigError::invalid("providers.signup_url", format!("{}: {e}", provider.domain))
            })?;
            if provider.input_selectors.is_empty() {
                return Err(ConfigError::invalid(
                    "providers.input_selectors",
                    format!("{} has no input selectors", provider.domain),
                ));
            }
        }

        Ok(())
    }

    /// Look up a provider by (case-insensitive) domain.
    #[must_use]
    pub fn provider(&self, domain: &str) -> Option<&ProviderConfig> {
        self.providers
            .iter()
            .find(|p| p.domain.eq_ignore_ascii_case(domain))
    }

    /// Provider domains in priority order, lower-cased.
    #[must_use]
    pub fn domain_priority(&self) -> Vec<String> {
        self.providers
            .iter()
            .map(|p| p.domain.trim().to_lowercase())
            .collect()
    }
}

/// File locations and batching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Pending-work list, rewritten after every batch
    pub pending_file: PathBuf,
    /// Append-only availability cache
    pub availability_cache: PathBuf,
    /// Append-only reputation cache
    pub reputation_cache: PathBuf,
    /// Directory under which `results_<timestamp>` run folders are created
    pub output_root: PathBuf,
    /// Candidates per batch
    pub batch_size: usize,
    /// Maximum targets taken this run (0 = all)
    pub limit: usize,
    /// Length of generated credentials for free addresses
    pub password_length: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            pending_file: PathBuf::from("mail.txt"),
            availability_cache: PathBuf::from("checked_cache.txt"),
            reputation_cache: PathBuf::from("reputation_cache.txt"),
            output_root: PathBuf::from("."),
            batch_size: 50,
            limit: 0,
            password_length: 12,
        }
    }
}

/// Signup-form availability probing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvailabilityConfig {
    /// Give up classifying after this long
    pub timeout_ms: u64,
    /// Contiguous time a state must hold before it is trusted
    pub stable_window_ms: u64,
    /// Classifier sampling interval
    pub poll_interval_ms: u64,
    /// Delay between blurring the input and starting classification
    pub settle_delay_ms: u64,
    /// Pause between candidates
    pub pause_between_ms: u64,
    /// Attempts per candidate before it is recorded busy
    pub attempts: u32,
    /// How long to wait for the username input to appear
    pub input_wait_ms: u64,
    /// Username input polling interval
    pub input_poll_ms: u64,
    /// Full phrases that mean the identifier is taken
    pub busy_phrases: Vec<String>,
    /// Short markers that mean the identifier is taken
    pub busy_keywords: Vec<String>,
}

impl AvailabilityConfig {
    /// Classifier timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Classifier stable window.
    #[must_use]
    pub fn stable_window(&self) -> Duration {
        Duration::from_millis(self.stable_window_ms)
    }

    /// Classifier poll interval.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for AvailabilityConfig {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| (*s).to_string()).collect();
        Self {
            timeout_ms: 25_000,
            stable_window_ms: 7_500,
            poll_interval_ms: 250,
            settle_delay_ms: 600,
            pause_between_ms: 250,
            attempts: 2,
            input_wait_ms: 25_000,
            input_poll_ms: 300,
            busy_phrases: owned(&[
                "not available for sign up",
                "this email address is not available",
                "that email address is not available",
                "already taken",
                "unavailable",
                "isn't available",
                "is not available",
                "email not available. try entering a different one.",
            ]),
            busy_keywords: owned(&[
                "email not available",
                "try something else",
                "try entering a different one",
                "taken",
                "занят",
                "недоступен",
                "déjà utilisée",
                "nicht verfügbar",
            ]),
        }
    }
}

/// Reputation scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReputationConfig {
    /// Whether the reputation phase runs after availability probing
    pub enabled: bool,
    /// Scoring page
    pub url: String,
    /// Address input on the scoring page
    pub input_selector: String,
    /// Submit button on the scoring page
    pub submit_selector: String,
    /// Gauge element carrying the score
    pub meter_selector: String,
    /// Attribute of the gauge element holding the numeric value
    pub meter_attribute: String,
    /// All of these must appear in the page source for an "unable" signal
    pub unable_phrases: Vec<String>,
    /// Attempts that end in timeout or browser failure before giving up
    pub max_attempts: u32,
    /// Backoff between failed attempts, indexed by attempt number
    pub backoff_secs: Vec<u64>,
    /// Upper bound for form readiness and score stabilization
    pub wait_secs: u64,
    /// Delay after clicking submit before reading the gauge
    pub after_click_delay_ms: u64,
    /// "Unable" signals tolerated before the target is abandoned
    pub unable_cap: u32,
    /// Attempt numbers after which the browser session is recreated
    pub recreate_session_at: Vec<u32>,
    /// How long a gauge value must stay unchanged
    pub stable_for_ms: u64,
    /// Gauge polling interval
    pub poll_interval_ms: u64,
    /// Pause range after "unable" or zero readings, in seconds
    pub cooldown_secs: (f64, f64),
    /// Pause range after each freshly scored address, in seconds
    pub pacing_secs: (f64, f64),
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "https://mailmeteor.com/tools/email-reputation".to_string(),
            input_selector: "[name='email-reputation-checker-input']".to_string(),
            submit_selector: "button[type='submit']".to_string(),
            meter_selector: "[role='meter']".to_string(),
            meter_attribute: "aria-valuenow".to_string(),
            unable_phrases: vec![
                "unable to check this email".to_string(),
                "please try again".to_string(),
            ],
            max_attempts: 4,
            backoff_secs: vec![10, 20, 40, 80],
            wait_secs: 180,
            after_click_delay_ms: 6_000,
            unable_cap: 3,
            recreate_session_at: vec![3, 5],
            stable_for_ms: 2_000,
            poll_interval_ms: 500,
            cooldown_secs: (8.0, 15.0),
            pacing_secs: (6.0, 14.0),
        }
    }
}

/// Browser launch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Explicit Chrome/Chromium executable, detected when unset
    pub executable: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            // Scoring pages sometimes need a human in front of the window.
            headless: false,
            window_width: 1366,
            window_height: 900,
            request_timeout_secs: 30,
            executable: None,
        }
    }
}

/// One signup provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    /// Mail domain served by this provider
    pub domain: String,
    /// Signup page with the username field
    pub signup_url: String,
    /// Candidate selectors for the username input, first displayed wins
    pub input_selectors: Vec<String>,
    /// Selectors whose displayed text may carry the "taken" message
    #[serde(default)]
    pub error_selectors: Vec<String>,
}

impl ProviderConfig {
    /// Built-in provider list, in priority order.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        let owned = |items: &[&str]| items.iter().map(|s| (*s).to_string()).collect::<Vec<_>>();
        let error_selectors = owned(&[
            "#reg-userId-error",
            "fieldset p",
            "fieldset span",
            "[class*='error']",
            "[class*='invalid']",
        ]);
        vec![
            Self {
                domain: "yahoo.com".to_string(),
                signup_url: "https://login.yahoo.com/account/create?lang=en-US".to_string(),
                input_selectors: owned(&[
                    "#reg-userId",
                    "#usernamereg-userId",
                    "input[name='userId']",
                    "input[id*='userId']",
                ]),
                error_selectors: error_selectors.clone(),
            },
            Self {
                domain: "aol.com".to_string(),
                signup_url: "https://login.aol.com/account/create?lang=en-US".to_string(),
                input_selectors: owned(&[
                    "#reg-userId",
                    "input[name='userId']",
                    "input[id*='userId']",
                ]),
                error_selectors,
            },
        ]
    }
}

/// Upper bound for a randomized pause, in seconds.
const MAX_PAUSE_SECS: f64 = 3600.0;

/// A `(lo, hi)` pause range must be finite, non-negative and ordered.
fn check_secs_range(field: &'static str, (lo, hi): (f64, f64)) -> ConfigResult<()> {
    if !lo.is_finite() || !hi.is_finite() {
        return Err(ConfigError::invalid(field, "bounds must be finite"));
    }
    if lo < 0.0 {
        return Err(ConfigError::invalid(field, "bounds cannot be negative"));
    }
    if lo > hi {
        return Err(ConfigError::invalid(field, "lower bound exceeds upper bound"));
    }
    if hi > MAX_PAUSE_SECS {
        return Err(ConfigError::invalid(
            field,
            format!("upper bound cannot exceed {MAX_PAUSE_SECS} seconds"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.general.batch_size, 50);
        assert_eq!(config.general.password_length, 12);
        assert_eq!(config.availability.attempts, 2);
        assert_eq!(config.reputation.unable_cap, 3);
        assert_eq!(config.domain_priority(), vec!["yahoo.com", "aol.com"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = tmp.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.general.batch_size = 10;
        config.reputation.backoff_secs = vec![1, 2];
        config.save_to(&path).expect("save config");

        let loaded = AppConfig::load_from(&path).expect("load config");
        assert_eq!(loaded.general.batch_size, 10);
        assert_eq!(loaded.reputation.backoff_secs, vec![1, 2]);
        assert_eq!(loaded.providers, config.providers);
    }

    #[test]
    fn test_load_from_missing_file() {
        let tmp = TempDir::new().expect("create temp dir");
        let err = AppConfig::load_from(&tmp.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r##"
[general]
batch_size = 5

[availability]
stable_window_ms = 1000

[[providers]]
domain = "example.com"
signup_url = "https://example.com/signup"
input_selectors = ["#user"]
"##;

        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert_eq!(config.general.batch_size, 5);
        assert_eq!(config.availability.stable_window_ms, 1000);
        // Defaults fill the rest
        assert_eq!(config.availability.timeout_ms, 25_000);
        assert_eq!(config.providers.len(), 1);
        assert!(config.providers[0].error_selectors.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.general.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.availability.stable_window_ms = config.availability.timeout_ms + 1;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.reputation.backoff_secs.clear();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        let dup = config.providers[0].clone();
        config.providers.push(dup);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.providers[1].signup_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_pause_ranges() {
        let config: AppConfig =
            toml::from_str("[reputation]\npacing_secs = [6.0, inf]").expect("parse inf");
        assert!(config.validate().is_err());

        let config: AppConfig =
            toml::from_str("[reputation]\ncooldown_secs = [nan, 2.0]").expect("parse nan");
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.reputation.cooldown_secs = (-1.0, 2.0);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.reputation.pacing_secs = (9.0, 6.0);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.reputation.pacing_secs = (1.0, 1e300);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.reputation.cooldown_secs = (2.0, 2.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_provider_lookup() {
        let config = AppConfig::default();
        assert!(config.provider("AOL.com").is_some());
        assert!(config.provider("gmail.com").is_none());
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("MAILPROBE_BATCH_SIZE", "7");
        std::env::set_var("MAILPROBE_HEADLESS", "true");

        let config = AppConfig::default().with_env_overrides();
        assert_eq!(config.general.batch_size, 7);
        assert!(config.browser.headless);

        std::env::remove_var("MAILPROBE_BATCH_SIZE");
        std::env::remove_var("MAILPROBE_HEADLESS");
    }
}
