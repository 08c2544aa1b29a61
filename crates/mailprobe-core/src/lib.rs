//! Mailprobe Core - Foundation crate for the mailprobe batch prober.
//!
//! This crate provides shared types, error handling and configuration
//! management that all other mailprobe crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes and enums (`ProbeTarget`, `Score`, `Verdict`)
//!
//! # Example
//!
//! ```rust
//! use mailprobe_core::{AppConfig, ProbeTarget};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! config.validate()?;
//!
//! let target = ProbeTarget::new("Alice", "Yahoo.com")?;
//! assert_eq!(target.as_str(), "alice@yahoo.com");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, AvailabilityConfig, BrowserConfig, GeneralConfig, ProviderConfig, ReputationConfig,
};
pub use error::{ConfigError, ConfigResult, MailprobeError};
pub use types::{ProbeTarget, Score, ScoreBand, Verdict};
