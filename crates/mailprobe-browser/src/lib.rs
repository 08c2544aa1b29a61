//! Browser session abstraction for signup-form and scoring-page probing.
//!
//! The scanner only talks to [`BrowserActions`] / [`ElementHandle`], so its
//! polling logic can be driven by scripted sessions in tests. The
//! [`BrowserEngine`] implements those traits over a chromiumoxide tab.

pub mod actions;
pub mod engine;
pub mod error;

pub use actions::{extract_domain, first_displayed, BrowserActions, ElementHandle, SessionFactory};
pub use engine::{BrowserEngine, ChromiumElement, ChromiumFactory};
pub use error::{BrowserError, Result};
