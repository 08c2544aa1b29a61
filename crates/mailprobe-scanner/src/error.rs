use mailprobe_browser::BrowserError;
use mailprobe_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Username input not found on {domain} signup page")]
    InputNotFound { domain: String },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl ScanError {
    /// Errors that another attempt with a fresh session cannot fix.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Browser(e) => !e.is_recoverable(),
            Self::Store(_) => true,
            Self::InputNotFound { .. } | Self::Timeout(_) | Self::Cancelled(_) => false,
        }
    }
}

/// Returned by polling loops when the run's cancellation token fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cancelled")]
pub struct Cancelled;

pub type Result<T> = std::result::Result<T, ScanError>;
