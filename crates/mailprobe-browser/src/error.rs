use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    LaunchError(String),

    #[error("chromium error: {0}")]
    ChromiumError(String),

    #[error("navigation failed: {0}")]
    NavigationError(String),

    #[error("script failed: {0}")]
    ScriptError(String),

    #[error("session closed")]
    SessionClosed,
}

impl BrowserError {
    /// Whether a fresh session can be expected to recover from this error.
    ///
    /// Launch failures usually mean the browser binary is missing or broken,
    /// so retrying with another session will fail the same way.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::LaunchError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BrowserError::NavigationError("page not found".to_string());
        assert_eq!(err.to_string(), "navigation failed: page not found");
    }

    #[test]
    fn test_recoverable() {
        assert!(BrowserError::NavigationError("reset".to_string()).is_recoverable());
        assert!(BrowserError::SessionClosed.is_recoverable());
        assert!(!BrowserError::LaunchError("no chrome".to_string()).is_recoverable());
    }
}
