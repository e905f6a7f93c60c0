use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("chromium protocol error: {0}")]
    Cdp(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("selector not found: {0}")]
    SelectorNotFound(String),

    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("script execution failed: {0}")]
    Script(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BrowserError::SelectorNotFound("#captcha".to_string());
        assert_eq!(err.to_string(), "selector not found: #captcha");
    }

    #[test]
    fn test_timeout_error() {
        let err = BrowserError::Timeout("post-submit URL change".to_string());
        assert!(err.to_string().contains("post-submit URL change"));
    }
}
