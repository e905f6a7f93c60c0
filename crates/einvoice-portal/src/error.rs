//! Error types for portal session acquisition and invocation.

use einvoice_browser::BrowserError;
use einvoice_core::CoreError;
use thiserror::Error;

/// Errors that can occur while acquiring a session or invoking the portal.
///
/// Every failure the portal can produce is a distinct variant; no error is
/// ever reported through a payload-shaped sentinel value.
#[derive(Error, Debug)]
pub enum PortalError {
    /// The CAPTCHA gate rejected every guess in the attempt budget
    #[error("captcha attempts exhausted after {attempts} tries")]
    CaptchaExhausted {
        /// Number of solve/submit attempts made
        attempts: u32,
    },

    /// The OCR pass produced no confident read for a CAPTCHA image
    #[error("no confident captcha read")]
    CaptchaUnreadable,

    /// The OCR engine itself failed
    #[error("OCR failed: {0}")]
    Ocr(String),

    /// A bounded login wait expired
    #[error("login timed out during {phase}")]
    LoginTimedOut {
        /// Which login phase hit its deadline
        phase: &'static str,
    },

    /// The portal answered with a non-success status
    #[error("portal returned status {status} for {operation}")]
    Transport {
        /// Portal operation that failed
        operation: &'static str,
        /// HTTP status code
        status: u16,
    },

    /// The request never produced a portal response
    #[error("request for {operation} failed: {source}")]
    Request {
        /// Portal operation that failed
        operation: &'static str,
        /// Underlying transport error
        #[source]
        source: reqwest::Error,
    },

    /// A success-status response was missing expected fields or held
    /// unparsable data
    #[error("malformed portal response for {operation}: {reason}")]
    MalformedResponse {
        /// Portal operation that produced the response
        operation: &'static str,
        /// What was wrong with it
        reason: String,
    },

    /// Every attempt in the re-auth budget failed
    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Portal operation that was retried
        operation: &'static str,
        /// Total attempts made, including the first
        attempts: u32,
        /// The last underlying failure
        #[source]
        source: Box<PortalError>,
    },

    /// Browser automation failed
    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),

    /// Harvested login material failed session validation
    #[error("invalid session material: {0}")]
    InvalidSession(#[from] CoreError),

    /// Internal errors (client construction and the like)
    #[error("internal error: {0}")]
    Internal(String),
}

impl PortalError {
    /// Whether the resilient invocation layer may re-authenticate and
    /// retry after this failure.
    ///
    /// Transport failures and login-machine failures are retryable;
    /// malformed success responses are not, since retrying cannot make the
    /// portal's data well-formed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. }
                | Self::Request { .. }
                | Self::CaptchaExhausted { .. }
                | Self::LoginTimedOut { .. }
                | Self::Browser(_)
        )
    }
}

/// Result type for portal operations.
pub type Result<T> = std::result::Result<T, PortalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PortalError::CaptchaExhausted { attempts: 5 };
        assert_eq!(err.to_string(), "captcha attempts exhausted after 5 tries");

        let err = PortalError::Transport {
            operation: "getCarrierList",
            status: 502,
        };
        assert!(err.to_string().contains("502"));
        assert!(err.to_string().contains("getCarrierList"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(PortalError::Transport {
            operation: "getCarrierList",
            status: 500
        }
        .is_retryable());
        assert!(PortalError::CaptchaExhausted { attempts: 5 }.is_retryable());
        assert!(PortalError::LoginTimedOut {
            phase: "token polling"
        }
        .is_retryable());

        assert!(!PortalError::MalformedResponse {
            operation: "searchCarrierInvoice",
            reason: "missing content".to_string()
        }
        .is_retryable());
        assert!(!PortalError::CaptchaUnreadable.is_retryable());
    }

    #[test]
    fn test_retries_exhausted_wraps_source() {
        let err = PortalError::RetriesExhausted {
            operation: "searchCarrierInvoice",
            attempts: 3,
            source: Box::new(PortalError::Transport {
                operation: "searchCarrierInvoice",
                status: 401,
            }),
        };

        let rendered = err.to_string();
        assert!(rendered.contains("after 3 attempts"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
