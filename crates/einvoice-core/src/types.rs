//! Shared types for portal sessions and invoice data.
//!
//! These types model the session material harvested from the portal login
//! flow and the invoice records returned by its search endpoints.

use crate::error::{CoreError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Login credentials for the portal.
///
/// Held in memory only for the lifetime of the owning session factory,
/// never persisted, and zeroized on drop. `Debug` output is redacted.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    mobile: String,
    password: String,
}

impl Credentials {
    /// Create a new credential pair from the portal account's mobile
    /// number and password.
    #[must_use]
    pub fn new(mobile: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            mobile: mobile.into(),
            password: password.into(),
        }
    }

    /// The account's mobile number (the portal's login principal).
    #[must_use]
    pub fn mobile(&self) -> &str {
        &self.mobile
    }

    /// The account password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("mobile", &"<redacted>")
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A single cookie harvested from the browser after login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
}

impl SessionCookie {
    /// Create a new cookie pair.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// An authenticated portal session.
///
/// A `Session` only exists fully populated: construction validates that the
/// cookie jar, bearer token and client identity are all present, so callers
/// never observe a partially-authenticated state. Sessions are replaced
/// wholesale on invalidation, never mutated field by field.
#[derive(Debug, Clone)]
pub struct Session {
    cookies: Vec<SessionCookie>,
    token: String,
    client_identity: String,
    created_at: DateTime<Utc>,
}

impl Session {
    /// Assemble a session from harvested login material.
    ///
    /// # Errors
    /// Returns a validation error if the token, cookie jar or client
    /// identity is empty.
    pub fn new(
        cookies: Vec<SessionCookie>,
        token: impl Into<String>,
        client_identity: impl Into<String>,
    ) -> Result<Self> {
        let token = token.into();
        let client_identity = client_identity.into();

        if token.is_empty() {
            return Err(CoreError::Validation("empty bearer token".to_string()));
        }
        if cookies.is_empty() {
            return Err(CoreError::Validation("empty cookie jar".to_string()));
        }
        if client_identity.is_empty() {
            return Err(CoreError::Validation("empty client identity".to_string()));
        }

        Ok(Self {
            cookies,
            token,
            client_identity,
            created_at: Utc::now(),
        })
    }

    /// The bearer token issued by the portal.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// The randomized client identity (user agent) this session was
    /// established with.
    #[must_use]
    pub fn client_identity(&self) -> &str {
        &self.client_identity
    }

    /// The harvested cookie jar.
    #[must_use]
    pub fn cookies(&self) -> &[SessionCookie] {
        &self.cookies
    }

    /// When this session was established.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Render the cookie jar as a `Cookie` request header value.
    #[must_use]
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Short-lived opaque token scoping a paginated invoice search to a date
/// range.
///
/// Minted by one portal call and consumed by subsequent paginated calls.
/// Never refreshed: expiry mid-pagination surfaces as a failure upstream.
#[derive(Clone, PartialEq, Eq)]
pub struct SearchToken(String);

impl SearchToken {
    /// Wrap a token string returned by the portal.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SearchToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SearchToken({} bytes)", self.0.len())
    }
}

/// One invoice line item returned by the portal's carrier search.
///
/// Only the fields the engine relies on are named; everything else the
/// portal sends is preserved in `extra`. The amount arrives as either a
/// JSON number or a numeric string and is validated on access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceRecord {
    /// Invoice number, e.g. `AB12345678`
    #[serde(rename = "invNum", default, skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    /// Seller display name
    #[serde(rename = "sellerName", default, skip_serializing_if = "Option::is_none")]
    pub seller_name: Option<String>,
    /// Invoice date as the portal renders it
    #[serde(rename = "invDate", default, skip_serializing_if = "Option::is_none")]
    pub invoice_date: Option<serde_json::Value>,
    /// Total amount; number or numeric string on the wire
    #[serde(rename = "totalAmount")]
    pub total_amount: serde_json::Value,
    /// Remaining portal fields, passed through untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl InvoiceRecord {
    /// The validated invoice amount.
    ///
    /// Accepts integer JSON numbers and numeric strings with surrounding
    /// whitespace. Anything else is a validation error; amounts are never
    /// silently coerced to zero.
    ///
    /// # Errors
    /// Returns a validation error for non-integer or unparsable amounts.
    pub fn amount(&self) -> Result<i64> {
        match &self.total_amount {
            serde_json::Value::Number(n) => n
                .as_i64()
                .ok_or_else(|| CoreError::Validation(format!("non-integer amount: {n}"))),
            serde_json::Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| CoreError::Validation(format!("unparsable amount: '{s}'"))),
            other => Err(CoreError::Validation(format!(
                "unexpected amount type: {other}"
            ))),
        }
    }
}

/// The folded result of a paginated invoice search.
///
/// Records keep server page order; the total is the exact sum of every
/// record's validated amount. Computed fresh per aggregation call and
/// never cached.
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedResult {
    /// All records across every page, in page order
    pub records: Vec<InvoiceRecord>,
    /// Sum of every record's amount
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie_jar() -> Vec<SessionCookie> {
        vec![
            SessionCookie::new("JSESSIONID", "abc123"),
            SessionCookie::new("route", "node-7"),
        ]
    }

    #[test]
    fn test_credentials_debug_redacted() {
        let creds = Credentials::new("0912345678", "hunter2");
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("0912345678"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_session_fully_populated() {
        let session =
            Session::new(cookie_jar(), "bearer-token", "Mozilla/5.0").expect("valid session");
        assert_eq!(session.token(), "bearer-token");
        assert_eq!(session.client_identity(), "Mozilla/5.0");
        assert_eq!(session.cookies().len(), 2);
    }

    #[test]
    fn test_session_rejects_missing_parts() {
        assert!(Session::new(cookie_jar(), "", "ua").is_err());
        assert!(Session::new(Vec::new(), "token", "ua").is_err());
        assert!(Session::new(cookie_jar(), "token", "").is_err());
    }

    #[test]
    fn test_cookie_header_rendering() {
        let session = Session::new(cookie_jar(), "t", "ua").expect("valid session");
        assert_eq!(session.cookie_header(), "JSESSIONID=abc123; route=node-7");
    }

    #[test]
    fn test_search_token_debug_hides_value() {
        let token = SearchToken::new("eyJhbGciOiJIUzI1NiJ9.secret");
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn test_amount_from_number() {
        let record: InvoiceRecord =
            serde_json::from_value(serde_json::json!({"totalAmount": 120})).expect("record");
        assert_eq!(record.amount().expect("amount"), 120);
    }

    #[test]
    fn test_amount_from_string_with_whitespace() {
        let record: InvoiceRecord =
            serde_json::from_value(serde_json::json!({"totalAmount": " 345 \n"})).expect("record");
        assert_eq!(record.amount().expect("amount"), 345);
    }

    #[test]
    fn test_amount_rejects_garbage() {
        let malformed = [
            serde_json::json!({"totalAmount": "12a"}),
            serde_json::json!({"totalAmount": 1.5}),
            serde_json::json!({"totalAmount": null}),
            serde_json::json!({"totalAmount": []}),
        ];

        for value in malformed {
            let record: InvoiceRecord = serde_json::from_value(value).expect("record");
            assert!(record.amount().is_err());
        }
    }

    #[test]
    fn test_record_preserves_unknown_fields() {
        let record: InvoiceRecord = serde_json::from_value(serde_json::json!({
            "invNum": "AB12345678",
            "totalAmount": "88",
            "cardCode": "/ABC+123"
        }))
        .expect("record");

        assert_eq!(record.invoice_number.as_deref(), Some("AB12345678"));
        assert_eq!(
            record.extra.get("cardCode").and_then(|v| v.as_str()),
            Some("/ABC+123")
        );
    }
}
