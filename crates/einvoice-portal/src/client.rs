//! Resilient portal invocation.
//!
//! Every portal operation goes through the same envelope: call against the
//! current session, and on a transport or login failure replace the
//! session and try again until the re-auth budget is spent. The portal
//! invalidates sessions without notice, so any non-success status is
//! treated as a request to log in again.

use crate::error::{PortalError, Result};
use crate::protocol;
use crate::session::SessionSource;
use chrono::{DateTime, Utc};
use einvoice_core::{InvoiceRecord, PortalConfig, SearchToken, Session};
use reqwest::header;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// A portal API operation and its request parameters.
enum Operation<'a> {
    CarrierList,
    MintSearchToken {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    SearchPage {
        token: &'a SearchToken,
        page: u32,
        size: u32,
    },
    InvoiceData {
        token: &'a SearchToken,
    },
    InvoiceDetail {
        token: &'a SearchToken,
        page: u32,
        size: u32,
    },
}

impl Operation<'_> {
    fn name(&self) -> &'static str {
        match self {
            Self::CarrierList => "getCarrierList",
            Self::MintSearchToken { .. } => "getSearchCarrierInvoiceListJWT",
            Self::SearchPage { .. } => "searchCarrierInvoice",
            Self::InvoiceData { .. } => "getCarrierInvoiceData",
            Self::InvoiceDetail { .. } => "getCarrierInvoiceDetail",
        }
    }
}

/// Body of the search-token mint request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchTokenRequest {
    card_code: &'static str,
    carrier_id2: &'static str,
    search_start_date: String,
    search_end_date: String,
    invoice_status: &'static str,
    is_search_all: &'static str,
}

impl SearchTokenRequest {
    fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            card_code: "",
            carrier_id2: "",
            search_start_date: protocol::format_search_bound(start),
            search_end_date: protocol::format_search_bound(end),
            invoice_status: "all",
            is_search_all: "true",
        }
    }
}

/// One page of carrier invoice search results.
#[derive(Debug, Deserialize)]
pub struct SearchPage {
    /// Records on this page; absent when the portal stops producing pages
    #[serde(default)]
    pub content: Option<Vec<InvoiceRecord>>,
    /// Whether the portal marked this as the last page
    #[serde(default)]
    pub last: Option<bool>,
    /// Total record count as reported by the portal, when present
    #[serde(rename = "totalElements", default)]
    pub total_elements: Option<u64>,
}

/// Authenticated portal client with transparent re-authentication.
///
/// Owns the current [`Session`] exclusively; the session slot is replaced
/// wholesale behind an `Arc` swap, so concurrent calls see either the old
/// session or the new one, never a half-updated mix.
pub struct PortalClient {
    http: reqwest::Client,
    source: Arc<dyn SessionSource>,
    session: RwLock<Option<Arc<Session>>>,
    base_url: String,
    max_reauth_retries: u32,
    page_size: u32,
}

impl PortalClient {
    /// Create a client over a session source.
    ///
    /// No login happens here; the first invocation acquires lazily.
    pub fn new(source: Arc<dyn SessionSource>, config: &PortalConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http.request_timeout())
            .build()
            .map_err(|e| PortalError::Internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            source,
            session: RwLock::new(None),
            base_url: protocol::SERVICE_BASE_URL.to_string(),
            max_reauth_retries: config.http.max_reauth_retries,
            page_size: config.http.page_size,
        })
    }

    /// Point the client at a different service base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Seed the client with an already-acquired session.
    #[must_use]
    pub fn with_session(self, session: Session) -> Self {
        Self {
            session: RwLock::new(Some(Arc::new(session))),
            ..self
        }
    }

    /// The configured search page size.
    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Fetch the account's carrier list.
    pub async fn carrier_list(&self) -> Result<serde_json::Value> {
        let operation = Operation::CarrierList;
        let name = operation.name();
        let response = self.invoke(&operation).await?;
        response
            .json()
            .await
            .map_err(|e| PortalError::MalformedResponse {
                operation: name,
                reason: e.to_string(),
            })
    }

    /// Mint a search token scoped to the given date range.
    ///
    /// Both bounds are normalized to the portal's fixed time of day before
    /// transmission.
    pub async fn mint_search_token(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<SearchToken> {
        let operation = Operation::MintSearchToken { start, end };
        let name = operation.name();
        let response = self.invoke(&operation).await?;
        let body = response
            .text()
            .await
            .map_err(|e| PortalError::MalformedResponse {
                operation: name,
                reason: e.to_string(),
            })?;

        let token = body.trim();
        if token.is_empty() {
            return Err(PortalError::MalformedResponse {
                operation: name,
                reason: "empty search token".to_string(),
            });
        }
        Ok(SearchToken::new(token))
    }

    /// Fetch one page of carrier invoice search results.
    pub async fn search_page(
        &self,
        token: &SearchToken,
        page: u32,
        size: u32,
    ) -> Result<SearchPage> {
        let operation = Operation::SearchPage { token, page, size };
        let name = operation.name();
        let response = self.invoke(&operation).await?;
        response
            .json()
            .await
            .map_err(|e| PortalError::MalformedResponse {
                operation: name,
                reason: e.to_string(),
            })
    }

    /// Fetch invoice data for a search token.
    pub async fn invoice_data(&self, token: &SearchToken) -> Result<serde_json::Value> {
        let operation = Operation::InvoiceData { token };
        let name = operation.name();
        let response = self.invoke(&operation).await?;
        response
            .json()
            .await
            .map_err(|e| PortalError::MalformedResponse {
                operation: name,
                reason: e.to_string(),
            })
    }

    /// Fetch one page of invoice detail for a search token.
    pub async fn invoice_detail(
        &self,
        token: &SearchToken,
        page: u32,
        size: u32,
    ) -> Result<serde_json::Value> {
        let operation = Operation::InvoiceDetail { token, page, size };
        let name = operation.name();
        let response = self.invoke(&operation).await?;
        response
            .json()
            .await
            .map_err(|e| PortalError::MalformedResponse {
                operation: name,
                reason: e.to_string(),
            })
    }

    /// The shared retry/re-auth envelope.
    ///
    /// One attempt against the current session, then up to
    /// `max_reauth_retries` more, each against a freshly acquired session.
    /// Retries are sequential; re-authenticating in parallel would only
    /// multiply browser automation cost and poke the portal's abuse
    /// heuristics.
    async fn invoke(&self, operation: &Operation<'_>) -> Result<reqwest::Response> {
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;

            let outcome = match self.current_session().await {
                Ok(session) => self.dispatch(operation, &session).await,
                Err(err) => Err(err),
            };

            match outcome {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() && attempts <= self.max_reauth_retries => {
                    warn!(
                        operation = operation.name(),
                        attempt = attempts,
                        error = %err,
                        "portal call failed, re-authenticating"
                    );
                    self.invalidate_session().await;
                }
                Err(err) if err.is_retryable() => {
                    return Err(PortalError::RetriesExhausted {
                        operation: operation.name(),
                        attempts,
                        source: Box::new(err),
                    });
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// The current session, acquiring one if none is established.
    async fn current_session(&self) -> Result<Arc<Session>> {
        if let Some(session) = self.session.read().await.as_ref() {
            return Ok(Arc::clone(session));
        }

        let mut slot = self.session.write().await;
        // Another caller may have acquired while we waited for the lock
        if let Some(session) = slot.as_ref() {
            return Ok(Arc::clone(session));
        }

        debug!("no portal session established, acquiring");
        let fresh = Arc::new(self.source.acquire().await?);
        *slot = Some(Arc::clone(&fresh));
        Ok(fresh)
    }

    /// Drop the current session so the next attempt acquires a fresh one.
    async fn invalidate_session(&self) {
        *self.session.write().await = None;
    }

    /// Build and send one request for an operation against a session.
    async fn dispatch(
        &self,
        operation: &Operation<'_>,
        session: &Session,
    ) -> Result<reqwest::Response> {
        let request = match operation {
            Operation::CarrierList => self
                .http
                .get(format!("{}{}", self.base_url, protocol::CARRIER_LIST_PATH)),
            Operation::MintSearchToken { start, end } => self
                .http
                .post(format!("{}{}", self.base_url, protocol::SEARCH_TOKEN_PATH))
                .json(&SearchTokenRequest::new(*start, *end)),
            Operation::SearchPage { token, page, size } => self
                .http
                .post(format!(
                    "{}{}?page={}&size={}",
                    self.base_url,
                    protocol::SEARCH_INVOICE_PATH,
                    page,
                    size
                ))
                .json(&serde_json::json!({ "token": token.as_str() })),
            // These two endpoints take the bare token string as the body
            Operation::InvoiceData { token } => self
                .http
                .post(format!("{}{}", self.base_url, protocol::INVOICE_DATA_PATH))
                .body(token.as_str().to_string()),
            Operation::InvoiceDetail { token, page, size } => self
                .http
                .post(format!(
                    "{}{}?page={}&size={}",
                    self.base_url,
                    protocol::INVOICE_DETAIL_PATH,
                    page,
                    size
                ))
                .body(token.as_str().to_string()),
        };

        let response = request
            .header(header::AUTHORIZATION, format!("Bearer {}", session.token()))
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::USER_AGENT, session.client_identity())
            .header(header::COOKIE, session.cookie_header())
            .send()
            .await
            .map_err(|source| PortalError::Request {
                operation: operation.name(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PortalError::Transport {
                operation: operation.name(),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_search_token_request_wire_shape() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).single().expect("valid date");
        let end = Utc.with_ymd_and_hms(2024, 3, 31, 8, 0, 0).single().expect("valid date");

        let body = serde_json::to_value(SearchTokenRequest::new(start, end)).expect("serialize");

        assert_eq!(body["cardCode"], "");
        assert_eq!(body["carrierId2"], "");
        assert_eq!(body["invoiceStatus"], "all");
        assert_eq!(body["isSearchAll"], "true");
        assert_eq!(body["searchStartDate"], "2024-03-01T15:05:23.222Z");
        assert_eq!(body["searchEndDate"], "2024-03-31T15:05:23.222Z");
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(Operation::CarrierList.name(), "getCarrierList");

        let token = SearchToken::new("t");
        assert_eq!(
            Operation::SearchPage {
                token: &token,
                page: 0,
                size: 100
            }
            .name(),
            "searchCarrierInvoice"
        );
    }

    #[test]
    fn test_search_page_tolerates_missing_fields() {
        let page: SearchPage = serde_json::from_str("{}").expect("parse empty page");
        assert!(page.content.is_none());
        assert!(page.last.is_none());

        let page: SearchPage = serde_json::from_value(serde_json::json!({
            "content": [{"totalAmount": 10}],
            "last": false,
            "totalElements": 237
        }))
        .expect("parse full page");
        assert_eq!(page.content.map(|c| c.len()), Some(1));
        assert_eq!(page.last, Some(false));
        assert_eq!(page.total_elements, Some(237));
    }
}
