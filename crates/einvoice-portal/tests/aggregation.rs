//! Pagination aggregation tests against a wiremock portal double.

use einvoice_core::{PortalConfig, SearchToken, Session, SessionCookie};
use einvoice_portal::{PortalClient, PortalError, SessionSource};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEARCH_INVOICE_PATH: &str = "/btc/cloud/api/btc502w/searchCarrierInvoice";
const SEARCH_TOKEN_PATH: &str = "/btc/cloud/api/btc502w/getSearchCarrierInvoiceListJWT";

fn test_session() -> Session {
    Session::new(
        vec![SessionCookie::new("JSESSIONID", "test-cookie")],
        "test-token",
        "TestAgent/1.0",
    )
    .expect("valid session")
}

struct CountingSource {
    acquires: AtomicUsize,
}

impl CountingSource {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            acquires: AtomicUsize::new(0),
        })
    }

    fn count(&self) -> usize {
        self.acquires.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SessionSource for CountingSource {
    async fn acquire(&self) -> einvoice_portal::Result<Session> {
        self.acquires.fetch_add(1, Ordering::SeqCst);
        Ok(test_session())
    }
}

fn client(source: Arc<CountingSource>, server: &MockServer) -> PortalClient {
    PortalClient::new(source, &PortalConfig::default())
        .expect("create client")
        .with_session(test_session())
        .with_base_url(server.uri())
}

/// `count` records with amounts `base`, `base + 1`, ...
fn number_records(base: i64, count: i64) -> Vec<serde_json::Value> {
    (0..count)
        .map(|i| json!({ "invNum": format!("AB{:08}", base + i), "totalAmount": base + i }))
        .collect()
}

/// Same, but with amounts as whitespace-padded strings.
fn string_records(base: i64, count: i64) -> Vec<serde_json::Value> {
    (0..count)
        .map(|i| json!({ "totalAmount": format!(" {} \n", base + i) }))
        .collect()
}

async fn mount_page(
    server: &MockServer,
    page: u32,
    body: serde_json::Value,
) {
    Mock::given(method("POST"))
        .and(path(SEARCH_INVOICE_PATH))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_aggregate_folds_all_pages_in_order() {
    let server = MockServer::start().await;

    // 100 + 100 + 37 records; only the third page is marked last, and the
    // third page delivers its amounts as padded numeric strings
    mount_page(
        &server,
        0,
        json!({ "content": number_records(1, 100), "last": false }),
    )
    .await;
    mount_page(
        &server,
        1,
        json!({ "content": number_records(101, 100), "last": false }),
    )
    .await;
    mount_page(
        &server,
        2,
        json!({ "content": string_records(201, 37), "last": true }),
    )
    .await;

    let source = CountingSource::new();
    let client = client(source.clone(), &server);

    let token = SearchToken::new("tok");
    let result = client.aggregate(&token, 100).await.expect("aggregate");

    assert_eq!(result.records.len(), 237);
    // Sum of 1..=237
    assert_eq!(result.total, 237 * 238 / 2);
    // Server page order is preserved
    assert_eq!(
        result.records[0].invoice_number.as_deref(),
        Some("AB00000001")
    );
    assert_eq!(result.records[100].amount().expect("amount"), 101);
    assert_eq!(source.count(), 0);
}

#[tokio::test]
async fn test_aggregate_stops_quietly_on_missing_content() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        0,
        json!({ "content": number_records(1, 3), "last": false }),
    )
    .await;
    // Second page lost its content field entirely
    mount_page(&server, 1, json!({ "last": false })).await;

    let source = CountingSource::new();
    let client = client(source.clone(), &server);

    let token = SearchToken::new("tok");
    let result = client.aggregate(&token, 100).await.expect("aggregate");

    assert_eq!(result.records.len(), 3);
    assert_eq!(result.total, 6);
}

#[tokio::test]
async fn test_aggregate_fails_loudly_on_malformed_amount() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        0,
        json!({ "content": [{ "totalAmount": "12a" }], "last": true }),
    )
    .await;

    let source = CountingSource::new();
    let client = client(source.clone(), &server);

    let token = SearchToken::new("tok");
    let err = client
        .aggregate(&token, 100)
        .await
        .expect_err("malformed amount must fail");

    assert!(matches!(err, PortalError::MalformedResponse { .. }));
}

#[tokio::test]
async fn test_token_expiry_mid_pagination_surfaces_as_failure() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        0,
        json!({ "content": number_records(1, 2), "last": false }),
    )
    .await;
    // The search token expired; the portal rejects page 1 for good
    Mock::given(method("POST"))
        .and(path(SEARCH_INVOICE_PATH))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let source = CountingSource::new();
    let client = client(source.clone(), &server);

    let token = SearchToken::new("tok");
    let err = client
        .aggregate(&token, 100)
        .await
        .expect_err("expired token must not truncate silently");

    assert!(matches!(err, PortalError::RetriesExhausted { .. }));
    // Re-auth was attempted before giving up
    assert_eq!(source.count(), 2);
}

#[tokio::test]
async fn test_fetch_invoice_summary_mints_then_aggregates() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(SEARCH_TOKEN_PATH))
        .and(body_string_contains("T15:05:23.222Z"))
        .respond_with(ResponseTemplate::new(200).set_body_string("jwt-9"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(SEARCH_INVOICE_PATH))
        .and(body_string_contains("jwt-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{ "totalAmount": 40 }, { "totalAmount": "2" }],
            "last": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let source = CountingSource::new();
    let client = client(source.clone(), &server);

    use chrono::TimeZone;
    let start = chrono::Utc
        .with_ymd_and_hms(2024, 5, 1, 0, 0, 0)
        .single()
        .expect("valid date");
    let end = chrono::Utc
        .with_ymd_and_hms(2024, 5, 31, 0, 0, 0)
        .single()
        .expect("valid date");

    let result = client
        .fetch_invoice_summary(start, end)
        .await
        .expect("summary");

    assert_eq!(result.records.len(), 2);
    assert_eq!(result.total, 42);
}
