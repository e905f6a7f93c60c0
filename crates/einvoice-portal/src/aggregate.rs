//! Pagination folding for carrier invoice search.

use crate::client::PortalClient;
use crate::error::{PortalError, Result};
use chrono::{DateTime, Utc};
use einvoice_core::{AggregatedResult, InvoiceRecord, SearchToken};
use tracing::{debug, info};

impl PortalClient {
    /// Drive the paginated search to completion and fold every page into
    /// one result.
    ///
    /// Pages are fetched in order starting at 0 until the portal marks the
    /// last page or a page arrives without its content field (some portal
    /// responses never mark the last page; a missing field is a quiet stop,
    /// not an error). A search token expiring mid-pagination fails the
    /// whole aggregation rather than truncating it silently.
    pub async fn aggregate(&self, token: &SearchToken, page_size: u32) -> Result<AggregatedResult> {
        let mut records: Vec<InvoiceRecord> = Vec::new();
        let mut page = 0u32;

        loop {
            let response = self.search_page(token, page, page_size).await?;

            let Some(content) = response.content else {
                debug!(page, "page missing content field, stopping");
                break;
            };

            debug!(page, records = content.len(), "collected search page");
            records.extend(content);

            if response.last.unwrap_or(true) {
                break;
            }
            page += 1;
        }

        let mut total: i64 = 0;
        for record in &records {
            total += record.amount().map_err(|e| PortalError::MalformedResponse {
                operation: "searchCarrierInvoice",
                reason: e.to_string(),
            })?;
        }

        info!(records = records.len(), total, "aggregated carrier invoices");
        Ok(AggregatedResult { records, total })
    }

    /// Mint a search token for the date range and aggregate every page of
    /// its results, using the configured page size.
    pub async fn fetch_invoice_summary(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<AggregatedResult> {
        let token = self.mint_search_token(start, end).await?;
        self.aggregate(&token, self.page_size()).await
    }
}
