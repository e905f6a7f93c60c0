//! Example: Log in to the portal and aggregate the current month's carrier
//! invoices.
//!
//! Requires Chrome/Chromium and Tesseract installed, plus portal
//! credentials in `EINVOICE_USERNAME` / `EINVOICE_PASSWORD`.

use chrono::{Datelike, Utc};
use einvoice_core::{Credentials, PortalConfig};
use einvoice_portal::{PortalClient, SessionFactory};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mobile = std::env::var("EINVOICE_USERNAME")
        .map_err(|_| "set EINVOICE_USERNAME to the portal account's mobile number")?;
    let password = std::env::var("EINVOICE_PASSWORD")
        .map_err(|_| "set EINVOICE_PASSWORD to the portal account's password")?;

    let config = PortalConfig::load_with_env()?;
    let factory = SessionFactory::new(Credentials::new(mobile, password), config.clone());
    let client = PortalClient::new(Arc::new(factory), &config)?;

    let today = Utc::now();
    let first_of_month = today
        .with_day(1)
        .expect("first of month is always a valid date");

    println!(
        "Aggregating carrier invoices {} → {}...\n",
        first_of_month.format("%Y-%m-%d"),
        today.format("%Y-%m-%d")
    );

    let summary = client.fetch_invoice_summary(first_of_month, today).await?;

    for record in &summary.records {
        println!(
            "  • {}  {}  {}",
            record.invoice_number.as_deref().unwrap_or("(no number)"),
            record.seller_name.as_deref().unwrap_or("(unknown seller)"),
            record.amount()?
        );
    }

    println!("\n✓ {} invoices, total {}", summary.records.len(), summary.total);

    Ok(())
}
