use crate::error::Result;
use crate::fingerprint::FingerprintConfig;
use einvoice_core::config::BrowserConfig;
use einvoice_core::SessionCookie;
use std::time::Duration;

/// Capability boundary for driving a browser through the portal login.
///
/// The login flow is written against this trait so it can run against a
/// fake in unit tests; only the chromiumoxide engine talks to a real
/// browser process.
#[async_trait::async_trait]
pub trait BrowserActions: Send + Sync {
    /// Navigate to a URL and wait for the load to settle.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// The page's current URL.
    async fn current_url(&self) -> Result<String>;

    /// Wait for a selector to appear, bounded by `timeout`.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()>;

    /// Fill a form field by selector.
    async fn fill_field(&self, selector: &str, value: &str) -> Result<()>;

    /// Click an element by selector.
    async fn click(&self, selector: &str) -> Result<()>;

    /// Screenshot a single element, returned as PNG bytes.
    async fn screenshot_element(&self, selector: &str) -> Result<Vec<u8>>;

    /// Evaluate a script in the page and return its JSON result.
    async fn execute_script(&self, script: &str) -> Result<serde_json::Value>;

    /// Read a key from the page's session storage.
    async fn session_storage_item(&self, key: &str) -> Result<Option<String>>;

    /// Snapshot all cookies visible to the page.
    async fn cookies(&self) -> Result<Vec<SessionCookie>>;

    /// Tear down the browser process. Idempotent.
    async fn close(&self) -> Result<()>;
}

/// Factory seam for producing browser handles.
///
/// The session factory launches one browser per login run through this
/// trait; tests substitute a launcher that hands out fakes.
#[async_trait::async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Launch a browser configured with the given window and identity.
    async fn launch(
        &self,
        config: &BrowserConfig,
        fingerprint: &FingerprintConfig,
    ) -> Result<Box<dyn BrowserActions>>;
}
