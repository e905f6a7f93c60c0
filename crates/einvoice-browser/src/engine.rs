use crate::actions::{BrowserActions, BrowserLauncher};
use crate::error::{BrowserError, Result};
use crate::fingerprint::FingerprintConfig;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, CaptureScreenshotFormat,
};
use chromiumoxide::Page;
use einvoice_core::config::BrowserConfig;
use einvoice_core::SessionCookie;
use futures_util::stream::StreamExt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Poll interval for bounded selector waits.
const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Injected before any portal script runs; the portal refuses automated
/// visitors that expose `navigator.webdriver`.
const WEBDRIVER_MASK: &str = r"
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined
    })
";

fn cdp(err: chromiumoxide::error::CdpError) -> BrowserError {
    BrowserError::Cdp(err.to_string())
}

/// Browser automation engine backed by chromiumoxide.
///
/// One engine drives one page in one browser process; the login flow owns
/// it for the duration of a single run and tears it down afterwards.
pub struct ChromiumEngine {
    page: Page,
    browser: Mutex<Option<Browser>>,
    handler_task: JoinHandle<()>,
    navigation_timeout: Duration,
}

impl ChromiumEngine {
    /// Launch a browser process with the given window and client identity.
    pub async fn launch(config: &BrowserConfig, fingerprint: &FingerprintConfig) -> Result<Self> {
        let mut builder = ChromeConfig::builder()
            .no_sandbox()
            .window_size(config.window_width, config.window_height)
            .args(vec![
                "--disable-blink-features=AutomationControlled",
                "--disable-gpu",
                "--disable-dev-shm-usage",
            ]);

        if !config.headless {
            builder = builder.with_head();
        }

        let chrome_config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(chrome_config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        // Drive browser events until the process goes away
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await.map_err(cdp)?;

        page.set_user_agent(fingerprint.user_agent.as_str())
            .await
            .map_err(cdp)?;

        let mask = AddScriptToEvaluateOnNewDocumentParams::builder()
            .source(WEBDRIVER_MASK)
            .build()
            .map_err(BrowserError::Script)?;
        page.execute(mask).await.map_err(cdp)?;

        tracing::debug!(
            user_agent = %fingerprint.user_agent,
            "browser launched"
        );

        Ok(Self {
            page,
            browser: Mutex::new(Some(browser)),
            handler_task,
            navigation_timeout: config.navigation_timeout(),
        })
    }

    async fn find(&self, selector: &str) -> Result<chromiumoxide::element::Element> {
        self.page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::SelectorNotFound(selector.to_string()))
    }
}

#[async_trait::async_trait]
impl BrowserActions for ChromiumEngine {
    async fn navigate(&self, url: &str) -> Result<()> {
        let load = async {
            self.page
                .goto(url)
                .await
                .map_err(|e| BrowserError::Navigation {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
            self.page
                .wait_for_navigation()
                .await
                .map_err(|e| BrowserError::Navigation {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
            Ok(())
        };

        tokio::time::timeout(self.navigation_timeout, load)
            .await
            .map_err(|_| BrowserError::Timeout(format!("navigation to {url}")))?
    }

    async fn current_url(&self) -> Result<String> {
        self.page
            .url()
            .await
            .map_err(cdp)?
            .ok_or_else(|| BrowserError::Navigation {
                url: String::new(),
                reason: "page has no URL".to_string(),
            })
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BrowserError::Timeout(format!("selector {selector}")));
            }
            tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }

    async fn fill_field(&self, selector: &str, value: &str) -> Result<()> {
        let element = self.find(selector).await?;
        element.click().await.map_err(cdp)?;
        element.type_str(value).await.map_err(cdp)?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let element = self.find(selector).await?;
        element.click().await.map_err(cdp)?;
        Ok(())
    }

    async fn screenshot_element(&self, selector: &str) -> Result<Vec<u8>> {
        let element = self.find(selector).await?;
        element
            .screenshot(CaptureScreenshotFormat::Png)
            .await
            .map_err(cdp)
    }

    async fn execute_script(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn session_storage_item(&self, key: &str) -> Result<Option<String>> {
        let script = format!("window.sessionStorage.getItem('{key}')");
        match self.execute_script(&script).await? {
            serde_json::Value::String(value) => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    async fn cookies(&self) -> Result<Vec<SessionCookie>> {
        let cookies = self.page.get_cookies().await.map_err(cdp)?;
        Ok(cookies
            .into_iter()
            .map(|c| SessionCookie::new(c.name, c.value))
            .collect())
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self.browser.lock().await;
        if let Some(mut browser) = guard.take() {
            if let Err(e) = browser.close().await {
                tracing::warn!("browser close failed: {}", e);
            }
            let _ = browser.wait().await;
            self.handler_task.abort();
            tracing::debug!("browser torn down");
        }
        Ok(())
    }
}

/// Default launcher producing [`ChromiumEngine`] handles.
pub struct ChromiumLauncher;

#[async_trait::async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(
        &self,
        config: &BrowserConfig,
        fingerprint: &FingerprintConfig,
    ) -> Result<Box<dyn BrowserActions>> {
        let engine = ChromiumEngine::launch(config, fingerprint).await?;
        Ok(Box::new(engine))
    }
}
