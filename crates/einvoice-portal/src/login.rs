//! Browser login flow for the portal.
//!
//! Drives a browser through the portal's CAPTCHA-gated login:
//! navigation, credential entry, a bounded CAPTCHA solve/submit loop,
//! bearer token polling and cookie harvest. The portal never announces
//! success or failure at the CAPTCHA stage; the only success signal is the
//! page navigating away after submit.

use crate::captcha::CaptchaSolver;
use crate::error::{PortalError, Result};
use crate::protocol;
use einvoice_browser::BrowserActions;
use einvoice_core::config::LoginConfig;
use einvoice_core::{Credentials, SessionCookie};
use std::time::{Duration, Instant};
use tracing::debug;

/// Poll interval while waiting for the post-submit URL change.
const URL_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Material harvested from a successful login run.
#[derive(Debug)]
pub struct LoginHarvest {
    /// Snapshot of every cookie the portal set
    pub cookies: Vec<SessionCookie>,
    /// The bearer token the portal wrote to session storage
    pub token: String,
}

/// One run of the portal login state machine.
///
/// Written against [`BrowserActions`] so the whole flow runs against a
/// fake in tests. Every wait is bounded: the CAPTCHA loop by an attempt
/// budget and the run's wall-clock deadline, the token poll by its own
/// timeout.
pub struct LoginFlow<'a> {
    config: &'a LoginConfig,
    solver: &'a dyn CaptchaSolver,
}

impl<'a> LoginFlow<'a> {
    /// Create a flow over the given bounds and CAPTCHA solver.
    #[must_use]
    pub fn new(config: &'a LoginConfig, solver: &'a dyn CaptchaSolver) -> Self {
        Self { config, solver }
    }

    /// Run the login flow to completion.
    ///
    /// The caller owns the browser's lifecycle and must tear it down
    /// whatever this returns.
    pub async fn run(
        &self,
        browser: &dyn BrowserActions,
        credentials: &Credentials,
    ) -> Result<LoginHarvest> {
        let deadline = Instant::now() + self.config.overall_timeout();

        debug!("navigating to portal login");
        browser.navigate(protocol::PORTAL_ROOT_URL).await?;
        browser
            .wait_for_selector(protocol::LOGIN_LINK_SELECTOR, self.config.element_wait())
            .await?;
        browser.click(protocol::LOGIN_LINK_SELECTOR).await?;

        browser
            .wait_for_selector(protocol::MOBILE_FIELD_SELECTOR, self.config.element_wait())
            .await?;
        browser
            .fill_field(protocol::MOBILE_FIELD_SELECTOR, credentials.mobile())
            .await?;
        browser
            .fill_field(protocol::PASSWORD_FIELD_SELECTOR, credentials.password())
            .await?;
        debug!("credentials entered");

        self.pass_captcha_gate(browser, deadline).await?;

        let token = self.poll_for_token(browser, deadline).await?;

        let cookies = browser.cookies().await?;
        debug!(cookies = cookies.len(), "session harvested");

        Ok(LoginHarvest { cookies, token })
    }

    /// Solve and submit CAPTCHAs until the portal lets us through, the
    /// attempt budget runs out, or the deadline passes.
    async fn pass_captcha_gate(
        &self,
        browser: &dyn BrowserActions,
        deadline: Instant,
    ) -> Result<()> {
        let budget = self.config.max_captcha_attempts;

        for attempt in 1..=budget {
            if Instant::now() >= deadline {
                return Err(PortalError::LoginTimedOut {
                    phase: "captcha gate",
                });
            }

            browser
                .wait_for_selector(protocol::CAPTCHA_IMAGE_SELECTOR, self.config.element_wait())
                .await?;

            // A wrong guess makes the portal render a new image; every
            // attempt captures afresh, a stale capture is never reused.
            let image = browser
                .screenshot_element(protocol::CAPTCHA_IMAGE_SELECTOR)
                .await?;

            let guess = match self.solver.solve(&image, protocol::CAPTCHA_ALLOWLIST) {
                Ok(guess) => guess,
                Err(PortalError::CaptchaUnreadable) => {
                    debug!(attempt, "no confident captcha read, requesting a fresh one");
                    browser.click(protocol::CAPTCHA_REFRESH_SELECTOR).await?;
                    continue;
                }
                Err(other) => return Err(other),
            };

            let previous_url = browser.current_url().await?;

            // Clear digits a prior attempt may have left behind
            browser
                .execute_script(&format!(
                    "document.querySelector('{}').value = ''",
                    protocol::CAPTCHA_FIELD_SELECTOR
                ))
                .await?;
            browser
                .fill_field(protocol::CAPTCHA_FIELD_SELECTOR, &guess)
                .await?;
            browser.click(protocol::SUBMIT_BUTTON_SELECTOR).await?;

            if self.url_changed(browser, &previous_url, deadline).await? {
                debug!(attempt, "captcha accepted");
                return Ok(());
            }

            debug!(attempt, "captcha rejected");
            browser.click(protocol::CAPTCHA_REFRESH_SELECTOR).await?;
        }

        Err(PortalError::CaptchaExhausted { attempts: budget })
    }

    /// Watch for the page to navigate away after submit.
    ///
    /// The portal gives no explicit verdict at this stage; an unchanged
    /// URL after the bounded wait means the guess was wrong.
    async fn url_changed(
        &self,
        browser: &dyn BrowserActions,
        previous_url: &str,
        deadline: Instant,
    ) -> Result<bool> {
        let wait_deadline = std::cmp::min(Instant::now() + self.config.submit_wait(), deadline);

        loop {
            if browser.current_url().await? != previous_url {
                return Ok(true);
            }
            if Instant::now() >= wait_deadline {
                return Ok(false);
            }
            tokio::time::sleep(URL_POLL_INTERVAL).await;
        }
    }

    /// Poll session storage for the issued bearer token.
    ///
    /// The hosting page can tear down navigation before the token is ever
    /// written, so the poll is bounded rather than waiting forever.
    async fn poll_for_token(
        &self,
        browser: &dyn BrowserActions,
        deadline: Instant,
    ) -> Result<String> {
        let poll_deadline = std::cmp::min(
            Instant::now() + self.config.token_poll_timeout(),
            deadline,
        );

        loop {
            if let Some(token) = browser
                .session_storage_item(protocol::TOKEN_STORAGE_KEY)
                .await?
            {
                if !token.is_empty() {
                    debug!("bearer token issued");
                    return Ok(token);
                }
            }
            if Instant::now() >= poll_deadline {
                return Err(PortalError::LoginTimedOut {
                    phase: "token polling",
                });
            }
            tokio::time::sleep(self.config.token_poll_interval()).await;
        }
    }
}
