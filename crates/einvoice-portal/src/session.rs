//! Session acquisition.

use crate::captcha::{CaptchaSolver, TesseractSolver};
use crate::error::{PortalError, Result};
use crate::login::LoginFlow;
use einvoice_browser::{BrowserLauncher, ChromiumLauncher, FingerprintConfig};
use einvoice_core::{Credentials, PortalConfig, Session};
use tokio::sync::Mutex;

/// Producer of fresh authenticated sessions.
///
/// The invocation layer re-acquires through this trait whenever a session
/// goes bad; tests substitute a counting fake.
#[async_trait::async_trait]
pub trait SessionSource: Send + Sync {
    /// Produce a fresh session. Never returns a stale one.
    async fn acquire(&self) -> Result<Session>;
}

/// Drives the login flow and packages its harvest into a [`Session`].
///
/// One factory per credential set, with caller-owned lifecycle: it holds
/// the credentials for its own lifetime and nothing outlives it. Login
/// runs are serialized so two browser automations never race on the same
/// account. No retry policy lives here; deciding when to log in again is
/// the invocation layer's job.
pub struct SessionFactory {
    credentials: Credentials,
    config: PortalConfig,
    solver: Box<dyn CaptchaSolver>,
    launcher: Box<dyn BrowserLauncher>,
    login_gate: Mutex<()>,
}

impl SessionFactory {
    /// Create a factory for one credential set.
    #[must_use]
    pub fn new(credentials: Credentials, config: PortalConfig) -> Self {
        let solver = Box::new(TesseractSolver::new(&config.captcha));
        Self {
            credentials,
            config,
            solver,
            launcher: Box::new(ChromiumLauncher),
            login_gate: Mutex::new(()),
        }
    }

    /// Replace the CAPTCHA solver.
    #[must_use]
    pub fn with_solver(mut self, solver: Box<dyn CaptchaSolver>) -> Self {
        self.solver = solver;
        self
    }

    /// Replace the browser launcher.
    #[must_use]
    pub fn with_launcher(mut self, launcher: Box<dyn BrowserLauncher>) -> Self {
        self.launcher = launcher;
        self
    }
}

#[async_trait::async_trait]
impl SessionSource for SessionFactory {
    async fn acquire(&self) -> Result<Session> {
        // At most one browser automation per credential set at a time
        let _gate = self.login_gate.lock().await;

        let fingerprint = FingerprintConfig::randomized();
        let browser = self
            .launcher
            .launch(&self.config.browser, &fingerprint)
            .await?;

        let flow = LoginFlow::new(&self.config.login, self.solver.as_ref());
        let outcome = tokio::time::timeout(
            self.config.login.overall_timeout(),
            flow.run(browser.as_ref(), &self.credentials),
        )
        .await;

        // Teardown on every path, deadline expiry included
        if let Err(e) = browser.close().await {
            tracing::warn!("browser teardown failed: {}", e);
        }

        let harvest = match outcome {
            Ok(result) => result?,
            Err(_) => {
                return Err(PortalError::LoginTimedOut {
                    phase: "overall deadline",
                })
            }
        };

        tracing::info!(cookies = harvest.cookies.len(), "portal session established");
        Ok(Session::new(
            harvest.cookies,
            harvest.token,
            fingerprint.user_agent,
        )?)
    }
}
