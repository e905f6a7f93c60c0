//! Configuration for the portal engine.
//!
//! TOML-based configuration with XDG-compliant paths and environment
//! variable overrides. Every bound the engine waits on (CAPTCHA attempts,
//! login deadlines, re-auth budgets, page sizes) is configured here.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Engine configuration.
///
/// Loaded from `~/.config/einvoice-engine/config.toml` (or platform
/// equivalent). Missing file or missing sections fall back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Login flow bounds
    pub login: LoginConfig,
    /// CAPTCHA solver settings
    pub captcha: CaptchaConfig,
    /// API invocation settings
    pub http: HttpConfig,
    /// Browser automation settings
    pub browser: BrowserConfig,
}

impl PortalConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if the config directory cannot be determined, or the
    /// file exists but cannot be read or parsed.
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(&config_path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supported overrides:
    /// - `EINVOICE_HEADLESS`: browser headless mode (true/false)
    /// - `EINVOICE_MAX_CAPTCHA_ATTEMPTS`: CAPTCHA attempt budget
    /// - `EINVOICE_MAX_REAUTH_RETRIES`: re-auth budget per operation
    /// - `EINVOICE_PAGE_SIZE`: search page size
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides onto an existing config.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("EINVOICE_HEADLESS") {
            if let Ok(headless) = val.parse() {
                self.browser.headless = headless;
                tracing::debug!("Override browser.headless from env: {}", headless);
            }
        }

        if let Ok(val) = std::env::var("EINVOICE_MAX_CAPTCHA_ATTEMPTS") {
            if let Ok(attempts) = val.parse() {
                self.login.max_captcha_attempts = attempts;
                tracing::debug!("Override login.max_captcha_attempts from env: {}", attempts);
            }
        }

        if let Ok(val) = std::env::var("EINVOICE_MAX_REAUTH_RETRIES") {
            if let Ok(retries) = val.parse() {
                self.http.max_reauth_retries = retries;
                tracing::debug!("Override http.max_reauth_retries from env: {}", retries);
            }
        }

        if let Ok(val) = std::env::var("EINVOICE_PAGE_SIZE") {
            if let Ok(size) = val.parse() {
                self.http.page_size = size;
                tracing::debug!("Override http.page_size from env: {}", size);
            }
        }
    }

    /// Save configuration to disk, creating the config directory if needed.
    ///
    /// # Errors
    /// Returns error if the directory cannot be created or the file cannot
    /// be written.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/einvoice-engine/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("tw", "einvoice-engine", "einvoice-engine")
            .ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

/// Bounds for the browser login flow.
///
/// The CAPTCHA loop and token polling in the source portal have no natural
/// termination; every wait here is explicit so the flow can never hang.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    /// Maximum CAPTCHA solve/submit attempts per login run
    pub max_captcha_attempts: u32,
    /// Wall-clock deadline for a whole login run, in seconds
    pub overall_timeout_secs: u64,
    /// Bounded wait for page elements to appear, in seconds
    pub element_wait_secs: u64,
    /// Bounded wait for the post-submit URL change, in seconds
    pub submit_wait_secs: u64,
    /// Interval between bearer-token polls, in seconds
    pub token_poll_interval_secs: u64,
    /// Deadline for the bearer token to appear in session storage, in seconds
    pub token_poll_timeout_secs: u64,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            max_captcha_attempts: 5,
            overall_timeout_secs: 180,
            element_wait_secs: 10,
            submit_wait_secs: 6,
            token_poll_interval_secs: 2,
            token_poll_timeout_secs: 30,
        }
    }
}

impl LoginConfig {
    /// Wall-clock deadline for a whole login run.
    #[must_use]
    pub fn overall_timeout(&self) -> Duration {
        Duration::from_secs(self.overall_timeout_secs)
    }

    /// Bounded wait for page elements.
    #[must_use]
    pub fn element_wait(&self) -> Duration {
        Duration::from_secs(self.element_wait_secs)
    }

    /// Bounded wait for the post-submit URL change.
    #[must_use]
    pub fn submit_wait(&self) -> Duration {
        Duration::from_secs(self.submit_wait_secs)
    }

    /// Interval between bearer-token polls.
    #[must_use]
    pub fn token_poll_interval(&self) -> Duration {
        Duration::from_secs(self.token_poll_interval_secs)
    }

    /// Deadline for the bearer token to appear.
    #[must_use]
    pub fn token_poll_timeout(&self) -> Duration {
        Duration::from_secs(self.token_poll_timeout_secs)
    }
}

/// CAPTCHA solver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptchaConfig {
    /// Minimum OCR confidence (0-100) for a read to count
    pub min_confidence: f32,
    /// Tesseract language model
    pub ocr_language: String,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            min_confidence: 40.0,
            ocr_language: "eng".to_string(),
        }
    }
}

/// API invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Additional re-auth retries per operation after the first attempt
    pub max_reauth_retries: u32,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
    /// Page size for paginated search
    pub page_size: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_reauth_retries: 2,
            request_timeout_secs: 30,
            page_size: 100,
        }
    }
}

impl HttpConfig {
    /// Request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Browser automation settings.
///
/// The portal serves a different layout below desktop widths and the login
/// control moves with it, so the default window matches the desktop page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// Navigation timeout in seconds
    pub navigation_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1280,
            window_height: 1024,
            navigation_timeout_secs: 30,
        }
    }
}

impl BrowserConfig {
    /// Navigation timeout as a `Duration`.
    #[must_use]
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PortalConfig::default();
        assert_eq!(config.login.max_captcha_attempts, 5);
        assert_eq!(config.login.token_poll_timeout_secs, 30);
        assert_eq!(config.http.max_reauth_retries, 2);
        assert_eq!(config.http.page_size, 100);
        assert!(config.browser.headless);
        assert_eq!(config.browser.window_width, 1280);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = PortalConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("[login]"));
        assert!(toml_str.contains("[http]"));
        assert!(toml_str.contains("[browser]"));

        let parsed: PortalConfig = toml::from_str(&toml_str).expect("parse serialized config");
        assert_eq!(
            parsed.login.max_captcha_attempts,
            config.login.max_captcha_attempts
        );
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[login]
max_captcha_attempts = 3

[http]
page_size = 50
"#;

        let config: PortalConfig = toml::from_str(toml_str).expect("parse partial config");
        assert_eq!(config.login.max_captcha_attempts, 3);
        assert_eq!(config.http.page_size, 50);
        // These should be defaults
        assert_eq!(config.http.max_reauth_retries, 2);
        assert!(config.browser.headless);
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("EINVOICE_MAX_CAPTCHA_ATTEMPTS", "7");
        std::env::set_var("EINVOICE_HEADLESS", "false");

        let mut config = PortalConfig::default();
        config.apply_env_overrides();

        assert_eq!(config.login.max_captcha_attempts, 7);
        assert!(!config.browser.headless);

        std::env::remove_var("EINVOICE_MAX_CAPTCHA_ATTEMPTS");
        std::env::remove_var("EINVOICE_HEADLESS");
    }

    #[test]
    fn test_duration_accessors() {
        let config = LoginConfig::default();
        assert_eq!(config.token_poll_interval(), Duration::from_secs(2));
        assert_eq!(config.token_poll_timeout(), Duration::from_secs(30));
        assert!(config.overall_timeout() > config.token_poll_timeout());
    }
}
