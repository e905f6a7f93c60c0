//! Einvoice Core - Foundation crate for the e-invoice portal engine.
//!
//! This crate provides the shared session/invoice types, error handling and
//! configuration management that the browser and portal crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Core error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Session and invoice types (`Credentials`, `Session`,
//!   `SearchToken`, `InvoiceRecord`, `AggregatedResult`)
//!
//! # Example
//!
//! ```rust
//! use einvoice_core::{Credentials, PortalConfig};
//!
//! let config = PortalConfig::default();
//! assert_eq!(config.login.max_captcha_attempts, 5);
//!
//! let _creds = Credentials::new("0912345678", "secret");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{BrowserConfig, CaptchaConfig, HttpConfig, LoginConfig, PortalConfig};
pub use error::{ConfigError, ConfigResult, CoreError, Result};
pub use types::{
    AggregatedResult, Credentials, InvoiceRecord, SearchToken, Session, SessionCookie,
};
