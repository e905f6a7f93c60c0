//! Browser automation boundary for the e-invoice portal.
//!
//! The portal is script-hostile and CAPTCHA-gated; everything the login
//! flow needs from a browser is expressed as the [`BrowserActions`]
//! capability trait so the flow stays testable without a browser process.

pub mod actions;
pub mod engine;
pub mod error;
pub mod fingerprint;

pub use actions::{BrowserActions, BrowserLauncher};
pub use engine::{ChromiumEngine, ChromiumLauncher};
pub use error::{BrowserError, Result};
pub use fingerprint::FingerprintConfig;
