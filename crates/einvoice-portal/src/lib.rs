//! Session acquisition and resilient invocation for the e-invoice portal.
//!
//! The portal has no official API, no stable session lifetime and an image
//! CAPTCHA on login. This crate logs in by driving a headless browser
//! (solving the CAPTCHA via OCR), harvests the bearer token and cookie
//! jar into a [`Session`](einvoice_core::Session), and invokes the
//! portal's JSON endpoints through an envelope that re-authenticates and
//! retries on any failure signal.
//!
//! # Modules
//!
//! - [`captcha`] - OCR-backed CAPTCHA solving behind a pluggable trait
//! - [`login`] - the browser login flow
//! - [`session`] - session factory and the `SessionSource` seam
//! - [`client`] - resilient invocation over the portal's endpoints
//! - [`aggregate`] - pagination folding for invoice search
//! - [`protocol`] - every observed portal constant in one place
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use einvoice_core::{Credentials, PortalConfig};
//! use einvoice_portal::{PortalClient, SessionFactory};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PortalConfig::load_with_env()?;
//! let factory = SessionFactory::new(
//!     Credentials::new("0912345678", "secret"),
//!     config.clone(),
//! );
//! let client = PortalClient::new(Arc::new(factory), &config)?;
//!
//! let carriers = client.carrier_list().await?;
//! println!("{carriers}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod aggregate;
pub mod captcha;
pub mod client;
pub mod error;
pub mod login;
pub mod protocol;
pub mod session;

pub use captcha::{CaptchaSolver, TesseractSolver};
pub use client::{PortalClient, SearchPage};
pub use error::{PortalError, Result};
pub use login::{LoginFlow, LoginHarvest};
pub use session::{SessionFactory, SessionSource};
