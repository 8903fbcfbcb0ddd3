//! RDP Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging for the RDP (Retail Data Pipeline)
//! workspace.
//!
//! # Overview
//!
//! - **Error Handling**: the [`RdpError`] taxonomy and [`Result`] alias used
//!   by every pipeline component.
//! - **Logging**: centralized tracing initialization ([`logging::init_logging`]).
//!
//! # Example
//!
//! ```no_run
//! use rdp_common::{Result, RdpError};
//!
//! fn read_cursor(raw: &str) -> Result<i64> {
//!     raw.parse()
//!         .map_err(|_| RdpError::shape(format!("cursor is not an integer: {raw}")))
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{RdpError, Result};
