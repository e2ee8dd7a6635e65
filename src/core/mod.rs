//! U2F BLE - Core constants, configuration, and the error catalog.
//!
//! This module has no dependencies on the rest of the crate beyond the
//! error types it maps into [`ErrorCode`]s.

mod config;
mod constants;
mod error;

pub use config::*;
pub use constants::*;
pub use error::*;
