//! U2F BLE - Authenticator service
//!
//! Async front end that owns the active connection's session and turns link
//! events into dispatcher calls.

#[allow(clippy::module_inception)]
mod server;

pub use server::*;
