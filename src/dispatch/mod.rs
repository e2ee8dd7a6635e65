//! U2F BLE - Command dispatch
//!
//! Implements:
//! - Per-connection [`Session`] records
//! - The [`InstructionRegistry`] that credential logic plugs into
//! - The [`Dispatcher`] state machine from inbound chunk to outbound chunks
//! - The [`Link`] seam for outbound notifications

mod dispatcher;
mod link;
mod registry;
mod session;

pub use dispatcher::*;
pub use link::*;
pub use registry::*;
pub use session::*;
