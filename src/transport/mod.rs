//! U2F BLE - Transport framing
//!
//! This module implements the framing layer of U2F over Bluetooth (U2F BT
//! 6.2). It provides:
//!
//! - **Wire types**: [`Command`], [`Frame`], [`Message`], and [`Mtu`]
//! - **Reassembly**: [`Reassembler`] turning inbound chunks into messages
//! - **Fragmentation**: [`encode`] splitting a message into outbound chunks
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Dispatch (APDU, handlers)       │
//! ├─────────────────────────────────────────┤
//! │         Transport framing               │  ← This module
//! │   frames, reassembly, fragmentation     │
//! ├─────────────────────────────────────────┤
//! │     GATT control point / status         │
//! └─────────────────────────────────────────┘
//! ```

mod encoder;
mod error;
mod frame;
mod reassembly;

pub use encoder::encode;
pub use error::*;
pub use frame::*;
pub use reassembly::{Feed, ReassemblyState, Reassembler};
