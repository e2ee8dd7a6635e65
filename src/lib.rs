//! # U2F BLE Protocol
//!
//! Authenticator-side protocol engine for **U2F over Bluetooth Low Energy**.
//!
//! The host writes chunks to the control point characteristic; the engine
//! reassembles them into commands, dispatches APDUs to registered instruction
//! handlers, and fragments responses into chunks sized for the negotiated MTU.
//! It provides:
//!
//! - **Framing**: Initial/continuation frames, reassembly with timeouts, fragmentation
//! - **APDU decoding**: Short and extended length forms
//! - **Dispatch**: Ping echo, instruction registry, protocol error replies
//! - **GATT surface**: Characteristic UUIDs and capability reads
//! - **Service**: Async tokio front end owning the active session
//!
//! ## Feature Flags
//!
//! - `server` (default): Async authenticator service on tokio
//!
//! ## Modules
//!
//! - [`core`]: Constants, configuration, and the error catalog
//! - [`transport`]: Frames, reassembly, and fragmentation
//! - [`apdu`]: APDU request decoding and status words
//! - [`dispatch`]: Sessions, instruction registry, and the dispatcher
//! - [`gatt`]: GATT characteristics
//! - [`server`]: Async service (requires `server` feature)
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Instant;
//!
//! use u2f_ble_protocol::prelude::*;
//!
//! let registry = InstructionRegistry::builder().with_version().build();
//! let dispatcher = Dispatcher::new(Arc::new(registry));
//! let config = AuthenticatorConfig::default();
//! let mut session = Session::new(ConnectionId::new(1), &config, Instant::now());
//!
//! // U2F_VERSION in a single initial frame
//! let chunks = dispatcher.process_chunk(
//!     &mut session,
//!     &[0x83, 0x00, 0x04, 0x00, 0x03, 0x00, 0x00],
//!     Instant::now(),
//! );
//! assert_eq!(chunks, vec![b"\x83\x00\x08U2F_V2\x90\x00".to_vec()]);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod apdu;
pub mod core;
pub mod dispatch;
pub mod gatt;
pub mod transport;

// Server API (feature-gated)
#[cfg(feature = "server")]
#[cfg_attr(docsrs, doc(cfg(feature = "server")))]
pub mod server;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::*;

    pub use crate::transport::{Command, Feed, Frame, FrameError, Message, Mtu, Reassembler, encode};

    pub use crate::apdu::{ApduError, ApduRequest, Instruction, LengthForm, StatusWord};

    pub use crate::dispatch::*;

    pub use crate::gatt::{Characteristic, GattError, read_characteristic};

    #[cfg(feature = "server")]
    pub use crate::server::*;
}

// Re-export commonly used items at crate root
pub use core::{AuthenticatorConfig, BusyPolicy, ErrorCode, ProtocolError};
pub use dispatch::{ConnectionId, Dispatcher, InstructionRegistry, Link, Session};
pub use transport::{Command, FrameError, Message, Mtu};

#[cfg(feature = "server")]
pub use server::{AuthenticatorServer, ChannelLink, ServerHandle};
