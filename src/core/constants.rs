//! Protocol constants from the FIDO U2F Bluetooth specification.
//!
//! These values are fixed by the protocol and MUST NOT be changed.

use std::time::Duration;

// =============================================================================
// FRAMING (U2F BT 6.2)
// =============================================================================

/// High bit of the first byte marks an initial frame.
pub const INIT_FRAME_FLAG: u8 = 0x80;

/// Mask for the 7-bit command identifier of an initial frame.
pub const COMMAND_MASK: u8 = 0x7F;

/// Initial frame header size (command + 16-bit BE length).
pub const INIT_HEADER_SIZE: usize = 3;

/// Continuation frame header size (sequence number).
pub const CONT_HEADER_SIZE: usize = 1;

/// Highest continuation sequence number.
pub const MAX_SEQUENCE: u8 = 0x7F;

/// Number of continuation frames one message may use.
pub const SEQUENCE_SPACE: usize = MAX_SEQUENCE as usize + 1;

/// Largest payload the 16-bit length field can declare.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

// =============================================================================
// COMMAND IDENTIFIERS (U2F BT 6.2, without the initial-frame bit)
// =============================================================================

/// Ping: echoed back verbatim.
pub const CMD_PING: u8 = 0x01;

/// Keep-alive notification (authenticator to host).
pub const CMD_KEEPALIVE: u8 = 0x02;

/// U2F raw message carrying an APDU.
pub const CMD_MSG: u8 = 0x03;

/// Cancel an outstanding request.
pub const CMD_CANCEL: u8 = 0x3E;

/// Error response carrying one error code byte.
pub const CMD_ERROR: u8 = 0x3F;

// =============================================================================
// MTU (U2F BT 6.1)
// =============================================================================

/// Smallest chunk size the link may negotiate.
pub const MIN_MTU: usize = 20;

/// Largest chunk size the link may negotiate.
pub const MAX_MTU: usize = 512;

/// MTU assumed until the link reports a negotiated value.
pub const DEFAULT_MTU: usize = MIN_MTU;

/// ATT protocol header subtracted from a negotiated ATT MTU.
pub const ATT_HEADER_SIZE: usize = 3;

// =============================================================================
// CAPABILITIES
// =============================================================================

/// Service revision bitfield: bit 6 set, U2F 1.2.
pub const SERVICE_REVISION_1_2: u8 = 0x40;

/// Version string answered to the VERSION instruction.
pub const U2F_VERSION: &[u8] = b"U2F_V2";

// =============================================================================
// TIMING
// =============================================================================

/// Discard an incomplete message after this long without a chunk.
pub const REASSEMBLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default capacity of the service event queue.
pub const EVENT_BUFFER: usize = 64;
