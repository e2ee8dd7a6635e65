//! Frame and message types for the U2F BLE transport.
//!
//! Implements the framing of U2F BT 6.2:
//! - Initial frame (command, total length, first payload slice)
//! - Continuation frame (sequence number, following payload slice)

use crate::core::{
    ATT_HEADER_SIZE, CMD_CANCEL, CMD_ERROR, CMD_KEEPALIVE, CMD_MSG, CMD_PING, COMMAND_MASK,
    CONT_HEADER_SIZE, INIT_FRAME_FLAG, INIT_HEADER_SIZE, MAX_MTU, MAX_PAYLOAD_LEN, MIN_MTU,
    SEQUENCE_SPACE,
};

use super::error::FrameError;

/// Command identifiers carried in the initial frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Echo request/response.
    Ping,
    /// Keep-alive status notification.
    KeepAlive,
    /// U2F raw message (APDU request or response).
    Message,
    /// Cancel an outstanding request.
    Cancel,
    /// Error response.
    Error,
    /// Any other 7-bit command value (vendor or reserved).
    Other(u8),
}

impl Command {
    /// Parse a command from its 7-bit identifier. The initial-frame bit is
    /// ignored.
    pub fn from_bits(bits: u8) -> Self {
        match bits & COMMAND_MASK {
            CMD_PING => Self::Ping,
            CMD_KEEPALIVE => Self::KeepAlive,
            CMD_MSG => Self::Message,
            CMD_CANCEL => Self::Cancel,
            CMD_ERROR => Self::Error,
            other => Self::Other(other),
        }
    }

    /// The 7-bit command identifier.
    pub fn bits(self) -> u8 {
        match self {
            Self::Ping => CMD_PING,
            Self::KeepAlive => CMD_KEEPALIVE,
            Self::Message => CMD_MSG,
            Self::Cancel => CMD_CANCEL,
            Self::Error => CMD_ERROR,
            Self::Other(bits) => bits & COMMAND_MASK,
        }
    }

    /// First byte of an initial frame carrying this command.
    pub fn as_byte(self) -> u8 {
        INIT_FRAME_FLAG | self.bits()
    }
}

/// Negotiated maximum chunk size for one connection, clamped to
/// `MIN_MTU..=MAX_MTU`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Mtu(u16);

impl Mtu {
    /// Smallest valid MTU.
    pub const MIN: Self = Self(MIN_MTU as u16);
    /// Largest valid MTU.
    pub const MAX: Self = Self(MAX_MTU as u16);

    /// Create an MTU, clamping out-of-range values.
    pub fn new(mtu: usize) -> Self {
        Self(mtu.clamp(MIN_MTU, MAX_MTU) as u16)
    }

    /// Derive the chunk MTU from a negotiated ATT MTU.
    ///
    /// The ATT header is not available for payload, so it is subtracted
    /// before clamping.
    pub fn from_att_mtu(att_mtu: usize) -> Self {
        Self::new(att_mtu.saturating_sub(ATT_HEADER_SIZE))
    }

    /// The MTU in bytes.
    pub fn get(self) -> usize {
        usize::from(self.0)
    }

    /// Largest payload a message may carry at this MTU.
    ///
    /// One initial frame plus one continuation frame per sequence number,
    /// capped by the 16-bit length field.
    pub fn max_message_len(self) -> usize {
        let mtu = self.get();
        let frames = (mtu - INIT_HEADER_SIZE) + SEQUENCE_SPACE * (mtu - CONT_HEADER_SIZE);
        frames.min(MAX_PAYLOAD_LEN)
    }
}

impl Default for Mtu {
    fn default() -> Self {
        Self::MIN
    }
}

impl std::fmt::Display for Mtu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One wire-level frame, borrowing its chunk.
///
/// Wire format:
/// ```text
/// Initial:      +-----------------+------------------+-----------------+
///               | 0x80 | command  | Length (BE16)    | Data            |
///               | 1 byte          | 2 bytes          | up to MTU - 3   |
///               +-----------------+------------------+-----------------+
/// Continuation: +-----------------+------------------------------------+
///               | Sequence (0-7F) | Data                               |
///               | 1 byte          | up to MTU - 1                      |
///               +-----------------+------------------------------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    /// First frame of a message.
    Initial {
        /// Command identifier.
        command: Command,
        /// Total payload length of the message.
        length: u16,
        /// Leading payload slice.
        data: &'a [u8],
    },
    /// Following frame of a message.
    Continuation {
        /// Sequence number (0..=127).
        sequence: u8,
        /// Payload slice.
        data: &'a [u8],
    },
}

impl<'a> Frame<'a> {
    /// Parse a chunk into a frame.
    pub fn parse(chunk: &'a [u8]) -> Result<Self, FrameError> {
        let first = *chunk.first().ok_or(FrameError::EmptyChunk)?;

        if first & INIT_FRAME_FLAG != 0 {
            if chunk.len() < INIT_HEADER_SIZE {
                return Err(FrameError::TruncatedHeader {
                    expected: INIT_HEADER_SIZE,
                    actual: chunk.len(),
                });
            }
            Ok(Self::Initial {
                command: Command::from_bits(first),
                length: u16::from_be_bytes([chunk[1], chunk[2]]),
                data: &chunk[INIT_HEADER_SIZE..],
            })
        } else {
            Ok(Self::Continuation {
                sequence: first,
                data: &chunk[CONT_HEADER_SIZE..],
            })
        }
    }

    /// Header size of this frame.
    pub fn header_len(&self) -> usize {
        match self {
            Self::Initial { .. } => INIT_HEADER_SIZE,
            Self::Continuation { .. } => CONT_HEADER_SIZE,
        }
    }

    /// Payload slice of this frame.
    pub fn data(&self) -> &'a [u8] {
        match self {
            Self::Initial { data, .. } | Self::Continuation { data, .. } => data,
        }
    }

    /// Serialize the frame into a new chunk.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.header_len() + self.data().len());
        match self {
            Self::Initial {
                command, length, ..
            } => {
                buf.push(command.as_byte());
                buf.extend_from_slice(&length.to_be_bytes());
            }
            Self::Continuation { sequence, .. } => buf.push(sequence & COMMAND_MASK),
        }
        buf.extend_from_slice(self.data());
        buf
    }
}

/// One complete logical message: a command and its whole payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    command: Command,
    payload: Vec<u8>,
}

impl Message {
    /// Create a message, rejecting payloads the length field cannot declare.
    pub fn new(command: Command, payload: Vec<u8>) -> Result<Self, FrameError> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(FrameError::MessageTooLong {
                length: payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }
        Ok(Self::from_parts(command, payload))
    }

    /// Build a message whose payload length is already known to fit.
    pub(crate) fn from_parts(command: Command, payload: Vec<u8>) -> Self {
        debug_assert!(payload.len() <= MAX_PAYLOAD_LEN);
        Self { command, payload }
    }

    /// The message command.
    pub fn command(&self) -> Command {
        self.command
    }

    /// The message payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload length as carried in the initial frame.
    pub fn len(&self) -> u16 {
        self.payload.len() as u16
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Consume the message, returning its payload.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}
