//! Error catalog for the U2F BLE protocol.
//!
//! [`ErrorCode`] is the closed set of failures a host can observe: every
//! internal failure is mapped onto exactly one code and sent back as an
//! `Error` message. [`ProtocolError`] is the internal union the dispatcher
//! works with before that mapping.

use thiserror::Error;

use crate::apdu::ApduError;
use crate::transport::{Command, FrameError, Message};

/// Error codes carried in the payload of an `Error` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCode {
    /// The command in the request is unknown or invalid.
    InvalidCommand = 0x01,
    /// A parameter in the request is invalid.
    InvalidParameter = 0x02,
    /// The length of the request is invalid.
    InvalidLength = 0x03,
    /// A continuation frame arrived out of sequence.
    InvalidSequence = 0x04,
    /// The request timed out before it was complete.
    RequestTimeout = 0x05,
    /// A new request started while another was being received.
    ChannelBusy = 0x06,
    /// The message cannot be represented within the sequence space.
    MessageTooLong = 0x07,
    /// The APDU instruction has no handler.
    InstructionNotSupported = 0x6D,
    /// Unspecified error.
    Other = 0x7F,
}

impl ErrorCode {
    /// Parse an error code from its wire byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::InvalidCommand),
            0x02 => Some(Self::InvalidParameter),
            0x03 => Some(Self::InvalidLength),
            0x04 => Some(Self::InvalidSequence),
            0x05 => Some(Self::RequestTimeout),
            0x06 => Some(Self::ChannelBusy),
            0x07 => Some(Self::MessageTooLong),
            0x6D => Some(Self::InstructionNotSupported),
            0x7F => Some(Self::Other),
            _ => None,
        }
    }

    /// Convert the error code to its wire byte.
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Build the outbound `Error` message for this code.
    pub fn to_message(self) -> Message {
        Message::from_parts(Command::Error, vec![self.as_byte()])
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::InvalidCommand => "invalid command",
            Self::InvalidParameter => "invalid parameter",
            Self::InvalidLength => "invalid length",
            Self::InvalidSequence => "invalid sequence",
            Self::RequestTimeout => "request timeout",
            Self::ChannelBusy => "channel busy",
            Self::MessageTooLong => "message too long",
            Self::InstructionNotSupported => "instruction not supported",
            Self::Other => "other",
        };
        write!(f, "{} (0x{:02x})", name, self.as_byte())
    }
}

/// Anything that can go wrong between an inbound chunk and its response.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Framing or reassembly failed.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The message payload is not a well-formed APDU.
    #[error("apdu error: {0}")]
    Apdu(#[from] ApduError),

    /// The message command is not one the authenticator accepts.
    #[error("invalid command: 0x{0:02x}")]
    InvalidCommand(u8),

    /// No handler is registered for the instruction.
    #[error("instruction not supported: 0x{0:02x}")]
    InstructionNotSupported(u8),

    /// The instruction handler reported a failure.
    #[error("handler failed: {0}")]
    Handler(ErrorCode),
}

impl ProtocolError {
    /// The code reported to the host for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Frame(e) => e.error_code(),
            Self::Apdu(_) => ErrorCode::InvalidLength,
            Self::InvalidCommand(_) => ErrorCode::InvalidCommand,
            Self::InstructionNotSupported(_) => ErrorCode::InstructionNotSupported,
            Self::Handler(code) => *code,
        }
    }
}
