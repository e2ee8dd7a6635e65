//! Framing and reassembly error types.
//!
//! Every error here is recoverable: the reassembler resets to idle and the
//! dispatcher reports the matching [`ErrorCode`] to the host.

use thiserror::Error;

use crate::core::ErrorCode;

/// Errors produced while parsing, reassembling, or fragmenting frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The link delivered a zero-length chunk.
    #[error("empty chunk")]
    EmptyChunk,

    /// Initial frame shorter than its header.
    #[error("truncated header: expected at least {expected} bytes, got {actual}")]
    TruncatedHeader {
        /// Minimum header size.
        expected: usize,
        /// Actual chunk size.
        actual: usize,
    },

    /// Chunk is larger than the negotiated MTU.
    #[error("frame of {size} bytes exceeds MTU of {mtu}")]
    FrameSizeViolation {
        /// Chunk size.
        size: usize,
        /// Negotiated MTU.
        mtu: usize,
    },

    /// Message cannot be represented within the sequence space.
    #[error("message of {length} bytes exceeds maximum of {max}")]
    MessageTooLong {
        /// Declared or actual payload length.
        length: usize,
        /// Maximum for the MTU in effect.
        max: usize,
    },

    /// Continuation frame with no message in progress.
    #[error("unexpected continuation frame (sequence {sequence})")]
    UnexpectedContinuation {
        /// Sequence number of the stray frame.
        sequence: u8,
    },

    /// Continuation frame out of order.
    #[error("sequence error: expected {expected}, got {actual}")]
    SequenceError {
        /// Next expected sequence number.
        expected: u8,
        /// Sequence number received.
        actual: u8,
    },

    /// Last sequence number consumed with the message still incomplete.
    #[error("continuation sequence exhausted")]
    SequenceExhausted,

    /// More payload bytes than the declared length.
    #[error("overflow: declared {expected} bytes, received {actual}")]
    Overflow {
        /// Declared payload length.
        expected: usize,
        /// Bytes received so far.
        actual: usize,
    },

    /// New initial frame while a message was in progress.
    #[error("channel busy")]
    ChannelBusy,

    /// Incomplete message was idle for too long.
    #[error("reassembly timed out")]
    Timeout,
}

impl FrameError {
    /// The code reported to the host for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::EmptyChunk
            | Self::TruncatedHeader { .. }
            | Self::FrameSizeViolation { .. }
            | Self::Overflow { .. } => ErrorCode::InvalidLength,
            Self::MessageTooLong { .. } => ErrorCode::MessageTooLong,
            Self::UnexpectedContinuation { .. }
            | Self::SequenceError { .. }
            | Self::SequenceExhausted => ErrorCode::InvalidSequence,
            Self::ChannelBusy => ErrorCode::ChannelBusy,
            Self::Timeout => ErrorCode::RequestTimeout,
        }
    }
}
