//! Reassembly of size-limited chunks into complete messages.
//!
//! A [`Reassembler`] holds at most one partially received message. Every
//! error return leaves it idle, so a malformed chunk can never wedge the
//! connection: the next initial frame always starts cleanly.

use std::time::{Duration, Instant};

use crate::core::{AuthenticatorConfig, BusyPolicy, MAX_SEQUENCE};

use super::error::FrameError;
use super::frame::{Command, Frame, Message, Mtu};

/// Result of feeding one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feed {
    /// The chunk completed a message.
    Complete(Message),
    /// More continuation frames are needed.
    Incomplete,
}

/// A message being received.
#[derive(Debug, Clone)]
pub struct ReassemblyState {
    /// Command from the initial frame.
    command: Command,
    /// Declared total payload length.
    expected_len: usize,
    /// Payload received so far (never longer than `expected_len`).
    buffer: Vec<u8>,
    /// Next continuation sequence number.
    next_sequence: u8,
    /// When the initial frame arrived.
    started_at: Instant,
    /// When the last frame arrived.
    last_activity: Instant,
}

impl ReassemblyState {
    /// Command of the message in progress.
    pub fn command(&self) -> Command {
        self.command
    }

    /// Declared total payload length.
    pub fn expected_len(&self) -> usize {
        self.expected_len
    }

    /// Bytes received so far.
    pub fn received(&self) -> usize {
        self.buffer.len()
    }

    /// Next expected continuation sequence number.
    pub fn next_sequence(&self) -> u8 {
        self.next_sequence
    }

    /// Time since the initial frame.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }
}

/// Stateful decoder turning inbound chunks into messages.
#[derive(Debug, Clone)]
pub struct Reassembler {
    state: Option<ReassemblyState>,
    timeout: Duration,
    busy_policy: BusyPolicy,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(&AuthenticatorConfig::default())
    }
}

impl Reassembler {
    /// Create an idle reassembler.
    pub fn new(config: &AuthenticatorConfig) -> Self {
        Self {
            state: None,
            timeout: config.reassembly_timeout,
            busy_policy: config.busy_policy,
        }
    }

    /// Whether no message is in progress.
    pub fn is_idle(&self) -> bool {
        self.state.is_none()
    }

    /// The message in progress, if any.
    pub fn state(&self) -> Option<&ReassemblyState> {
        self.state.as_ref()
    }

    /// Drop any message in progress.
    pub fn reset(&mut self) {
        self.state = None;
    }

    /// When the message in progress expires, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.state.as_ref().map(|s| s.last_activity + self.timeout)
    }

    /// Discard a message that has been idle longer than the timeout.
    ///
    /// Returns `Some(FrameError::Timeout)` if one was discarded.
    pub fn expire(&mut self, now: Instant) -> Option<FrameError> {
        match self.deadline() {
            Some(deadline) if now >= deadline => {
                if let Some(state) = self.state.take() {
                    tracing::debug!(
                        received = state.received(),
                        expected = state.expected_len,
                        age = ?state.age(now),
                        "reassembly timed out"
                    );
                }
                Some(FrameError::Timeout)
            }
            _ => None,
        }
    }

    /// Feed one chunk.
    ///
    /// On any error the reassembler is idle afterwards.
    pub fn feed(&mut self, chunk: &[u8], mtu: Mtu, now: Instant) -> Result<Feed, FrameError> {
        let expired = self.expire(now).is_some();

        let result = self.feed_inner(chunk, mtu, now, expired);
        if result.is_err() {
            self.state = None;
        }
        result
    }

    fn feed_inner(
        &mut self,
        chunk: &[u8],
        mtu: Mtu,
        now: Instant,
        expired: bool,
    ) -> Result<Feed, FrameError> {
        if chunk.len() > mtu.get() {
            return Err(FrameError::FrameSizeViolation {
                size: chunk.len(),
                mtu: mtu.get(),
            });
        }

        match Frame::parse(chunk)? {
            Frame::Initial {
                command,
                length,
                data,
            } => self.start(command, usize::from(length), data, mtu, now),
            Frame::Continuation { sequence, data } => {
                if expired {
                    return Err(FrameError::Timeout);
                }
                self.extend(sequence, data, now)
            }
        }
    }

    fn start(
        &mut self,
        command: Command,
        expected_len: usize,
        data: &[u8],
        mtu: Mtu,
        now: Instant,
    ) -> Result<Feed, FrameError> {
        if let Some(previous) = self.state.take() {
            match self.busy_policy {
                BusyPolicy::Restart => {
                    tracing::debug!(
                        received = previous.received(),
                        expected = previous.expected_len,
                        age = ?previous.age(now),
                        "initial frame replaces incomplete message"
                    );
                }
                BusyPolicy::Reject => return Err(FrameError::ChannelBusy),
            }
        }

        let max = mtu.max_message_len();
        if expected_len > max {
            return Err(FrameError::MessageTooLong {
                length: expected_len,
                max,
            });
        }
        if data.len() > expected_len {
            return Err(FrameError::Overflow {
                expected: expected_len,
                actual: data.len(),
            });
        }
        if data.len() == expected_len {
            return Ok(Feed::Complete(Message::from_parts(command, data.to_vec())));
        }

        let mut buffer = Vec::with_capacity(expected_len);
        buffer.extend_from_slice(data);
        self.state = Some(ReassemblyState {
            command,
            expected_len,
            buffer,
            next_sequence: 0,
            started_at: now,
            last_activity: now,
        });
        Ok(Feed::Incomplete)
    }

    fn extend(&mut self, sequence: u8, data: &[u8], now: Instant) -> Result<Feed, FrameError> {
        let state = self
            .state
            .as_mut()
            .ok_or(FrameError::UnexpectedContinuation { sequence })?;

        if sequence != state.next_sequence {
            return Err(FrameError::SequenceError {
                expected: state.next_sequence,
                actual: sequence,
            });
        }

        let received = state.buffer.len() + data.len();
        if received > state.expected_len {
            return Err(FrameError::Overflow {
                expected: state.expected_len,
                actual: received,
            });
        }
        state.buffer.extend_from_slice(data);
        state.last_activity = now;

        if received == state.expected_len {
            let command = state.command;
            let payload = std::mem::take(&mut state.buffer);
            self.state = None;
            return Ok(Feed::Complete(Message::from_parts(command, payload)));
        }

        if sequence == MAX_SEQUENCE {
            return Err(FrameError::SequenceExhausted);
        }
        state.next_sequence = sequence + 1;
        Ok(Feed::Incomplete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mtu20() -> Mtu {
        Mtu::new(20)
    }

    fn feed(r: &mut Reassembler, chunk: &[u8]) -> Result<Feed, FrameError> {
        r.feed(chunk, mtu20(), Instant::now())
    }

    #[test]
    fn test_single_frame_message() {
        let mut r = Reassembler::default();
        let out = feed(&mut r, &[0x81, 0x00, 0x02, 0xde, 0xad]).unwrap();
        assert_eq!(
            out,
            Feed::Complete(Message::new(Command::Ping, vec![0xde, 0xad]).unwrap())
        );
        assert!(r.is_idle());
    }

    #[test]
    fn test_zero_length_message() {
        let mut r = Reassembler::default();
        let out = feed(&mut r, &[0x83, 0x00, 0x00]).unwrap();
        assert_eq!(
            out,
            Feed::Complete(Message::new(Command::Message, vec![]).unwrap())
        );
    }

    #[test]
    fn test_multi_frame_message() {
        let mut r = Reassembler::default();
        let mut first = vec![0x83, 0x00, 0x14];
        first.extend_from_slice(&[1u8; 17]);
        assert_eq!(feed(&mut r, &first).unwrap(), Feed::Incomplete);
        assert_eq!(r.state().unwrap().received(), 17);

        let out = feed(&mut r, &[0x00, 2, 2, 2]).unwrap();
        let Feed::Complete(msg) = out else {
            panic!("expected complete message");
        };
        assert_eq!(msg.len(), 20);
        assert_eq!(&msg.payload()[17..], &[2, 2, 2]);
        assert!(r.is_idle());
    }

    #[test]
    fn test_unexpected_continuation() {
        let mut r = Reassembler::default();
        assert_eq!(
            feed(&mut r, &[0x00, 0x01]),
            Err(FrameError::UnexpectedContinuation { sequence: 0 })
        );
        assert!(r.is_idle());
    }

    #[test]
    fn test_sequence_error_resets() {
        let mut r = Reassembler::default();
        let mut first = vec![0x83, 0x00, 0x40];
        first.extend_from_slice(&[0u8; 17]);
        feed(&mut r, &first).unwrap();
        feed(&mut r, &[0x00; 20]).unwrap();

        assert_eq!(
            feed(&mut r, &[0x02; 20]),
            Err(FrameError::SequenceError {
                expected: 1,
                actual: 2
            })
        );
        assert!(r.is_idle());

        // Fresh message after the failure.
        let out = feed(&mut r, &[0x81, 0x00, 0x01, 0x7f]).unwrap();
        assert!(matches!(out, Feed::Complete(_)));
    }

    #[test]
    fn test_overflow_in_continuation() {
        let mut r = Reassembler::default();
        feed(&mut r, &[0x83, 0x00, 0x04, 0xaa, 0xbb]).unwrap();
        assert_eq!(
            feed(&mut r, &[0x00, 0xcc, 0xdd, 0xee]),
            Err(FrameError::Overflow {
                expected: 4,
                actual: 5
            })
        );
        assert!(r.is_idle());
    }

    #[test]
    fn test_overflow_in_initial() {
        let mut r = Reassembler::default();
        assert_eq!(
            feed(&mut r, &[0x81, 0x00, 0x01, 0xaa, 0xbb]),
            Err(FrameError::Overflow {
                expected: 1,
                actual: 2
            })
        );
    }

    #[test]
    fn test_message_too_long() {
        let mut r = Reassembler::default();
        // 2450 > 17 + 128 * 19
        let len = 2450u16.to_be_bytes();
        assert_eq!(
            feed(&mut r, &[0x83, len[0], len[1]]),
            Err(FrameError::MessageTooLong {
                length: 2450,
                max: 2449
            })
        );
        assert!(r.is_idle());
    }

    #[test]
    fn test_frame_size_violation() {
        let mut r = Reassembler::default();
        let chunk = [0x83u8; 21];
        assert_eq!(
            feed(&mut r, &chunk),
            Err(FrameError::FrameSizeViolation { size: 21, mtu: 20 })
        );
    }

    #[test]
    fn test_sequence_exhausted() {
        let mut r = Reassembler::default();
        // Declare the maximum, then trickle one byte per continuation.
        let len = 2449u16.to_be_bytes();
        feed(&mut r, &[0x83, len[0], len[1]]).unwrap();
        for seq in 0..MAX_SEQUENCE {
            assert_eq!(feed(&mut r, &[seq, 0x00]).unwrap(), Feed::Incomplete);
        }
        assert_eq!(
            feed(&mut r, &[MAX_SEQUENCE, 0x00]),
            Err(FrameError::SequenceExhausted)
        );
        assert!(r.is_idle());
    }

    #[test]
    fn test_restart_on_new_initial() {
        let mut r = Reassembler::default();
        feed(&mut r, &[0x83, 0x00, 0x20, 0x01]).unwrap();
        assert!(!r.is_idle());

        let out = feed(&mut r, &[0x81, 0x00, 0x01, 0x02]).unwrap();
        assert_eq!(
            out,
            Feed::Complete(Message::new(Command::Ping, vec![0x02]).unwrap())
        );
    }

    #[test]
    fn test_reject_on_new_initial() {
        let config = AuthenticatorConfig::builder()
            .busy_policy(BusyPolicy::Reject)
            .build();
        let mut r = Reassembler::new(&config);
        feed(&mut r, &[0x83, 0x00, 0x20, 0x01]).unwrap();

        assert_eq!(
            feed(&mut r, &[0x81, 0x00, 0x01, 0x02]),
            Err(FrameError::ChannelBusy)
        );
        assert!(r.is_idle());

        // The retry goes through.
        assert!(matches!(
            feed(&mut r, &[0x81, 0x00, 0x01, 0x02]),
            Ok(Feed::Complete(_))
        ));
    }

    #[test]
    fn test_expire() {
        let config = AuthenticatorConfig::builder()
            .reassembly_timeout(Duration::from_millis(100))
            .build();
        let mut r = Reassembler::new(&config);
        let t0 = Instant::now();
        r.feed(&[0x83, 0x00, 0x20, 0x01], mtu20(), t0).unwrap();

        assert_eq!(r.deadline(), Some(t0 + Duration::from_millis(100)));
        assert_eq!(r.expire(t0 + Duration::from_millis(50)), None);
        assert_eq!(
            r.expire(t0 + Duration::from_millis(100)),
            Some(FrameError::Timeout)
        );
        assert!(r.is_idle());
        assert_eq!(r.expire(t0 + Duration::from_millis(200)), None);
    }

    #[test]
    fn test_late_continuation_times_out() {
        let config = AuthenticatorConfig::builder()
            .reassembly_timeout(Duration::from_millis(100))
            .build();
        let mut r = Reassembler::new(&config);
        let t0 = Instant::now();
        r.feed(&[0x83, 0x00, 0x20, 0x01], mtu20(), t0).unwrap();

        assert_eq!(
            r.feed(&[0x00, 0x02], mtu20(), t0 + Duration::from_secs(1)),
            Err(FrameError::Timeout)
        );
        assert!(r.is_idle());
    }

    #[test]
    fn test_continuation_refreshes_deadline() {
        let config = AuthenticatorConfig::builder()
            .reassembly_timeout(Duration::from_millis(100))
            .build();
        let mut r = Reassembler::new(&config);
        let t0 = Instant::now();
        r.feed(&[0x83, 0x00, 0x20, 0x01], mtu20(), t0).unwrap();

        let t1 = t0 + Duration::from_millis(80);
        r.feed(&[0x00, 0x02], mtu20(), t1).unwrap();
        assert_eq!(r.deadline(), Some(t1 + Duration::from_millis(100)));
        assert_eq!(r.state().unwrap().age(t1), Duration::from_millis(80));
    }
}
