//! Fragmentation of outbound messages into size-limited chunks.

use crate::core::{CONT_HEADER_SIZE, INIT_HEADER_SIZE, MAX_SEQUENCE};

use super::error::FrameError;
use super::frame::{Frame, Message, Mtu};

/// Split a message into chunks of at most `mtu` bytes.
///
/// The first chunk is an initial frame, the rest are continuation frames
/// numbered from 0. Fails with [`FrameError::MessageTooLong`] if the payload
/// needs more continuation frames than the sequence space holds.
pub fn encode(message: &Message, mtu: Mtu) -> Result<Vec<Vec<u8>>, FrameError> {
    let max = mtu.max_message_len();
    let payload = message.payload();
    if payload.len() > max {
        return Err(FrameError::MessageTooLong {
            length: payload.len(),
            max,
        });
    }

    let (head, mut rest) = payload.split_at(payload.len().min(mtu.get() - INIT_HEADER_SIZE));
    let cont_size = mtu.get() - CONT_HEADER_SIZE;

    let mut chunks = Vec::with_capacity(1 + rest.len().div_ceil(cont_size));
    chunks.push(
        Frame::Initial {
            command: message.command(),
            length: message.len(),
            data: head,
        }
        .to_vec(),
    );

    let mut sequence: u8 = 0;
    while !rest.is_empty() {
        // Guaranteed by the length check above.
        debug_assert!(sequence <= MAX_SEQUENCE);
        let (data, tail) = rest.split_at(rest.len().min(cont_size));
        chunks.push(Frame::Continuation { sequence, data }.to_vec());
        rest = tail;
        sequence = sequence.wrapping_add(1);
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Command, Feed, Reassembler};
    use std::time::Instant;

    fn message(len: usize) -> Message {
        let payload = (0..len).map(|i| i as u8).collect();
        Message::new(Command::Message, payload).unwrap()
    }

    #[test]
    fn test_single_frame_at_mtu_20() {
        let chunks = encode(&message(17), Mtu::new(20)).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 20);
        assert_eq!(&chunks[0][..3], &[0x83, 0x00, 0x11]);
    }

    #[test]
    fn test_fifty_bytes_at_mtu_20() {
        let chunks = encode(&message(50), Mtu::new(20)).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 20);
        assert_eq!(chunks[1][0], 0x00);
        assert_eq!(chunks[1].len(), 20);
        assert_eq!(chunks[2][0], 0x01);
        // 50 - 17 - 19 = 14 payload bytes
        assert_eq!(chunks[2].len(), 15);
        assert!(chunks.iter().all(|c| c.len() <= 20));
    }

    #[test]
    fn test_empty_payload() {
        let msg = Message::new(Command::Ping, vec![]).unwrap();
        let chunks = encode(&msg, Mtu::new(20)).unwrap();
        assert_eq!(chunks, vec![vec![0x81, 0x00, 0x00]]);
    }

    #[test]
    fn test_error_message() {
        let msg = crate::core::ErrorCode::InvalidLength.to_message();
        let chunks = encode(&msg, Mtu::MIN).unwrap();
        assert_eq!(chunks, vec![hex::decode("bf000103").unwrap()]);
    }

    #[test]
    fn test_max_message_fills_sequence_space() {
        let mtu = Mtu::new(20);
        let chunks = encode(&message(mtu.max_message_len()), mtu).unwrap();
        assert_eq!(chunks.len(), 129);
        assert_eq!(chunks.last().unwrap()[0], 0x7F);
    }

    #[test]
    fn test_too_long() {
        let mtu = Mtu::new(20);
        assert_eq!(
            encode(&message(mtu.max_message_len() + 1), mtu),
            Err(FrameError::MessageTooLong {
                length: 2450,
                max: 2449
            })
        );
    }

    #[test]
    fn test_deterministic() {
        let msg = message(300);
        let mtu = Mtu::new(64);
        assert_eq!(encode(&msg, mtu).unwrap(), encode(&msg, mtu).unwrap());
    }

    #[test]
    fn test_reassemble_encoded() {
        let msg = message(50);
        let mtu = Mtu::new(20);
        let mut r = Reassembler::default();
        let now = Instant::now();
        let mut out = None;
        for chunk in encode(&msg, mtu).unwrap() {
            if let Feed::Complete(m) = r.feed(&chunk, mtu, now).unwrap() {
                out = Some(m);
            }
        }
        assert_eq!(out, Some(msg));
    }
}
