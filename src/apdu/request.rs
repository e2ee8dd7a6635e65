//! APDU request decoding (ISO 7816-4 short and extended length).

use thiserror::Error;

use super::instruction::Instruction;

/// CLA, INS, P1, P2.
const HEADER_SIZE: usize = 4;

/// Errors decoding an APDU request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApduError {
    /// Fewer bytes than the four-byte header.
    #[error("apdu too short: {actual} bytes")]
    TooShort {
        /// Payload size.
        actual: usize,
    },

    /// Length field does not match the bytes that follow it.
    #[error("wrong length: Lc {declared}, {available} bytes after length field")]
    WrongLength {
        /// Data length declared by Lc.
        declared: usize,
        /// Bytes present after the length field.
        available: usize,
    },
}

/// Encoding of the length fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthForm {
    /// One-byte Lc/Le.
    Short,
    /// Zero marker followed by two-byte Lc.
    Extended,
}

/// A decoded APDU request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduRequest {
    /// Class byte.
    pub cla: u8,
    /// Instruction byte, uninterpreted.
    pub ins: u8,
    /// First parameter.
    pub p1: u8,
    /// Second parameter.
    pub p2: u8,
    /// Request data (Lc bytes).
    pub data: Vec<u8>,
    /// Expected response length, if the request carried Le.
    pub le: Option<usize>,
    /// Length encoding used by the request.
    pub form: LengthForm,
}

impl ApduRequest {
    /// Decode a message-class payload.
    ///
    /// ```text
    /// CLA | INS | P1 | P2 | [Lc | DATA] | [Le]
    /// ```
    ///
    /// Short form uses one-byte Lc and Le; extended form starts the body with
    /// `0x00` followed by a two-byte Lc, and its Le is two bytes. A body of a
    /// single byte is Le alone.
    pub fn decode(payload: &[u8]) -> Result<Self, ApduError> {
        if payload.len() < HEADER_SIZE {
            return Err(ApduError::TooShort {
                actual: payload.len(),
            });
        }

        let (header, body) = payload.split_at(HEADER_SIZE);
        let (data, le, form) = match body {
            [] => (&[][..], None, LengthForm::Short),
            [le] => (&[][..], Some(short_le(*le)), LengthForm::Short),
            [0x00, hi, lo, rest @ ..] => {
                let lc = usize::from(u16::from_be_bytes([*hi, *lo]));
                let (data, trailer) = split_data(lc, rest)?;
                let le = match trailer {
                    [] => None,
                    [hi, lo] => Some(extended_le(*hi, *lo)),
                    _ => return Err(wrong_length(lc, rest)),
                };
                (data, le, LengthForm::Extended)
            }
            [0x00, _] => return Err(wrong_length(0, &body[1..])),
            [lc, rest @ ..] => {
                let lc = usize::from(*lc);
                let (data, trailer) = split_data(lc, rest)?;
                let le = match trailer {
                    [] => None,
                    [le] => Some(short_le(*le)),
                    _ => return Err(wrong_length(lc, rest)),
                };
                (data, le, LengthForm::Short)
            }
        };

        Ok(Self {
            cla: header[0],
            ins: header[1],
            p1: header[2],
            p2: header[3],
            data: data.to_vec(),
            le,
            form,
        })
    }

    /// The instruction as a registry key.
    pub fn instruction(&self) -> Instruction {
        Instruction::from_byte(self.ins)
    }

    /// Data length (Lc).
    pub fn lc(&self) -> usize {
        self.data.len()
    }
}

fn split_data(lc: usize, rest: &[u8]) -> Result<(&[u8], &[u8]), ApduError> {
    if rest.len() < lc {
        return Err(wrong_length(lc, rest));
    }
    Ok(rest.split_at(lc))
}

fn wrong_length(declared: usize, rest: &[u8]) -> ApduError {
    ApduError::WrongLength {
        declared,
        available: rest.len(),
    }
}

fn short_le(byte: u8) -> usize {
    if byte == 0 { 256 } else { usize::from(byte) }
}

fn extended_le(hi: u8, lo: u8) -> usize {
    match u16::from_be_bytes([hi, lo]) {
        0 => 65536,
        n => usize::from(n),
    }
}
