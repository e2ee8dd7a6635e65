//! U2F BLE - APDU layer
//!
//! Decoding of the APDU carried by a `Message` command:
//!
//! - [`ApduRequest`]: class, instruction, parameters, data, expected length
//! - [`Instruction`]: registry key for instruction handlers
//! - [`StatusWord`]: trailer for handler responses

mod instruction;
mod request;
mod status;

pub use instruction::Instruction;
pub use request::{ApduError, ApduRequest, LengthForm};
pub use status::StatusWord;
