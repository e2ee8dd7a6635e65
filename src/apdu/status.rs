//! ISO 7816 status words appended to APDU responses.

/// Status words used by U2F instruction handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum StatusWord {
    /// Command completed successfully.
    NoError = 0x9000,
    /// The request had the wrong length.
    WrongLength = 0x6700,
    /// User presence is required.
    ConditionsNotSatisfied = 0x6985,
    /// The request data was rejected, e.g. an unknown key handle.
    WrongData = 0x6A80,
    /// The instruction is not supported.
    InsNotSupported = 0x6D00,
    /// The class byte is not supported.
    ClaNotSupported = 0x6E00,
}

impl StatusWord {
    /// Big-endian wire bytes.
    pub fn to_bytes(self) -> [u8; 2] {
        (self as u16).to_be_bytes()
    }

    /// Append the status word to response data.
    pub fn append_to(self, mut data: Vec<u8>) -> Vec<u8> {
        data.extend_from_slice(&self.to_bytes());
        data
    }
}
