//! U2F instruction identifiers.

/// Instruction codes from the U2F raw message format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    /// U2F_REGISTER.
    Register,
    /// U2F_AUTHENTICATE.
    Authenticate,
    /// U2F_VERSION.
    Version,
    /// Vendor-specific range (0x40..=0xBF).
    Vendor(u8),
    /// Any other instruction byte.
    Other(u8),
}

impl Instruction {
    /// Register instruction byte.
    pub const REGISTER: u8 = 0x01;
    /// Authenticate instruction byte.
    pub const AUTHENTICATE: u8 = 0x02;
    /// Version instruction byte.
    pub const VERSION: u8 = 0x03;
    /// First vendor-specific instruction byte.
    pub const VENDOR_FIRST: u8 = 0x40;
    /// Last vendor-specific instruction byte.
    pub const VENDOR_LAST: u8 = 0xBF;

    /// Parse an instruction byte. Known codes never map to `Vendor` or `Other`.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            Self::REGISTER => Self::Register,
            Self::AUTHENTICATE => Self::Authenticate,
            Self::VERSION => Self::Version,
            Self::VENDOR_FIRST..=Self::VENDOR_LAST => Self::Vendor(byte),
            _ => Self::Other(byte),
        }
    }

    /// The instruction byte.
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Register => Self::REGISTER,
            Self::Authenticate => Self::AUTHENTICATE,
            Self::Version => Self::VERSION,
            Self::Vendor(b) | Self::Other(b) => b,
        }
    }
}

impl From<u8> for Instruction {
    fn from(byte: u8) -> Self {
        Self::from_byte(byte)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_roundtrip() {
        for byte in 0..=u8::MAX {
            assert_eq!(Instruction::from_byte(byte).as_byte(), byte);
        }
    }

    #[test]
    fn test_instruction_ranges() {
        assert_eq!(Instruction::from_byte(0x01), Instruction::Register);
        assert_eq!(Instruction::from_byte(0x02), Instruction::Authenticate);
        assert_eq!(Instruction::from_byte(0x03), Instruction::Version);
        assert_eq!(Instruction::from_byte(0x40), Instruction::Vendor(0x40));
        assert_eq!(Instruction::from_byte(0xBF), Instruction::Vendor(0xBF));
        assert_eq!(Instruction::from_byte(0xC0), Instruction::Other(0xC0));
        assert_eq!(Instruction::from_byte(0x04), Instruction::Other(0x04));
    }
}
