//! U2F BLE - GATT service surface
//!
//! Identifies the characteristics of the FIDO U2F GATT service and answers
//! reads of the two capability characteristics:
//!
//! | Characteristic | Access | Value |
//! |---|---|---|
//! | Control point | write | inbound chunks |
//! | Status | notify | outbound chunks |
//! | Control point length | read | MTU, BE16 |
//! | Service revision bitfield | read/write | `0x40` (U2F 1.2) |

use thiserror::Error;

use crate::core::SERVICE_REVISION_1_2;
use crate::transport::Mtu;

/// FIDO U2F service UUID (16-bit 0xFFFD).
pub const SERVICE_UUID: &str = "0000fffd-0000-1000-8000-00805f9b34fb";

/// Characteristics of the U2F service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Characteristic {
    /// Host writes request chunks here.
    ControlPoint,
    /// Authenticator notifies response chunks here.
    Status,
    /// Maximum control point write size.
    ControlPointLength,
    /// Supported protocol revisions.
    ServiceRevisionBitfield,
}

impl Characteristic {
    /// All characteristics of the service.
    pub const ALL: [Self; 4] = [
        Self::ControlPoint,
        Self::Status,
        Self::ControlPointLength,
        Self::ServiceRevisionBitfield,
    ];

    /// Characteristic UUID.
    pub fn uuid(self) -> &'static str {
        match self {
            Self::ControlPoint => "f1d0fff1-deaa-ecee-b42f-c9ba7ed623bb",
            Self::Status => "f1d0fff2-deaa-ecee-b42f-c9ba7ed623bb",
            Self::ControlPointLength => "f1d0fff3-deaa-ecee-b42f-c9ba7ed623bb",
            Self::ServiceRevisionBitfield => "f1d0fff4-deaa-ecee-b42f-c9ba7ed623bb",
        }
    }

    /// Look up a characteristic by UUID (case-insensitive).
    pub fn from_uuid(uuid: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.uuid().eq_ignore_ascii_case(uuid))
    }

    /// Whether the host may read the characteristic.
    pub fn is_readable(self) -> bool {
        matches!(self, Self::ControlPointLength | Self::ServiceRevisionBitfield)
    }
}

/// Errors answering a characteristic access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GattError {
    /// Only whole-value access at offset 0 is supported.
    #[error("invalid offset: {0}")]
    InvalidOffset(usize),

    /// The characteristic does not support reads.
    #[error("read not permitted: {0:?}")]
    ReadNotPermitted(Characteristic),
}

/// Answer a read of a service characteristic.
pub fn read_characteristic(
    characteristic: Characteristic,
    offset: usize,
    mtu: Mtu,
) -> Result<Vec<u8>, GattError> {
    if !characteristic.is_readable() {
        return Err(GattError::ReadNotPermitted(characteristic));
    }
    if offset != 0 {
        return Err(GattError::InvalidOffset(offset));
    }
    let value = match characteristic {
        Characteristic::ControlPointLength => (mtu.get() as u16).to_be_bytes().to_vec(),
        _ => vec![SERVICE_REVISION_1_2],
    };
    Ok(value)
}
