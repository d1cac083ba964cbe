//! Transaction Information Flags.
//!
//! Every server reply carries a `tif=` value: a bit-packed integer rendered
//! as lowercase hex without prefix, telling the client what the server
//! concluded about the transaction.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use crate::error::WireError;

/// Bit-packed transaction flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tif(u16);

impl Tif {
    /// No flags set.
    pub const EMPTY: Tif = Tif(0);
    /// The presented identity key matches a known identity.
    pub const CURRENT_ID_MATCH: Tif = Tif(0x001);
    /// The presented previous identity key matches a known identity.
    pub const PREVIOUS_ID_MATCH: Tif = Tif(0x002);
    /// Request IP matches the IP the nut was issued to. Only meaningful
    /// with an encrypted-nut registry; this server leaves it clear.
    pub const IP_ADDRESSES_MATCH: Tif = Tif(0x004);
    /// The matched identity has SQRL authentication disabled.
    pub const ID_DISABLED: Tif = Tif(0x008);
    /// The client asked for something this server does not do.
    pub const FUNCTION_NOT_SUPPORTED: Tif = Tif(0x010);
    /// Transient server-side failure; the client may retry with the
    /// fresh nut in the same reply.
    pub const TRANSIENT_ERROR: Tif = Tif(0x020);
    /// The command was not executed.
    pub const COMMAND_FAILED: Tif = Tif(0x040);
    /// The failure was the client's fault (bad envelope, bad signature).
    pub const CLIENT_FAILURE: Tif = Tif(0x080);
    /// The identity presented belongs to a different association.
    pub const BAD_ID_ASSOCIATION: Tif = Tif(0x100);

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn from_bits(bits: u16) -> Tif {
        Tif(bits)
    }

    pub const fn contains(self, other: Tif) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Lowercase hex rendering, as emitted in `tif=`.
    pub fn hex(self) -> String {
        format!("{:x}", self.0)
    }

    /// Parse the wire rendering back into a flag set.
    pub fn from_hex(hex: &str) -> Result<Tif, WireError> {
        u16::from_str_radix(hex, 16)
            .map(Tif)
            .map_err(|_| WireError::Tif(hex.to_string()))
    }
}

impl BitOr for Tif {
    type Output = Tif;

    fn bitor(self, rhs: Tif) -> Tif {
        Tif(self.0 | rhs.0)
    }
}

impl BitOrAssign for Tif {
    fn bitor_assign(&mut self, rhs: Tif) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Tif {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}
