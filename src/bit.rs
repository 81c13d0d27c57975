use crate::error::{PhyError, Result};
use core::fmt;
use serde::{Deserialize, Serialize};

/// A single binary value on the medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Bit {
    #[default]
    Zero,
    One,
}

impl Bit {
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Bit::Zero => Bit::One,
            Bit::One => Bit::Zero,
        }
    }

    /// # Errors
    ///
    /// `InvalidBit` for any character other than `0` or `1`.
    pub fn from_char(c: char) -> Result<Self> {
        match c {
            '0' => Ok(Bit::Zero),
            '1' => Ok(Bit::One),
            other => Err(PhyError::InvalidBit(other)),
        }
    }
}

impl From<bool> for Bit {
    fn from(value: bool) -> Self {
        if value {
            Bit::One
        } else {
            Bit::Zero
        }
    }
}

impl From<Bit> for bool {
    fn from(bit: Bit) -> Self {
        bit == Bit::One
    }
}

impl fmt::Display for Bit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bit::Zero => write!(f, "0"),
            Bit::One => write!(f, "1"),
        }
    }
}

/// Parse a bit string such as `"0110"`. Whitespace and `_` separators are skipped.
///
/// # Errors
///
/// `InvalidBit` on the first character that is not a bit.
pub fn parse_bits(s: &str) -> Result<Vec<Bit>> {
    s.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .map(Bit::from_char)
        .collect()
}

#[must_use]
pub fn format_bits(bits: &[Bit]) -> String {
    bits.iter().map(ToString::to_string).collect()
}
