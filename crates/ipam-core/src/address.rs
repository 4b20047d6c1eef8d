use std::fmt;
use std::ops::Add;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single IPv4 host address, stored as an unsigned 32-bit integer in host
/// byte order (`a.b.c.d` parses to `a*2^24 + b*2^16 + c*2^8 + d`).
///
/// IPv6 is out of scope: this is always a 32-bit identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub u32);

impl Address {
    pub fn new(value: u32) -> Self {
        Address(value)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

/// Add a signed offset to an address. Offsets used internally by the
/// donation arithmetic are always small and non-negative, but the type
/// supports negative offsets for symmetry with callers that step backwards.
impl Add<i64> for Address {
    type Output = Address;

    fn add(self, rhs: i64) -> Address {
        Address(((self.0 as i64) + rhs) as u32)
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let octets: Vec<&str> = s.split('.').collect();
        if octets.len() != 4 {
            return Err(AddressParseError::Malformed(s.to_string()));
        }
        let mut value: u32 = 0;
        for octet in octets {
            let byte: u8 = octet
                .parse()
                .map_err(|_| AddressParseError::Malformed(s.to_string()))?;
            value = (value << 8) | byte as u32;
        }
        Ok(Address(value))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.0.to_be_bytes();
        write!(f, "{}.{}.{}.{}", o[0], o[1], o[2], o[3])
    }
}

/// Error parsing a dotted-quad IPv4 address string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressParseError {
    #[error("invalid IPv4 address: '{0}'")]
    Malformed(String),
}
