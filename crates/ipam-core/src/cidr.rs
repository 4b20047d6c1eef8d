use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::Address;
use crate::range::Range;

/// A power-of-two-aligned [`Range`], identified by a prefix length.
///
/// Only constructible via [`Cidr::parse`], which rejects anything that
/// isn't properly aligned (`start mod 2^(32-prefix) == 0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cidr {
    pub range: Range,
    pub prefix_len: u8,
}

impl Cidr {
    /// Parse a string like `"10.0.0.0/25"`.
    pub fn parse(s: &str) -> Result<Self, CidrParseError> {
        let (addr_part, prefix_part) = s
            .split_once('/')
            .ok_or_else(|| CidrParseError::Malformed(s.to_string()))?;

        let network: Address = addr_part
            .parse()
            .map_err(|_| CidrParseError::Malformed(s.to_string()))?;

        let prefix_len: u8 = prefix_part
            .parse()
            .map_err(|_| CidrParseError::Malformed(s.to_string()))?;

        // prefix_len == 0 would need a Range whose size is 2^32, which can't
        // be represented as `[Address, Address)` (the end bound itself would
        // overflow `u32`) — rejected here rather than silently truncated.
        if prefix_len == 0 || prefix_len > 32 {
            return Err(CidrParseError::PrefixOutOfRange(prefix_len));
        }

        let host_bits = 32 - prefix_len;
        let size: u64 = 1u64 << host_bits;

        if network.value() as u64 % size != 0 {
            return Err(CidrParseError::Unaligned(s.to_string()));
        }

        Ok(Cidr {
            range: Range::new(network, size),
            prefix_len,
        })
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.range.start, self.prefix_len)
    }
}

/// Error parsing a `"a.b.c.d/p"` CIDR string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CidrParseError {
    #[error("invalid CIDR syntax: '{0}'")]
    Malformed(String),
    #[error("prefix length {0} is out of range (must be 1-32)")]
    PrefixOutOfRange(u8),
    #[error("CIDR '{0}' is not aligned to its prefix length")]
    Unaligned(String),
}
