use miette::Diagnostic;
use thiserror::Error;

use crate::address::Address;
use crate::range::Range;

/// Error type for [`crate::Space`] operations.
///
/// `Allocate` and `Donate` do not appear here: the "no candidate" case is a
/// normal, retryable outcome signalled structurally via `Option`, not an
/// error. A violated internal invariant is not representable as a `Result`
/// either — see [`crate::Space::assert_invariants`], which panics instead,
/// since it indicates a bug in this crate rather than a caller mistake.
#[derive(Error, Debug, Diagnostic, PartialEq, Eq)]
pub enum IpamError {
    /// Operand falls outside the addresses this Space owns.
    #[error("address {address} is not owned by this space (owned ranges: {owned_summary})")]
    #[diagnostic(
        code(ipam::not_owned),
        help("call `add()` to extend ownership over this address first")
    )]
    NotOwned {
        address: Address,
        owned_summary: String,
    },

    /// `Free` called on an address that is already free, or outside `ours`.
    #[error("address {address} is not currently allocated (owned ranges: {owned_summary})")]
    #[diagnostic(
        code(ipam::not_allocated),
        help("the address may already be free; check with `is_free()` before freeing again")
    )]
    NotAllocated {
        address: Address,
        owned_summary: String,
    },

    /// `Claim` called on an address that is not in the free set.
    #[error("address {address} is already allocated")]
    #[diagnostic(
        code(ipam::already_allocated),
        help("call `free()` first if you intend to reclaim this address")
    )]
    AlreadyAllocated { address: Address },
}

pub type Result<T> = std::result::Result<T, IpamError>;

impl IpamError {
    pub fn not_owned(address: Address, owned: &[Range]) -> Self {
        Self::NotOwned {
            address,
            owned_summary: summarize_ranges(owned),
        }
    }

    pub fn not_allocated(address: Address, owned: &[Range]) -> Self {
        Self::NotAllocated {
            address,
            owned_summary: summarize_ranges(owned),
        }
    }

    pub fn already_allocated(address: Address) -> Self {
        Self::AlreadyAllocated { address }
    }
}

fn summarize_ranges(ranges: &[Range]) -> String {
    if ranges.is_empty() {
        return "none".to_string();
    }
    ranges
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
