//! ipam-core - IPv4 address space allocation
//!
//! This crate provides:
//! - `Address`/`Range`/`Cidr` primitives for working with IPv4 address space
//! - `Space`, a single-process allocator tracking owned/free/allocated
//!   addresses within a set of owned ranges
//! - a CIDR-aware heuristic for donating contiguous sub-ranges to peers
//!
//! `Space` is synchronous and holds no internal locking: it is `Send` so it
//! may be moved between threads, but a caller sharing one `Space` across
//! threads must serialize access itself.

mod address;
mod cidr;
mod donate;
mod error;
mod intervals;
mod range;
mod space;

pub use address::{Address, AddressParseError};
pub use cidr::{Cidr, CidrParseError};
pub use error::{IpamError, Result};
pub use range::Range;
pub use space::Space;
