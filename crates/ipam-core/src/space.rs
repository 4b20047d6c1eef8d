use tracing::debug;

use crate::address::Address;
use crate::cidr::Cidr;
use crate::donate;
use crate::error::{IpamError, Result};
use crate::intervals::IntervalSet;
use crate::range::Range;

/// Tracks which addresses within a set of owned ranges are free, claimed,
/// or allocated, and hands out contiguous sub-ranges to peers on request.
///
/// A `Space` owns two interval sets:
///
/// - `ours` — every address this Space is authoritative for.
/// - `free` — the subset of `ours` not currently allocated.
///
/// `Add`/`Donate` are the only operations that change `ours`; every other
/// mutator touches `free` only. Single-threaded and synchronous: nothing
/// here blocks, and a `Space` has no internal locking — callers that share
/// one across threads must serialize access themselves.
#[derive(Debug, Clone, Default)]
pub struct Space {
    ours: IntervalSet,
    free: IntervalSet,
}

impl Space {
    pub fn new() -> Self {
        Space {
            ours: IntervalSet::new(),
            free: IntervalSet::new(),
        }
    }

    /// Grow both `ours` and `free` by `[start, start+size)`.
    ///
    /// Precondition: the new range is disjoint from the current `ours` —
    /// violating it would silently re-free addresses this Space has
    /// already allocated, so it's checked with a `debug_assert` rather than
    /// threaded through as a `Result` (there's no natural error channel for
    /// a void-returning operation, and the condition is a caller bug, not a
    /// runtime one).
    pub fn add(&mut self, start: Address, size: u64) {
        let r = Range::new(start, size);
        debug_assert!(
            self.ours.num_addresses_in(r) == 0,
            "Space::add: {} overlaps existing owned space",
            r
        );
        self.ours.add(r.start, r.end);
        self.free.add(r.start, r.end);
        debug!(range = %r, "ipam: added owned range");
        self.assert_invariants();
    }

    /// Mark an owned, currently-free address as allocated without
    /// returning it (used to record an allocation decided elsewhere).
    pub fn claim(&mut self, addr: Address) -> Result<()> {
        if !self.ours.contains(addr) {
            return Err(IpamError::not_owned(addr, &self.owned_ranges()));
        }
        if !self.free.contains(addr) {
            return Err(IpamError::already_allocated(addr));
        }
        self.free.subtract(addr, addr + 1);
        debug!(%addr, "ipam: claimed address");
        self.assert_invariants();
        Ok(())
    }

    /// Return a previously allocated address to the free set.
    pub fn free(&mut self, addr: Address) -> Result<()> {
        if !self.ours.contains(addr) {
            return Err(IpamError::not_owned(addr, &self.owned_ranges()));
        }
        if self.free.contains(addr) {
            return Err(IpamError::not_allocated(addr, &self.owned_ranges()));
        }
        self.free.add(addr, addr + 1);
        debug!(%addr, "ipam: freed address");
        self.assert_invariants();
        Ok(())
    }

    /// Pick and allocate the smallest free address within `within`.
    /// Returns `None` if no free address exists there.
    pub fn allocate(&mut self, within: Range) -> Option<Address> {
        let addr = self.free.smallest_in(within)?;
        self.free.subtract(addr, addr + 1);
        debug!(%addr, "ipam: allocated address");
        self.assert_invariants();
        Some(addr)
    }

    /// Relinquish a contiguous free sub-range to a peer Space, removing it
    /// from both `ours` and `free`. Returns `None` if no non-empty donation
    /// is possible in `free ∩ within`.
    ///
    /// `owned_cidrs` is called at most once, and only when `prefer_cidr` is
    /// set — callers with an expensive or cacheable CIDR enumeration can
    /// defer the work to exactly the calls that need it.
    pub fn donate(
        &mut self,
        within: Range,
        prefer_cidr: bool,
        owned_cidrs: impl Fn() -> Vec<Cidr>,
    ) -> Option<Range> {
        let d = donate::select(&self.ours, &self.free, within, prefer_cidr, owned_cidrs)?;
        self.ours.subtract(d.start, d.end);
        self.free.subtract(d.start, d.end);
        debug!(range = %d, "ipam: donated range");
        self.assert_invariants();
        Some(d)
    }

    /// True iff `range ⊆ ours` and no address in `range` is currently
    /// allocated.
    pub fn is_free(&self, range: Range) -> bool {
        if !self.ours.contains_range(range) {
            return false;
        }
        self.free.num_addresses_in(range) == range.size()
    }

    /// True iff `range ⊆ ours` and every owned address in `range` is
    /// allocated.
    pub fn is_full(&self, range: Range) -> bool {
        self.ours.contains_range(range) && self.free.num_addresses_in(range) == 0
    }

    /// Cardinality of `free`.
    pub fn num_free_addresses(&self) -> u64 {
        self.free.num_addresses()
    }

    /// Cardinality of `free ∩ range`.
    pub fn num_free_addresses_in_range(&self, range: Range) -> u64 {
        self.free.num_addresses_in(range)
    }

    /// The intervals of `ours`, ascending, disjoint, non-touching.
    pub fn owned_ranges(&self) -> Vec<Range> {
        self.ours.intervals()
    }

    /// The largest interval in `free ∩ within`, ties broken by lowest
    /// start. Empty when the intersection is empty.
    pub fn biggest_free_range(&self, within: Range) -> Range {
        self.free.biggest_in(within)
    }

    /// Check the invariants from the design doc: `free ⊆ ours`, and both
    /// interval sets are well-formed boundary sequences. Compiled out in
    /// release builds; a violation here is a bug in this crate, not a
    /// caller mistake, so it panics rather than returning a `Result`.
    #[cfg(debug_assertions)]
    fn assert_invariants(&self) {
        if let Err(msg) = self.ours.assert_well_formed() {
            panic!("ipam-core invariant violated (ours): {}", msg);
        }
        if let Err(msg) = self.free.assert_well_formed() {
            panic!("ipam-core invariant violated (free): {}", msg);
        }
        for r in self.free.intervals() {
            if !self.ours.contains_range(r) {
                panic!(
                    "ipam-core invariant violated: free range {} is not owned",
                    r
                );
            }
        }
    }

    #[cfg(not(debug_assertions))]
    fn assert_invariants(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a(v: u32) -> Address {
        Address::new(v)
    }

    fn ip(s: &str) -> Address {
        s.parse().unwrap()
    }

    fn empty_cidrs() -> Vec<Cidr> {
        Vec::new()
    }

    fn make_space(start: Address, size: u64) -> Space {
        let mut s = Space::new();
        s.add(start, size);
        s
    }

    #[test]
    fn allocate_claim_free_roundtrip() {
        let mut s = Space::new();
        assert_eq!(s.num_free_addresses(), 0);
        assert_eq!(s.allocate(Range::new(a(0), 1000)), None);

        s.add(a(100), 100);
        assert_eq!(s.num_free_addresses(), 100);

        let got = s.allocate(Range::new(a(0), 1000));
        assert_eq!(got, Some(a(100)));
        assert_eq!(s.num_free_addresses(), 99);

        s.claim(a(150)).unwrap();
        assert_eq!(s.num_free_addresses(), 98);

        s.free(a(100)).unwrap();
        assert_eq!(s.num_free_addresses(), 99);

        assert!(s.free(a(0)).is_err());
        assert!(s.free(a(100)).is_err());
    }

    #[test]
    fn num_free_addresses_in_range() {
        let start = ip("10.0.3.4");
        let mut space = make_space(start, 20);

        let addr1 = space.allocate(Range::new(start, 20)).unwrap();
        assert_eq!(addr1, ip("10.0.3.4"));
        assert_eq!(space.num_free_addresses(), 19);

        let addr2 = space.allocate(Range::new(start, 20)).unwrap();
        assert_ne!(addr2, ip("10.0.3.4"));
        assert_eq!(space.num_free_addresses(), 18);

        let narrow = Range { start: ip("10.0.3.4"), end: ip("10.0.3.19") };
        assert_eq!(space.num_free_addresses_in_range(narrow), 13);

        let wide = Range { start: ip("10.0.3.4"), end: ip("10.0.9.19") };
        assert_eq!(space.num_free_addresses_in_range(wide), 18);

        space.free(addr2).unwrap();
        assert!(space.free(addr2).is_err());
        assert!(space.free(ip("10.0.3.19")).is_err());
        assert!(space.free(ip("10.0.9.19")).is_err());
    }

    #[test]
    fn donate_half_split_then_scarce() {
        let mut s = Space::new();
        s.add(a(100), 100);
        s.allocate(Range::new(a(0), 1000));
        s.claim(a(150)).unwrap();
        s.free(a(100)).unwrap();

        let r = s.donate(Range::new(a(0), 1000), false, empty_cidrs).unwrap();
        assert_eq!(r.start, a(125));
        assert_eq!(r.size(), 25);
    }

    #[test]
    fn claim_is_idempotent_with_error() {
        let mut s = Space::new();
        s.add(a(0), 10);

        s.claim(a(5)).unwrap();
        match s.claim(a(5)) {
            Err(IpamError::AlreadyAllocated { address }) => assert_eq!(address, a(5)),
            other => panic!("expected AlreadyAllocated, got {:?}", other),
        }

        match s.claim(a(50)) {
            Err(IpamError::NotOwned { address, .. }) => assert_eq!(address, a(50)),
            other => panic!("expected NotOwned, got {:?}", other),
        }
    }

    #[test]
    fn donate_on_empty_space_fails() {
        let mut s = Space::new();
        assert!(s.donate(Range::new(a(0), 1000), false, empty_cidrs).is_none());
    }

    #[test]
    fn donate_scarce_addresses() {
        let mut s = Space::new();
        s.add(a(0), 3);
        s.claim(a(0)).unwrap();
        s.claim(a(2)).unwrap();

        let r = s.donate(Range::new(a(0), 1000), false, empty_cidrs).unwrap();
        assert_eq!(r.start, a(1));
        assert_eq!(r.end, a(2));

        assert!(s.donate(Range::new(a(0), 1000), false, empty_cidrs).is_none());
    }

    #[test]
    fn donate_simple_half_then_drain() {
        let start = ip("10.0.1.0");
        let size = 48u64;
        let mut s = make_space(start, size);

        let r = s.donate(Range::new(start, size), false, empty_cidrs).unwrap();
        assert_eq!(r.start.to_string(), "10.0.1.24");
        assert_eq!(r.size(), 24);
        assert_eq!(s.num_free_addresses(), 24);

        let mut given_up = r.size();
        for _ in 0..1000 {
            match s.donate(Range::new(start, size), false, empty_cidrs) {
                Some(r) => given_up += r.size(),
                None => break,
            }
        }
        assert_eq!(s.num_free_addresses(), 0);
        assert_eq!(given_up, size);
    }

    #[test]
    fn donate_hard_after_fragmenting_free_list() {
        let start = ip("10.0.1.0");
        let size = 48u64;
        let mut s = make_space(start, size);

        for _ in 0..size {
            assert!(s.allocate(Range::new(start, size)).is_some());
        }
        assert_eq!(s.num_free_addresses(), 0);

        for i in 0..(size - 1) {
            s.free(start + i as i64).unwrap();
        }

        let r = s.donate(Range::new(start, size), false, empty_cidrs).unwrap();
        assert_eq!(r.start, ip("10.0.1.23"));
        assert_eq!(r.size(), 24);
        assert_eq!(s.num_free_addresses(), 23);
    }

    #[test]
    fn donate_cidr_aware() {
        let mut space = Space::new();
        space.add(ip("10.0.0.0"), 128);

        let within = Range {
            start: ip("10.0.0.0"),
            end: a(ip("10.0.0.255").value() + 1),
        };
        space.claim(ip("10.0.0.1")).unwrap();
        space.claim(ip("10.0.0.97")).unwrap();

        let cidrs = vec![Cidr::parse("10.0.0.0/25").unwrap()];
        let chunk1 = space.donate(within, true, || cidrs.clone()).unwrap();
        assert_eq!(chunk1.start, ip("10.0.0.32"));
        assert_eq!(chunk1.end, a(ip("10.0.0.63").value() + 1));
    }

    #[test]
    fn donate_whole_free_cidr_preferred() {
        let mut space = Space::new();
        space.add(ip("10.0.0.0"), 64);
        space.add(ip("10.0.0.128"), 128);

        let cidrs = vec![
            Cidr::parse("10.0.0.0/26").unwrap(),
            Cidr::parse("10.0.0.128/25").unwrap(),
        ];
        let within = Range {
            start: ip("10.0.0.0"),
            end: a(ip("10.0.0.2").value() + 1),
        };
        let chunk = space.donate(within, true, || cidrs.clone()).unwrap();
        assert_eq!(chunk.start, ip("10.0.0.192"));
        assert_eq!(chunk.end, ip("10.0.1.0"));
    }

    #[test]
    fn is_free_and_is_full() {
        let mut space1 = Space::new();
        space1.add(ip("10.0.0.0"), 256);
        let full_range = Range { start: ip("10.0.0.0"), end: a(ip("10.0.0.255").value() + 1) };
        assert!(space1.is_free(full_range));

        let sub_range = Range { start: ip("10.0.0.42"), end: a(ip("10.0.0.65").value() + 1) };
        assert!(space1.is_free(sub_range));

        space1.claim(ip("10.0.0.43")).unwrap();
        assert!(!space1.is_free(sub_range));

        assert!(!space1.is_full(full_range));
    }

    #[test]
    fn biggest_free_range_scenarios() {
        let start = ip("10.0.3.4");
        let entire = Range::new(start, 20);
        let mut space = make_space(start, 20);

        let r = space.biggest_free_range(entire);
        assert_eq!(r.start, start);
        assert_eq!(r.size(), 20);

        for _ in 0..20 {
            assert!(space.allocate(entire).is_some());
        }
        assert!(space.allocate(entire).is_none());
        assert!(space.biggest_free_range(entire).is_empty());

        // Fully allocated: no non-empty donation is possible, so Donate
        // reports `None` rather than an empty `Some(range)`.
        assert!(space.donate(entire, false, empty_cidrs).is_none());

        space.free(ip("10.0.3.13")).unwrap();
        let r = space.biggest_free_range(entire);
        assert_eq!(r.start, ip("10.0.3.13"));
        assert_eq!(r.size(), 1);

        space.free(ip("10.0.3.23")).unwrap();
        let r = space.biggest_free_range(entire);
        assert_eq!(r.start, ip("10.0.3.23"));
        assert_eq!(r.size(), 1);

        space.free(ip("10.0.3.22")).unwrap();
        space.free(ip("10.0.3.21")).unwrap();
        assert_eq!(space.num_free_addresses(), 4);

        let r = space.biggest_free_range(entire);
        assert_eq!(r.start, ip("10.0.3.21"));
        assert_eq!(r.size(), 3);

        space.free(ip("10.0.3.12")).unwrap();
        space.free(ip("10.0.3.11")).unwrap();
        space.free(ip("10.0.3.10")).unwrap();
        assert_eq!(space.num_free_addresses(), 7);

        let r = space.biggest_free_range(entire);
        assert_eq!(r.start, ip("10.0.3.10"));
        assert_eq!(r.size(), 4);

        assert_eq!(
            space.owned_ranges(),
            vec![Range { start: ip("10.0.3.4"), end: ip("10.0.3.24") }]
        );
    }

    #[test]
    fn allocate_is_lowest_first() {
        let mut space = make_space(a(0), 10);
        assert_eq!(space.allocate(Range::new(a(0), 10)), Some(a(0)));
        assert_eq!(space.allocate(Range::new(a(0), 10)), Some(a(1)));
    }
}
