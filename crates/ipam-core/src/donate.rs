//! CIDR-aware donation policy: picks a contiguous free sub-range to
//! relinquish to a peer allocator.

use crate::cidr::Cidr;
use crate::intervals::IntervalSet;
use crate::range::Range;

/// Select the range to donate, or `None` if no non-empty donation is
/// possible.
///
/// When `prefer_cidr` is set, each CIDR the caller reports owning is
/// considered independently:
///
/// - If the CIDR is already entirely free, we never hand over the whole
///   thing in one call — we take its upper half instead (the same bias the
///   non-CIDR path applies), keeping the other half as a local reserve.
/// - Otherwise we recursively bisect the CIDR into aligned halves, in each
///   branch returning as soon as a sub-block turns out to be entirely free
///   (never splitting a sub-block further just because it happens to be
///   free), and preferring the larger of the two branches' results (ties
///   broken by lower start, which falls out naturally since the low half
///   of any split always has the lower start).
///
/// The largest candidate across all supplied CIDRs wins. This scan is
/// intentionally **not** narrowed by `within` — a peer asking for space in
/// one sub-range may still receive a larger block elsewhere if that's the
/// better donation. Only when no CIDR produces a candidate (including the
/// `prefer_cidr = false` case) do we fall back to the largest free
/// interval inside `within`, donating it whole if it's a single address or
/// its plain upper half otherwise.
pub(crate) fn select(
    ours: &IntervalSet,
    free: &IntervalSet,
    within: Range,
    prefer_cidr: bool,
    owned_cidrs: impl Fn() -> Vec<Cidr>,
) -> Option<Range> {
    if prefer_cidr {
        let mut best: Option<Range> = None;
        for cidr in owned_cidrs() {
            if let Some(candidate) = candidate_for_cidr(cidr.range, ours, free) {
                best = Some(match best {
                    None => candidate,
                    Some(b)
                        if candidate.size() > b.size()
                            || (candidate.size() == b.size() && candidate.start < b.start) =>
                    {
                        candidate
                    }
                    Some(b) => b,
                });
            }
        }
        if let Some(d) = best {
            return Some(d);
        }
    }

    let candidate = free.biggest_in(within);
    if candidate.is_empty() {
        return None;
    }
    if candidate.size() == 1 {
        return Some(candidate);
    }
    Some(upper_half(candidate))
}

/// The donation candidate a single owned CIDR yields.
fn candidate_for_cidr(range: Range, ours: &IntervalSet, free: &IntervalSet) -> Option<Range> {
    if range.is_empty() {
        return None;
    }
    if ours.contains_range(range) && free.contains_range(range) {
        return if range.size() == 1 {
            Some(range)
        } else {
            Some(upper_half(range))
        };
    }
    bisect(range, ours, free)
}

/// Recursively bisect `range` into aligned halves, returning the largest
/// sub-block that is entirely free (and owned), or `None` if no such
/// sub-block exists. A fully-free sub-block is returned as soon as it's
/// found — it is never split further.
///
/// Before splitting, a subtree with no free addresses at all is pruned in
/// one `num_addresses_in` check rather than walked address-by-address —
/// without this, a mostly-claimed CIDR with no fully-free sub-block
/// anywhere would cost O(range size) recursive calls instead of O(number
/// of free intervals), since every leaf down to individual addresses
/// would otherwise get visited.
fn bisect(range: Range, ours: &IntervalSet, free: &IntervalSet) -> Option<Range> {
    if range.is_empty() {
        return None;
    }
    if ours.contains_range(range) && free.contains_range(range) {
        return Some(range);
    }
    if range.size() == 1 {
        return None;
    }
    if free.num_addresses_in(range) == 0 {
        return None;
    }
    let lower = range.size() / 2;
    let mid = range.start + lower as i64;
    let lo = bisect(Range { start: range.start, end: mid }, ours, free);
    let hi = bisect(Range { start: mid, end: range.end }, ours, free);
    match (lo, hi) {
        (Some(l), Some(h)) => Some(if h.size() > l.size() { h } else { l }),
        (Some(l), None) => Some(l),
        (None, Some(h)) => Some(h),
        (None, None) => None,
    }
}

/// The upper half of `r`: `[lo + floor(size/2), hi)`, so the donated piece
/// is at least as large as what remains.
fn upper_half(r: Range) -> Range {
    let lower = r.size() / 2;
    Range {
        start: r.start + lower as i64,
        end: r.end,
    }
}
