//! Debug-only assertions for the ring's structural invariants.
//!
//! Macros gated on `debug_assertions`, zero overhead in release builds,
//! each one tagged with the invariant it checks so a panic message points
//! straight back at the invariant it names.

/// INV-CONTAIN: a live slice never runs past the end of the arena, except
/// the intentional backfill case where it is extended to land exactly on
/// `aligned_capacity`.
macro_rules! debug_assert_contained {
    ($offset:expr, $aligned_size:expr, $aligned_capacity:expr) => {
        debug_assert!(
            $offset as u64 + $aligned_size as u64 <= $aligned_capacity as u64,
            "INV-CONTAIN violated: slice at {} + {} exceeds capacity {}",
            $offset,
            $aligned_size,
            $aligned_capacity
        )
    };
}

/// INV-XOR-EMPTY: `head_last` is either the all-`INVALID` sentinel or both
/// halves are valid offsets — never one valid and one not.
macro_rules! debug_assert_head_last_consistent {
    ($head:expr, $last:expr, $invalid:expr) => {
        debug_assert!(
            ($head == $invalid) == ($last == $invalid),
            "INV-XOR-EMPTY violated: head={} last={}",
            $head,
            $last
        )
    };
}

/// INV-RECEIVED: a consumer must not call `return_slice` on an offset it
/// never received from `next`, a producer must not call `share` on an
/// offset it never received from `make`.
macro_rules! debug_assert_offset_was_issued {
    ($issued:expr, $context:literal) => {
        debug_assert!($issued, "INV-RECEIVED violated: {}", $context)
    };
}

/// INV-BACKFILL: after a wraparound allocation, the slice that absorbed
/// the tail gap ends exactly at `aligned_capacity`.
macro_rules! debug_assert_backfill_reaches_capacity {
    ($prior_offset:expr, $enlarged_size:expr, $aligned_capacity:expr) => {
        debug_assert_eq!(
            $prior_offset as u64 + $enlarged_size as u64,
            $aligned_capacity as u64,
            "INV-BACKFILL violated: enlarged slice at {} does not reach capacity {}",
            $prior_offset,
            $aligned_capacity
        )
    };
}

pub(crate) use debug_assert_backfill_reaches_capacity;
pub(crate) use debug_assert_contained;
pub(crate) use debug_assert_head_last_consistent;
pub(crate) use debug_assert_offset_was_issued;
