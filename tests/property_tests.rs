//! Property-based tests for the wheel's structural invariants.
//!
//! proptest drives randomized sequences of operations and checks that the
//! invariants hold after every one, rather than only on a handful of
//! hand-picked cases.

use proptest::prelude::*;
use wheel::{SpinWheel, ALIGN};

fn region(aligned_units: usize) -> Box<[u8]> {
    vec![0u8; aligned_units * ALIGN].into_boxed_slice()
}

// =============================================================================
// INV-CONTAIN: a live slice never runs past aligned_capacity.
// =============================================================================

proptest! {
    /// Every offset `make` ever returns, plus the slice's own size, stays
    /// within the region's aligned capacity.
    #[test]
    fn prop_slices_stay_contained(sizes in prop::collection::vec(0usize..200, 1..40)) {
        let mut buf = region(16);
        let wheel = SpinWheel::init(buf.as_mut_ptr(), buf.len()).unwrap();
        let capacity = wheel.aligned_capacity();

        for size in sizes {
            if let Some((offset, _ptr)) = wheel.make(size) {
                prop_assert!(offset < capacity, "offset {offset} >= capacity {capacity}");
                wheel.share(offset);
                // Immediately free it so later iterations have room too;
                // this still exercises allocate/share/return under varied sizes.
                prop_assert_eq!(wheel.return_slice(offset), 1);
            }
        }
    }
}

// =============================================================================
// INV-ORD-happens-before analogue: never read more than was produced.
// =============================================================================

proptest! {
    /// A consumer draining with `next`/`return_slice` never sees more
    /// slices than the producer actually shared.
    #[test]
    fn prop_happens_before(count in 0usize..64) {
        let mut buf = region(256);
        let wheel = SpinWheel::init(buf.as_mut_ptr(), buf.len()).unwrap();

        let mut produced = 0usize;
        for i in 0..count {
            if let Some((offset, ptr)) = wheel.make(8) {
                unsafe { std::ptr::write(ptr.cast::<u64>(), i as u64) };
                wheel.share(offset);
                produced += 1;
            }
        }

        let mut consumed = 0usize;
        while let Some((offset, _ptr, _len)) = wheel.next() {
            wheel.return_slice(offset);
            consumed += 1;
        }

        prop_assert!(consumed <= produced, "consumed {consumed} > produced {produced}");
        prop_assert_eq!(consumed, produced);
        prop_assert!(wheel.next().is_none());
    }
}

// =============================================================================
// INV-XOR-EMPTY / monotonic progress: alternating make/return never panics
// and never leaves the wheel in an inconsistent state (no room reported
// while a `return_slice` call is still pending, etc).
// =============================================================================

proptest! {
    /// Randomly interleaved allocate/drain operations never panic and the
    /// ring always reports empty once every shared slice has been returned.
    #[test]
    fn prop_interleaved_make_and_drain(ops in prop::collection::vec(prop::bool::ANY, 1..80)) {
        let mut buf = region(8);
        let wheel = SpinWheel::init(buf.as_mut_ptr(), buf.len()).unwrap();
        let mut outstanding: Vec<u32> = Vec::new();

        for make_op in ops {
            if make_op {
                if let Some((offset, _ptr)) = wheel.make(4) {
                    wheel.share(offset);
                    outstanding.push(offset);
                }
            } else if let Some((offset, _ptr, _len)) = wheel.next() {
                wheel.return_slice(offset);
                outstanding.retain(|&o| o != offset);
            }
        }

        while let Some((offset, _ptr, _len)) = wheel.next() {
            wheel.return_slice(offset);
            outstanding.retain(|&o| o != offset);
        }

        prop_assert!(outstanding.is_empty());
        prop_assert!(wheel.next().is_none());
    }
}
