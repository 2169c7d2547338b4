//! The spin wheel — the lock-free SPSC allocator/FIFO over the header and
//! slice-header layout. Same producer-publishes/consumer-advances shape and
//! the same debug-assertion-guarded invariants as a fixed-stride ring, but
//! adapted to variable-sized slices addressed by byte offset.

use crate::align::{ceil_units, Offset, ALIGN, INVALID, MIN_REGION_BYTES};
use crate::error::WheelError;
use crate::header::{state, HeadLast, Header, SliceHeader, SLICE_HEADER_LEN};
use crate::invariants::{
    debug_assert_backfill_reaches_capacity, debug_assert_contained,
    debug_assert_head_last_consistent, debug_assert_offset_was_issued,
};
use std::sync::atomic::Ordering;

fn validate(bytes: usize) -> Result<u32, WheelError> {
    if bytes % ALIGN != 0 {
        return Err(WheelError::Unaligned { bytes, align: ALIGN });
    }
    if bytes < MIN_REGION_BYTES {
        return Err(WheelError::TooSmall { bytes, min: MIN_REGION_BYTES });
    }
    let total_units = bytes / ALIGN;
    if total_units > u32::MAX as usize {
        return Err(WheelError::TooLarge { bytes });
    }
    Ok((total_units - 1) as u32)
}

/// A lock-free single-producer/single-consumer ring of variable-sized byte
/// slices, living entirely inside a caller-supplied region of memory.
///
/// `SpinWheel` itself is just a pointer and a length: it never allocates,
/// never blocks, and holds no notion of which process it is running in.
/// Two `SpinWheel`s constructed over the same bytes in two different
/// processes' mappings of one shared region cooperate correctly because
/// every cross-reference inside the region is a byte offset, never an
/// address.
pub struct SpinWheel {
    base: *mut u8,
    region_len: usize,
}

// SAFETY: all shared mutable state is reached exclusively through atomics
// on a `*mut u8` the caller guarantees is valid shared memory; `SpinWheel`
// itself carries no non-atomic interior mutability.
unsafe impl Send for SpinWheel {}
unsafe impl Sync for SpinWheel {}

impl SpinWheel {
    /// Initializes a fresh region: writes `aligned_capacity` and the empty
    /// `head_last` sentinel. Call exactly once, from whichever process
    /// creates the shared region.
    pub fn init(region: *mut u8, bytes: usize) -> Result<Self, WheelError> {
        let aligned_capacity = validate(bytes)?;
        let wheel = Self { base: region, region_len: bytes };
        wheel.header().init_fields(aligned_capacity);
        log::debug!(
            "wheel initialized: {bytes} bytes, {aligned_capacity} aligned units of capacity"
        );
        Ok(wheel)
    }

    /// Wraps a region a peer process already initialized with [`init`],
    /// without touching the header.
    ///
    /// # Safety
    /// The region must already have been initialized by a call to `init`
    /// (in this process or another one mapping the same shared memory),
    /// and must remain mapped for as long as the returned wheel is used.
    pub unsafe fn attach(region: *mut u8, bytes: usize) -> Result<Self, WheelError> {
        validate(bytes)?;
        Ok(Self { base: region, region_len: bytes })
    }

    #[inline]
    pub(crate) fn header(&self) -> &Header {
        // SAFETY: `base` points at a region at least `region_len >= MIN_REGION_BYTES`
        // bytes long, and the first ALIGN bytes are reserved for the header.
        unsafe { Header::at(self.base) }
    }

    #[inline]
    fn arena_base(&self) -> *mut u8 {
        // SAFETY: region_len >= MIN_REGION_BYTES >= ALIGN.
        unsafe { self.base.add(ALIGN) }
    }

    #[inline]
    fn slice_ptr(&self, offset: Offset) -> *mut u8 {
        // SAFETY: callers only pass offsets that index live or just-allocated
        // slices, which `make`'s own bounds checks keep within the arena.
        unsafe { self.arena_base().add(offset as usize * ALIGN) }
    }

    #[inline]
    fn slice_header(&self, offset: Offset) -> &SliceHeader {
        unsafe { SliceHeader::at(self.slice_ptr(offset)) }
    }

    /// Total bytes of the region, including the header.
    #[inline]
    pub fn region_len(&self) -> usize {
        self.region_len
    }

    #[inline]
    pub fn aligned_capacity(&self) -> u32 {
        self.header().aligned_capacity()
    }

    /// The largest `U` for which `make(U)` can ever succeed (only when the
    /// wheel is entirely empty).
    #[inline]
    pub fn max_user_size(&self) -> usize {
        self.aligned_capacity() as usize * ALIGN - SLICE_HEADER_LEN
    }

    /// Pointer to the first byte of a slice's payload (after its header).
    #[inline]
    pub fn payload_ptr(&self, offset: Offset) -> *mut u8 {
        // SAFETY: every live offset has SLICE_HEADER_LEN + something bytes
        // reserved for it (enforced by `make`'s size computation).
        unsafe { self.slice_ptr(offset).add(SLICE_HEADER_LEN) }
    }

    /// Chooses where the next slice of `s` aligned units should land, and
    /// whether doing so requires backfilling the current `last` slice
    /// (slot selection, with the backfill rule applied on wraparound).
    fn select_slot(&self, s: u32, pair: HeadLast, aligned_capacity: u32) -> Option<(Offset, bool)> {
        if pair.is_empty() {
            return (s <= aligned_capacity).then_some((0, false));
        }

        let last_header = self.slice_header(pair.last);
        let last_size = last_header.aligned_size_in_wheel(Ordering::Relaxed);
        let last_end = pair.last + last_size;

        if pair.last < pair.head {
            // Already wrapped: the only free region is the hole between the
            // live tail and the live head.
            let hole = pair.head - last_end;
            return (s <= hole).then_some((last_end, false));
        }

        // Not wrapped: try the tail first, then the front (which wraps).
        let tail_space = aligned_capacity - last_end;
        if s <= tail_space {
            return Some((last_end, false));
        }
        (s <= pair.head).then_some((0, true))
    }

    /// Allocates room for `user_size` bytes. Returns the new slice's offset
    /// and a pointer to its writable payload, or `None` ("no room" — not
    /// an error, just a transient condition the caller retries).
    pub fn make(&self, user_size: usize) -> Option<(Offset, *mut u8)> {
        let s = ceil_units(SLICE_HEADER_LEN.checked_add(user_size)?)?;
        if s == 0 {
            return None;
        }
        let aligned_capacity = self.aligned_capacity();
        if s > aligned_capacity {
            return None;
        }

        let mut pair = self.header().load_head_last(Ordering::Acquire);
        debug_assert_head_last_consistent!(pair.head, pair.last, INVALID);
        loop {
            let (offset, needs_backfill) = self.select_slot(s, pair, aligned_capacity)?;

            if needs_backfill {
                let prior_last_header = self.slice_header(pair.last);
                let enlarged = aligned_capacity - pair.last;
                debug_assert_backfill_reaches_capacity!(pair.last, enlarged, aligned_capacity);
                prior_last_header.set_aligned_size_in_wheel(enlarged, Ordering::Relaxed);
                log::trace!(
                    "backfill: slice at {} enlarged to {} units to reach capacity {}",
                    pair.last,
                    enlarged,
                    aligned_capacity
                );
            }

            debug_assert_contained!(offset, s, aligned_capacity);
            self.slice_header(offset).write(user_size as u32, s);

            if pair.is_empty() {
                // Uncontested: no consumer can race an empty wheel to
                // non-empty, so a plain store suffices.
                let published = HeadLast { head: offset, last: offset };
                self.header().store_head_last(published, Ordering::Release);
                return Some((offset, self.payload_ptr(offset)));
            }

            let published = HeadLast { head: pair.head, last: offset };
            match self.header().cas_head_last(pair, published, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return Some((offset, self.payload_ptr(offset))),
                Err(actual) => {
                    // The consumer advanced (or emptied) head concurrently.
                    // `last` cannot have moved (only this producer writes
                    // it), so recomputing the slot from the fresh pair is
                    // always safe and terminates because head only ever
                    // advances or the wheel empties.
                    debug_assert_head_last_consistent!(actual.head, actual.last, INVALID);
                    pair = actual;
                }
            }
        }
    }

    /// Marks a slice visible to the consumer. `offset` must be one this
    /// wheel's own `make` returned and that has not already been shared.
    pub fn share(&self, offset: Offset) {
        let header = self.slice_header(offset);
        debug_assert_offset_was_issued!(
            header.state(Ordering::Relaxed) == state::UNINIT,
            "share called on an offset not returned by make, or already shared"
        );
        header.set_state(state::READABLE, Ordering::Release);
    }

    /// Peeks the oldest shared-but-unread slice, without advancing.
    /// Returns `None` if the wheel is empty or its head slice is not yet
    /// `READABLE`.
    pub fn next(&self) -> Option<(Offset, *const u8, usize)> {
        let pair = self.header().load_head_last(Ordering::Relaxed);
        debug_assert_head_last_consistent!(pair.head, pair.last, INVALID);
        if pair.is_empty() {
            return None;
        }
        let header = self.slice_header(pair.head);
        if header.state(Ordering::Acquire) != state::READABLE {
            return None;
        }
        Some((pair.head, self.payload_ptr(pair.head).cast_const(), header.trailing_user_size() as usize))
    }

    /// Releases a slice the consumer is done with, then advances `head`
    /// over any contiguous prefix of already-returned slices. Returns the
    /// number of slices the head actually advanced past this call (`0` if
    /// `offset` was already returned, or if it was not at the head yet).
    pub fn return_slice(&self, offset: Offset) -> usize {
        let slice_header = self.slice_header(offset);
        let prev = slice_header.exchange_state(state::RETURNED, Ordering::AcqRel);
        debug_assert_offset_was_issued!(
            prev == state::READABLE || prev == state::RETURNED,
            "return_slice called on an offset never marked READABLE by share"
        );
        if prev == state::RETURNED {
            return 0;
        }

        let mut released = 0usize;
        let mut pair = self.header().load_head_last(Ordering::Acquire);
        debug_assert_head_last_consistent!(pair.head, pair.last, INVALID);
        loop {
            if pair.is_empty() {
                break;
            }
            let head_header = self.slice_header(pair.head);
            if head_header.state(Ordering::Acquire) != state::RETURNED {
                break;
            }

            let next = if pair.head == pair.last {
                HeadLast::EMPTY
            } else {
                let size = head_header.aligned_size_in_wheel(Ordering::Relaxed);
                let next_head = (pair.head + size) % self.aligned_capacity();
                HeadLast { head: next_head, last: pair.last }
            };

            match self.header().cas_head_last(pair, next, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => {
                    released += 1;
                    if next.is_empty() {
                        break;
                    }
                    pair = next;
                }
                Err(actual) => {
                    // Only the producer could have changed `last` out from
                    // under us; `head` (what we're walking) is untouched.
                    debug_assert_head_last_consistent!(actual.head, actual.last, INVALID);
                    pair = actual;
                }
            }
        }
        released
    }
}
