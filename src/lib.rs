//! wheel - a lock-free SPSC ring of variable-sized byte slices
//!
//! A single-producer/single-consumer ring buffer designed to live inside a
//! region of memory shared across disjoint address spaces: every
//! cross-reference inside the region is a 32-bit aligned-unit offset, never
//! a pointer, so two processes mapping the same shared region at different
//! base addresses cooperate correctly.
//!
//! The core allocator ([`SpinWheel`]) never blocks and has no opinion about
//! how its region got shared or how a peer is told new data arrived. An
//! optional notification layer ([`NotifiedWheel`], Unix only) pairs it with
//! a pair of `eventfd` counting semaphores for processes that want to block
//! instead of spin.
//!
//! # Example
//!
//! ```
//! use wheel::SpinWheel;
//!
//! let mut region = vec![0u8; 4096].into_boxed_slice();
//! let wheel = SpinWheel::init(region.as_mut_ptr(), region.len()).unwrap();
//!
//! let payload = b"hello wheel";
//! let (offset, ptr) = wheel.make(payload.len()).expect("room for a small message");
//! unsafe { std::ptr::copy_nonoverlapping(payload.as_ptr(), ptr, payload.len()) };
//! wheel.share(offset);
//!
//! let (got_offset, got_ptr, got_len) = wheel.next().expect("shared slice visible");
//! assert_eq!(got_offset, offset);
//! let got = unsafe { std::slice::from_raw_parts(got_ptr, got_len) };
//! assert_eq!(got, payload);
//! wheel.return_slice(offset);
//! ```

mod align;
mod backoff;
mod error;
mod header;
mod invariants;
#[cfg(unix)]
mod notify;
mod spin;

pub use align::{Offset, ALIGN, INVALID, MIN_REGION_BYTES};
pub use backoff::Backoff;
pub use error::{NotifyError, WheelError};
pub use header::{HeadLast, SliceHeader, SLICE_HEADER_LEN};
#[cfg(unix)]
pub use notify::{create_notify_handles, init_notify_handles, NotifiedWheel, NotifyHandles};
pub use spin::SpinWheel;
