//! The notification layer. Wraps each of the four spin-wheel
//! primitives so that a pair of per-process counting-semaphore handles
//! stays coherent with the `is_readable`/`is_writable` flags living beside
//! the wheel header.
//!
//! Two Linux `eventfd`s in counting-semaphore mode (`EFD_SEMAPHORE |
//! EFD_NONBLOCK | EFD_CLOEXEC`) act as per-process handles a reactor can
//! wait on instead of spinning; the header's flags are the single source
//! of truth for readability/writability, and the handles are kept
//! coherent with them by gating every post/drain on an atomic-exchange
//! observing the relevant 0↔1 transition.

use crate::align::Offset;
use crate::error::NotifyError;
use crate::spin::SpinWheel;
use nix::sys::eventfd::{eventfd, EfdFlags};
use nix::unistd::{read, write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::atomic::Ordering;

/// A pair of per-process counting-semaphore notification handles.
///
/// Each process that wants to wait on the wheel holds its own
/// `NotifyHandles`, built either by [`create_notify_handles`] (the side
/// that owns the wheel) or [`init_notify_handles`] (a peer that received
/// the same two descriptors over a transport this crate does not
/// implement, such as passing file descriptors over a Unix domain socket).
pub struct NotifyHandles {
    readable: OwnedFd,
    writable: OwnedFd,
}

impl NotifyHandles {
    #[inline]
    pub fn readable_fd(&self) -> RawFd {
        self.readable.as_raw_fd()
    }

    #[inline]
    pub fn writable_fd(&self) -> RawFd {
        self.writable.as_raw_fd()
    }
}

fn new_eventfd() -> Result<OwnedFd, NotifyError> {
    let flags = EfdFlags::EFD_SEMAPHORE | EfdFlags::EFD_NONBLOCK | EfdFlags::EFD_CLOEXEC;
    let fd = eventfd(0, flags).map_err(NotifyError::Handle)?;
    // SAFETY: `eventfd` just returned a freshly created, uniquely-owned fd.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

fn post(fd: RawFd, count: u64) -> Result<(), NotifyError> {
    write(fd, &count.to_ne_bytes()).map_err(NotifyError::Handle)?;
    log::trace!("notify: posted {count} unit(s) to fd {fd}");
    Ok(())
}

fn drain(fd: RawFd) -> Result<(), NotifyError> {
    let mut buf = [0u8; 8];
    match read(fd, &mut buf) {
        Ok(_) => {
            log::trace!("notify: drained 1 unit from fd {fd}");
            Ok(())
        }
        // A racing waiter may have already drained this unit; the flag
        // transition already happened, so there is nothing left to do.
        Err(nix::Error::EAGAIN) => Ok(()),
        Err(e) => Err(NotifyError::Handle(e)),
    }
}

/// Creates a fresh pair of handles, seeding their counts from the wheel's
/// current `is_readable`/`is_writable` flags. The writable
/// handle's large baseline can't be expressed as a single 32-bit `eventfd`
/// initval, so it is established with a follow-up write. Call this once,
/// from whichever process creates the shared region, right after
/// [`SpinWheel::init`].
pub fn create_notify_handles(wheel: &SpinWheel) -> Result<NotifyHandles, NotifyError> {
    let header = wheel.header();

    let readable = new_eventfd()?;
    if header.is_readable.load(Ordering::Acquire) == 1 {
        post(readable.as_raw_fd(), 1)?;
    }

    let writable = new_eventfd()?;
    let is_writable = u64::from(header.is_writable.load(Ordering::Acquire));
    let baseline = u64::MAX - 1 - is_writable;
    post(writable.as_raw_fd(), baseline)?;

    log::debug!("notify handles created: readable={readable:?} writable={writable:?}");
    Ok(NotifyHandles { readable, writable })
}

/// Wraps two descriptors this process did not create — received from a
/// peer via ancillary-data transport (out of scope for this crate).
/// Their counts were already established by whichever process called
/// [`create_notify_handles`]; this function must not re-seed them.
///
/// # Safety
/// `readable_fd` and `writable_fd` must be open, valid, and not owned
/// elsewhere in this process (ownership transfers to the returned value).
pub unsafe fn init_notify_handles(readable_fd: RawFd, writable_fd: RawFd) -> NotifyHandles {
    NotifyHandles {
        readable: OwnedFd::from_raw_fd(readable_fd),
        writable: OwnedFd::from_raw_fd(writable_fd),
    }
}

/// Wraps a [`SpinWheel`] together with the [`NotifyHandles`] this process
/// uses to wake (or be woken by) its peer, keeping the handles coherent
/// with the header's flags.
pub struct NotifiedWheel {
    wheel: SpinWheel,
    handles: NotifyHandles,
}

impl NotifiedWheel {
    pub fn new(wheel: SpinWheel, handles: NotifyHandles) -> Self {
        Self { wheel, handles }
    }

    pub fn wheel(&self) -> &SpinWheel {
        &self.wheel
    }

    pub fn handles(&self) -> &NotifyHandles {
        &self.handles
    }

    /// Current value of the `is_readable` coherence flag. Exposed for
    /// tests and diagnostics; the gated post/drain calls above are what
    /// actually keep it meaningful.
    pub fn is_readable(&self) -> bool {
        self.wheel.header().is_readable.load(Ordering::Acquire) == 1
    }

    /// Current value of the `is_writable` coherence flag.
    pub fn is_writable(&self) -> bool {
        self.wheel.header().is_writable.load(Ordering::Acquire) == 1
    }

    /// As [`SpinWheel::make`]. On failure, posts to the writable handle
    /// exactly on the `is_writable` 1→0 transition.
    pub fn make(&self, user_size: usize) -> (Option<(Offset, *mut u8)>, Result<(), NotifyError>) {
        let result = self.wheel.make(user_size);
        let mut notified = Ok(());
        if result.is_none() {
            let header = self.wheel.header();
            if header
                .is_writable
                .compare_exchange(1, 0, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                notified = post(self.handles.writable_fd(), 1);
                if let Err(ref e) = notified {
                    log::warn!("notify: failed to post writable handle after make failure: {e}");
                }
            }
        }
        (result, notified)
    }

    /// As [`SpinWheel::share`]. Posts to the readable handle exactly on
    /// the `is_readable` 0→1 transition.
    pub fn share(&self, offset: Offset) -> Result<(), NotifyError> {
        self.wheel.share(offset);
        let header = self.wheel.header();
        if header
            .is_readable
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let result = post(self.handles.readable_fd(), 1);
            if let Err(ref e) = result {
                log::warn!("notify: failed to post readable handle after share: {e}");
            }
            return result;
        }
        Ok(())
    }

    /// As [`SpinWheel::next`]. On returning nothing, drains the readable
    /// handle exactly on the `is_readable` 1→0 transition.
    pub fn next(&self) -> (Option<(Offset, *const u8, usize)>, Result<(), NotifyError>) {
        let result = self.wheel.next();
        let mut notified = Ok(());
        if result.is_none() {
            let header = self.wheel.header();
            if header
                .is_readable
                .compare_exchange(1, 0, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                notified = drain(self.handles.readable_fd());
                if let Err(ref e) = notified {
                    log::warn!("notify: failed to drain readable handle after empty next: {e}");
                }
            }
        }
        (result, notified)
    }

    /// As [`SpinWheel::return_slice`]. Drains the writable handle exactly
    /// on the `is_writable` 0→1 transition.
    pub fn return_slice(&self, offset: Offset) -> (usize, Result<(), NotifyError>) {
        let released = self.wheel.return_slice(offset);
        let header = self.wheel.header();
        let mut notified = Ok(());
        if header
            .is_writable
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            notified = drain(self.handles.writable_fd());
            if let Err(ref e) = notified {
                log::warn!("notify: failed to drain writable handle after return: {e}");
            }
        }
        (released, notified)
    }
}
