use thiserror::Error;

/// Configuration errors surfaced synchronously at init time.
///
/// Everything that can go wrong *after* init (wheel full, nothing
/// readable) is not an error — those are modeled as a plain
/// `None`/[`crate::INVALID`] return instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WheelError {
    /// `bytes` was not a multiple of [`crate::ALIGN`].
    #[error("region size {bytes} is not a multiple of the {align}-byte alignment unit")]
    Unaligned { bytes: usize, align: usize },
    /// `bytes` was smaller than [`crate::MIN_REGION_BYTES`].
    #[error("region size {bytes} is smaller than the minimum {min} bytes")]
    TooSmall { bytes: usize, min: usize },
    /// `bytes` would not fit in the 32-bit aligned-unit offset space.
    #[error("region size {bytes} exceeds the maximum addressable by a 32-bit aligned offset")]
    TooLarge { bytes: usize },
}

/// Failures reported by the notification layer: rare,
/// and never unwind the ring's own state. The primary wheel operation's
/// result is always reported to the caller first; this is the auxiliary
/// indicator they may inspect afterward.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Creating or posting/draining a notification handle failed.
    #[error("notification handle operation failed: {0}")]
    Handle(#[from] nix::Error),
}
