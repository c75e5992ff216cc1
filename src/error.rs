//! Error types returned at the codec boundary.

use thiserror::Error;

use crate::error_capture::{self, ErrorLevel, ErrorRecord};

/// Domain tag used when a [`CodecError`] is captured into an
/// [`ErrorRecord`] — this crate only ever reports errors from itself, so
/// every record shares the same domain.
const DOMAIN_CODEC: u32 = 1;

/// An error produced by a codec operation.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The frame was too small, or a length/header/payload decode failed.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// Encoding would exceed [`crate::PAYLOAD_MAX`], or a decoded length
    /// claimed a payload larger than that.
    #[error("payload too large: {len} bytes exceeds limit of {max}")]
    PayloadTooLarge {
        /// The length, in bytes, that was rejected.
        len: u32,
        /// The limit that was exceeded.
        max: u32,
    },
    /// `nfds` (encode) or a decoded descriptor count (decode) exceeded
    /// [`crate::FDS_MAX`].
    #[error("too many file descriptors: {count} exceeds limit of {max}")]
    TooManyFds {
        /// The descriptor count that was rejected.
        count: u32,
        /// The limit that was exceeded.
        max: u32,
    },
    /// [`crate::dup_fd`] was called with a slot index at or beyond the
    /// attached descriptor count.
    #[error("no such descriptor slot: {slot} (message has {nfds})")]
    NoSuchSlot {
        /// The slot that was requested.
        slot: u32,
        /// The number of descriptors actually attached.
        nfds: u32,
    },
    /// An OS-level failure duplicating a descriptor or setting
    /// close-on-exec on it.
    #[error("system error: {0}")]
    System(#[from] std::io::Error),
    /// The allocator itself failed to satisfy a buffer growth request.
    ///
    /// Distinct from [`CodecError::PayloadTooLarge`]: that variant rejects a
    /// size before ever touching the allocator; this one is what happens
    /// when a size within [`crate::PAYLOAD_MAX`] still can't be allocated.
    #[error("allocation failed while growing the message buffer")]
    Allocation,
}

impl CodecError {
    /// Wire-representable error code for this variant, used when the error
    /// is captured into the thread-local last-error slot.
    fn wire_code(&self) -> u32 {
        match self {
            CodecError::Protocol(_) => 2,
            CodecError::PayloadTooLarge { .. } => 3,
            CodecError::TooManyFds { .. } => 4,
            CodecError::NoSuchSlot { .. } => 5,
            CodecError::System(_) => 6,
            CodecError::Allocation => 7,
        }
    }

    fn record(&self) -> ErrorRecord {
        ErrorRecord {
            code: self.wire_code(),
            domain: DOMAIN_CODEC,
            level: ErrorLevel::Error,
            message: Some(self.to_string()),
            str1: None,
            str2: None,
            int1: 0,
            int2: 0,
        }
    }
}

/// The result of a codec operation.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Records `err` as this thread's last error, then returns it as a
/// `Result::Err`.
///
/// Every codec operation that fails constructs its [`CodecError`] through
/// this helper rather than a bare `Err(...)`, so a peer (or a later save of
/// the thread-local into a wire record via [`crate::save_error`]) always
/// sees an explanation for the most recent failure on this thread.
pub(crate) fn fail<T>(err: CodecError) -> Result<T> {
    error_capture::set_last_error(err.record());
    Err(err)
}
