//! The in-memory representation of one message.

use std::os::unix::io::RawFd;

use crate::fd::close_ignore_eintr;
use crate::header::Header;

/// Sentinel value for a descriptor slot that hasn't been filled in (on
/// decode) or has already been handed off to the peer (on encode).
pub const FD_SENTINEL: RawFd = -1;

type Destructor = Box<dyn FnOnce(&mut Message) + Send>;

/// One message: a header, a buffer, and any descriptors attached to it.
///
/// # Buffer cursors
///
/// `buffer_length` and `buffer_offset` are reused across encode and decode
/// phases rather than split into four direction-specific fields. Their
/// meaning depends on what operation ran last:
///
/// * During encode, before finalization: `buffer_length` is the buffer's
///   *allocated capacity*, `buffer_offset` is the next write position.
/// * After a successful encode finalization ([`crate::payload`]):
///   `buffer_length` is the *written* size (and the frame's total length),
///   `buffer_offset` is `0`, ready for the I/O loop to write
///   `buffer[0..buffer_length]`.
/// * During decode, after [`crate::frame::decode_length`]: `buffer_length`
///   is the total frame size, `buffer_offset` is the next read position.
/// * After [`crate::payload::decode_payload_typed`]: `buffer_offset`
///   advances by the number of bytes the payload decode consumed, so it
///   keeps meaning "next read position" and a subsequent
///   [`crate::fd::decode_num_fds`] can read straight from it.
///
/// The invariant `buffer_offset <= buffer_length` holds within each phase,
/// but what "remaining" or "consumed" means is phase-dependent.
pub struct Message {
    pub(crate) buffer: Vec<u8>,
    pub(crate) buffer_length: usize,
    pub(crate) buffer_offset: usize,

    header: Header,

    pub(crate) fds: Vec<RawFd>,
    pub(crate) donefds: usize,

    tracked: bool,

    destructor: Option<Destructor>,

    /// Intrusive link used by [`crate::TxQueue`]. Not meaningful outside
    /// queue membership.
    pub(crate) next: Option<Box<Message>>,
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("buffer_length", &self.buffer_length)
            .field("buffer_offset", &self.buffer_offset)
            .field("header", &self.header)
            .field("nfds", &self.fds.len())
            .field("donefds", &self.donefds)
            .field("tracked", &self.tracked)
            .field("has_destructor", &self.destructor.is_some())
            .finish()
    }
}

impl Message {
    /// Allocates an empty message: no buffer, no descriptors, no
    /// destructor, `tracked` set as given.
    pub fn new(tracked: bool) -> Self {
        Message {
            buffer: Vec::new(),
            buffer_length: 0,
            buffer_offset: 0,
            header: Header::default(),
            fds: Vec::new(),
            donefds: 0,
            tracked,
            destructor: None,
            next: None,
        }
    }

    /// The message's decoded (or to-be-encoded) header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Mutable access to the message's header, for a caller filling it in
    /// before [`crate::frame::encode_header`].
    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    /// Whether this message participates in higher-layer serial-number
    /// tracking. Opaque to the codec; preserved across [`Message::clear`].
    pub fn tracked(&self) -> bool {
        self.tracked
    }

    /// Descriptors attached to this message so far.
    pub fn fds(&self) -> &[RawFd] {
        &self.fds
    }

    /// Number of descriptors already handed off to the peer by the I/O
    /// loop.
    pub fn done_fds(&self) -> usize {
        self.donefds
    }

    /// Marks `count` descriptors as handed off. Called by the I/O loop
    /// after it has passed them to the peer out-of-band; those slots are
    /// reset to [`FD_SENTINEL`] and this message is no longer responsible
    /// for closing them.
    pub fn mark_fds_done(&mut self, count: usize) {
        let end = (self.donefds + count).min(self.fds.len());
        for slot in &mut self.fds[self.donefds..end] {
            *slot = FD_SENTINEL;
        }
        self.donefds = end;
    }

    /// Installs a destructor callback, invoked exactly once when the
    /// message is dropped.
    ///
    /// Rust closures already capture whatever state a C-style "cookie"
    /// would carry, so there's no separate cookie parameter here — just
    /// move whatever the destructor needs into the closure.
    pub fn set_destructor(&mut self, destructor: impl FnOnce(&mut Message) + Send + 'static) {
        self.destructor = Some(Box::new(destructor));
    }

    /// Closes every attached descriptor (ignoring `EINTR`), and resets the
    /// descriptor array and done-count.
    pub fn clear_fds(&mut self) {
        for &fd in &self.fds {
            if fd != FD_SENTINEL {
                close_ignore_eintr(fd);
            }
        }
        self.fds.clear();
        self.donefds = 0;
    }

    /// Closes descriptors, then releases the buffer and resets both
    /// cursors.
    pub fn clear_payload(&mut self) {
        self.clear_fds();
        self.buffer.clear();
        self.buffer_length = 0;
        self.buffer_offset = 0;
    }

    /// Clears the payload and descriptors, then zeroes the rest of the
    /// record (header, destructor, queue link) for reuse. `tracked` is the
    /// only field preserved across a clear.
    ///
    /// This is for reuse, not disposal: the destructor is *not* invoked
    /// here, even if one was set. Use [`drop`] (or let the message go out
    /// of scope) to dispose of a message and run its destructor.
    pub fn clear(&mut self) {
        self.clear_payload();
        self.header = Header::default();
        self.destructor = None;
        self.next = None;
    }
}

impl Drop for Message {
    fn drop(&mut self) {
        if let Some(destructor) = self.destructor.take() {
            destructor(self);
        }
        self.clear_payload();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn clear_preserves_tracked_flag() {
        for tracked in [true, false] {
            let mut msg = Message::new(tracked);
            msg.header_mut().serial = 7;
            msg.buffer = vec![1, 2, 3];
            msg.buffer_length = 3;

            msg.clear();

            assert_eq!(msg.tracked(), tracked);
            assert_eq!(msg.header().serial, 0);
            assert_eq!(msg.buffer_length, 0);
        }
    }

    #[test]
    fn destructor_runs_exactly_once_on_drop() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();

        let mut msg = Message::new(false);
        msg.set_destructor(move |_msg| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        drop(msg);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clear_does_not_invoke_destructor() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();

        let mut msg = Message::new(false);
        msg.set_destructor(move |_msg| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        msg.clear();
        assert_eq!(count.load(Ordering::SeqCst), 0, "clear must not run the destructor");

        drop(msg);
        assert_eq!(
            count.load(Ordering::SeqCst),
            0,
            "clear removes the destructor entirely, so drop afterwards must not run it either"
        );
    }

    #[test]
    fn destructor_can_reclaim_descriptors_before_close() {
        use std::os::unix::io::AsRawFd;

        let f = std::fs::File::open("/dev/null").unwrap();
        let fd = f.as_raw_fd();
        std::mem::forget(f); // ownership transferred to the message below

        let reclaimed = Arc::new(AtomicUsize::new(0));
        let reclaimed_clone = reclaimed.clone();

        let mut msg = Message::new(false);
        msg.fds.push(fd);
        msg.set_destructor(move |msg| {
            // Reclaim ownership of the descriptor before Drop's
            // clear_payload() would otherwise close it.
            if let Some(slot) = msg.fds.first_mut() {
                reclaimed_clone.fetch_add(1, Ordering::SeqCst);
                *slot = FD_SENTINEL;
            }
        });

        drop(msg);
        assert_eq!(reclaimed.load(Ordering::SeqCst), 1);
        close_ignore_eintr(fd);
    }

    #[test]
    fn mark_fds_done_resets_slots_to_sentinel() {
        let mut msg = Message::new(false);
        msg.fds = vec![3, 4, 5];

        msg.mark_fds_done(2);
        assert_eq!(msg.fds, vec![FD_SENTINEL, FD_SENTINEL, 5]);
        assert_eq!(msg.done_fds(), 2);
    }
}
