//! Duplication, close-on-exec, and scoped ownership of attached descriptors.

use std::os::unix::io::RawFd;

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg};

use crate::error::{fail, CodecError, Result};
use crate::message::Message;
use crate::message::FD_SENTINEL;
use crate::xdr;
use crate::{FDS_MAX, LEN_SIZE};

/// Closes `fd`, retrying if the underlying syscall reports `EINTR`.
///
/// `close()` on this target never needs more than a retry loop; it never
/// returns a partial-close state worth surfacing to the caller.
pub(crate) fn close_ignore_eintr(fd: RawFd) {
    loop {
        match nix::unistd::close(fd) {
            Ok(()) => return,
            Err(Errno::EINTR) => continue,
            Err(_) => return,
        }
    }
}

/// Duplicates `fd`, atomically setting close-on-exec on the duplicate.
///
/// Uses `F_DUPFD_CLOEXEC` rather than `dup` + a separate `fcntl(F_SETFD)`
/// call, so there's no window in which a concurrent `fork`+`exec` on
/// another thread could inherit the duplicate.
pub(crate) fn dup_cloexec(fd: RawFd) -> Result<RawFd> {
    match fcntl(fd, FcntlArg::F_DUPFD_CLOEXEC(0)) {
        Ok(dup) => Ok(dup),
        Err(errno) => {
            log::warn!("dup_cloexec: failed to duplicate fd {fd}: {errno}");
            fail(CodecError::System(std::io::Error::from_raw_os_error(
                errno as i32,
            )))
        }
    }
}

/// A duplicated descriptor that closes itself on drop unless explicitly
/// committed.
///
/// `AddFD` needs to duplicate a descriptor, then either append it to the
/// message's descriptor array (success) or close it and report an error
/// (failure) without leaking it or touching descriptors already attached.
/// Wrapping the duplicate in this guard as soon as it's created makes that
/// "close unless committed" property hold even across an early return.
#[derive(Debug)]
pub(crate) struct OwnedFdSlot(Option<RawFd>);

impl OwnedFdSlot {
    /// Takes ownership of an already-duplicated descriptor.
    pub(crate) fn new(fd: RawFd) -> Self {
        OwnedFdSlot(Some(fd))
    }

    /// Duplicates `fd` with close-on-exec and wraps the duplicate.
    pub(crate) fn dup(fd: RawFd) -> Result<Self> {
        Ok(OwnedFdSlot::new(dup_cloexec(fd)?))
    }

    /// Releases the descriptor to the caller; it will no longer be closed
    /// by this guard.
    pub(crate) fn commit(mut self) -> RawFd {
        self.0.take().expect("commit called on an already-taken slot")
    }
}

impl Drop for OwnedFdSlot {
    fn drop(&mut self) {
        if let Some(fd) = self.0.take() {
            close_ignore_eintr(fd);
        }
    }
}

/// Duplicates `fd` with close-on-exec and appends it to `msg`'s descriptor
/// array. The caller retains ownership of the original `fd`; the message
/// owns the duplicate from here on.
///
/// On failure the duplicate (if one was created) is closed and `msg` is
/// left unchanged — previously attached descriptors are unaffected.
pub fn add_fd(msg: &mut Message, fd: RawFd) -> Result<()> {
    let slot = OwnedFdSlot::dup(fd)?;
    msg.fds.push(slot.commit());
    Ok(())
}

/// Duplicates the descriptor attached at `slot`, with close-on-exec, and
/// returns it to the caller, who takes ownership of the duplicate.
pub fn dup_fd(msg: &Message, slot: u32) -> Result<RawFd> {
    let nfds = msg.fds.len() as u32;
    let fd = match msg.fds.get(slot as usize) {
        Some(&fd) => fd,
        None => return fail(CodecError::NoSuchSlot { slot, nfds }),
    };

    dup_cloexec(fd)
}

/// XDR-encodes the number of descriptors attached to `msg` and appends it
/// to the already-finalized frame.
///
/// Per the wire format, the descriptor count follows the payload within
/// the same frame, so this must run after
/// [`crate::payload::encode_payload_typed`] or
/// [`crate::payload::encode_payload_raw`] has finalized the frame, not
/// before.
pub fn encode_num_fds(msg: &mut Message) -> Result<()> {
    let nfds = msg.fds.len() as u32;
    if nfds > FDS_MAX {
        return fail(CodecError::TooManyFds { count: nfds, max: FDS_MAX });
    }

    let old_total = msg.buffer_length;
    let new_total = old_total + LEN_SIZE;
    if new_total > msg.buffer.len() {
        msg.buffer.resize(new_total, 0);
    }

    xdr::patch_u32(&mut msg.buffer, old_total, nfds);
    msg.buffer_length = new_total;
    xdr::patch_u32(&mut msg.buffer, 0, new_total as u32);
    Ok(())
}

/// Decodes the descriptor count following the payload, advancing
/// `buffer_offset` past it.
///
/// If `msg` has no descriptor slots allocated yet, allocates `count`
/// slots initialized to [`FD_SENTINEL`] for the I/O loop to fill in as it
/// receives descriptors out-of-band. If slots already exist (the I/O loop
/// pre-populated them before calling this), the array is left alone — only
/// the count is validated.
pub fn decode_num_fds(msg: &mut Message) -> Result<u32> {
    let count = {
        let mut cursor = &msg.buffer[msg.buffer_offset..msg.buffer_length];
        let count: u32 = match xdr::XdrDecode::decode(&mut cursor) {
            Ok(count) => count,
            Err(err) => {
                log::debug!("decode_num_fds: fd count decode failed: {err}");
                return fail(CodecError::Protocol(format!(
                    "fd count decode failed: {err}"
                )));
            }
        };
        msg.buffer_offset += LEN_SIZE;
        count
    };

    if count > FDS_MAX {
        return fail(CodecError::TooManyFds { count, max: FDS_MAX });
    }

    if msg.fds.is_empty() && count > 0 {
        msg.fds = vec![FD_SENTINEL; count as usize];
    }

    Ok(count)
}
