//! A minimal XDR (RFC 4506) primitive layer.
//!
//! Rather than pull in a whole XDR crate for just the fixed header and a
//! handful of `u32` counts, this module defines the two traits a caller
//! needs directly: a pair implemented by whatever value type gets encoded
//! as a message payload, in the same shape as a stream-position-tracking
//! marshaller callback.

use byteorder::{NetworkEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// Implemented by types that can be XDR-encoded into a message payload.
///
/// [`crate::encode_payload_typed`] calls `encode` with a cursor over the
/// message's own buffer, and treats any `Err` the same way regardless of
/// cause.
pub trait XdrEncode {
    /// Writes `self` to `w` in XDR form.
    fn encode(&self, w: &mut dyn Write) -> io::Result<()>;
}

/// Implemented by types that can be XDR-decoded from a message payload.
pub trait XdrDecode: Sized {
    /// Reads an instance of `Self` from `r`.
    fn decode(r: &mut dyn Read) -> io::Result<Self>;
}

impl XdrEncode for u32 {
    fn encode(&self, w: &mut dyn Write) -> io::Result<()> {
        w.write_u32::<NetworkEndian>(*self)
    }
}

impl XdrDecode for u32 {
    fn decode(r: &mut dyn Read) -> io::Result<Self> {
        r.read_u32::<NetworkEndian>()
    }
}

impl XdrEncode for () {
    fn encode(&self, _w: &mut dyn Write) -> io::Result<()> {
        Ok(())
    }
}

impl XdrDecode for () {
    fn decode(_r: &mut dyn Read) -> io::Result<Self> {
        Ok(())
    }
}

/// Writes a big-endian `u32` at a fixed offset in `buf`, without touching
/// any cursor. Used to back-patch the length prefix after the fact.
pub(crate) fn patch_u32(buf: &mut [u8], offset: usize, value: u32) {
    NetworkEndian::write_u32(&mut buf[offset..offset + 4], value);
}

/// Reads a big-endian `u32` from a fixed offset in `buf`.
pub(crate) fn peek_u32(buf: &[u8], offset: usize) -> u32 {
    NetworkEndian::read_u32(&buf[offset..offset + 4])
}
