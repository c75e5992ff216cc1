//! The fixed-width message header carried by every frame.

use std::io::{self, Read, Write};

use byteorder::{NetworkEndian, ReadBytesExt, WriteBytesExt};

use crate::xdr::{XdrDecode, XdrEncode};

/// Marshalled size, in bytes, of a [`Header`]: six network-order `u32`
/// fields.
pub const HEADER_XDR_LEN: usize = 6 * 4;

/// Message type discriminant.
///
/// Decoding a [`Header`] does not validate this field against the
/// enumeration below — an unrecognized value decodes to a raw `u32` in
/// [`Header::msg_type`] and it's up to a higher layer (the dispatcher) to
/// reject it. [`MessageType::from_u32`] is a convenience for that layer.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// A request for a remote procedure to be invoked.
    Call = 0,
    /// A reply to a previously sent [`MessageType::Call`].
    Reply = 1,
    /// A one-way event, not expecting a reply.
    Message = 2,
    /// A chunk of stream data associated with an in-progress call.
    Stream = 3,
    /// Like [`MessageType::Call`], additionally carrying descriptors.
    CallWithFds = 4,
    /// Like [`MessageType::Reply`], additionally carrying descriptors.
    ReplyWithFds = 5,
    /// Like [`MessageType::Message`], additionally carrying descriptors.
    MessageWithFds = 6,
    /// Marks a hole (skipped region) in a stream, carrying no payload.
    StreamHole = 7,
}

impl MessageType {
    /// Converts a raw wire value into a known message type, if recognized.
    pub fn from_u32(v: u32) -> Option<Self> {
        Some(match v {
            0 => MessageType::Call,
            1 => MessageType::Reply,
            2 => MessageType::Message,
            3 => MessageType::Stream,
            4 => MessageType::CallWithFds,
            5 => MessageType::ReplyWithFds,
            6 => MessageType::MessageWithFds,
            7 => MessageType::StreamHole,
            _ => return None,
        })
    }
}

/// The decoded header of one message.
///
/// Field validity (is `program` known, is `msg_type` a recognized
/// discriminant, is `status` a sensible code for this `msg_type`) is not
/// checked by the codec — that's the dispatcher's job. The codec only
/// guarantees the header round-trips byte-for-byte.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// RPC program identifier.
    pub program: u32,
    /// RPC program version.
    pub program_version: u32,
    /// Procedure number within the program.
    pub procedure: u32,
    /// Raw message type discriminant; see [`MessageType::from_u32`].
    pub msg_type: u32,
    /// Serial number, used to match replies to calls.
    pub serial: u32,
    /// Status code (success/error indicator), meaning depends on `msg_type`.
    pub status: u32,
}

impl Header {
    /// Writes the header in its fixed XDR form.
    pub(crate) fn encode(&self, w: &mut dyn Write) -> io::Result<()> {
        w.write_u32::<NetworkEndian>(self.program)?;
        w.write_u32::<NetworkEndian>(self.program_version)?;
        w.write_u32::<NetworkEndian>(self.procedure)?;
        w.write_u32::<NetworkEndian>(self.msg_type)?;
        w.write_u32::<NetworkEndian>(self.serial)?;
        w.write_u32::<NetworkEndian>(self.status)?;
        Ok(())
    }

    /// Reads a header from its fixed XDR form.
    pub(crate) fn decode(r: &mut dyn Read) -> io::Result<Self> {
        Ok(Header {
            program: r.read_u32::<NetworkEndian>()?,
            program_version: r.read_u32::<NetworkEndian>()?,
            procedure: r.read_u32::<NetworkEndian>()?,
            msg_type: r.read_u32::<NetworkEndian>()?,
            serial: r.read_u32::<NetworkEndian>()?,
            status: r.read_u32::<NetworkEndian>()?,
        })
    }
}

impl XdrEncode for Header {
    fn encode(&self, w: &mut dyn Write) -> io::Result<()> {
        Header::encode(self, w)
    }
}

impl XdrDecode for Header {
    fn decode(r: &mut dyn Read) -> io::Result<Self> {
        Header::decode(r)
    }
}
