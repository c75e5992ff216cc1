//! Typed (XDR) and raw payload encode/decode, with back-patching.

use std::io::Cursor;

use crate::error::{fail, CodecError, Result};
use crate::frame::grow_capacity;
use crate::message::Message;
use crate::xdr::{self, XdrDecode, XdrEncode};
use crate::{LEN_SIZE, PAYLOAD_MAX};

fn finalize(msg: &mut Message) {
    xdr::patch_u32(&mut msg.buffer, 0, msg.buffer_offset as u32);
    msg.buffer_length = msg.buffer_offset;
    msg.buffer_offset = 0;
    msg.buffer.truncate(msg.buffer_length);
}

/// Encodes `value` as the payload of `msg`, growing the buffer and
/// retrying as needed, then finalizes the frame.
///
/// Precondition: [`crate::frame::encode_header`] has already run.
///
/// Every encode failure — whether the buffer was genuinely too small or
/// `value`'s own encoding logic rejected something — is treated the same
/// way: double the payload capacity and retry. There's no way to
/// distinguish "ran out of room" from "the marshaller itself failed" once
/// it's inside a single opaque callback, so this deliberately doesn't try.
/// Retrying stops, and the size-exceeded error is returned, once capacity
/// growth would exceed [`PAYLOAD_MAX`].
pub fn encode_payload_typed<T: XdrEncode>(msg: &mut Message, value: &T) -> Result<()> {
    loop {
        let mut cursor = Cursor::new(&mut msg.buffer[msg.buffer_offset..msg.buffer_length]);
        match value.encode(&mut cursor) {
            Ok(()) => {
                let written = cursor.position() as usize;
                msg.buffer_offset += written;
                break;
            }
            Err(_) => {
                let current_payload_cap = msg.buffer_length - LEN_SIZE;
                let new_payload_cap = current_payload_cap.saturating_mul(2).max(1);
                grow_capacity(msg, new_payload_cap)?;
            }
        }
    }

    finalize(msg);
    Ok(())
}

/// Appends `bytes` verbatim as the payload of `msg`, then finalizes the
/// frame.
///
/// Precondition: [`crate::frame::encode_header`] has already run. An empty
/// `bytes` appends nothing — this is the way to finalize a frame whose
/// payload is empty (e.g. a bare acknowledgement).
pub fn encode_payload_raw(msg: &mut Message, bytes: &[u8]) -> Result<()> {
    if bytes.is_empty() {
        finalize(msg);
        return Ok(());
    }

    let needed_end = msg.buffer_offset + bytes.len();
    let max_total = PAYLOAD_MAX as usize + LEN_SIZE;
    if needed_end > max_total {
        return fail(CodecError::PayloadTooLarge {
            len: needed_end.min(u32::MAX as usize) as u32,
            max: max_total as u32,
        });
    }

    grow_capacity(msg, needed_end - LEN_SIZE)?;
    msg.buffer[msg.buffer_offset..needed_end].copy_from_slice(bytes);
    msg.buffer_offset = needed_end;

    finalize(msg);
    Ok(())
}

/// Decodes a value of type `T` from `msg`'s remaining unread bytes.
///
/// Precondition: [`crate::frame::decode_header`] has already run, so
/// `buffer_offset` points just past the header.
///
/// Advances `buffer_offset` by the number of bytes consumed, so
/// `buffer_offset..buffer_length` always denotes "what's left to read" —
/// both before and after this call, so a subsequent descriptor-count
/// decode can resume straight from it.
pub fn decode_payload_typed<T: XdrDecode>(msg: &mut Message) -> Result<T> {
    let mut cursor = Cursor::new(&msg.buffer[msg.buffer_offset..msg.buffer_length]);
    let value = match T::decode(&mut cursor) {
        Ok(value) => value,
        Err(err) => {
            log::debug!("decode_payload_typed: payload decode failed: {err}");
            return fail(CodecError::Protocol(format!("payload decode failed: {err}")));
        }
    };

    let consumed = cursor.position() as usize;
    msg.buffer_offset += consumed;
    Ok(value)
}
