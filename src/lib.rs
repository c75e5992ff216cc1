//! A codec for a length-prefixed, XDR-framed RPC transport.
//!
//! This crate implements the wire-level message codec used by an RPC
//! transport that multiplexes control-plane calls, replies, stream chunks
//! and events over a single stream-oriented connection, optionally carrying
//! out-of-band file descriptors alongside the byte stream.
//!
//! It deliberately stops at the byte/descriptor boundary: reading and
//! writing the underlying socket, authentication, and the program/procedure
//! dispatch table are the job of whatever I/O loop embeds this crate.

#![warn(
    anonymous_parameters,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    single_use_lifetimes,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unused_extern_crates,
    unused_qualifications,
    variant_size_differences
)]

mod error;
mod error_capture;
mod fd;
mod frame;
mod header;
mod message;
mod payload;
mod queue;
mod xdr;

pub use error::{CodecError, Result};
pub use error_capture::{save_error, set_last_error, ErrorLevel, ErrorRecord};
pub use fd::{add_fd, decode_num_fds, dup_fd, encode_num_fds};
pub use frame::{decode_header, decode_length, encode_header};
pub use header::{Header, MessageType};
pub use message::Message;
pub use payload::{decode_payload_typed, encode_payload_raw, encode_payload_typed};
pub use queue::TxQueue;
pub use xdr::{XdrDecode, XdrEncode};

/// Size in bytes of the big-endian length prefix that begins every frame.
pub const LEN_SIZE: usize = 4;

/// Marshalled size, in bytes, of a [`Header`].
pub const HEADER_XDR_LEN: usize = header::HEADER_XDR_LEN;

/// Largest payload (everything past the length prefix) this codec will
/// encode or accept on decode, in bytes.
pub const PAYLOAD_MAX: u32 = 256 * 1024 * 1024;

/// Largest number of file descriptors a single message may carry.
pub const FDS_MAX: u32 = 32;

/// Starting payload capacity guess used when a message is first encoded.
///
/// Chosen to cover the common case (a handful of XDR-encoded scalars and
/// short strings) without over-allocating; the buffer doubles from here
/// under [`frame`]'s growth policy when a payload doesn't fit.
pub(crate) const INITIAL: usize = 1024;

/// Smallest frame that can possibly be valid: the length prefix plus a
/// fully-encoded header.
pub const MIN_FRAME_LEN: usize = LEN_SIZE + HEADER_XDR_LEN;
