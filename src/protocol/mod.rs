//! Wire Protocol Module
//!
//! The compact binary command/response framing spoken between clients and
//! servers over TCP.
//!
//! ## Frame Layout
//! ```text
//! request  = version:u8  command:u8  arg_count:u32be  { arg_len:u32be  arg_bytes }*
//! response = version:u8  reply:u8    body_len:u32be   body_bytes
//! ```
//! `reply` is 0 for success (the body is the result) and 1 for an error
//! (the body is the error text, which [`crate::error::Error`] can parse
//! back into a typed error — redirects in particular travel this way).

pub mod frame;

pub use frame::{read_request, read_response, write_request, write_response, Request};

#[cfg(test)]
mod tests;

/// Command bytes. The numbering is part of the wire contract.
pub const GET_COMMAND: u8 = 1;
pub const SET_COMMAND: u8 = 2;
pub const DELETE_COMMAND: u8 = 3;
pub const STATUS_COMMAND: u8 = 4;
pub const NODES_COMMAND: u8 = 5;

/// Protocol version carried in every frame.
pub const PROTOCOL_VERSION: u8 = 1;

pub(crate) const REPLY_OK: u8 = 0;
pub(crate) const REPLY_ERR: u8 = 1;

/// Upper bound on any single argument or response body. A frame claiming
/// more is treated as corrupt rather than honored with an allocation.
pub(crate) const MAX_FRAME_BYTES: u32 = 64 * 1024 * 1024;

/// Upper bound on the argument count of one request. The widest command
/// (`SET`) carries three arguments; anything past this is a corrupt frame,
/// not a reason to preallocate.
pub(crate) const MAX_REQUEST_ARGS: u32 = 8;
