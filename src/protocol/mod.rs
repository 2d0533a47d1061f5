//! Server-Sent Events wire protocol
//!
//! Encoding of logical events into the `text/event-stream` frame format.

pub mod constants;
pub mod encoder;
pub mod frame;
pub mod json;

pub use encoder::{
    encode, encode_bytes, encode_int, encode_json, encode_str, encode_uint, Data,
};
pub use frame::Frame;
