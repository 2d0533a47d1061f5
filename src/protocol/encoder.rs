//! Event frame encoder
//!
//! Every payload shape is first reduced to a data text `D`, then framed the
//! same way:
//!
//! ```text
//! event:{name}\n          (only when the event name is non-empty)
//! data:{line 1}\n
//! data:{line 2}\n          (one data: line per \n-separated line of D)
//! ...
//! data:{line k+1}\n\n
//! ```
//!
//! An empty `D` is written as the bare token `data\n\n`.
//!
//! Every entry point accepts an event `id`. It is carried through the API
//! but not written to the frame.
//!
//! Event names must be a single line. A name containing `\n` or `\r` would
//! be written as-is and start extra fields; debug builds panic on it.

use bytes::{BufMut, BytesMut};
use serde::Serialize;

use super::constants::{DATA_FIELD, EVENT_PREFIX, FRAME_TERMINATOR, LF, MAX_INT_LEN};
use super::frame::Frame;
use super::json::to_json;
use crate::error::EncodingError;

/// Payload shapes that always encode successfully
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Data<'a> {
    /// UTF-8 text
    Text(&'a str),
    /// Raw bytes, written as-is
    Binary(&'a [u8]),
    /// Signed integer in decimal
    Int(i64),
    /// Unsigned integer in decimal
    Uint(u64),
}

impl<'a> From<&'a str> for Data<'a> {
    fn from(s: &'a str) -> Self {
        Data::Text(s)
    }
}

impl<'a> From<&'a String> for Data<'a> {
    fn from(s: &'a String) -> Self {
        Data::Text(s.as_str())
    }
}

impl<'a> From<&'a [u8]> for Data<'a> {
    fn from(b: &'a [u8]) -> Self {
        Data::Binary(b)
    }
}

impl From<i64> for Data<'_> {
    fn from(v: i64) -> Self {
        Data::Int(v)
    }
}

impl From<u64> for Data<'_> {
    fn from(v: u64) -> Self {
        Data::Uint(v)
    }
}

/// Encode an event with the given data
pub fn encode(id: &str, event: &str, data: Data<'_>) -> Frame {
    match data {
        Data::Text(s) => encode_bytes(id, event, s.as_bytes()),
        Data::Binary(b) => encode_bytes(id, event, b),
        Data::Int(v) => encode_int(id, event, v),
        Data::Uint(v) => encode_uint(id, event, v),
    }
}

/// Encode an event whose data is a string
pub fn encode_str(id: &str, event: &str, data: &str) -> Frame {
    encode_bytes(id, event, data.as_bytes())
}

/// Encode an event whose data is a byte slice interpreted as text
pub fn encode_bytes(_id: &str, event: &str, data: &[u8]) -> Frame {
    let mut buf = BytesMut::with_capacity(frame_len(event, data));
    put_event(&mut buf, event);
    put_data(&mut buf, data);
    Frame::from_bytes(buf.freeze())
}

/// Encode an event whose data is a signed integer
pub fn encode_int(id: &str, event: &str, data: i64) -> Frame {
    let mut digits = [0u8; MAX_INT_LEN];
    let start = format_int(data, &mut digits);
    encode_bytes(id, event, &digits[start..])
}

/// Encode an event whose data is an unsigned integer
pub fn encode_uint(id: &str, event: &str, data: u64) -> Frame {
    let mut digits = [0u8; MAX_INT_LEN];
    let start = format_uint(data, &mut digits);
    encode_bytes(id, event, &digits[start..])
}

/// Encode an event whose data is `value` serialized as compact JSON
///
/// Fails if the value cannot be represented as JSON (for example NaN);
/// no frame is produced in that case.
pub fn encode_json<T>(id: &str, event: &str, value: &T) -> Result<Frame, EncodingError>
where
    T: ?Sized + Serialize,
{
    let json = to_json(value)?;
    Ok(encode_bytes(id, event, &json))
}

/// Exact encoded length, so the frame is built in a single allocation
fn frame_len(event: &str, data: &[u8]) -> usize {
    let mut len = DATA_FIELD.len() + FRAME_TERMINATOR.len();
    if !event.is_empty() {
        len += EVENT_PREFIX.len() + event.len() + 1;
    }
    if !data.is_empty() {
        let breaks = data.iter().filter(|&&b| b == LF).count();
        // ":" before the first line, "\ndata:" replaces every break
        len += 1 + data.len() + breaks * (DATA_FIELD.len() + 1);
    }
    len
}

fn put_event(buf: &mut BytesMut, event: &str) {
    if event.is_empty() {
        return;
    }
    debug_assert!(
        !event.contains(&['\n', '\r'][..]),
        "event name must be a single line: {:?}",
        event
    );
    buf.put_slice(EVENT_PREFIX);
    buf.put_slice(event.as_bytes());
    buf.put_u8(LF);
}

fn put_data(buf: &mut BytesMut, data: &[u8]) {
    buf.put_slice(DATA_FIELD);
    if !data.is_empty() {
        for (i, line) in data.split(|&b| b == LF).enumerate() {
            if i > 0 {
                buf.put_u8(LF);
                buf.put_slice(DATA_FIELD);
            }
            buf.put_u8(b':');
            buf.put_slice(line);
        }
    }
    buf.put_slice(FRAME_TERMINATOR);
}

/// Write the decimal digits of `v` right-aligned into `out`, returning the start index
fn format_uint(mut v: u64, out: &mut [u8; MAX_INT_LEN]) -> usize {
    let mut pos = MAX_INT_LEN;
    loop {
        pos -= 1;
        out[pos] = b'0' + (v % 10) as u8;
        v /= 10;
        if v == 0 {
            return pos;
        }
    }
}

fn format_int(v: i64, out: &mut [u8; MAX_INT_LEN]) -> usize {
    // unsigned_abs covers i64::MIN
    let mut pos = format_uint(v.unsigned_abs(), out);
    if v < 0 {
        pos -= 1;
        out[pos] = b'-';
    }
    pos
}
