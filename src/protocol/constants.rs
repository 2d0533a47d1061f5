//! Event stream protocol constants

/// Prefix of the event-name field line
pub const EVENT_PREFIX: &[u8] = b"event:";

/// Data field name; followed by `:` unless the data is empty
pub const DATA_FIELD: &[u8] = b"data";

/// Line terminator
pub const LF: u8 = b'\n';

/// Blank line closing a frame
pub const FRAME_TERMINATOR: &[u8] = b"\n\n";

/// Widest decimal rendering of a 64-bit integer ('-' + 19 digits, or 20 digits unsigned)
pub const MAX_INT_LEN: usize = 20;

/// MIME type of an event stream response
pub const CONTENT_TYPE_EVENT_STREAM: &str = "text/event-stream";

/// Response headers set before the first frame is written
pub const STREAM_HEADERS: [(&str, &str); 3] = [
    ("Cache-Control", "no-cache"),
    ("Connection", "keep-alive"),
    ("Content-Type", CONTENT_TYPE_EVENT_STREAM),
];
