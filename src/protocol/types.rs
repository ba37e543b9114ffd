//! Line Protocol Data Types
//!
//! ## Protocol Format
//!
//! Each message is one line terminated by `\n`:
//!
//! | Request                        | Response                   |
//! |--------------------------------|----------------------------|
//! | `PING`                         | `PONG`                     |
//! | `ECHO <text>`                  | `<text>`                   |
//! | `EMULATE_LONG_CALC_OP <secs>`  | `OK` after `<secs>` seconds |
//! | anything else                  | `ERR <reason>`             |

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use std::time::Duration;

/// The byte that terminates every request and response line
pub const DELIMITER: u8 = b'\n';

/// Request verbs
pub mod verb {
    pub const PING: &str = "PING";
    pub const ECHO: &str = "ECHO";
    pub const EMULATE_LONG_CALC_OP: &str = "EMULATE_LONG_CALC_OP";
}

/// A parsed request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Liveness check.
    /// Format: `PING\n`
    Ping,

    /// Returns the text unchanged.
    /// Format: `ECHO <text>\n`
    Echo(String),

    /// Occupies the serving worker for the given duration.
    /// Format: `EMULATE_LONG_CALC_OP <seconds>\n`
    EmulateLongComputation(Duration),
}

impl Request {
    /// Builds the payload for a long computation request.
    ///
    /// # Example
    /// ```
    /// use lifeline::protocol::Request;
    /// let payload = Request::emulate_long_computation(10);
    /// assert_eq!(&payload[..], b"EMULATE_LONG_CALC_OP 10\n");
    /// ```
    pub fn emulate_long_computation(seconds: u64) -> Bytes {
        Request::EmulateLongComputation(Duration::from_secs(seconds)).serialize()
    }

    /// Serializes the request, delimiter included.
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::new();
        match self {
            Request::Ping => buf.put_slice(verb::PING.as_bytes()),
            Request::Echo(text) => {
                buf.put_slice(verb::ECHO.as_bytes());
                buf.put_u8(b' ');
                buf.put_slice(text.as_bytes());
            }
            Request::EmulateLongComputation(duration) => {
                buf.put_slice(verb::EMULATE_LONG_CALC_OP.as_bytes());
                buf.put_slice(format!(" {}", duration.as_secs()).as_bytes());
            }
        }
        buf.put_u8(DELIMITER);
        buf.freeze()
    }
}

/// A response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Answer to `PING`
    Pong,
    /// Free text
    Text(String),
    /// Generic success
    Ok,
    /// Failure, sent as `ERR <message>`
    Error(String),
}

impl Response {
    /// Creates a new error response.
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error(message.into())
    }

    /// Serializes the response, delimiter included.
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::new();
        match self {
            Response::Pong => buf.put_slice(b"PONG"),
            Response::Text(text) => buf.put_slice(text.as_bytes()),
            Response::Ok => buf.put_slice(b"OK"),
            Response::Error(message) => {
                buf.put_slice(b"ERR ");
                buf.put_slice(message.as_bytes());
            }
        }
        buf.put_u8(DELIMITER);
        buf.freeze()
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Pong => write!(f, "PONG"),
            Response::Text(text) => write!(f, "{}", text),
            Response::Ok => write!(f, "OK"),
            Response::Error(message) => write!(f, "ERR {}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_requests() {
        assert_eq!(&Request::Ping.serialize()[..], b"PING\n");
        assert_eq!(
            &Request::Echo("hello there".into()).serialize()[..],
            b"ECHO hello there\n"
        );
        assert_eq!(
            &Request::emulate_long_computation(3)[..],
            b"EMULATE_LONG_CALC_OP 3\n"
        );
    }

    #[test]
    fn test_serialize_responses() {
        assert_eq!(&Response::Pong.serialize()[..], b"PONG\n");
        assert_eq!(&Response::Ok.serialize()[..], b"OK\n");
        assert_eq!(&Response::Text("abc".into()).serialize()[..], b"abc\n");
        assert_eq!(
            &Response::error("unknown command 'FOO'").serialize()[..],
            b"ERR unknown command 'FOO'\n"
        );
    }

    #[test]
    fn test_display_matches_wire_text() {
        let response = Response::error("bad");
        let wire = response.serialize();
        assert_eq!(format!("{}\n", response).as_bytes(), &wire[..]);
    }
}
