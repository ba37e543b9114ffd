//! Line Protocol Implementation
//!
//! Requests and responses are single lines of text terminated by `\n`.
//! The delimiter is part of the payload contract and is never negotiated.
//!
//! ## Modules
//!
//! - `types`: Defines the `Request` and `Response` enums and serialization
//! - `parser`: Parser for incoming request lines
//!
//! ## Example
//!
//! ```
//! use lifeline::protocol::{parse_request, Request, Response};
//!
//! let request = parse_request(b"ECHO hello world\n").unwrap();
//! assert_eq!(request, Request::Echo("hello world".to_string()));
//!
//! let response = Response::Text("hello world".to_string());
//! assert_eq!(&response.serialize()[..], b"hello world\n");
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{parse_request, strip_delimiter, ParseError, ParseResult};
pub use types::{Request, Response, DELIMITER};
