//! Request Line Parser
//!
//! Turns one received line into a [`Request`].
//!
//! ## Rules
//!
//! 1. The trailing `\n` (and a `\r` before it, if present) is ignored.
//! 2. The verb is the first whitespace-separated word, matched case-insensitively.
//! 3. `ECHO` keeps the rest of the line verbatim, apart from the separating whitespace.
//! 4. `EMULATE_LONG_CALC_OP` takes exactly one non-negative integer (seconds).

use crate::protocol::types::{verb, Request, DELIMITER};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while parsing a request line.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// The line holds no verb
    #[error("empty request")]
    EmptyInput,

    /// The line is not valid UTF-8
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// The verb is not recognised
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    /// Wrong number of arguments for the verb
    #[error("wrong number of arguments for '{0}'")]
    WrongArity(&'static str),

    /// An argument could not be parsed as an integer
    #[error("invalid integer: {0}")]
    InvalidInteger(String),
}

/// Result type for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Removes the trailing delimiter, and a `\r` before it, from a line.
pub fn strip_delimiter(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(&[DELIMITER]).unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Parses a single request line.
///
/// The line may or may not still carry its delimiter.
pub fn parse_request(line: &[u8]) -> ParseResult<Request> {
    let line = std::str::from_utf8(strip_delimiter(line))
        .map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;

    let line = line.trim_start();
    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim_start()),
        None => (line, ""),
    };

    if name.is_empty() {
        return Err(ParseError::EmptyInput);
    }

    match name.to_ascii_uppercase().as_str() {
        verb::PING => {
            if !rest.is_empty() {
                return Err(ParseError::WrongArity(verb::PING));
            }
            Ok(Request::Ping)
        }
        verb::ECHO => {
            if rest.is_empty() {
                return Err(ParseError::WrongArity(verb::ECHO));
            }
            Ok(Request::Echo(rest.to_string()))
        }
        verb::EMULATE_LONG_CALC_OP => {
            let mut args = rest.split_whitespace();
            let (Some(seconds), None) = (args.next(), args.next()) else {
                return Err(ParseError::WrongArity(verb::EMULATE_LONG_CALC_OP));
            };
            let seconds: u64 = seconds
                .parse()
                .map_err(|_| ParseError::InvalidInteger(seconds.to_string()))?;
            Ok(Request::EmulateLongComputation(Duration::from_secs(seconds)))
        }
        _ => Err(ParseError::UnknownCommand(name.to_string())),
    }
}
