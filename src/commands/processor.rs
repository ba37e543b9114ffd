//! Command Processor
//!
//! ## Supported Commands
//!
//! - `PING` - Test connection
//! - `ECHO text` - Echo text
//! - `EMULATE_LONG_CALC_OP seconds` - Block the serving worker, then reply `OK`

use crate::protocol::{parse_request, Request, Response};
use bytes::Bytes;
use std::time::Duration;
use tracing::{debug, trace};

/// Turns one request line into one response line.
///
/// Implementations may block; they run on an event-loop worker.
pub trait Processor: Send + Sync + 'static {
    /// Processes a request, delimiter included, and returns the full response.
    fn process(&self, request: &[u8]) -> Bytes;
}

impl<F> Processor for F
where
    F: Fn(&[u8]) -> Bytes + Send + Sync + 'static,
{
    fn process(&self, request: &[u8]) -> Bytes {
        self(request)
    }
}

/// Executes line-protocol commands.
#[derive(Debug, Clone, Default)]
pub struct CommandProcessor {
    /// Fixed delay spent on every request before it is executed
    simulated_work: Duration,
}

impl CommandProcessor {
    /// Creates a processor that answers immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a processor that spends `simulated_work` on every request.
    pub fn with_simulated_work(simulated_work: Duration) -> Self {
        Self { simulated_work }
    }

    /// Executes a parsed request.
    pub fn execute(&self, request: Request) -> Response {
        match request {
            Request::Ping => Response::Pong,
            Request::Echo(text) => Response::Text(text),
            Request::EmulateLongComputation(duration) => {
                debug!(seconds = duration.as_secs(), "Emulating long computation");
                std::thread::sleep(duration);
                Response::Ok
            }
        }
    }
}

impl Processor for CommandProcessor {
    fn process(&self, request: &[u8]) -> Bytes {
        if !self.simulated_work.is_zero() {
            std::thread::sleep(self.simulated_work);
        }

        let response = match parse_request(request) {
            Ok(request) => self.execute(request),
            Err(e) => {
                trace!(error = %e, "Rejected request");
                Response::error(e.to_string())
            }
        };
        response.serialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_ping() {
        let processor = CommandProcessor::new();
        assert_eq!(&processor.process(b"PING\n")[..], b"PONG\n");
    }

    #[test]
    fn test_echo() {
        let processor = CommandProcessor::new();
        assert_eq!(&processor.process(b"ECHO hi there\n")[..], b"hi there\n");
    }

    #[test]
    fn test_unknown_command() {
        let processor = CommandProcessor::new();
        assert_eq!(
            &processor.process(b"JUMP\n")[..],
            b"ERR unknown command 'JUMP'\n"
        );
    }

    #[test]
    fn test_long_computation_zero_seconds() {
        let processor = CommandProcessor::new();
        assert_eq!(&processor.process(b"EMULATE_LONG_CALC_OP 0\n")[..], b"OK\n");
    }

    #[test]
    fn test_simulated_work_delays_response() {
        let processor = CommandProcessor::with_simulated_work(Duration::from_millis(30));
        let started = Instant::now();
        assert_eq!(&processor.process(b"PING\n")[..], b"PONG\n");
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_closure_processor() {
        let upper = |request: &[u8]| Bytes::from(request.to_ascii_uppercase());
        assert_eq!(&upper.process(b"abc\n")[..], b"ABC\n");
    }
}
