//! Configuration
//!
//! Server and client settings plus the command-line parser for the
//! `lifeline` binary.

use crate::{DEFAULT_HOST, DEFAULT_PORT};
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroUsize;
use std::time::Duration;

/// Default fixed delay applied to every server request
pub const DEFAULT_SIMULATED_WORK: Duration = Duration::from_millis(500);

/// Default number of client worker threads
pub const DEFAULT_CLIENT_THREADS: usize = 4;

/// Errors from configuration and argument parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} requires a value")]
    MissingValue(&'static str),

    #[error("invalid value '{value}' for {flag}")]
    InvalidValue { flag: &'static str, value: String },

    #[error("unknown argument: {0}")]
    UnknownArgument(String),

    #[error("invalid host address: {0}")]
    InvalidHost(String),

    #[error("client mode needs at least one --request")]
    NoRequests,
}

/// Server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind to
    pub host: String,
    /// Port to listen on; 0 picks an ephemeral port
    pub port: u16,
    /// Worker thread count
    pub threads: usize,
    /// Delay spent on every request before it is executed
    pub simulated_work: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            threads: default_server_threads(),
            simulated_work: DEFAULT_SIMULATED_WORK,
        }
    }
}

impl ServerConfig {
    /// Resolves `host:port` into a socket address.
    pub fn bind_address(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidHost(self.host.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Twice the available parallelism, or 2 when it cannot be determined.
fn default_server_threads() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .map(|n| n * 2)
        .unwrap_or(2)
}

/// Client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Worker thread count
    pub threads: usize,
    /// Server to send requests to
    pub endpoint: SocketAddr,
    /// Request lines, without the delimiter
    pub requests: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            threads: DEFAULT_CLIENT_THREADS,
            endpoint: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            requests: Vec::new(),
        }
    }
}

/// What the binary was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Server(ServerConfig),
    Client(ClientConfig),
    Help,
    Version,
}

/// Parses command-line arguments, program name excluded.
///
/// With no subcommand the server is started with default settings.
pub fn parse_args<I, S>(args: I) -> Result<Command, ConfigError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut args = args.into_iter().map(Into::into).peekable();

    match args.peek().map(String::as_str) {
        Some("client") => {
            args.next();
            parse_client(args)
        }
        Some("server") => {
            args.next();
            parse_server(args)
        }
        _ => parse_server(args),
    }
}

fn parse_server(mut args: impl Iterator<Item = String>) -> Result<Command, ConfigError> {
    let mut config = ServerConfig::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--host" | "-h" => config.host = value(&mut args, "--host")?,
            "--port" | "-p" => config.port = parse_value(&mut args, "--port")?,
            "--threads" | "-t" => config.threads = parse_threads(&mut args)?,
            "--delay-ms" | "-d" => {
                config.simulated_work =
                    Duration::from_millis(parse_value(&mut args, "--delay-ms")?)
            }
            "--help" => return Ok(Command::Help),
            "--version" | "-v" => return Ok(Command::Version),
            _ => return Err(ConfigError::UnknownArgument(arg)),
        }
    }

    config.bind_address()?;
    Ok(Command::Server(config))
}

fn parse_client(mut args: impl Iterator<Item = String>) -> Result<Command, ConfigError> {
    let mut config = ClientConfig::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--endpoint" | "-e" => config.endpoint = parse_value(&mut args, "--endpoint")?,
            "--request" | "-r" => config.requests.push(value(&mut args, "--request")?),
            "--threads" | "-t" => config.threads = parse_threads(&mut args)?,
            "--help" => return Ok(Command::Help),
            "--version" | "-v" => return Ok(Command::Version),
            _ => return Err(ConfigError::UnknownArgument(arg)),
        }
    }

    if config.requests.is_empty() {
        return Err(ConfigError::NoRequests);
    }
    Ok(Command::Client(config))
}

fn value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ConfigError> {
    args.next().ok_or(ConfigError::MissingValue(flag))
}

fn parse_value<T: std::str::FromStr>(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<T, ConfigError> {
    let raw = value(args, flag)?;
    raw.parse()
        .map_err(|_| ConfigError::InvalidValue { flag, value: raw })
}

fn parse_threads(args: &mut impl Iterator<Item = String>) -> Result<usize, ConfigError> {
    let threads: NonZeroUsize = parse_value(args, "--threads")?;
    Ok(threads.get())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Command, ConfigError> {
        parse_args(args.iter().copied())
    }

    #[test]
    fn test_server_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3333);
        assert!(config.threads >= 2);
        assert_eq!(config.threads % 2, 0);
        assert_eq!(config.simulated_work, Duration::from_millis(500));
        assert_eq!(
            config.bind_address().unwrap(),
            "127.0.0.1:3333".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_no_arguments_starts_server() {
        assert_eq!(parse(&[]).unwrap(), Command::Server(ServerConfig::default()));
    }

    #[test]
    fn test_server_flags() {
        let command = parse(&[
            "server", "--host", "0.0.0.0", "--port", "4000", "--threads", "3", "--delay-ms", "0",
        ])
        .unwrap();

        assert_eq!(
            command,
            Command::Server(ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 4000,
                threads: 3,
                simulated_work: Duration::ZERO,
            })
        );
    }

    #[test]
    fn test_client_flags() {
        let command = parse(&[
            "client",
            "--endpoint",
            "10.0.0.1:9000",
            "-r",
            "PING",
            "--request",
            "ECHO hi",
        ])
        .unwrap();

        let Command::Client(config) = command else {
            panic!("expected client command");
        };
        assert_eq!(config.endpoint, "10.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.requests, vec!["PING", "ECHO hi"]);
        assert_eq!(config.threads, DEFAULT_CLIENT_THREADS);
    }

    #[test]
    fn test_client_without_requests() {
        assert_eq!(parse(&["client"]).unwrap_err(), ConfigError::NoRequests);
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(parse(&["--help"]).unwrap(), Command::Help);
        assert_eq!(parse(&["client", "-v"]).unwrap(), Command::Version);
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            parse(&["--port"]).unwrap_err(),
            ConfigError::MissingValue("--port")
        );
        assert_eq!(
            parse(&["--port", "http"]).unwrap_err(),
            ConfigError::InvalidValue {
                flag: "--port",
                value: "http".to_string()
            }
        );
        assert_eq!(
            parse(&["--threads", "0"]).unwrap_err(),
            ConfigError::InvalidValue {
                flag: "--threads",
                value: "0".to_string()
            }
        );
        assert_eq!(
            parse(&["--host", "localhost"]).unwrap_err(),
            ConfigError::InvalidHost("localhost".to_string())
        );
        assert_eq!(
            parse(&["--bogus"]).unwrap_err(),
            ConfigError::UnknownArgument("--bogus".to_string())
        );
    }
}
