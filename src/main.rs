//! Lifeline - request/response TCP server and cancellable client
//!
//! `lifeline server` serves the line protocol until Ctrl+C.
//! `lifeline client` sends each `--request` as its own request and reports
//! how each one ended.

use anyhow::Context;
use lifeline::config::{parse_args, ClientConfig, Command, ServerConfig};
use lifeline::{logging, Dispatcher, RequestError, RequestId, Server, DELIMITER};
use std::process::ExitCode;
use tracing::{error, info};

fn print_help() {
    println!(
        r#"
Lifeline - Request/Response TCP Server and Cancellable Client

USAGE:
    lifeline [server] [OPTIONS]
    lifeline client --request <LINE> [--request <LINE> ...] [OPTIONS]

SERVER OPTIONS:
    -h, --host <HOST>        Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>        Port to listen on (default: 3333)
    -t, --threads <N>        Worker threads (default: 2 x CPU count)
    -d, --delay-ms <MS>      Delay spent on every request (default: 500)

CLIENT OPTIONS:
    -e, --endpoint <ADDR>    Server address (default: 127.0.0.1:3333)
    -r, --request <LINE>     Request to send; repeat for more requests
    -t, --threads <N>        Worker threads (default: 4)

COMMON:
    -v, --version            Print version information
        --help               Print this help message

PROTOCOL:
    PING                     -> PONG
    ECHO <text>              -> <text>
    EMULATE_LONG_CALC_OP <s> -> OK after <s> seconds

EXAMPLES:
    lifeline server --port 3333 --delay-ms 0
    lifeline client -r PING -r "ECHO hello" -r "EMULATE_LONG_CALC_OP 2"
"#
    );
}

fn print_banner(config: &ServerConfig, addr: std::net::SocketAddr) {
    println!(
        r#"
Lifeline v{}
──────────────────────────────────────────────────────────────
Server started on {}
Worker threads: {}, delay per request: {} ms
Ready to accept connections.

Use Ctrl+C to stop.
"#,
        lifeline::VERSION,
        addr,
        config.threads,
        config.simulated_work.as_millis()
    );
}

fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let server = Server::start(&config).context("failed to start server")?;
    print_banner(&config, server.local_addr());

    let signals = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build signal runtime")?;
    signals
        .block_on(tokio::signal::ctrl_c())
        .context("failed to listen for Ctrl+C")?;

    info!("Shutdown signal received, stopping server...");
    server.stop();
    info!("Server shutdown complete");
    Ok(())
}

fn report(id: RequestId, result: Result<String, RequestError>) {
    match result {
        Ok(response) => info!("Request #{} has completed. Response: {}", id, response),
        Err(RequestError::Cancelled) => info!("Request #{} has been cancelled by the user.", id),
        Err(e) => error!("Request #{} failed! Error message: {}", id, e),
    }
}

fn run_client(config: ClientConfig) -> anyhow::Result<()> {
    let client = Dispatcher::with_config(&config).context("failed to start client")?;

    for (id, line) in (1..).zip(&config.requests) {
        let mut payload = line.clone().into_bytes();
        payload.push(DELIMITER);
        client
            .submit(config.endpoint, payload, id, report)
            .with_context(|| format!("failed to submit request #{id}"))?;
    }

    client.shutdown();
    Ok(())
}

fn main() -> ExitCode {
    let command = match parse_args(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {e}");
            print_help();
            return ExitCode::FAILURE;
        }
    };

    let result = match command {
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Version => {
            println!("Lifeline version {}", lifeline::VERSION);
            Ok(())
        }
        Command::Server(config) => {
            logging::init(logging::default_level());
            run_server(config)
        }
        Command::Client(config) => {
            logging::init(logging::default_level());
            run_client(config)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
