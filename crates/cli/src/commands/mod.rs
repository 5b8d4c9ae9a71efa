pub mod ping;
pub mod publish;
pub mod status;

use std::net::TcpStream;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use pulso_protocol::codec::{read_frame, write_frame};
use pulso_protocol::{IngestRequest, IngestResponse};
use pulso_runtime::DEFAULT_LISTEN_ADDR;

pub use ping::PingArgs;
pub use publish::PublishArgs;
pub use status::StatusArgs;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Publish one metric sample to the daemon.
    ///
    /// Example:
    ///   pulso publish cpu --tag host=node-1 --field idle=97.5
    Publish(PublishArgs),

    /// Check that the daemon is alive.
    Ping(PingArgs),

    /// Show daemon status: listen address, sink target, points accepted.
    Status(StatusArgs),
}

#[derive(Debug, Args)]
pub struct ConnectOptions {
    /// Daemon ingest address (host:port)
    #[arg(long, default_value = DEFAULT_LISTEN_ADDR)]
    pub addr: String,
}

/// One request, one response, over a fresh connection.
pub fn roundtrip(addr: &str, request: &IngestRequest) -> Result<IngestResponse> {
    let mut stream = TcpStream::connect(addr)
        .with_context(|| format!("Failed to connect to daemon at {addr}. Is pulsod running?"))?;
    write_frame(&mut stream, request).context("Failed to send request")?;
    read_frame(&mut stream).context("Failed to read response")
}
