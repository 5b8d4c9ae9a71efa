use std::process::ExitCode;

use anyhow::{Result, bail};
use clap::Args;
use pulso_protocol::{IngestRequest, IngestResponse};

use crate::commands::{ConnectOptions, roundtrip};

#[derive(Debug, Args)]
pub struct PingArgs {
    #[command(flatten)]
    pub connect: ConnectOptions,
}

pub fn run(args: PingArgs) -> ExitCode {
    match execute(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("[error] {e:#}");
            ExitCode::from(2)
        }
    }
}

fn execute(args: PingArgs) -> Result<ExitCode> {
    match roundtrip(&args.connect.addr, &IngestRequest::Ping)? {
        IngestResponse::Pong => {
            println!("pong");
            Ok(ExitCode::SUCCESS)
        }
        other => bail!("unexpected response to ping: {other:?}"),
    }
}
