use std::process::ExitCode;

use anyhow::{Result, bail};
use clap::Args;
use pulso_protocol::{IngestRequest, IngestResponse};

use crate::commands::{ConnectOptions, roundtrip};

#[derive(Debug, Args)]
pub struct StatusArgs {
    #[command(flatten)]
    pub connect: ConnectOptions,
}

pub fn run(args: StatusArgs) -> ExitCode {
    match execute(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("[error] {e:#}");
            ExitCode::from(2)
        }
    }
}

fn execute(args: StatusArgs) -> Result<ExitCode> {
    match roundtrip(&args.connect.addr, &IngestRequest::Status)? {
        IngestResponse::Status(report) => {
            println!("listen:          {}", report.listen_addr);
            println!("sink:            {}", report.sink_target);
            println!("points accepted: {}", report.points_accepted);
            println!("uptime:          {}s", report.uptime_secs);
            Ok(ExitCode::SUCCESS)
        }
        other => bail!("unexpected response to status: {other:?}"),
    }
}
