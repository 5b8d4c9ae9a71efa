use std::process::ExitCode;

use clap::Parser;

mod commands;

use commands::Command;
use pulso_runtime::logging;

#[derive(Debug, Parser)]
#[command(name = "pulso", version, about = "Pulso metrics bridge control tool")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

fn main() -> ExitCode {
    logging::init().ok();

    let cli = Cli::parse();
    match cli.command {
        Command::Publish(args) => commands::publish::run(args),
        Command::Ping(args) => commands::ping::run(args),
        Command::Status(args) => commands::status::run(args),
    }
}
