use std::process::ExitCode;

use clap::Parser;
use skinpaint::{cli, logger};

fn main() -> ExitCode {
    let args = cli::CliArgs::parse();

    // Initialize session log (overwrites previous session log)
    match &args.log {
        Some(path) => logger::init_at(path),
        None => logger::init(),
    }

    cli::run(args)
}
