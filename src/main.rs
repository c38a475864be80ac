//! linkforge command-line entry point.
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use linkforge::cli::{Cli, Command, GlobalOpts};
use linkforge::commands;
use linkforge::logging::{self, Logger};

/// Install the subscriber and create the logger for `command`.
fn start_logging(global: &GlobalOpts, command: &str) -> Arc<Logger> {
    logging::init_subscriber(global.verbose, command);
    Arc::new(Logger::new(command))
}

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = Cli::parse();
    let name = args.command.name();

    match args.command {
        Command::Run(opts) => {
            let log = start_logging(&args.global, name);
            commands::run::run(&args.global, &opts, &log)
        }
        Command::Discover(opts) => {
            let log = start_logging(&args.global, name);
            commands::discover::run(&args.global, &opts, &log)
        }
        Command::Version => {
            commands::version::run();
            Ok(())
        }
    }
}
