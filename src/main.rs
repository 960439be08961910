//! gokart CLI entry point.

use clap::Parser;
use gokart::check::builtin;
use gokart::cli::{self, Cli, Commands, EXIT_ERROR, EXIT_SUCCESS};
use gokart::{logging, shutdown};

fn main() {
    // `gokart _name ...` runs a built-in program instead of the CLI.
    if let Some(code) = builtin::dispatcher().run_from_env() {
        std::process::exit(code);
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(if e.use_stderr() { EXIT_ERROR } else { EXIT_SUCCESS });
        }
    };
    logging::init(cli.debug);
    if let Err(e) = shutdown::install() {
        log::warn!("signal handling unavailable: {}", e);
    }

    let task = cli.command.task();
    let result = match &cli.command {
        Commands::Amalgomate(args) => cli::run_amalgomate(args),
        Commands::Check(args) => cli::run_check(args),
        Commands::Test(args) => cli::run_test(args),
        Commands::Packages(args) => cli::run_packages(args),
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            if cli.debug {
                eprintln!("Error: {}: {:#}", task, e);
            } else {
                eprintln!("Error: {}: {}", task, e);
            }
            EXIT_ERROR
        }
    };

    std::process::exit(exit_code);
}
