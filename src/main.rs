//! Provisioner - idempotent container entrypoint
//!
//! Prepares a stateful application (LMS, ERP, CRM, survey tool, ...) on every container
//! start and then replaces itself with the application process.

use clap::Parser;
use miette::Diagnostic;

mod cache;
mod cli;
mod commands;
mod common;
mod config;
mod database;
mod error;
mod handoff;
mod installer;
mod integration;
mod logging;
mod pipeline;
mod reconcile;
mod state;
mod wait;

#[cfg(test)]
mod test_fixtures;

use cli::{Cli, Commands};
use error::ProvisionError;

fn report(err: &ProvisionError) {
    eprintln!("Error: {err}");
    if let Some(help) = err.help() {
        eprintln!("  help: {help}");
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = match cli.command {
        Commands::Run(args) => commands::run::run(&cli.profile, args),
        Commands::Wait => commands::wait::run(&cli.profile),
        Commands::Status => commands::status::run(&cli.profile),
        Commands::Compose => commands::compose::run(&cli.profile),
        Commands::Cache(args) => commands::cache::run(&cli.profile, args),
        Commands::Completions(args) => commands::completions::run(args),
    };

    if let Err(e) = result {
        report(&e);
        std::process::exit(1);
    }
}
