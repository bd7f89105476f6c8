//! CLI definitions using clap derive API
//!
//! This module is organized into submodules for each command's argument types:
//! - run: Run command arguments
//! - cache: Cache command arguments
//! - completions: Completions command arguments

use clap::builder::{Styles, styling::AnsiColor};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod cache;
pub mod completions;
pub mod run;

pub use cache::{CacheArgs, CacheSubcommand};
pub use completions::CompletionsArgs;
pub use run::RunArgs;

/// Default profile location inside the image
pub const DEFAULT_PROFILE: &str = "/etc/provisioner/profile.yaml";

/// Provisioner - idempotent container entrypoint
///
/// Waits for the database, installs the application once per version, reconciles its
/// configuration from the environment and hands off to the application.
#[derive(Parser, Debug)]
#[command(
    name = "provisioner",
    author,
    version,
    styles = Styles::styled()
        .header(AnsiColor::Green.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default().bold())
        .placeholder(AnsiColor::Cyan.on_default()),
    about = "Idempotent entrypoint for stateful application containers",
    long_about = "Provisioner prepares a stateful application on every container start: it waits \
                  for the database, runs one-time setup for the packaged version, rewrites \
                  configuration from the environment, optionally runs integration SQL, and then \
                  replaces itself with the application.",
    after_help = "\x1b[1m\x1b[32mExamples:\x1b[0m\n   \
                  provisioner run                          \x1b[90m# Provision, then exec the profile's command\x1b[0m\n   \
                  provisioner run -- apache2-foreground    \x1b[90m# Provision, then exec this command\x1b[0m\n   \
                  provisioner status                       \x1b[90m# Show installation state\x1b[0m\n   \
                  provisioner compose                      \x1b[90m# Print the integration SQL unit\x1b[0m\n\n\
                  "
)]
pub struct Cli {
    /// Profile describing the application bundle
    #[arg(
        long,
        short = 'p',
        global = true,
        env = "PROVISIONER_PROFILE",
        default_value = DEFAULT_PROFILE
    )]
    pub profile: PathBuf,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Provision the application and hand off to it
    Run(RunArgs),

    /// Wait for the database only
    Wait,

    /// Show installation and integration state
    Status,

    /// Print the composed integration unit without executing it
    Compose,

    /// Show or clear the application cache
    #[command(name = "cache")]
    Cache(CacheArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}
