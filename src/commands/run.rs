//! Run command: provision, then hand off

use std::path::Path;

use crate::cli::RunArgs;
use crate::commands::helpers::{block_on, connect, load_config};
use crate::common::display_utils::print_field;
use crate::database::Database;
use crate::error::Result;
use crate::handoff;
use crate::installer::{CommandSetup, InstallOutcome};
use crate::pipeline::{self, RunReport};

pub fn run(profile_path: &Path, args: RunArgs) -> Result<()> {
    let mut config = load_config(profile_path)?;

    // Resolve the hand-off before provisioning so a missing command fails fast
    let command = if args.no_exec {
        None
    } else {
        Some(handoff::resolve_command(&args.command, &config.profile.exec)?)
    };
    let setup = CommandSetup::from_profile(config.profile.install.as_ref());

    let report = block_on(async {
        let connection = connect(&config)?;
        let db = connection.as_ref().map(|(_, db)| db as &dyn Database);
        let report = pipeline::run(&mut config, db, &setup).await;
        if let Some((_, db)) = &connection {
            db.close().await;
        }
        report
    })??;

    let Some(command) = command else {
        print_summary(&report);
        return Ok(());
    };
    match handoff::exec(&command, &config.env)? {}
}

fn print_summary(report: &RunReport) {
    println!("Provisioning complete:");
    let install = match &report.install {
        InstallOutcome::Installed(marker) => format!("installed {}", marker.version),
        InstallOutcome::AlreadyInstalled(marker) => {
            format!("{} already installed", marker.version)
        }
    };
    print_field("Install:", install);
    if report.secrets_generated > 0 {
        print_field("Secrets generated:", report.secrets_generated);
    }

    let reconcile = &report.reconcile;
    if reconcile.file_skipped {
        print_field("Config file:", "missing, skipped");
    } else if !reconcile.file_updates.is_empty() {
        print_field("Config file:", reconcile.file_updates.join(", "));
    }
    if !reconcile.settings_written.is_empty() {
        print_field("Settings:", reconcile.settings_written.join(", "));
    }
    if let Some(base_url) = &reconcile.base_url {
        print_field("Base URL:", format!("{} ({})", base_url.url, base_url.change));
        if base_url.change.invalidates_cache() {
            print_field("Cache entries removed:", base_url.cache_entries_removed);
        }
    }
    print_field("Integration:", report.integration.label());
    if !reconcile.warnings.is_empty() {
        print_field("Warnings:", reconcile.warnings.len());
    }
}
