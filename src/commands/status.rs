//! Status command: installation, integration and cache state

use std::path::Path;

use console::Style;

use crate::cache;
use crate::commands::helpers::load_config;
use crate::common::display_utils::print_field;
use crate::error::Result;
use crate::installer::secrets::secrets_path;
use crate::state::StateStore;

pub fn run(profile_path: &Path) -> Result<()> {
    let config = load_config(profile_path)?;
    let store = StateStore::new(&config.state_dir, config.component());
    let state = store.read(config.version())?;

    let label = if state.is_installed() {
        Style::new().green().apply_to(state.label())
    } else {
        Style::new().yellow().apply_to(state.label())
    };

    println!("{} {}", Style::new().bold().apply_to(config.component()), config.version());
    print_field("State:", label);
    print_field("State directory:", config.state_dir.display());

    if let Some(marker) = state.marker() {
        print_field("Installed at:", marker.installed_at.to_rfc3339());
        if let Some(record) = &marker.integration {
            print_field("Integrated at:", record.completed_at.to_rfc3339());
            print_field("Fragments:", record.fragments);
            print_field("Checksum:", &record.checksum);
        }
    }

    let others: Vec<String> = store
        .markers()?
        .into_iter()
        .filter(|m| m.version != config.version())
        .map(|m| m.version)
        .collect();
    if !others.is_empty() {
        print_field("Earlier versions:", others.join(", "));
    }

    if let Some(install) = &config.profile.install {
        if !install.secrets.is_empty() {
            let path = secrets_path(&config.state_dir, config.component());
            let stored = if path.is_file() { "stored" } else { "not generated yet" };
            print_field("Secrets:", format!("{} ({stored})", path.display()));
        }
    }

    if let Some(base_url) = &config.profile.base_url {
        let stats = cache::cache_stats(&base_url.cache_dir)?;
        let summary = if stats.exists {
            format!(
                "{} ({} files, {})",
                base_url.cache_dir.display(),
                stats.files,
                stats.formatted_size()
            )
        } else {
            format!("{} (missing)", base_url.cache_dir.display())
        };
        print_field("Cache:", summary);
    }

    Ok(())
}
