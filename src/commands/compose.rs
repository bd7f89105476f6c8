//! Compose command: print the integration unit without executing it

use std::path::Path;

use console::Style;

use crate::commands::helpers::load_config;
use crate::error::Result;
use crate::integration::compose;

pub fn run(profile_path: &Path) -> Result<()> {
    let config = load_config(profile_path)?;
    let Some(integration) = &config.profile.integration else {
        eprintln!("No integration configured in this profile.");
        return Ok(());
    };

    let unit = compose(&config.env, &integration.fragment_prefix);
    let warning = Style::new().yellow();

    for variable in &unit.excluded {
        eprintln!(
            "{} {variable} is set but follows a gap in the numbering and will not run",
            warning.apply_to("warning:")
        );
    }
    if unit.is_empty() {
        eprintln!("No {}_<n> fragments are set.", integration.fragment_prefix);
        return Ok(());
    }

    eprintln!(
        "{} fragment(s), checksum {}",
        unit.fragments.len(),
        unit.checksum()
    );
    if !config.env.is_truthy(&integration.enabled_env) {
        eprintln!(
            "{} {} is not enabled; `run` would skip this unit",
            warning.apply_to("note:"),
            integration.enabled_env
        );
    }
    println!("{}", unit.sql());
    Ok(())
}
