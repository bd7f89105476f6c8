//! Cache command: show statistics or clear the application cache

use std::path::Path;

use crate::cache;
use crate::cli::{CacheArgs, CacheSubcommand};
use crate::commands::helpers::load_config;
use crate::error::Result;

pub fn run(profile_path: &Path, args: CacheArgs) -> Result<()> {
    let config = load_config(profile_path)?;
    let Some(base_url) = &config.profile.base_url else {
        println!("No cache directory configured in this profile.");
        return Ok(());
    };
    let dir = &base_url.cache_dir;

    match args.command {
        Some(CacheSubcommand::Clear) => {
            let removed = cache::clear(dir)?;
            println!("Removed {removed} entries from {}", dir.display());
        }
        None => {
            let stats = cache::cache_stats(dir)?;
            println!("Cache Statistics:");
            println!("  Location: {}", dir.display());
            if !stats.exists {
                println!("\nCache directory does not exist.");
                return Ok(());
            }
            println!("  Files: {}", stats.files);
            println!("  Directories: {}", stats.directories);
            println!("  Size: {}", stats.formatted_size());

            if stats.is_empty() {
                println!("\nCache is empty.");
            } else {
                println!("\nRun 'provisioner cache clear' to remove everything from cache.");
            }
        }
    }

    Ok(())
}
