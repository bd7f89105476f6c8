//! Wait command: block until the database answers

use std::path::Path;

use crate::commands::helpers::{block_on, connect, load_config};
use crate::database::Database;
use crate::error::Result;
use crate::wait::wait_until_ready;

pub fn run(profile_path: &Path) -> Result<()> {
    let config = load_config(profile_path)?;
    let Some(database) = &config.profile.database else {
        println!("No database configured, nothing to wait for.");
        return Ok(());
    };
    let policy = database.wait;

    let attempts = block_on(async {
        let Some((target, db)) = connect(&config)? else {
            return Ok(0);
        };
        let result = wait_until_ready(&target, policy, || db.probe()).await;
        db.close().await;
        result
    })??;

    println!("Database ready after {attempts} attempt(s).");
    Ok(())
}
