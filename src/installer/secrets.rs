//! Generated secret material
//!
//! Secrets the operator does not supply are generated once and persisted next to the
//! installation markers, so the setup command and every later start of the application
//! see the same values.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::common::fs::{read_optional, write_atomic};
use crate::config::{Environment, SecretSpec};
use crate::error::{Result, state};

pub fn secrets_path(state_dir: &Path, component: &str) -> PathBuf {
    state_dir.join(format!("{component}.secrets.json"))
}

fn generate(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Fill every secret variable in `env`, generating and persisting missing ones
///
/// Operator-supplied values always win and are never written to disk. Returns the number
/// of newly generated secrets.
pub fn ensure_secrets(path: &Path, specs: &[SecretSpec], env: &mut Environment) -> Result<usize> {
    if specs.is_empty() {
        return Ok(0);
    }

    let shown = path.display().to_string();
    let mut stored: BTreeMap<String, String> = match read_optional(path)? {
        Some(content) => {
            serde_json::from_str(&content).map_err(|e| state::read_failed(&shown, e))?
        }
        None => BTreeMap::new(),
    };

    let mut generated = 0;
    for spec in specs {
        if env.get(&spec.env).is_some() {
            continue;
        }
        let value = stored.entry(spec.env.clone()).or_insert_with(|| {
            generated += 1;
            generate(spec.length)
        });
        env.set(spec.env.clone(), value.clone());
    }

    if generated > 0 {
        // created with mode 0600; later rewrites keep the existing mode
        let json =
            serde_json::to_vec_pretty(&stored).map_err(|e| state::write_failed(&shown, e))?;
        write_atomic(path, &json)?;
        tracing::info!(count = generated, path = %shown, "generated secrets");
    }

    Ok(generated)
}
