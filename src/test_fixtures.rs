//! Test fixtures shared by the unit tests of several modules.
//!
//! - [`CountingSetup`]: a setup procedure that records how often it ran
//! - [`MemoryDatabase`]: an in-memory [`Database`] with switchable failures
//! - [`run_config`]: a [`RunConfig`] rooted in a temp directory

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::config::{Environment, Profile, RunConfig, STATE_DIR_ENV, SettingKey, SettingsProfile};
use crate::database::Database;
use crate::error::{Result, database};
use crate::installer::{SetupProcedure, SetupResult};

/// Setup procedure that counts its invocations
pub struct CountingSetup {
    calls: AtomicUsize,
    failure: Option<String>,
}

impl CountingSetup {
    pub fn succeeding() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failure: None,
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failure: Some(reason.to_string()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SetupProcedure for CountingSetup {
    async fn run(&self, _env: &Environment) -> SetupResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(reason) => Err(reason.clone()),
            None => Ok(()),
        }
    }
}

/// In-memory database
///
/// Settings rows are keyed by table and rendered key. Objects listed with
/// [`MemoryDatabase::creating`] become queryable once any script succeeds.
#[derive(Default)]
pub struct MemoryDatabase {
    settings: Mutex<BTreeMap<(String, String), String>>,
    scripts: Mutex<Vec<String>>,
    objects: Mutex<BTreeSet<String>>,
    script_objects: Vec<String>,
    unreachable_probes: AtomicU32,
    probes: AtomicU32,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_scripts: AtomicBool,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Objects that executing a script creates
    pub fn creating(objects: &[&str]) -> Self {
        Self {
            script_objects: objects.iter().map(|o| (*o).to_string()).collect(),
            ..Self::default()
        }
    }

    /// Fail the first `count` probes
    pub fn unreachable_for(self, count: u32) -> Self {
        self.unreachable_probes.store(count, Ordering::SeqCst);
        self
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_scripts(&self, fail: bool) {
        self.fail_scripts.store(fail, Ordering::SeqCst);
    }

    pub fn seed_setting(&self, settings: &SettingsProfile, key: &SettingKey, value: &str) {
        self.settings
            .lock()
            .unwrap()
            .insert((settings.table.clone(), key.to_string()), value.to_string());
    }

    pub fn setting(&self, settings: &SettingsProfile, key: &SettingKey) -> Option<String> {
        self.settings
            .lock()
            .unwrap()
            .get(&(settings.table.clone(), key.to_string()))
            .cloned()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }

    pub fn probes(&self) -> u32 {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn probe(&self) -> Result<()> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let remaining = self.unreachable_probes.load(Ordering::SeqCst);
        if remaining > 0 {
            self.unreachable_probes.store(remaining - 1, Ordering::SeqCst);
            return Err(database::error("connection refused"));
        }
        Ok(())
    }

    async fn fetch_setting(
        &self,
        settings: &SettingsProfile,
        key: &SettingKey,
    ) -> Result<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(database::error("lost connection during query"));
        }
        Ok(self.setting(settings, key))
    }

    async fn upsert_setting(
        &self,
        settings: &SettingsProfile,
        key: &SettingKey,
        value: &str,
    ) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(database::error("deadlock found when trying to get lock"));
        }
        self.seed_setting(settings, key, value);
        Ok(())
    }

    async fn execute_script(&self, script: &str) -> Result<()> {
        if self.fail_scripts.load(Ordering::SeqCst) {
            return Err(database::error("syntax error near 'CREAT'"));
        }
        self.scripts.lock().unwrap().push(script.to_string());
        self.objects
            .lock()
            .unwrap()
            .extend(self.script_objects.iter().cloned());
        Ok(())
    }

    async fn check_queryable(&self, object: &str) -> Result<()> {
        if self.objects.lock().unwrap().contains(object) {
            Ok(())
        } else {
            Err(database::error(format!("no such table: {object}")))
        }
    }
}

/// Build a [`RunConfig`] from YAML with the state directory inside `state_root`
pub fn run_config(yaml: &str, state_root: &Path, vars: &[(&str, &str)]) -> RunConfig {
    let profile = Profile::from_yaml(yaml).expect("profile should parse");
    let mut env = Environment::from_pairs(vars.iter().copied());
    env.set(STATE_DIR_ENV, state_root.to_str().expect("utf-8 temp path"));
    RunConfig::new(profile, env)
}
