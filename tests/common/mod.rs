//! Common test utilities for provisioner integration tests

#![allow(dead_code)]

use std::path::PathBuf;

use assert_cmd::Command;
use tempfile::TempDir;

/// A scratch directory standing in for a container's filesystem
pub struct TestWorkspace {
    /// Temporary directory
    pub temp: TempDir,
    /// Path to workspace root
    pub path: PathBuf,
}

impl TestWorkspace {
    /// Create a new test workspace
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let path = temp.path().to_path_buf();
        Self { temp, path }
    }

    /// Write a file in workspace
    pub fn write_file(&self, path: &str, content: &str) {
        let file_path = self.path.join(path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&file_path, content).expect("Failed to write file");
    }

    /// Read a file from workspace
    pub fn read_file(&self, path: &str) -> String {
        let file_path = self.path.join(path);
        std::fs::read_to_string(&file_path).expect("Failed to read file")
    }

    /// Check if a file exists in workspace
    pub fn file_exists(&self, path: &str) -> bool {
        self.path.join(path).exists()
    }

    /// Number of entries directly inside a workspace directory
    pub fn count_entries(&self, path: &str) -> usize {
        std::fs::read_dir(self.path.join(path))
            .expect("Failed to read directory")
            .count()
    }

    /// Write `profile.yaml`, replacing `{root}` with the workspace path
    pub fn write_profile(&self, template: &str) {
        let root = self.path.display().to_string();
        self.write_file("profile.yaml", &template.replace("{root}", &root));
    }
}

/// Command for the provisioner binary, pointed at the workspace's profile and state dir
#[allow(deprecated)]
pub fn provisioner_cmd(workspace: &TestWorkspace) -> Command {
    let mut cmd = Command::cargo_bin("provisioner").expect("provisioner binary");
    cmd.current_dir(&workspace.path)
        .arg("--profile")
        .arg(workspace.path.join("profile.yaml"))
        .env("PROVISIONER_STATE_DIR", workspace.path.join("state"))
        .env_remove("PROVISIONER_PROFILE")
        .env_remove("PROVISIONER_LOG")
        .env_remove("RUST_LOG");
    cmd
}
