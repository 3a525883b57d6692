//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests.

#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Test workspace
///
/// A temporary directory holding firmware files plus isolated config and
/// data directories for the binary under test.
pub struct TestWorkspace {
    /// Temporary directory for the workspace
    pub dir: TempDir,
}

impl TestWorkspace {
    /// Create a new workspace in a temporary directory
    pub fn new() -> Self {
        let workspace = Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        };
        std::fs::create_dir_all(workspace.config_dir()).expect("Failed to create config dir");
        std::fs::create_dir_all(workspace.data_dir()).expect("Failed to create data dir");
        workspace
    }

    /// Get the path to the workspace directory
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Isolated config directory
    pub fn config_dir(&self) -> PathBuf {
        self.dir.path().join("config")
    }

    /// Isolated data directory
    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    /// Reports written by the binary
    pub fn reports(&self) -> Vec<PathBuf> {
        let dir = self.data_dir().join("reports");
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut reports: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
        reports.sort();
        reports
    }

    /// Create a file in the workspace
    pub fn create_file(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// Write `config.toml` into the config directory
    pub fn write_config(&self, content: &str) {
        std::fs::write(self.config_dir().join("config.toml"), content)
            .expect("Failed to write config");
    }

    /// Create a zip archive with `(name, content)` entries
    pub fn create_zip(&self, name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
        let path = self.dir.path().join(name);
        write_zip(&path, entries);
        path
    }

    /// Create a tar archive with `(name, content)` entries
    pub fn create_tar(&self, name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
        let path = self.dir.path().join(name);
        let file = File::create(&path).expect("Failed to create tar");
        let mut builder = tar::Builder::new(file);
        for (entry, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, entry, *content)
                .expect("Failed to append tar entry");
        }
        builder.finish().expect("Failed to finish tar");
        path
    }

    /// Create an executable shell script standing in for a transport tool
    #[cfg(unix)]
    pub fn create_tool(&self, name: &str, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = self.create_file(&format!("bin/{name}"), script.as_bytes());
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("Failed to make tool executable");
        path
    }

    /// Run the romflash binary with isolated directories
    pub fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_romflash"))
            .current_dir(self.path())
            .env("ROMFLASH_CONFIG_DIR", self.config_dir())
            .env("ROMFLASH_DATA_DIR", self.data_dir())
            .env_remove("RUST_LOG")
            .args(args)
            .output()
            .expect("Failed to execute romflash")
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Write a zip archive with `(name, content)` entries
pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let file = File::create(path).expect("Failed to create zip");
    let mut zip = zip::ZipWriter::new(file);
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, content) in entries {
        zip.start_file(*name, options).expect("Failed to start zip entry");
        zip.write_all(content).expect("Failed to write zip entry");
    }
    zip.finish().expect("Failed to finish zip");
}

/// Standard output as text
pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Standard error as text
pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
