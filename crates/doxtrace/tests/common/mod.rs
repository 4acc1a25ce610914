//! Common test utilities.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

/// Get the path to the shared C++ fixtures.
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("doxtrace-core")
        .join("tests")
        .join("fixtures")
}

fn copy_tree(from: &Path, to: &Path) {
    std::fs::create_dir_all(to).expect("Failed to create dir");
    for entry in std::fs::read_dir(from).expect("Failed to read fixture dir") {
        let entry = entry.expect("Failed to read entry");
        let target = to.join(entry.file_name());
        if entry.file_type().expect("Failed to stat entry").is_dir() {
            copy_tree(&entry.path(), &target);
        } else {
            std::fs::copy(entry.path(), &target).expect("Failed to copy fixture");
        }
    }
}

/// Create a temporary project holding the fixture trees and a config file.
pub fn create_temp_project(config: &str) -> tempfile::TempDir {
    let temp = tempfile::tempdir().expect("Failed to create temp dir");

    copy_tree(&fixtures_dir().join("tree"), temp.path());
    copy_tree(&fixtures_dir().join("edge"), &temp.path().join("edge"));

    let config_dir = temp.path().join(".config/doxtrace");
    std::fs::create_dir_all(&config_dir).expect("Failed to create config dir");
    std::fs::write(config_dir.join("config.yaml"), config).expect("Failed to write config");

    temp
}
