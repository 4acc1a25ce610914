//! doxtrace library - Trace requirements to doxygen-annotated C++ tests
//!
//! This library exposes config loading and the scan driver of the
//! `doxtrace` binary for testing and embedding purposes.

pub mod config;
pub mod logging;
pub mod output;

use config::Config;
use doxtrace_core::{ScanSummary, Sources, TraceabilityIndex, WalkSources};
use eyre::{Result, WrapErr};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Config file location relative to the project root
pub const CONFIG_PATH: &str = ".config/doxtrace/config.yaml";

/// Project root for the current directory (see [`find_project_root_from`])
pub fn find_project_root() -> Result<PathBuf> {
    let current = std::env::current_dir().wrap_err("Failed to get current directory")?;
    Ok(find_project_root_from(&current))
}

/// Nearest ancestor holding `.config/doxtrace`, else the nearest holding
/// `.git`, else `start` itself
pub fn find_project_root_from(start: &Path) -> PathBuf {
    let config_dir = start
        .ancestors()
        .find(|dir| dir.join(".config/doxtrace").is_dir());
    let git_dir = || start.ancestors().find(|dir| dir.join(".git").exists());

    config_dir
        .or_else(git_dir)
        .unwrap_or(start)
        .to_path_buf()
}

pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        eyre::bail!(
            "Config file not found at {}\n\n\
             Create a config file listing the test trees to scan:\n\n\
             roots:\n  \
                 - test/doxy_tests\n\
             requirements:\n  \
                 - req-1a",
            path.display()
        );
    }

    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = facet_yaml::from_str(&content)
        .wrap_err_with(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(config)
}

/// Load config if it exists, otherwise return the default config.
/// A config file that exists but does not parse is still an error.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }
    load_config(path)
}

/// Resolve a configured root against the project root
///
/// Relative roots stay relative when the project root is the current
/// directory, so reported paths do not carry an absolute prefix.
pub fn resolve_root(project_root: &Path, current_dir: &Path, root: &str) -> PathBuf {
    let root = Path::new(root);
    if root.is_absolute() || project_root == current_dir {
        root.to_path_buf()
    } else {
        project_root.join(root)
    }
}

/// Scan roots for one invocation
///
/// Roots given on the command line (relative to the current directory) win
/// over roots from the config (relative to the project root). With neither,
/// the project root itself is scanned.
pub fn scan_roots(
    config: &Config,
    project_root: &Path,
    current_dir: &Path,
    cli_roots: &[PathBuf],
) -> Vec<PathBuf> {
    if !cli_roots.is_empty() {
        return cli_roots.to_vec();
    }
    if config.roots.is_empty() {
        let root = if project_root == current_dir {
            PathBuf::from(".")
        } else {
            project_root.to_path_buf()
        };
        return vec![root];
    }
    config
        .roots
        .iter()
        .map(|root| resolve_root(project_root, current_dir, root))
        .collect()
}

/// Walk `roots`, scan every C/C++ file and build the index
///
/// Requirements listed in the config are declared up front so that the
/// report shows them even when nothing mentions them.
pub fn build_index(
    config: &Config,
    roots: &[PathBuf],
    lookahead: Option<usize>,
) -> Result<(TraceabilityIndex, ScanSummary)> {
    let options = config.scan_options(lookahead);
    let policy = config.read_failure_policy()?;

    let mut index = TraceabilityIndex::new();
    for id in &config.requirements {
        index.declare_requirement(id);
    }

    let summary = WalkSources::roots(roots.iter().cloned())
        .include(config.include.iter().cloned())
        .exclude(config.exclude.iter().cloned())
        .on_read_error(policy)
        .scan_into(&mut index, &options)?;

    info!(
        files = summary.scanned.len(),
        skipped = summary.skipped.len(),
        tests = index.len(),
        "scan complete"
    );
    Ok((index, summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_root_prefers_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("project");
        let nested = project.join("tests/unit");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::create_dir_all(project.join(".config/doxtrace")).unwrap();

        assert_eq!(find_project_root_from(&nested), project);
    }

    #[test]
    fn test_project_root_falls_back_to_git() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();

        assert_eq!(find_project_root_from(&nested), dir.path().to_path_buf());
    }

    #[test]
    fn test_resolve_root() {
        let project = Path::new("/work/project");
        assert_eq!(
            resolve_root(project, project, "test/doxy_tests"),
            PathBuf::from("test/doxy_tests")
        );
        assert_eq!(
            resolve_root(project, Path::new("/work/project/sub"), "test/doxy_tests"),
            PathBuf::from("/work/project/test/doxy_tests")
        );
    }

    #[test]
    fn test_cli_roots_win() {
        let config = Config {
            roots: vec!["from-config".to_string()],
            ..Default::default()
        };
        let project = Path::new("/p");
        let cli = vec![PathBuf::from("from-cli")];
        assert_eq!(scan_roots(&config, project, project, &cli), cli);
        assert_eq!(
            scan_roots(&config, project, project, &[]),
            vec![PathBuf::from("from-config")]
        );
        assert_eq!(
            scan_roots(&Config::default(), project, project, &[]),
            vec![PathBuf::from(".")]
        );
    }

    #[test]
    fn test_load_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            indoc::indoc! {"
                roots:
                  - test/doxy_tests
                exclude:
                  - build/**
                lookahead: 3
                on_read_error: abort
                requirements:
                  - req-1a
            "},
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.roots, vec!["test/doxy_tests".to_string()]);
        assert_eq!(config.exclude, vec!["build/**".to_string()]);
        assert_eq!(config.lookahead, Some(3));
        assert_eq!(config.on_read_error.as_deref(), Some("abort"));
        assert_eq!(config.requirements, vec!["req-1a".to_string()]);
        assert!(config.include.is_empty());
    }

    #[test]
    fn test_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.yaml");
        assert!(load_config(&path).is_err());
        assert!(load_config_or_default(&path).unwrap().roots.is_empty());
    }

    #[test]
    fn test_build_index_declares_expected_requirements() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.cpp"),
            "/// @req req-1a\nBOOST_AUTO_TEST_CASE(test1a) {}\n",
        )
        .unwrap();
        let config = Config {
            requirements: vec!["req-1a".to_string(), "req-2".to_string()],
            ..Default::default()
        };

        let (index, summary) = build_index(&config, &[dir.path().to_path_buf()], None).unwrap();
        assert_eq!(summary.scanned.len(), 1);
        assert_eq!(index.tests_for("req-1a").len(), 1);
        assert_eq!(index.requirements_without_tests().len(), 1);
    }
}
