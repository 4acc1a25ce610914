//! Configuration schema for doxtrace
//!
//! Config lives at `.config/doxtrace/config.yaml` relative to the project root.
//!
//! ```yaml
//! roots:
//!   - test/doxy_tests
//!   - tests/data/doxygen_tests
//! exclude:
//!   - build/**
//! test_macros:
//!   - MY_TEST_CASE
//! lookahead: 2
//! on_read_error: skip
//! requirements:
//!   - req-1a
//!   - req-1b
//! ```

use doxtrace_core::{ReadFailurePolicy, ScanOptions};
use eyre::Result;
use facet::Facet;

/// Root configuration for doxtrace
#[derive(Debug, Clone, Default, Facet)]
pub struct Config {
    /// Directories (or files) to scan, relative to the project root.
    /// Defaults to the project root itself.
    #[facet(default)]
    pub roots: Vec<String>,

    /// Glob patterns a file must match, relative to its root
    #[facet(default)]
    pub include: Vec<String>,

    /// Glob patterns to exclude, relative to each root
    #[facet(default)]
    pub exclude: Vec<String>,

    /// Extra test-case macros, named by their first argument
    #[facet(default)]
    pub test_macros: Vec<String>,

    /// Code lines an annotation may precede its test by
    #[facet(default)]
    pub lookahead: Option<usize>,

    /// `skip` (default) or `abort`
    #[facet(default)]
    pub on_read_error: Option<String>,

    /// Requirement identifiers that are expected to be verified
    #[facet(default)]
    pub requirements: Vec<String>,
}

impl Config {
    /// Scan options from the config, with an optional lookahead override
    pub fn scan_options(&self, lookahead: Option<usize>) -> ScanOptions {
        let mut options = ScanOptions::default();
        if let Some(lookahead) = lookahead.or(self.lookahead) {
            options = options.with_lookahead(lookahead);
        }
        for name in &self.test_macros {
            options = options.with_test_macro(name.trim());
        }
        options
    }

    pub fn read_failure_policy(&self) -> Result<ReadFailurePolicy> {
        match &self.on_read_error {
            None => Ok(ReadFailurePolicy::default()),
            Some(value) => value.parse().map_err(|e: String| eyre::eyre!(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doxtrace_core::DEFAULT_LOOKAHEAD;

    #[test]
    fn test_default_scan_options() {
        let options = Config::default().scan_options(None);
        assert_eq!(options.lookahead, DEFAULT_LOOKAHEAD);
    }

    #[test]
    fn test_lookahead_override() {
        let config = Config {
            lookahead: Some(4),
            ..Default::default()
        };
        assert_eq!(config.scan_options(None).lookahead, 4);
        assert_eq!(config.scan_options(Some(3)).lookahead, 3);
        assert_eq!(config.scan_options(Some(0)).lookahead, 1);
    }

    #[test]
    fn test_extra_macros() {
        let config = Config {
            test_macros: vec!["MY_TEST".to_string()],
            ..Default::default()
        };
        let options = config.scan_options(None);
        assert!(options.test_macros.iter().any(|m| m.name == "MY_TEST"));
        assert!(
            options
                .test_macros
                .iter()
                .any(|m| m.name == "BOOST_AUTO_TEST_CASE")
        );
    }

    #[test]
    fn test_read_failure_policy() {
        assert_eq!(
            Config::default().read_failure_policy().unwrap(),
            ReadFailurePolicy::Skip
        );
        let config = Config {
            on_read_error: Some("abort".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.read_failure_policy().unwrap(),
            ReadFailurePolicy::Abort
        );
        let config = Config {
            on_read_error: Some("retry".to_string()),
            ..Default::default()
        };
        assert!(config.read_failure_policy().is_err());
    }
}
