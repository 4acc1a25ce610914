//! Traceability report

use crate::associate::TestOccurrence;
use crate::index::{Conflict, TraceabilityIndex};
use crate::tags::{Annotation, ParseWarning};
use facet::Facet;
use std::path::PathBuf;

/// One test occurrence as it appears in the report
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct TestEntry {
    /// Scan root the file was found under
    pub root: PathBuf,
    /// Relative to `root`
    pub file: PathBuf,
    pub test_id: String,
    /// Path-and-name identifier, e.g. `subdir-test2-simplest-cpp-test3a`
    pub qualified_id: String,
    pub module: String,
    pub line: usize,
}

impl TestEntry {
    fn from_occurrence(occurrence: &TestOccurrence) -> Self {
        TestEntry {
            root: occurrence.location.root.clone(),
            file: occurrence.location.file.clone(),
            test_id: occurrence.test_id.clone(),
            qualified_id: occurrence.qualified_id(),
            module: occurrence.module.clone(),
            line: occurrence.location.line,
        }
    }

    /// The file on disk
    pub fn path(&self) -> PathBuf {
        self.root.join(&self.file)
    }
}

/// A requirement and the tests verifying it
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct RequirementEntry {
    pub id: String,
    pub tests: Vec<TestEntry>,
}

/// A comment block left open at end of file
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct MalformedEntry {
    pub root: PathBuf,
    /// Relative to `root`
    pub file: PathBuf,
    pub line: usize,
    /// Content recovered before end of file
    pub text: String,
}

impl MalformedEntry {
    /// The file on disk
    pub fn path(&self) -> PathBuf {
        self.root.join(&self.file)
    }
}

/// Traceability results for one scan
#[derive(Debug, Clone, Facet)]
pub struct TraceReport {
    /// Every known requirement, sorted by id
    pub requirements: Vec<RequirementEntry>,

    /// Requirements no test verifies
    pub unverified_requirements: Vec<String>,

    /// Test occurrences carrying no requirement
    pub untraced_tests: Vec<TestEntry>,

    /// Annotations that found no test
    pub orphans: Vec<Annotation>,

    pub conflicts: Vec<Conflict>,

    pub malformed: Vec<MalformedEntry>,

    pub warnings: Vec<ParseWarning>,
}

impl TraceReport {
    /// Number of distinct test occurrences in the report
    pub fn total_tests(&self) -> usize {
        let mut keys: Vec<(&PathBuf, &PathBuf, &str, usize)> = self
            .requirements
            .iter()
            .flat_map(|r| &r.tests)
            .chain(&self.untraced_tests)
            .map(|t| (&t.root, &t.file, t.test_id.as_str(), t.line))
            .collect();
        keys.sort();
        keys.dedup();
        keys.len()
    }

    /// Verified requirements, as a percentage of known ones (0.0 - 100.0)
    pub fn coverage_percent(&self) -> f64 {
        if self.requirements.is_empty() {
            return 100.0;
        }
        let verified = self.requirements.len() - self.unverified_requirements.len();
        (verified as f64 / self.requirements.len() as f64) * 100.0
    }

    /// Whether the scan is "passing" (no orphans or conflicts, >= threshold coverage)
    pub fn is_passing(&self, threshold: f64) -> bool {
        self.orphans.is_empty() && self.conflicts.is_empty() && self.coverage_percent() >= threshold
    }
}

/// Build the report; a pure function of the index
pub fn build_report(index: &TraceabilityIndex) -> TraceReport {
    let requirements = index
        .requirements()
        .map(|requirement| RequirementEntry {
            id: requirement.id.clone(),
            tests: index
                .tests_for(&requirement.id)
                .into_iter()
                .map(TestEntry::from_occurrence)
                .collect(),
        })
        .collect();

    let unverified_requirements = index
        .requirements_without_tests()
        .into_iter()
        .map(|r| r.id.clone())
        .collect();

    let untraced_tests = index
        .tests_without_requirements()
        .into_iter()
        .map(TestEntry::from_occurrence)
        .collect();

    let malformed = index
        .malformed_blocks()
        .map(|block| MalformedEntry {
            root: block.start.root.clone(),
            file: block.start.file.clone(),
            line: block.start.line,
            text: block.text(),
        })
        .collect();

    TraceReport {
        requirements,
        unverified_requirements,
        untraced_tests,
        orphans: index.orphan_annotations().cloned().collect(),
        conflicts: index.conflicts().cloned().collect(),
        malformed,
        warnings: index.warnings().cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::associate::{ScanOptions, scan_file};
    use crate::index::merge_into;
    use indoc::indoc;
    use std::path::Path;

    fn index_of(files: &[(&str, &str)]) -> TraceabilityIndex {
        let mut index = TraceabilityIndex::new();
        for (path, content) in files {
            merge_into(
                &mut index,
                scan_file(Path::new(path), content, &ScanOptions::default()),
            );
        }
        index
    }

    #[test]
    fn test_report_lists_requirements_with_tests() {
        let index = index_of(&[(
            "subdir/test2-simplest.cpp",
            indoc! {"
                /** \\file subdir/test2-simplest.cpp */
                /// \\verify req-3a
                BOOST_AUTO_TEST_CASE(test3a) {}
                //! \\verify req-3b
                BOOST_AUTO_TEST_CASE(test3b) {}
            "},
        )]);
        let report = build_report(&index);

        assert_eq!(report.requirements.len(), 2);
        let first = &report.requirements[0];
        assert_eq!(first.id, "req-3a");
        assert_eq!(
            first.tests,
            vec![TestEntry {
                root: PathBuf::new(),
                file: PathBuf::from("subdir/test2-simplest.cpp"),
                test_id: "test3a".to_string(),
                qualified_id: "subdir-test2-simplest-cpp-test3a".to_string(),
                module: "subdir/test2-simplest.cpp".to_string(),
                line: 3,
            }]
        );
        assert_eq!(report.total_tests(), 2);
        assert_eq!(report.coverage_percent(), 100.0);
        assert!(report.is_passing(100.0));
    }

    #[test]
    fn test_orphans_fail_the_report() {
        let index = index_of(&[
            ("a.cpp", "/// @req req-1\nBOOST_AUTO_TEST_CASE(t) {}\n"),
            ("b.cpp", "BOOST_AUTO_TEST_CASE(u) {}\n/// @req req-2\n"),
        ]);
        let report = build_report(&index);

        assert_eq!(report.unverified_requirements, vec!["req-2".to_string()]);
        assert_eq!(report.untraced_tests.len(), 1);
        assert_eq!(report.untraced_tests[0].test_id, "u");
        assert_eq!(report.orphans.len(), 1);
        assert_eq!(report.coverage_percent(), 50.0);
        assert!(!report.is_passing(0.0));
    }

    #[test]
    fn test_malformed_and_warnings_reported() {
        let index = index_of(&[("open.cpp", "/// @req\nBOOST_AUTO_TEST_CASE(t) {}\n/** @req r\n")]);
        let report = build_report(&index);

        assert_eq!(report.malformed.len(), 1);
        assert_eq!(report.malformed[0].line, 3);
        assert!(report.malformed[0].text.contains("@req r"));
        assert_eq!(report.warnings.len(), 2);
        assert_eq!(report.warnings[0].line, 1);
    }

    #[test]
    fn test_empty_index_is_fully_covered() {
        let report = build_report(&TraceabilityIndex::new());
        assert_eq!(report.coverage_percent(), 100.0);
        assert_eq!(report.total_tests(), 0);
        assert!(report.is_passing(100.0));
    }

    #[test]
    fn test_report_is_deterministic() {
        let files = [
            ("b.cpp", "/// @req r\nBOOST_AUTO_TEST_CASE(t) {}\n"),
            ("a.cpp", "/// @req r\nBOOST_AUTO_TEST_CASE(t) {}\n"),
        ];
        let mut reversed = files;
        reversed.reverse();

        let forward = build_report(&index_of(&files));
        let backward = build_report(&index_of(&reversed));
        assert_eq!(forward.requirements, backward.requirements);
        assert_eq!(forward.requirements[0].tests[0].file, PathBuf::from("a.cpp"));
    }
}
