//! doxtrace-core - Core library for requirement traceability
//!
//! This crate provides the building blocks for:
//! - Finding doxygen comment blocks in C and C++ test sources
//! - Extracting requirement tags (`@req`, `\verify`, `@def`, `@file`, ...)
//! - Binding each annotation to the test case it documents
//! - Merging per-file results into a cross-file traceability index
//! - Building a report of verified, unverified and orphaned requirements
//!
//! # Features
//!
//! - `walk` - Enable [`WalkSources`] for gitignore-aware directory walking (brings in `ignore` and `globset`)
//! - `parallel` - Enable parallel per-file scanning (brings in `rayon`)
//!
//! # Annotating Tests
//!
//! Any doxygen comment style works, and `@req`, `\req`, `@verify` and
//! `\verify` all mean the same thing. A forward declaration of the test
//! between the comment and the test is skipped:
//!
//! ```cpp
//! /// @req req-1a
//! void test1a();
//! BOOST_AUTO_TEST_CASE(test1a) { BOOST_CHECK(true); }
//!
//! /*! \verify req-4a */
//! BOOST_AUTO_TEST_CASE(test4a) { }
//! ```
//!
//! # Scanning a Single File
//!
//! ```
//! use doxtrace_core::{ScanOptions, TraceabilityIndex, merge_into, scan_file};
//! use std::path::Path;
//!
//! let source = "/// @req req-3a\nBOOST_AUTO_TEST_CASE(test3a) {}\n";
//! let result = scan_file(Path::new("subdir/test2.cpp"), source, &ScanOptions::default());
//! assert_eq!(result.occurrences.len(), 1);
//!
//! let mut index = TraceabilityIndex::new();
//! merge_into(&mut index, result);
//! assert_eq!(index.tests_for("req-3a")[0].test_id, "test3a");
//! ```
//!
//! # Scanning a Tree
//!
//! ```ignore
//! use doxtrace_core::{ScanOptions, Sources, TraceabilityIndex, WalkSources, build_report};
//!
//! let mut index = TraceabilityIndex::new();
//! WalkSources::new("test/doxy_tests")
//!     .with_root("tests/data/doxygen_tests")
//!     .exclude(["build/**"])
//!     .scan_into(&mut index, &ScanOptions::default())?;
//!
//! let report = build_report(&index);
//! println!("Coverage: {:.1}%", report.coverage_percent());
//! ```
//!
//! # In-Memory Sources (for testing)
//!
//! Use [`MemorySources`] when you don't want to hit the filesystem:
//!
//! ```
//! use doxtrace_core::{MemorySources, ScanOptions, Sources, TraceabilityIndex, build_report};
//!
//! let mut index = TraceabilityIndex::new();
//! MemorySources::new()
//!     .add("a.cpp", "/// @req req-1a\nBOOST_AUTO_TEST_CASE(test1a) {}\n")
//!     .add("b.cpp", "BOOST_AUTO_TEST_CASE(test1b) {}\n/// @req req-1b\n")
//!     .scan_into(&mut index, &ScanOptions::default())
//!     .unwrap();
//!
//! let report = build_report(&index);
//! assert_eq!(report.unverified_requirements, vec!["req-1b".to_string()]);
//! assert_eq!(report.orphans.len(), 1);
//! ```

mod anchor;
mod associate;
mod index;
mod lexer;
mod report;
mod sources;
mod tags;

pub use anchor::{
    Anchor, BOOST_TEST_MACROS, GTEST_MACROS, MacroShape, TestMacro, classify, default_test_macros,
};
pub use associate::{
    DEFAULT_LOOKAHEAD, OccurrenceKey, PerFileResult, ScanOptions, TestOccurrence, qualified_id,
    scan_file, scan_file_under,
};
pub use index::{
    AnnotationContent, Conflict, ConflictKind, Requirement, TraceabilityIndex, merge_into,
};
pub use lexer::{
    CodeLine, CommentBlock, CommentStyle, SourceLocation, Token, Tokens, tokenize, tokenize_under,
};
pub use report::{MalformedEntry, RequirementEntry, TestEntry, TraceReport, build_report};
pub use sources::{
    MemorySources, PathSources, ReadFailurePolicy, SUPPORTED_EXTENSIONS, ScanSummary,
    SkippedFile, Sources, is_supported_extension,
};
pub use tags::{Annotation, Extracted, ParseWarning, Tag, WarningKind, extract_annotations};

#[cfg(feature = "walk")]
pub use sources::WalkSources;
