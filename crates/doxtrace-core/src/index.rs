//! Cross-file traceability index
//!
//! The index is an ordinary owned value. Per-file results are merged into it
//! one at a time through `&mut`, so whoever owns it is the single writer.
//! All maps are ordered, which makes merging order-independent and every
//! view deterministic.

use crate::associate::{OccurrenceKey, PerFileResult, TestOccurrence};
use crate::lexer::CommentBlock;
use crate::tags::{Annotation, ParseWarning, Tag};
use facet::Facet;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// A requirement identifier and the tests that verify it
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct Requirement {
    pub id: String,
    /// Sorted, deduplicated
    pub verified_by: Vec<OccurrenceKey>,
}

impl Requirement {
    fn new(id: String) -> Self {
        Self {
            id,
            verified_by: Vec::new(),
        }
    }

    fn add(&mut self, key: OccurrenceKey) {
        if let Err(pos) = self.verified_by.binary_search(&key) {
            self.verified_by.insert(pos, key);
        }
    }

    pub fn is_verified(&self) -> bool {
        !self.verified_by.is_empty()
    }
}

/// What kind of inconsistency a [`Conflict`] records
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Facet)]
#[repr(u8)]
pub enum ConflictKind {
    /// The same (file, test, line) was merged twice with different annotations
    DivergentOccurrence,
    /// One file defines the same test twice with different annotations
    DuplicateTestName,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::DivergentOccurrence => "divergent-occurrence",
            ConflictKind::DuplicateTestName => "duplicate-test-name",
        }
    }
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag and payload of an annotation, without its location
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Facet)]
pub struct AnnotationContent {
    pub tag: Tag,
    pub payload: String,
}

impl std::fmt::Display for AnnotationContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.tag, self.payload)
    }
}

fn content_of(occurrence: &TestOccurrence) -> Vec<AnnotationContent> {
    let mut content: Vec<AnnotationContent> = occurrence
        .annotations
        .iter()
        .map(|a| AnnotationContent {
            tag: a.tag,
            payload: a.payload.trim().to_string(),
        })
        .collect();
    content.sort();
    content.dedup();
    content
}

/// A detected inconsistency, recorded instead of failing the scan
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Facet)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub root: PathBuf,
    /// Relative to `root`
    pub file: PathBuf,
    pub test_id: String,
    pub first_line: usize,
    pub second_line: usize,
    pub first: Vec<AnnotationContent>,
    pub second: Vec<AnnotationContent>,
}

type Side<'a> = (usize, &'a [AnnotationContent]);

impl Conflict {
    /// Build a conflict between two scanned (line, content) sides of the test
    /// named by `key`; the pair is normalized so the result does not depend
    /// on which one was seen first.
    fn between(kind: ConflictKind, key: &OccurrenceKey, a: Side<'_>, b: Side<'_>) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Conflict {
            kind,
            root: key.root.clone(),
            file: key.file.clone(),
            test_id: key.test_id.clone(),
            first_line: first.0,
            second_line: second.0,
            first: first.1.to_vec(),
            second: second.1.to_vec(),
        }
    }

    /// The file on disk
    pub fn path(&self) -> PathBuf {
        self.root.join(&self.file)
    }
}

/// Requirements, test occurrences and everything that went wrong, across files
#[derive(Debug, Clone, Default)]
pub struct TraceabilityIndex {
    requirements: BTreeMap<String, Requirement>,
    occurrences: BTreeMap<OccurrenceKey, TestOccurrence>,
    /// Every distinct annotation set each occurrence was scanned with
    scanned: BTreeMap<OccurrenceKey, BTreeSet<Vec<AnnotationContent>>>,
    orphans: BTreeSet<Annotation>,
    malformed: BTreeMap<(PathBuf, PathBuf, usize), CommentBlock>,
    warnings: BTreeSet<ParseWarning>,
    conflicts: BTreeSet<Conflict>,
}

impl TraceabilityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one file's result (see [`merge_into`])
    pub fn merge(&mut self, result: PerFileResult) {
        for block in result.malformed {
            self.record_malformed(block);
        }
        self.warnings.extend(result.warnings);
        for orphan in result.orphans {
            self.record_orphan(orphan);
        }
        for occurrence in result.occurrences {
            let requirements: Vec<String> =
                occurrence.requirements().map(str::to_string).collect();
            let key = occurrence.key();
            self.record_occurrence(occurrence);
            for requirement in requirements {
                self.link(&requirement, &key);
            }
        }
    }

    /// Insert an occurrence
    ///
    /// A key collision with identical annotations is a no-op. With differing
    /// annotations a [`ConflictKind::DivergentOccurrence`] is recorded and the
    /// stored occurrence keeps the union of both annotation sets. Conflicts
    /// compare the annotation sets as scanned, never the union, so they do
    /// not depend on merge order.
    pub fn record_occurrence(&mut self, occurrence: TestOccurrence) {
        let key = occurrence.key();
        let content = content_of(&occurrence);

        let same_name = OccurrenceKey {
            line: 0,
            ..key.clone()
        }..=OccurrenceKey {
            line: usize::MAX,
            ..key.clone()
        };
        for (other, seen) in self.scanned.range(same_name) {
            let kind = if other.line == key.line {
                ConflictKind::DivergentOccurrence
            } else {
                ConflictKind::DuplicateTestName
            };
            for earlier in seen.iter().filter(|earlier| **earlier != content) {
                self.conflicts.insert(Conflict::between(
                    kind,
                    &key,
                    (other.line, earlier.as_slice()),
                    (key.line, content.as_slice()),
                ));
            }
        }

        if !self.scanned.entry(key.clone()).or_default().insert(content) {
            return;
        }

        match self.occurrences.get_mut(&key) {
            None => {
                self.occurrences.insert(key, occurrence);
            }
            Some(existing) => {
                for annotation in occurrence.annotations {
                    if !existing
                        .annotations
                        .iter()
                        .any(|a| a.same_content(&annotation))
                    {
                        existing.annotations.push(annotation);
                    }
                }
                existing.annotations.sort();
            }
        }
    }

    /// Record that `occurrence` verifies `requirement_id`
    pub fn record_requirement_link(&mut self, requirement_id: &str, occurrence: &TestOccurrence) {
        self.link(requirement_id, &occurrence.key());
    }

    fn link(&mut self, requirement_id: &str, key: &OccurrenceKey) {
        let id = requirement_id.trim();
        if id.is_empty() {
            return;
        }
        self.requirements
            .entry(id.to_string())
            .or_insert_with(|| Requirement::new(id.to_string()))
            .add(key.clone());
    }

    /// Make a requirement known without linking a test to it
    pub fn declare_requirement(&mut self, requirement_id: &str) {
        let id = requirement_id.trim();
        if id.is_empty() {
            return;
        }
        self.requirements
            .entry(id.to_string())
            .or_insert_with(|| Requirement::new(id.to_string()));
    }

    /// Record an annotation that found no test; orphaned requirement
    /// identifiers become known (unverified) requirements.
    pub fn record_orphan(&mut self, annotation: Annotation) {
        if annotation.tag == Tag::Requirement {
            self.declare_requirement(&annotation.payload);
        }
        self.orphans.insert(annotation);
    }

    pub fn record_malformed(&mut self, block: CommentBlock) {
        let key = (
            block.start.root.clone(),
            block.start.file.clone(),
            block.start.line,
        );
        self.malformed.insert(key, block);
    }

    pub fn requirement(&self, id: &str) -> Option<&Requirement> {
        self.requirements.get(id.trim())
    }

    pub fn requirements(&self) -> impl Iterator<Item = &Requirement> {
        self.requirements.values()
    }

    pub fn occurrences(&self) -> impl Iterator<Item = &TestOccurrence> {
        self.occurrences.values()
    }

    /// Test occurrences verifying a requirement
    pub fn tests_for(&self, requirement_id: &str) -> Vec<&TestOccurrence> {
        self.requirement(requirement_id)
            .map(|r| {
                r.verified_by
                    .iter()
                    .filter_map(|key| self.occurrences.get(key))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Requirement identifiers verified by one occurrence
    pub fn requirements_for(&self, key: &OccurrenceKey) -> Vec<&str> {
        self.requirements
            .values()
            .filter(|r| r.verified_by.binary_search(key).is_ok())
            .map(|r| r.id.as_str())
            .collect()
    }

    pub fn orphan_annotations(&self) -> impl Iterator<Item = &Annotation> {
        self.orphans.iter()
    }

    pub fn requirements_without_tests(&self) -> Vec<&Requirement> {
        self.requirements
            .values()
            .filter(|r| !r.is_verified())
            .collect()
    }

    pub fn tests_without_requirements(&self) -> Vec<&TestOccurrence> {
        self.occurrences
            .values()
            .filter(|o| !o.has_requirements())
            .collect()
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &Conflict> {
        self.conflicts.iter()
    }

    pub fn malformed_blocks(&self) -> impl Iterator<Item = &CommentBlock> {
        self.malformed.values()
    }

    /// Warnings, ordered by file and line
    pub fn warnings(&self) -> impl Iterator<Item = &ParseWarning> {
        self.warnings.iter()
    }

    /// Number of test occurrences
    pub fn len(&self) -> usize {
        self.occurrences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occurrences.is_empty()
    }
}

/// Merge one file's result into the index
///
/// Merging the same result twice leaves the index unchanged, and merging a
/// set of files in any order yields the same index.
pub fn merge_into(index: &mut TraceabilityIndex, result: PerFileResult) {
    index.merge(result);
}
