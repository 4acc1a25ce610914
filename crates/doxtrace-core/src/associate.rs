//! Association of annotations with test-case definitions
//!
//! Annotated comment blocks wait for the next test-case definition. Every
//! code line after a block spends one unit of its lookahead budget; a block
//! whose budget runs out (or that is still waiting at end of file) is
//! orphaned.
//!
//! The first forward declaration after a block is held back instead of
//! spending budget. It stays free only if the definition that follows
//! declares the same identifier; otherwise it is charged like any other line
//! when the definition is reached. Declarations are never occurrences.

use crate::anchor::{Anchor, MacroShape, TestMacro, classify, default_test_macros};
use crate::lexer::{CommentBlock, SourceLocation, Token, tokenize_under};
use crate::tags::{Annotation, ParseWarning, Tag, WarningKind, extract_annotations};
use facet::Facet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default lookahead: the definition plus one unrelated code line, on top of
/// a matching forward declaration
pub const DEFAULT_LOOKAHEAD: usize = 2;

/// Knobs for the per-file scan
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Code lines an annotated block may wait for its test (minimum 1)
    pub lookahead: usize,
    /// Macros that introduce test-case definitions
    pub test_macros: Vec<TestMacro>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            lookahead: DEFAULT_LOOKAHEAD,
            test_macros: default_test_macros(),
        }
    }
}

impl ScanOptions {
    pub fn with_lookahead(mut self, lookahead: usize) -> Self {
        self.lookahead = lookahead.max(1);
        self
    }

    /// Add a test macro named by its first argument
    pub fn with_test_macro(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.test_macros.iter().any(|m| m.name == name) {
            self.test_macros.push(TestMacro::new(name, MacroShape::Name));
        }
        self
    }
}

/// Unique key of a test occurrence
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Facet)]
pub struct OccurrenceKey {
    pub root: PathBuf,
    /// Relative to `root`
    pub file: PathBuf,
    pub test_id: String,
    /// Line of the defining construct (1-indexed)
    pub line: usize,
}

impl std::fmt::Display for OccurrenceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} {}",
            self.root.join(&self.file).display(),
            self.line,
            self.test_id
        )
    }
}

/// A located test-case definition and the annotations bound to it
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct TestOccurrence {
    /// Test name (`Suite.Name` for GoogleTest-style macros)
    pub test_id: String,
    pub location: SourceLocation,
    /// Nearest preceding `@file` payload, else the file name
    pub module: String,
    /// The macro that defined the test
    pub macro_name: String,
    pub annotations: Vec<Annotation>,
}

impl TestOccurrence {
    pub fn key(&self) -> OccurrenceKey {
        OccurrenceKey {
            root: self.location.root.clone(),
            file: self.location.file.clone(),
            test_id: self.test_id.clone(),
            line: self.location.line,
        }
    }

    /// Identifiers of the requirements this test verifies, in source order
    pub fn requirements(&self) -> impl Iterator<Item = &str> {
        self.annotations
            .iter()
            .filter(|a| a.tag == Tag::Requirement)
            .map(|a| a.payload.trim())
    }

    pub fn has_requirements(&self) -> bool {
        self.requirements().next().is_some()
    }

    /// Flat identifier derived from the root-relative path and name, e.g.
    /// `subdir-test2-simplest-cpp-test3a`
    pub fn qualified_id(&self) -> String {
        qualified_id(&self.location.file, &self.test_id)
    }
}

/// Flatten a (root-relative) file path and test name into one identifier
pub fn qualified_id(file: &Path, test_id: &str) -> String {
    let path = file.to_string_lossy().replace('\\', "/");
    let path = path.trim_start_matches("./");
    format!("{}-{}", path.replace(['/', '.'], "-"), test_id)
}

/// Everything one file contributes to the index
#[derive(Debug, Clone, Default, PartialEq, Eq, Facet)]
pub struct PerFileResult {
    pub root: PathBuf,
    /// Relative to `root`
    pub file: PathBuf,
    /// Test-case definitions, annotated or not, in source order
    pub occurrences: Vec<TestOccurrence>,
    /// Every annotation found, including `@file` tags and orphans
    pub annotations: Vec<Annotation>,
    /// Annotations that found no test within their lookahead
    pub orphans: Vec<Annotation>,
    /// Block comments left open at end of file
    pub malformed: Vec<CommentBlock>,
    pub warnings: Vec<ParseWarning>,
}

struct Pending {
    annotations: Vec<Annotation>,
    budget: usize,
    /// Forward declaration seen since the block, not yet charged
    declared: Option<String>,
}

impl Pending {
    /// Spend one unit; true once the budget is gone
    fn spend(&mut self) -> bool {
        self.budget = self.budget.saturating_sub(1);
        self.budget == 0
    }

    /// Whether the held-back declaration names the test `test_id`
    /// (`Name` also matches `Suite.Name`)
    fn declaration_matches(&self, test_id: &str) -> bool {
        self.declared
            .as_deref()
            .is_none_or(|name| test_id.rsplit('.').next() == Some(name))
    }
}

/// Charge every pending block for one code line
///
/// A forward declaration is held back, uncharged, by blocks that have not
/// seen one yet.
fn advance(
    pending: &mut Vec<Pending>,
    orphans: &mut Vec<Annotation>,
    declaration: Option<&str>,
) {
    pending.retain_mut(|p| {
        if let (Some(name), None) = (declaration, &p.declared) {
            p.declared = Some(name.to_string());
            return true;
        }
        if p.spend() {
            orphans.append(&mut p.annotations);
            false
        } else {
            true
        }
    });
}

/// Scan one file given by its own path (no scan root)
///
/// Pure and deterministic: the same input always yields the same result.
pub fn scan_file(path: &Path, text: &str, options: &ScanOptions) -> PerFileResult {
    scan_file_under(Path::new(""), path, text, options)
}

/// Scan one file found under `root`; `path` is relative to `root`
pub fn scan_file_under(
    root: &Path,
    path: &Path,
    text: &str,
    options: &ScanOptions,
) -> PerFileResult {
    let mut result = PerFileResult {
        root: root.to_path_buf(),
        file: path.to_path_buf(),
        ..Default::default()
    };
    let file_module = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let mut module = file_module.clone();
    let lookahead = options.lookahead.max(1);
    let mut pending: Vec<Pending> = Vec::new();

    for token in tokenize_under(root, path, text) {
        match token {
            Token::Comment(block) => {
                let extracted = extract_annotations(&block);
                result.warnings.extend(extracted.warnings);

                let mut linked = Vec::new();
                for annotation in extracted.annotations {
                    if annotation.tag == Tag::File {
                        module = if annotation.payload.is_empty() {
                            file_module.clone()
                        } else {
                            annotation.payload.clone()
                        };
                    } else {
                        linked.push(annotation.clone());
                    }
                    result.annotations.push(annotation);
                }
                if !linked.is_empty() {
                    pending.push(Pending {
                        annotations: linked,
                        budget: lookahead,
                        declared: None,
                    });
                }

                if block.malformed {
                    result.warnings.push(ParseWarning {
                        root: root.to_path_buf(),
                        file: path.to_path_buf(),
                        line: block.start.line,
                        kind: WarningKind::UnterminatedComment,
                    });
                    result.malformed.push(block);
                }
            }
            Token::Code(code) => match classify(&code.text, &options.test_macros) {
                Anchor::TestCase { name, macro_name } => {
                    let mut annotations = Vec::new();
                    for mut p in pending.drain(..) {
                        // a declaration of some other function was an ordinary line
                        if !p.declaration_matches(&name) && p.spend() {
                            result.orphans.extend(p.annotations);
                        } else {
                            annotations.extend(p.annotations);
                        }
                    }
                    result.occurrences.push(TestOccurrence {
                        test_id: name,
                        location: SourceLocation::new(path, code.line).with_root(root),
                        module: module.clone(),
                        macro_name,
                        annotations,
                    });
                }
                Anchor::ForwardDeclaration { name } => {
                    advance(&mut pending, &mut result.orphans, Some(&name));
                }
                Anchor::Other => advance(&mut pending, &mut result.orphans, None),
            },
        }
    }

    result
        .orphans
        .extend(pending.into_iter().flat_map(|p| p.annotations));

    for orphan in &result.orphans {
        warn!(
            location = %orphan.location,
            marker = %orphan.marker,
            payload = %orphan.payload,
            "annotation is not followed by a test case"
        );
    }

    debug!(
        file = %path.display(),
        occurrences = result.occurrences.len(),
        orphans = result.orphans.len(),
        malformed = result.malformed.len(),
        "scanned file"
    );

    result
}
