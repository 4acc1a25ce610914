//! Doxygen tag extraction from comment blocks
//!
//! Each content line of a block is checked on its own. A marker has to be a
//! whole whitespace-delimited word: `@req`, `\req`, `@verify`, `\verify`,
//! `@def`, `\def`, `@file` or `\file`. Anything else starting with `@` or
//! `\` is ignored.

use crate::lexer::{CommentBlock, SourceLocation};
use facet::Facet;
use std::path::PathBuf;

/// Canonical meaning of a recognized tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Facet)]
#[repr(u8)]
pub enum Tag {
    /// `@file` / `\file`: labels the enclosing module
    File,
    /// `@req`, `\req`, `@verify`, `\verify`: the test verifies a requirement
    Requirement,
    /// `@def` / `\def`: descriptive metadata, never used for linking
    Definition,
}

impl Tag {
    /// Parse a marker word, returning the canonical tag
    pub fn parse(marker: &str) -> Option<Self> {
        match marker {
            "@req" | "\\req" | "@verify" | "\\verify" => Some(Tag::Requirement),
            "@def" | "\\def" => Some(Tag::Definition),
            "@file" | "\\file" => Some(Tag::File),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::File => "file",
            Tag::Requirement => "requirement",
            Tag::Definition => "definition",
        }
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized (tag, payload) pair extracted from a comment
///
/// Equality and ordering only look at the canonical content and where it
/// was found, so `@req x` and `\verify x` on the same line compare equal.
#[derive(Debug, Clone, Facet)]
pub struct Annotation {
    pub tag: Tag,
    pub payload: String,
    /// Location of the marker
    pub location: SourceLocation,
    /// Id of the originating [`CommentBlock`] within its file
    pub block: usize,
    /// The marker as written (e.g. `\verify`)
    pub marker: String,
}

impl Annotation {
    fn sort_key(&self) -> (&SourceLocation, usize, Tag, &str) {
        (&self.location, self.block, self.tag, &self.payload)
    }

    /// Whether two annotations carry the same tag and payload
    pub fn same_content(&self, other: &Annotation) -> bool {
        self.tag == other.tag && self.payload == other.payload
    }
}

impl PartialEq for Annotation {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl Eq for Annotation {}

impl PartialOrd for Annotation {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Annotation {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// Warning during tag extraction
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Facet)]
pub struct ParseWarning {
    /// Scan root of the file
    pub root: PathBuf,
    /// File where the warning occurred, relative to `root`
    pub file: PathBuf,
    /// Line number (1-indexed)
    pub line: usize,
    /// What kind of warning
    pub kind: WarningKind,
}

impl ParseWarning {
    /// The file on disk
    pub fn path(&self) -> PathBuf {
        self.root.join(&self.file)
    }
}

/// Types of parse warnings
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Facet)]
#[repr(u8)]
pub enum WarningKind {
    /// A requirement or definition marker with nothing after it
    MissingPayload(String),
    /// Block comment still open at end of file
    UnterminatedComment,
}

impl std::fmt::Display for WarningKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WarningKind::MissingPayload(marker) => write!(f, "`{}` without a payload", marker),
            WarningKind::UnterminatedComment => f.write_str("unterminated block comment"),
        }
    }
}

/// Annotations and warnings extracted from one block
#[derive(Debug, Clone, Default)]
pub struct Extracted {
    pub annotations: Vec<Annotation>,
    pub warnings: Vec<ParseWarning>,
}

/// Extract every recognized annotation from a comment block
pub fn extract_annotations(block: &CommentBlock) -> Extracted {
    let mut extracted = Extracted::default();

    for (line_no, line) in block.numbered_lines() {
        let words: Vec<(usize, &str)> = words_with_offsets(line).collect();

        for (idx, &(offset, word)) in words.iter().enumerate() {
            let Some(tag) = Tag::parse(word) else {
                continue;
            };

            let payload = match tag {
                Tag::File => words[idx + 1..]
                    .iter()
                    .take_while(|(_, w)| Tag::parse(w).is_none())
                    .map(|(_, w)| *w)
                    .collect::<Vec<_>>()
                    .join(" "),
                Tag::Requirement | Tag::Definition => match words.get(idx + 1) {
                    Some((_, next)) if Tag::parse(next).is_none() => next.trim().to_string(),
                    _ => {
                        extracted.warnings.push(ParseWarning {
                            root: block.start.root.clone(),
                            file: block.start.file.clone(),
                            line: line_no,
                            kind: WarningKind::MissingPayload(word.to_string()),
                        });
                        continue;
                    }
                },
            };

            // Columns are only meaningful on the first line of a block, where
            // the opener's position is known.
            let mut location = SourceLocation {
                line: line_no,
                column: None,
                ..block.start.clone()
            };
            if line_no == block.start.line {
                if let Some(column) = block.start.column {
                    location = location.with_column(column + block.style.opener().len() + offset);
                }
            }

            extracted.annotations.push(Annotation {
                tag,
                payload,
                location,
                block: block.id,
                marker: word.to_string(),
            });
        }
    }

    extracted
}

/// Whitespace-delimited words with their byte offsets
fn words_with_offsets(line: &str) -> impl Iterator<Item = (usize, &str)> {
    line.split(char::is_whitespace)
        .scan(0usize, |offset, word| {
            let start = *offset;
            *offset += word.len() + 1;
            Some((start, word))
        })
        .filter(|(_, word)| !word.is_empty())
}
