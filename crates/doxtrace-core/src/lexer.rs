//! Comment tokenizer for doxygen-annotated C and C++ sources
//!
//! This module splits source text into doc comment blocks and code lines.
//! It recognizes the four doxygen comment openings (`///`, `//!`, `/*!`,
//! `/**`), consumes ordinary comments silently and never looks for comment
//! openers inside string, character or raw string literals.

use facet::Facet;
use std::collections::VecDeque;
use std::iter::Enumerate;
use std::path::{Path, PathBuf};
use std::str::Lines;

/// A position in a scanned source file
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Facet)]
pub struct SourceLocation {
    /// Scan root the file was found under; empty for paths given directly
    pub root: PathBuf,
    /// File path relative to `root`
    pub file: PathBuf,
    /// Line number (1-indexed)
    pub line: usize,
    /// Byte column (1-indexed), when known
    pub column: Option<usize>,
}

impl SourceLocation {
    pub fn new(file: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            root: PathBuf::new(),
            file: file.into(),
            line,
            column: None,
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_column(mut self, column: usize) -> Self {
        self.column = Some(column);
        self
    }

    /// The file on disk: `root` joined with `file`
    pub fn path(&self) -> PathBuf {
        self.root.join(&self.file)
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.path().display(), self.line)
    }
}

/// The doxygen comment syntax a block was written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Facet)]
#[repr(u8)]
pub enum CommentStyle {
    /// `/// ...`
    LineSlashSlashSlash,
    /// `//! ...`
    LineBangSlash,
    /// `/*! ... */`
    BlockSlashStarBang,
    /// `/** ... */`
    BlockStarStar,
}

impl CommentStyle {
    /// The opening delimiter of this style
    pub fn opener(&self) -> &'static str {
        match self {
            CommentStyle::LineSlashSlashSlash => "///",
            CommentStyle::LineBangSlash => "//!",
            CommentStyle::BlockSlashStarBang => "/*!",
            CommentStyle::BlockStarStar => "/**",
        }
    }

    fn line_style(comment: &str) -> Option<Self> {
        if comment.starts_with("////") {
            None
        } else if comment.starts_with("///") {
            Some(CommentStyle::LineSlashSlashSlash)
        } else if comment.starts_with("//!") {
            Some(CommentStyle::LineBangSlash)
        } else {
            None
        }
    }

    fn block_style(comment: &str) -> Option<Self> {
        if comment.starts_with("/**/") {
            None
        } else if comment.starts_with("/**") {
            Some(CommentStyle::BlockStarStar)
        } else if comment.starts_with("/*!") {
            Some(CommentStyle::BlockSlashStarBang)
        } else {
            None
        }
    }
}

impl std::fmt::Display for CommentStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.opener())
    }
}

/// One logical doc comment
///
/// Line `i` of [`CommentBlock::lines`] sits on source line `start.line + i`.
/// Block comment continuation lines have their leading `*` decoration
/// removed; the delimiters themselves are never part of the text.
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct CommentBlock {
    /// Index of this block within its file, in source order
    pub id: usize,
    pub style: CommentStyle,
    pub lines: Vec<String>,
    pub start: SourceLocation,
    /// Last source line covered by the block (1-indexed)
    pub end_line: usize,
    /// Set when a block comment reached end of file without `*/`
    pub malformed: bool,
}

impl CommentBlock {
    /// Content lines paired with their source line numbers
    pub fn numbered_lines(&self) -> impl Iterator<Item = (usize, &str)> {
        self.lines
            .iter()
            .enumerate()
            .map(|(i, line)| (self.start.line + i, line.as_str()))
    }

    /// Content joined with newlines
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// A line of code with comments and literal contents removed
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct CodeLine {
    /// Line number (1-indexed)
    pub line: usize,
    /// Trimmed code text. Literals are collapsed to `""` / `''`.
    pub text: String,
}

/// An item produced by the tokenizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Comment(CommentBlock),
    Code(CodeLine),
}

#[derive(Debug, Clone)]
enum Mode {
    Code,
    PlainBlock,
    DocBlock(CommentBlock),
    RawString { terminator: String },
}

/// Lazy token stream over one file
///
/// Cloning the stream restarts nothing: it forks the current position. Call
/// [`tokenize`] again to start from the top.
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    root: &'a Path,
    path: &'a Path,
    lines: Enumerate<Lines<'a>>,
    mode: Mode,
    /// Line comment block still collecting consecutive lines
    open_line_block: Option<CommentBlock>,
    queue: VecDeque<Token>,
    next_id: usize,
    done: bool,
}

/// Tokenize the full text of one file
pub fn tokenize<'a>(path: &'a Path, text: &'a str) -> Tokens<'a> {
    tokenize_under(Path::new(""), path, text)
}

/// Tokenize a file found under a scan root; `path` is relative to `root`
pub fn tokenize_under<'a>(root: &'a Path, path: &'a Path, text: &'a str) -> Tokens<'a> {
    Tokens {
        root,
        path,
        lines: text.lines().enumerate(),
        mode: Mode::Code,
        open_line_block: None,
        queue: VecDeque::new(),
        next_id: 0,
        done: false,
    }
}

impl Iterator for Tokens<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            if let Some(token) = self.queue.pop_front() {
                return Some(token);
            }
            if self.done {
                return None;
            }
            match self.lines.next() {
                Some((idx, line)) => self.scan_line(idx + 1, line),
                None => self.finish(),
            }
        }
    }
}

impl Tokens<'_> {
    fn new_block(&mut self, style: CommentStyle, line: usize, column: usize) -> CommentBlock {
        let id = self.next_id;
        self.next_id += 1;
        CommentBlock {
            id,
            style,
            lines: Vec::new(),
            start: SourceLocation::new(self.path, line)
                .with_root(self.root)
                .with_column(column),
            end_line: line,
            malformed: false,
        }
    }

    fn flush_line_block(&mut self) {
        if let Some(block) = self.open_line_block.take() {
            self.queue.push_back(Token::Comment(block));
        }
    }

    fn finish(&mut self) {
        self.flush_line_block();
        if let Mode::DocBlock(mut block) = std::mem::replace(&mut self.mode, Mode::Code) {
            block.malformed = true;
            self.queue.push_back(Token::Comment(block));
        }
        self.done = true;
    }

    fn scan_line(&mut self, line_no: usize, line: &str) {
        let bytes = line.as_bytes();
        let mut emitted: Vec<Token> = Vec::new();
        let mut code = String::new();
        let mut seen_code = false;
        let mut seen_comment = false;
        let mut line_doc: Option<(CommentStyle, usize, &str)> = None;
        let mut i = 0;

        loop {
            match &mut self.mode {
                Mode::DocBlock(block) => {
                    let rest = &line[i..];
                    let continuation = i == 0;
                    match rest.find("*/") {
                        Some(end) => {
                            push_block_line(block, &rest[..end], continuation, line_no);
                            if let Mode::DocBlock(block) =
                                std::mem::replace(&mut self.mode, Mode::Code)
                            {
                                emitted.push(Token::Comment(block));
                            }
                            seen_comment = true;
                            i += end + 2;
                        }
                        None => {
                            push_block_line(block, rest, continuation, line_no);
                            break;
                        }
                    }
                }
                Mode::PlainBlock => match line[i..].find("*/") {
                    Some(end) => {
                        self.mode = Mode::Code;
                        seen_comment = true;
                        i += end + 2;
                    }
                    None => break,
                },
                Mode::RawString { terminator } => match line[i..].find(terminator.as_str()) {
                    Some(end) => {
                        i += end + terminator.len();
                        self.mode = Mode::Code;
                    }
                    None => break,
                },
                Mode::Code => {
                    if i >= bytes.len() {
                        break;
                    }
                    let rest = &line[i..];
                    match bytes[i] {
                        b'"' => {
                            seen_code = true;
                            code.push_str("\"\"");
                            if let Some(terminator) = raw_string_terminator(line, i) {
                                // `"delim(` is as long as `)delim"`
                                let body = i + terminator.len();
                                match line[body..].find(terminator.as_str()) {
                                    Some(end) => i = body + end + terminator.len(),
                                    None => {
                                        self.mode = Mode::RawString { terminator };
                                        break;
                                    }
                                }
                            } else {
                                i = skip_quoted(bytes, i, b'"');
                            }
                        }
                        b'\'' if i == 0 || !bytes[i - 1].is_ascii_alphanumeric() => {
                            seen_code = true;
                            code.push_str("''");
                            i = skip_quoted(bytes, i, b'\'');
                        }
                        b'/' if rest.starts_with("//") => {
                            if !seen_code && !seen_comment {
                                if let Some(style) = CommentStyle::line_style(rest) {
                                    line_doc = Some((style, i + 1, &rest[3..]));
                                }
                            }
                            break;
                        }
                        b'/' if rest.starts_with("/*") => match CommentStyle::block_style(rest) {
                            Some(style) if !seen_code => {
                                let block = self.new_block(style, line_no, i + 1);
                                self.mode = Mode::DocBlock(block);
                                i += 3;
                            }
                            _ => {
                                self.mode = Mode::PlainBlock;
                                i += 2;
                            }
                        },
                        _ => {
                            let Some(ch) = rest.chars().next() else {
                                break;
                            };
                            if !ch.is_whitespace() {
                                seen_code = true;
                            }
                            code.push(ch);
                            i += ch.len_utf8();
                        }
                    }
                }
            }
        }

        if let Some((style, column, content)) = line_doc {
            if let Some(open) = self.open_line_block.as_mut() {
                if open.style == style && open.end_line + 1 == line_no {
                    open.lines.push(content.to_string());
                    open.end_line = line_no;
                    return;
                }
            }
            self.flush_line_block();
            let mut block = self.new_block(style, line_no, column);
            block.lines.push(content.to_string());
            self.open_line_block = Some(block);
            return;
        }

        self.flush_line_block();
        self.queue.extend(emitted);
        let code = code.trim();
        if !code.is_empty() {
            self.queue.push_back(Token::Code(CodeLine {
                line: line_no,
                text: code.to_string(),
            }));
        }
    }
}

fn push_block_line(block: &mut CommentBlock, segment: &str, continuation: bool, line_no: usize) {
    let text = if continuation {
        strip_decoration(segment)
    } else {
        segment
    };
    block.lines.push(text.to_string());
    block.end_line = line_no;
}

/// Strip the ` * ` decoration from a block comment continuation line
fn strip_decoration(segment: &str) -> &str {
    let trimmed = segment.trim_start();
    if trimmed.starts_with('*') {
        trimmed.trim_start_matches('*')
    } else {
        segment
    }
}

/// Position just past a quoted literal starting at `start`
///
/// An unterminated literal runs to end of line.
fn skip_quoted(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut j = start + 1;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 2,
            b if b == quote => return j + 1,
            _ => j += 1,
        }
    }
    bytes.len()
}

/// If the `"` at `quote` opens a C++ raw string, the `)delim"` that closes it
fn raw_string_terminator(line: &str, quote: usize) -> Option<String> {
    let bytes = line.as_bytes();
    let mut start = quote;
    while start > 0 && (bytes[start - 1].is_ascii_alphanumeric() || bytes[start - 1] == b'_') {
        start -= 1;
    }
    if !matches!(&line[start..quote], "R" | "LR" | "uR" | "UR" | "u8R") {
        return None;
    }
    let open = line[quote + 1..].find('(')?;
    let delimiter = &line[quote + 1..quote + 1 + open];
    if delimiter.len() > 16
        || delimiter
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '\\' | ')'))
    {
        return None;
    }
    Some(format!("){}\"", delimiter))
}
