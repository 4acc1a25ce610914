//! Source providers feeding the traceability index
//!
//! Files are read and scanned independently (in parallel with the `parallel`
//! feature), then merged into the index one at a time in path order.

use crate::associate::{PerFileResult, ScanOptions, scan_file, scan_file_under};
use crate::index::TraceabilityIndex;
use eyre::{Result, WrapErr};
use facet::Facet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File extensions scanned for doxygen annotations
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "c",   // C
    "h",   // C headers
    "cpp", // C++
    "cc",  // C++
    "cxx", // C++
    "hpp", // C++ headers
    "hh",  // C++ headers
    "hxx", // C++ headers
    "ipp", // C++ inline implementations
];

/// Check if a file extension is supported for scanning
pub fn is_supported_extension(ext: &OsStr) -> bool {
    ext.to_str()
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e))
        .unwrap_or(false)
}

/// What to do when a file cannot be read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Facet)]
#[repr(u8)]
pub enum ReadFailurePolicy {
    /// Record the file as skipped and keep going
    #[default]
    Skip,
    /// Stop merging and return the error; files merged so far stay merged
    Abort,
}

impl std::str::FromStr for ReadFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip" => Ok(ReadFailurePolicy::Skip),
            "abort" => Ok(ReadFailurePolicy::Abort),
            _ => Err(format!("Unknown read failure policy: {}", s)),
        }
    }
}

/// A file left out of the scan
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Which files a scan looked at
#[derive(Debug, Clone, Default, PartialEq, Eq, Facet)]
pub struct ScanSummary {
    /// Files merged into the index (root joined with the relative path), in
    /// merge order
    pub scanned: Vec<PathBuf>,
    pub skipped: Vec<SkippedFile>,
}

/// Trait for providing source files to the traceability index
pub trait Sources {
    /// Scan every source and merge the results into `index`
    fn scan_into(self, index: &mut TraceabilityIndex, options: &ScanOptions)
    -> Result<ScanSummary>;
}

fn read_source(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// A file to scan: its scan root and its path relative to that root
type Candidate = (PathBuf, PathBuf);

fn read_and_scan(
    (root, file): &Candidate,
    options: &ScanOptions,
) -> std::io::Result<PerFileResult> {
    let content = read_source(&root.join(file))?;
    Ok(scan_file_under(root, file, &content, options))
}

/// Read and scan `candidates`, then merge in order
fn scan_paths(
    mut candidates: Vec<Candidate>,
    policy: ReadFailurePolicy,
    index: &mut TraceabilityIndex,
    options: &ScanOptions,
    summary: &mut ScanSummary,
) -> Result<()> {
    candidates.sort();
    candidates.dedup();

    #[cfg(feature = "parallel")]
    let results: Vec<(PathBuf, std::io::Result<PerFileResult>)> = {
        use rayon::prelude::*;

        candidates
            .into_par_iter()
            .map(|candidate| {
                let result = read_and_scan(&candidate, options);
                (candidate.0.join(&candidate.1), result)
            })
            .collect()
    };

    #[cfg(not(feature = "parallel"))]
    let results: Vec<(PathBuf, std::io::Result<PerFileResult>)> = candidates
        .into_iter()
        .map(|candidate| {
            let result = read_and_scan(&candidate, options);
            (candidate.0.join(&candidate.1), result)
        })
        .collect();

    for (path, result) in results {
        match result {
            Ok(result) => {
                index.merge(result);
                summary.scanned.push(path);
            }
            Err(err) => match policy {
                ReadFailurePolicy::Skip => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable file");
                    summary.skipped.push(SkippedFile {
                        path,
                        reason: err.to_string(),
                    });
                }
                ReadFailurePolicy::Abort => {
                    return Err(err).wrap_err_with(|| format!("Failed to read {}", path.display()));
                }
            },
        }
    }

    Ok(())
}

/// Sources from an explicit list of file paths
///
/// Paths have no scan root; each is recorded as given.
pub struct PathSources {
    paths: Vec<PathBuf>,
    on_read_error: ReadFailurePolicy,
}

impl PathSources {
    /// Create from an iterator of paths
    pub fn new(paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            on_read_error: ReadFailurePolicy::default(),
        }
    }

    pub fn on_read_error(mut self, policy: ReadFailurePolicy) -> Self {
        self.on_read_error = policy;
        self
    }
}

impl Sources for PathSources {
    fn scan_into(
        self,
        index: &mut TraceabilityIndex,
        options: &ScanOptions,
    ) -> Result<ScanSummary> {
        let candidates = self
            .paths
            .into_iter()
            .map(|path| (PathBuf::new(), path))
            .collect();
        let mut summary = ScanSummary::default();
        scan_paths(candidates, self.on_read_error, index, options, &mut summary)?;
        Ok(summary)
    }
}

/// In-memory sources (useful for testing)
pub struct MemorySources(Vec<(PathBuf, String)>);

impl MemorySources {
    /// Create empty memory sources
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Add a file with content
    pub fn add(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.0.push((path.into(), content.into()));
        self
    }
}

impl Default for MemorySources {
    fn default() -> Self {
        Self::new()
    }
}

impl Sources for MemorySources {
    fn scan_into(
        mut self,
        index: &mut TraceabilityIndex,
        options: &ScanOptions,
    ) -> Result<ScanSummary> {
        self.0.sort_by(|a, b| a.0.cmp(&b.0));
        let mut summary = ScanSummary::default();
        for (path, content) in self.0 {
            index.merge(scan_file(&path, &content, options));
            summary.scanned.push(path);
        }
        Ok(summary)
    }
}

/// Gitignore-aware walker over one or more scan roots
///
/// Files are recorded relative to the root they were found under, together
/// with that root, so the same relative file under two roots is two distinct
/// files. Unreadable directories and broken links met while walking are
/// handled by the read failure policy like unreadable files.
#[cfg(feature = "walk")]
pub struct WalkSources {
    roots: Vec<PathBuf>,
    include: Vec<String>,
    exclude: Vec<String>,
    on_read_error: ReadFailurePolicy,
}

#[cfg(feature = "walk")]
impl WalkSources {
    /// Create a walker for the given root directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            roots: vec![root.into()],
            include: Vec::new(),
            exclude: Vec::new(),
            on_read_error: ReadFailurePolicy::default(),
        }
    }

    /// Walk several roots
    pub fn roots(roots: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            include: Vec::new(),
            exclude: Vec::new(),
            on_read_error: ReadFailurePolicy::default(),
        }
    }

    /// Add another root
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.push(root.into());
        self
    }

    /// Add include patterns, relative to each root (e.g., `["**/*_test.cpp"]`)
    pub fn include(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.include.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Add exclude patterns, relative to each root (e.g., `["build/**"]`)
    pub fn exclude(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.exclude.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn on_read_error(mut self, policy: ReadFailurePolicy) -> Self {
        self.on_read_error = policy;
        self
    }

    /// Note a root or walk entry that could not be visited
    fn skip(&self, skipped: SkippedFile, list: &mut Vec<SkippedFile>) -> Result<()> {
        match self.on_read_error {
            ReadFailurePolicy::Skip => {
                warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipping");
                list.push(skipped);
                Ok(())
            }
            ReadFailurePolicy::Abort => {
                eyre::bail!("{}: {}", skipped.reason, skipped.path.display())
            }
        }
    }

    /// Collect candidate files from every root, plus what could not be walked
    fn collect(&self) -> Result<(Vec<Candidate>, Vec<SkippedFile>)> {
        use ignore::WalkBuilder;

        let include = build_glob_set(&self.include).wrap_err("Invalid include pattern")?;
        let exclude = build_glob_set(&self.exclude).wrap_err("Invalid exclude pattern")?;

        let mut files = Vec::new();
        let mut skipped = Vec::new();

        for root in &self.roots {
            if !root.exists() {
                let missing = SkippedFile {
                    path: root.clone(),
                    reason: "scan root not found".to_string(),
                };
                self.skip(missing, &mut skipped)?;
                continue;
            }

            let walker = WalkBuilder::new(root)
                .follow_links(true)
                .hidden(false)
                .git_ignore(true)
                .git_global(true)
                .git_exclude(true)
                .build();

            for entry in walker {
                let entry = match entry {
                    Ok(e) => e,
                    Err(err) => {
                        let unwalkable = SkippedFile {
                            path: walk_error_path(&err)
                                .map(Path::to_path_buf)
                                .unwrap_or_else(|| root.clone()),
                            reason: err.to_string(),
                        };
                        self.skip(unwalkable, &mut skipped)?;
                        continue;
                    }
                };
                if !entry.file_type().is_some_and(|t| t.is_file()) {
                    continue;
                }

                let path = entry.path();
                if path
                    .extension()
                    .is_none_or(|ext| !is_supported_extension(ext))
                {
                    continue;
                }

                let (file_root, relative) = split_under(path, root);
                let pattern_path = relative.to_string_lossy().replace('\\', "/");
                if !self.include.is_empty() && !include.is_match(&pattern_path) {
                    continue;
                }
                if exclude.is_match(&pattern_path) {
                    continue;
                }

                files.push((file_root, relative));
            }
        }

        debug!(
            roots = self.roots.len(),
            files = files.len(),
            skipped = skipped.len(),
            "collected source files"
        );
        Ok((files, skipped))
    }
}

#[cfg(feature = "walk")]
impl Sources for WalkSources {
    fn scan_into(
        self,
        index: &mut TraceabilityIndex,
        options: &ScanOptions,
    ) -> Result<ScanSummary> {
        let (files, skipped) = self.collect()?;
        let mut summary = ScanSummary {
            skipped,
            ..Default::default()
        };
        scan_paths(files, self.on_read_error, index, options, &mut summary)?;
        Ok(summary)
    }
}

/// Split a walked path into (scan root, path relative to it)
#[cfg(feature = "walk")]
fn split_under(path: &Path, root: &Path) -> (PathBuf, PathBuf) {
    match path.strip_prefix(root) {
        Ok(relative) if !relative.as_os_str().is_empty() => {
            (root.to_path_buf(), relative.to_path_buf())
        }
        // a root that is itself a file
        _ => {
            let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
            let name = path
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| path.to_path_buf());
            (parent, name)
        }
    }
}

/// The path a walk error is about, when it names one
#[cfg(feature = "walk")]
fn walk_error_path(err: &ignore::Error) -> Option<&Path> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path.as_path()),
        ignore::Error::Loop { child, .. } => Some(child.as_path()),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            walk_error_path(err)
        }
        _ => None,
    }
}

#[cfg(feature = "walk")]
fn build_glob_set(patterns: &[String]) -> Result<globset::GlobSet> {
    let mut builder = globset::GlobSetBuilder::new();
    for pattern in patterns {
        let glob = globset::GlobBuilder::new(&pattern.replace('\\', "/"))
            .literal_separator(true)
            .build()
            .wrap_err_with(|| format!("Bad glob: {}", pattern))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    const TESTS: &str = indoc! {"
        /// @req req-1a
        void test1a();
        BOOST_AUTO_TEST_CASE(test1a) {}
    "};

    fn write(root: &Path, relative: &str, content: &str) -> PathBuf {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported_extension(OsStr::new("cpp")));
        assert!(is_supported_extension(OsStr::new("h")));
        assert!(!is_supported_extension(OsStr::new("rs")));
        assert!(!is_supported_extension(OsStr::new("CPP")));
    }

    #[test]
    fn test_memory_sources() {
        let mut index = TraceabilityIndex::new();
        let summary = MemorySources::new()
            .add("b/test.cpp", TESTS)
            .add("a/test.cpp", TESTS)
            .scan_into(&mut index, &ScanOptions::default())
            .unwrap();

        assert_eq!(
            summary.scanned,
            vec![PathBuf::from("a/test.cpp"), PathBuf::from("b/test.cpp")]
        );
        assert_eq!(index.tests_for("req-1a").len(), 2);
        assert_eq!(index.conflicts().count(), 0);
    }

    #[test]
    fn test_path_sources_skip_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let good = write(dir.path(), "good.cpp", TESTS);
        let missing = dir.path().join("missing.cpp");

        let mut index = TraceabilityIndex::new();
        let summary = PathSources::new([good.clone(), missing.clone()])
            .scan_into(&mut index, &ScanOptions::default())
            .unwrap();

        assert_eq!(summary.scanned, vec![good]);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].path, missing);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_path_sources_abort_keeps_merged_files() {
        let dir = tempfile::tempdir().unwrap();
        let good = write(dir.path(), "a.cpp", TESTS);
        let missing = dir.path().join("b.cpp");
        let never = write(dir.path(), "c.cpp", "/// @req req-c\nBOOST_AUTO_TEST_CASE(c) {}\n");

        let mut index = TraceabilityIndex::new();
        let err = PathSources::new([never, missing, good])
            .on_read_error(ReadFailurePolicy::Abort)
            .scan_into(&mut index, &ScanOptions::default())
            .unwrap_err();

        assert!(format!("{:?}", err).contains("b.cpp"));
        assert!(index.requirement("req-1a").is_some());
        assert!(index.requirement("req-c").is_none());
    }

    #[test]
    fn test_read_failure_policy_from_str() {
        assert_eq!("skip".parse(), Ok(ReadFailurePolicy::Skip));
        assert_eq!("Abort".parse(), Ok(ReadFailurePolicy::Abort));
        assert!("ignore".parse::<ReadFailurePolicy>().is_err());
    }

    #[cfg(feature = "walk")]
    #[test]
    fn test_walk_multiple_roots_keeps_paths_distinct() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "one/test1-simplest.cpp", TESTS);
        write(dir.path(), "two/test1-simplest.cpp", TESTS);
        write(dir.path(), "two/notes.txt", "/// @req req-txt");

        let mut index = TraceabilityIndex::new();
        let summary = WalkSources::new(dir.path().join("one"))
            .with_root(dir.path().join("two"))
            .scan_into(&mut index, &ScanOptions::default())
            .unwrap();

        assert_eq!(summary.scanned.len(), 2);
        let tests = index.tests_for("req-1a");
        assert_eq!(tests.len(), 2);
        assert_eq!(tests[0].location.file, tests[1].location.file);
        assert_ne!(tests[0].location.root, tests[1].location.root);
        assert_eq!(tests[0].qualified_id(), tests[1].qualified_id());
        assert!(index.requirement("req-txt").is_none());
    }

    #[cfg(feature = "walk")]
    #[test]
    fn test_walk_records_paths_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("doxygen_tests");
        write(&root, "subdir/t.cpp", "/// @req r\nBOOST_AUTO_TEST_CASE(test3a) {}\n");

        let mut index = TraceabilityIndex::new();
        let summary = WalkSources::new(&root)
            .scan_into(&mut index, &ScanOptions::default())
            .unwrap();

        let test = index.tests_for("r")[0];
        assert_eq!(test.location.root, root);
        assert_eq!(test.location.file, PathBuf::from("subdir/t.cpp"));
        assert_eq!(test.qualified_id(), "subdir-t-cpp-test3a");
        assert_eq!(summary.scanned, vec![root.join("subdir/t.cpp")]);
    }

    #[cfg(feature = "walk")]
    #[test]
    fn test_walk_file_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), "only.cpp", TESTS);

        let mut index = TraceabilityIndex::new();
        WalkSources::new(&file)
            .scan_into(&mut index, &ScanOptions::default())
            .unwrap();

        let test = index.tests_for("req-1a")[0];
        assert_eq!(test.location.file, PathBuf::from("only.cpp"));
        assert_eq!(test.location.path(), file);
    }

    #[cfg(all(feature = "walk", unix))]
    #[test]
    fn test_walk_broken_symlink_is_skipped_or_aborts() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "good.cpp", TESTS);
        std::os::unix::fs::symlink(dir.path().join("gone.cpp"), dir.path().join("dangling.cpp"))
            .unwrap();

        let mut index = TraceabilityIndex::new();
        let summary = WalkSources::new(dir.path())
            .scan_into(&mut index, &ScanOptions::default())
            .unwrap();
        assert_eq!(summary.scanned, vec![dir.path().join("good.cpp")]);
        assert_eq!(summary.skipped.len(), 1);
        assert!(summary.skipped[0].path.ends_with("dangling.cpp"));
        assert_eq!(index.len(), 1);

        let mut index = TraceabilityIndex::new();
        let aborted = WalkSources::new(dir.path())
            .on_read_error(ReadFailurePolicy::Abort)
            .scan_into(&mut index, &ScanOptions::default());
        assert!(aborted.is_err());
        assert!(index.is_empty());
    }

    #[cfg(feature = "walk")]
    #[test]
    fn test_walk_include_exclude() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "unit/a.cpp", TESTS);
        write(dir.path(), "unit/skip/b.cpp", TESTS);
        write(dir.path(), "other/c.cpp", TESTS);

        let mut index = TraceabilityIndex::new();
        let summary = WalkSources::new(dir.path())
            .include(["unit/**/*.cpp"])
            .exclude(["unit/skip/**"])
            .scan_into(&mut index, &ScanOptions::default())
            .unwrap();

        assert_eq!(summary.scanned, vec![dir.path().join("unit/a.cpp")]);
    }

    #[cfg(feature = "walk")]
    #[test]
    fn test_walk_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");

        let mut index = TraceabilityIndex::new();
        let summary = WalkSources::new(&missing)
            .scan_into(&mut index, &ScanOptions::default())
            .unwrap();
        assert_eq!(summary.skipped[0].path, missing);

        let aborted = WalkSources::new(&missing)
            .on_read_error(ReadFailurePolicy::Abort)
            .scan_into(&mut index, &ScanOptions::default());
        assert!(aborted.is_err());
    }

    #[cfg(feature = "walk")]
    #[test]
    fn test_walk_bad_glob_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = TraceabilityIndex::new();
        let result = WalkSources::new(dir.path())
            .include(["unit/[.cpp"])
            .scan_into(&mut index, &ScanOptions::default());
        assert!(result.is_err());
    }
}
