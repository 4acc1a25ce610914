//! Output formatting for traceability reports

use doxtrace_core::{RequirementEntry, ScanSummary, TestEntry, TraceReport};
use eyre::Result;
use facet::Facet;
use owo_colors::OwoColorize;

/// Output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Markdown,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            "markdown" | "md" => Some(Self::Markdown),
            _ => None,
        }
    }
}

/// Render a traceability report in the specified format
pub fn render_report(
    report: &TraceReport,
    summary: &ScanSummary,
    threshold: f64,
    format: OutputFormat,
    verbose: bool,
) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(report, summary, verbose)),
        OutputFormat::Json => render_json(report, summary, threshold),
        OutputFormat::Markdown => Ok(render_markdown(report, summary, verbose)),
    }
}

/// Render the tests verifying one requirement
pub fn render_query(entry: &RequirementEntry, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let json = JsonRequirement {
                id: entry.id.clone(),
                tests: entry.tests.iter().map(JsonTest::from_entry).collect(),
            };
            to_json(&json)
        }
        OutputFormat::Markdown => {
            let mut output = format!("# `{}`\n\n", entry.id);
            if entry.tests.is_empty() {
                output.push_str("Not verified by any test.\n");
            }
            for test in &entry.tests {
                output.push_str(&format!(
                    "- `{}` ({}) at `{}:{}`\n",
                    test.test_id,
                    test.module,
                    test.path().display(),
                    test.line
                ));
            }
            Ok(output)
        }
        OutputFormat::Text => {
            let mut output = format!("{} {}\n", "##".bold(), entry.id.cyan().bold());
            if entry.tests.is_empty() {
                output.push_str(&format!("  {} not verified by any test\n", "?".yellow()));
            }
            for test in &entry.tests {
                output.push_str(&format!("  {} {}\n", "✓".green(), test_line(test)));
            }
            Ok(output)
        }
    }
}

fn test_line(test: &TestEntry) -> String {
    format!(
        "{} {}",
        test.test_id,
        format!("{}:{} ({})", test.path().display(), test.line, test.module).dimmed()
    )
}

fn render_text(report: &TraceReport, summary: &ScanSummary, verbose: bool) -> String {
    let mut output = String::new();

    output.push('\n');
    output.push_str(&format!("{} Traceability Report\n", "##".bold()));
    output.push('\n');

    let percent = report.coverage_percent();
    let percent_str = format!("{:.1}%", percent);
    let color_percent = if percent >= 80.0 {
        percent_str.green().to_string()
    } else if percent >= 50.0 {
        percent_str.yellow().to_string()
    } else {
        percent_str.red().to_string()
    };

    let verified = report.requirements.len() - report.unverified_requirements.len();
    output.push_str(&format!(
        "Coverage: {} ({}/{} requirements)\n",
        color_percent,
        verified,
        report.requirements.len()
    ));
    output.push_str(&format!(
        "  {}\n",
        format!(
            "{} tests in {} files, {} untraced",
            report.total_tests(),
            summary.scanned.len(),
            report.untraced_tests.len()
        )
        .dimmed()
    ));
    output.push('\n');

    if !report.conflicts.is_empty() {
        output.push_str(&format!(
            "{} Conflicts ({}):\n",
            "!".red().bold(),
            report.conflicts.len()
        ));
        for c in &report.conflicts {
            output.push_str(&format!(
                "  {} {}:{} and :{} - {} `{}`\n",
                "-".red(),
                c.path().display(),
                c.first_line,
                c.second_line,
                c.kind.as_str().dimmed(),
                c.test_id.yellow()
            ));
        }
        output.push('\n');
    }

    if !report.orphans.is_empty() {
        output.push_str(&format!(
            "{} Orphaned Annotations ({}):\n",
            "!".red().bold(),
            report.orphans.len()
        ));
        for a in &report.orphans {
            output.push_str(&format!(
                "  {} {} - {} {} has no test\n",
                "-".red(),
                a.location,
                a.marker.dimmed(),
                a.payload.yellow()
            ));
        }
        output.push('\n');
    }

    if !report.malformed.is_empty() {
        output.push_str(&format!(
            "{} Unterminated Comments ({}):\n",
            "!".yellow().bold(),
            report.malformed.len()
        ));
        for m in &report.malformed {
            output.push_str(&format!(
                "  {} {}:{}\n",
                "-".yellow(),
                m.path().display(),
                m.line
            ));
        }
        output.push('\n');
    }

    if !report.unverified_requirements.is_empty() {
        output.push_str(&format!(
            "{} Unverified Requirements ({}):\n",
            "?".yellow().bold(),
            report.unverified_requirements.len()
        ));
        for id in &report.unverified_requirements {
            output.push_str(&format!("  {} {}\n", "-".yellow(), id.dimmed()));
        }
        output.push('\n');
    }

    if !summary.skipped.is_empty() {
        output.push_str(&format!(
            "{} Skipped Files ({}):\n",
            "?".yellow().bold(),
            summary.skipped.len()
        ));
        for s in &summary.skipped {
            output.push_str(&format!(
                "  {} {} ({})\n",
                "-".yellow(),
                s.path.display(),
                s.reason.dimmed()
            ));
        }
        output.push('\n');
    }

    if verbose {
        if !report.warnings.is_empty() {
            output.push_str(&format!(
                "{} Warnings ({}):\n",
                "?".yellow().bold(),
                report.warnings.len()
            ));
            for w in &report.warnings {
                output.push_str(&format!(
                    "  {} {}:{} - {}\n",
                    "-".yellow(),
                    w.path().display(),
                    w.line,
                    w.kind
                ));
            }
            output.push('\n');
        }

        if !report.untraced_tests.is_empty() {
            output.push_str(&format!(
                "{} Untraced Tests ({}):\n",
                "~".bold(),
                report.untraced_tests.len()
            ));
            for t in &report.untraced_tests {
                output.push_str(&format!("  {} {}\n", "-".dimmed(), test_line(t)));
            }
            output.push('\n');
        }

        for r in report.requirements.iter().filter(|r| !r.tests.is_empty()) {
            output.push_str(&format!("  [{}] ({} tests)\n", r.id.green(), r.tests.len()));
            for t in &r.tests {
                output.push_str(&format!("      {}\n", test_line(t)));
            }
        }
        output.push('\n');
    }

    output
}

#[derive(Facet)]
struct JsonReport {
    passing: bool,
    coverage_percent: f64,
    total_requirements: usize,
    verified_requirements: usize,
    total_tests: usize,
    scanned_files: usize,
    requirements: Vec<JsonRequirement>,
    unverified_requirements: Vec<String>,
    untraced_tests: Vec<JsonTest>,
    orphans: Vec<JsonAnnotation>,
    conflicts: Vec<JsonConflict>,
    malformed: Vec<JsonLocation>,
    warnings: Vec<JsonWarning>,
    skipped: Vec<JsonSkipped>,
}

#[derive(Facet)]
struct JsonRequirement {
    id: String,
    tests: Vec<JsonTest>,
}

#[derive(Facet)]
struct JsonTest {
    root: String,
    /// Relative to `root`
    file: String,
    test_id: String,
    qualified_id: String,
    module: String,
    line: usize,
}

impl JsonTest {
    fn from_entry(t: &TestEntry) -> Self {
        JsonTest {
            root: t.root.display().to_string(),
            file: t.file.display().to_string(),
            test_id: t.test_id.clone(),
            qualified_id: t.qualified_id.clone(),
            module: t.module.clone(),
            line: t.line,
        }
    }
}

#[derive(Facet)]
struct JsonAnnotation {
    tag: String,
    marker: String,
    payload: String,
    file: String,
    line: usize,
}

#[derive(Facet)]
struct JsonConflict {
    kind: String,
    file: String,
    test_id: String,
    first_line: usize,
    second_line: usize,
    first: Vec<String>,
    second: Vec<String>,
}

#[derive(Facet)]
struct JsonLocation {
    file: String,
    line: usize,
}

#[derive(Facet)]
struct JsonWarning {
    file: String,
    line: usize,
    message: String,
}

#[derive(Facet)]
struct JsonSkipped {
    path: String,
    reason: String,
}

fn to_json<T: Facet<'static>>(value: &T) -> Result<String> {
    facet_json::to_string_pretty(value)
        .map_err(|e| eyre::eyre!("JSON serialization failed: {}", e))
}

fn render_json(report: &TraceReport, summary: &ScanSummary, threshold: f64) -> Result<String> {
    let json_report = JsonReport {
        passing: report.is_passing(threshold),
        coverage_percent: report.coverage_percent(),
        total_requirements: report.requirements.len(),
        verified_requirements: report.requirements.len() - report.unverified_requirements.len(),
        total_tests: report.total_tests(),
        scanned_files: summary.scanned.len(),
        requirements: report
            .requirements
            .iter()
            .map(|r| JsonRequirement {
                id: r.id.clone(),
                tests: r.tests.iter().map(JsonTest::from_entry).collect(),
            })
            .collect(),
        unverified_requirements: report.unverified_requirements.clone(),
        untraced_tests: report
            .untraced_tests
            .iter()
            .map(JsonTest::from_entry)
            .collect(),
        orphans: report
            .orphans
            .iter()
            .map(|a| JsonAnnotation {
                tag: a.tag.as_str().to_string(),
                marker: a.marker.clone(),
                payload: a.payload.clone(),
                file: a.location.path().display().to_string(),
                line: a.location.line,
            })
            .collect(),
        conflicts: report
            .conflicts
            .iter()
            .map(|c| JsonConflict {
                kind: c.kind.as_str().to_string(),
                file: c.path().display().to_string(),
                test_id: c.test_id.clone(),
                first_line: c.first_line,
                second_line: c.second_line,
                first: c.first.iter().map(ToString::to_string).collect(),
                second: c.second.iter().map(ToString::to_string).collect(),
            })
            .collect(),
        malformed: report
            .malformed
            .iter()
            .map(|m| JsonLocation {
                file: m.path().display().to_string(),
                line: m.line,
            })
            .collect(),
        warnings: report
            .warnings
            .iter()
            .map(|w| JsonWarning {
                file: w.path().display().to_string(),
                line: w.line,
                message: w.kind.to_string(),
            })
            .collect(),
        skipped: summary
            .skipped
            .iter()
            .map(|s| JsonSkipped {
                path: s.path.display().to_string(),
                reason: s.reason.clone(),
            })
            .collect(),
    };

    to_json(&json_report)
}

fn render_markdown(report: &TraceReport, summary: &ScanSummary, verbose: bool) -> String {
    let mut output = String::new();

    output.push_str("# Traceability Report\n\n");

    let verified = report.requirements.len() - report.unverified_requirements.len();
    output.push_str(&format!(
        "**Coverage:** {:.1}% ({}/{} requirements, {} tests in {} files)\n\n",
        report.coverage_percent(),
        verified,
        report.requirements.len(),
        report.total_tests(),
        summary.scanned.len()
    ));

    output.push_str("| Requirement | Test | Module | Location |\n");
    output.push_str("|---|---|---|---|\n");
    for r in &report.requirements {
        if r.tests.is_empty() {
            output.push_str(&format!("| `{}` | _none_ | | |\n", r.id));
        }
        for t in &r.tests {
            output.push_str(&format!(
                "| `{}` | `{}` | {} | `{}:{}` |\n",
                r.id,
                t.test_id,
                t.module,
                t.path().display(),
                t.line
            ));
        }
    }
    output.push('\n');

    if !report.conflicts.is_empty() {
        output.push_str("## Conflicts\n\n");
        for c in &report.conflicts {
            output.push_str(&format!(
                "- `{}:{}` and line {} - {} `{}`\n",
                c.path().display(),
                c.first_line,
                c.second_line,
                c.kind,
                c.test_id
            ));
        }
        output.push('\n');
    }

    if !report.orphans.is_empty() {
        output.push_str("## Orphaned Annotations\n\n");
        for a in &report.orphans {
            output.push_str(&format!(
                "- `{}` - `{} {}`\n",
                a.location, a.marker, a.payload
            ));
        }
        output.push('\n');
    }

    if !report.malformed.is_empty() {
        output.push_str("## Unterminated Comments\n\n");
        for m in &report.malformed {
            output.push_str(&format!("- `{}:{}`\n", m.path().display(), m.line));
        }
        output.push('\n');
    }

    if !report.unverified_requirements.is_empty() {
        output.push_str("## Unverified Requirements\n\n");
        for id in &report.unverified_requirements {
            output.push_str(&format!("- `{}`\n", id));
        }
        output.push('\n');
    }

    if verbose && !report.untraced_tests.is_empty() {
        output.push_str("## Untraced Tests\n\n");
        for t in &report.untraced_tests {
            output.push_str(&format!(
                "- `{}` at `{}:{}`\n",
                t.test_id,
                t.path().display(),
                t.line
            ));
        }
        output.push('\n');
    }

    output
}
