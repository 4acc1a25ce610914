//! doxtrace - Trace requirements to doxygen-annotated C++ tests
//!
//! doxtrace scans C and C++ test sources for doxygen comments carrying
//! requirement tags (`@req`, `\verify`, ...), binds each one to the test
//! case that follows it and reports which requirement is verified where.

use doxtrace::logging::{self, Verbosity};
use doxtrace::output::{OutputFormat, render_query, render_report};
use doxtrace::{CONFIG_PATH, build_index, find_project_root, load_config, load_config_or_default};
use doxtrace_core::build_report;
use eyre::{Result, WrapErr};
use figue as args;
use owo_colors::OwoColorize;
use std::path::PathBuf;

/// CLI arguments
#[derive(Debug, facet::Facet)]
struct Args {
    /// Subcommand to run (default: scan)
    #[facet(args::subcommand)]
    command: Option<Command>,

    /// Path to config file (default: .config/doxtrace/config.yaml)
    #[facet(args::named, args::short = 'c', default)]
    config: Option<PathBuf>,

    /// Exit 1 when there are orphans, conflicts or coverage below the threshold
    #[facet(args::named, default)]
    check: bool,

    /// Minimum coverage percentage to pass (default: 0)
    #[facet(args::named, default)]
    threshold: Option<f64>,

    /// Code lines an annotation may precede its test by (default: 2)
    #[facet(args::named, default)]
    lookahead: Option<usize>,

    /// Show verbose output including every requirement-to-test link
    #[facet(args::named, args::short = 'v', default)]
    verbose: bool,

    /// Only print the report and errors
    #[facet(args::named, args::short = 'q', default)]
    quiet: bool,

    /// Output format: text, json, markdown
    #[facet(args::named, args::short = 'f', default)]
    format: Option<String>,
}

/// Subcommands
#[derive(Debug, facet::Facet)]
#[repr(u8)]
enum Command {
    /// Scan test sources and print the traceability report
    Scan {
        /// Directories or files to scan (default: roots from the config)
        #[facet(args::positional, default)]
        roots: Vec<PathBuf>,
    },

    /// Show the tests verifying one requirement
    Query {
        /// Requirement identifier, e.g. req-1a
        #[facet(args::positional)]
        requirement: String,
    },
}

fn main() -> Result<()> {
    let args: Args = figue::from_std_args()
        .into_result()
        .map(|o| o.get())
        .wrap_err("Failed to parse command line arguments")?;

    logging::init(Verbosity::from_flags(args.verbose, args.quiet));

    let format = match &args.format {
        Some(f) => OutputFormat::from_str(f)
            .ok_or_else(|| eyre::eyre!("Unknown output format '{}' (text, json, markdown)", f))?,
        None => OutputFormat::default(),
    };

    let project_root = find_project_root()?;
    let current_dir = std::env::current_dir().wrap_err("Failed to get current directory")?;

    // An explicit --config must exist; the default location is optional
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => load_config_or_default(&project_root.join(CONFIG_PATH))?,
    };

    let (cli_roots, query) = match args.command {
        Some(Command::Scan { ref roots }) => (roots.clone(), None),
        Some(Command::Query { ref requirement }) => (Vec::new(), Some(requirement.clone())),
        None => (Vec::new(), None),
    };

    let roots = doxtrace::scan_roots(&config, &project_root, &current_dir, &cli_roots);

    if !args.quiet {
        let listed: Vec<String> = roots.iter().map(|r| r.display().to_string()).collect();
        eprintln!(
            "{} Scanning {}...",
            "->".blue().bold(),
            listed.join(", ").cyan()
        );
    }

    let (index, summary) = build_index(&config, &roots, args.lookahead)?;

    if !args.quiet {
        eprintln!(
            "   Found {} tests in {} files",
            index.len().to_string().green(),
            summary.scanned.len().to_string().green()
        );
        if !summary.skipped.is_empty() {
            eprintln!(
                "   {} Skipped {} unreadable paths",
                "!".yellow().bold(),
                summary.skipped.len()
            );
        }
    }

    let report = build_report(&index);

    if let Some(requirement) = query {
        let Some(entry) = report
            .requirements
            .iter()
            .find(|r| r.id == requirement.trim())
        else {
            eyre::bail!("Unknown requirement '{}'", requirement);
        };
        print!("{}", render_query(entry, format)?);
        return Ok(());
    }

    let threshold = args.threshold.unwrap_or(0.0);
    print!(
        "{}",
        render_report(&report, &summary, threshold, format, args.verbose)?
    );

    if args.check && !report.is_passing(threshold) {
        std::process::exit(1);
    }

    Ok(())
}
