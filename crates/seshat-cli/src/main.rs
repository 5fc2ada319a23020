//! Seshat - TextGrid annotation checking CLI
//!
//! The `seshat` command runs the campaign checks and the two-annotator merge
//! steps on local files, without any task store.
//!
//! ## Commands
//!
//! - `check`: Check TextGrid files against a checking scheme
//! - `template`: Write the blank TextGrid a scheme expects
//! - `merge`: Stack a reference and a target annotation
//! - `merge-times`: Derive the times-merging grid and its conflict table
//! - `scheme`: Validate a scheme file and print it normalized
//! - `parsers`: List the registered annotation parsers

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{debug, info, Level};

use seshat_core::{
    build_merged_annots, decode_textgrid_bytes, derive_merged_times, CheckingScheme, ErrorLog,
    ErrorSummary, GridKind, MergeResults, ParserRegistry, SchemeFile, TextGrid, TimeConflict,
    METRICS,
};

#[derive(Parser)]
#[command(name = "seshat")]
#[command(author = "Seshat Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Check and merge TextGrid annotations", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check TextGrid files against a checking scheme
    Check {
        /// TextGrid files to check
        #[arg(required = true)]
        grids: Vec<PathBuf>,

        /// Scheme file (.toml or .json)
        #[arg(short, long)]
        scheme: PathBuf,

        /// Which workflow stage the files belong to
        #[arg(short, long, value_enum, default_value = "single")]
        kind: KindArg,

        /// Report format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Write the blank TextGrid a scheme expects for an audio file
    Template {
        /// Scheme file (.toml or .json)
        #[arg(short, long)]
        scheme: PathBuf,

        /// Audio duration in seconds
        #[arg(short, long)]
        duration: f64,

        /// Name given to the grid
        #[arg(short, long, default_value = "template")]
        name: String,

        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Stack a reference and a target annotation into X-ref / X-target tiers
    Merge {
        /// Reference annotator's TextGrid
        reference: PathBuf,

        /// Target annotator's TextGrid
        target: PathBuf,

        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Derive the X-merged / X-target grid from an agreed X-ref / X-target grid
    MergeTimes {
        /// Grid with agreed annotations
        merged: PathBuf,

        /// Scheme file (.toml or .json)
        #[arg(short, long)]
        scheme: PathBuf,

        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Conflict table format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Validate a scheme file and print it normalized
    Scheme {
        /// Scheme file (.toml or .json)
        path: PathBuf,

        /// Print as JSON instead of TOML
        #[arg(long = "as-json")]
        as_json: bool,
    },

    /// List the registered annotation parsers
    Parsers,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KindArg {
    /// A single annotator's grid
    Single,
    /// X-ref / X-target grid, while merging annotations
    MergedAnnots,
    /// X-merged / X-target grid, while merging times
    MergedTimes,
}

impl From<KindArg> for GridKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Single => GridKind::Single,
            KindArg::MergedAnnots => GridKind::MergedAnnots,
            KindArg::MergedTimes => GridKind::MergedTimes,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    seshat_core::init_tracing(cli.json, level);

    let result = match cli.command {
        Commands::Check {
            grids,
            scheme,
            kind,
            format,
        } => cmd_check(&grids, &scheme, kind.into(), format),
        Commands::Template {
            scheme,
            duration,
            name,
            output,
        } => cmd_template(&scheme, duration, &name, output.as_deref()),
        Commands::Merge {
            reference,
            target,
            output,
        } => cmd_merge(&reference, &target, output.as_deref()),
        Commands::MergeTimes {
            merged,
            scheme,
            output,
            format,
        } => cmd_merge_times(&merged, &scheme, output.as_deref(), format),
        Commands::Scheme { path, as_json } => cmd_scheme(&path, as_json),
        Commands::Parsers => cmd_parsers(),
    };
    METRICS.flush();
    result
}

fn load_scheme(path: &Path) -> Result<CheckingScheme> {
    let file = SchemeFile::load(path)
        .with_context(|| format!("Failed to load scheme file: {:?}", path))?;
    let scheme = file
        .build(&ParserRegistry::with_builtins())
        .with_context(|| format!("Invalid scheme in {:?}", path))?;
    debug!(scheme = scheme.name(), tiers = scheme.tiers().len(), "scheme loaded");
    Ok(scheme)
}

fn read_grid(path: &Path) -> Result<TextGrid> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read TextGrid: {:?}", path))?;
    let text = decode_textgrid_bytes(&bytes)
        .with_context(|| format!("Failed to decode TextGrid: {:?}", path))?;
    TextGrid::parse(&text).with_context(|| format!("Invalid TextGrid in {:?}", path))
}

fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("Failed to write {:?}", path))?;
            info!("Wrote {:?}", path);
        }
        None => print!("{text}"),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct FileReport {
    file: String,
    summary: ErrorSummary,
}

/// Check one file. A file that does not parse is reported as a structural
/// error rather than aborting the run.
fn check_file(path: &Path, scheme: &CheckingScheme, kind: GridKind) -> Result<ErrorSummary> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read TextGrid: {:?}", path))?;
    let mut log = ErrorLog::new();
    match decode_textgrid_bytes(&bytes).and_then(|text| TextGrid::parse(&text)) {
        Ok(grid) => kind.run(&grid, scheme, &mut log),
        Err(err) => log.log_structural(format!("The file is not a valid TextGrid: {err}")),
    }
    Ok(log.into_summary())
}

fn cmd_check(
    grids: &[PathBuf],
    scheme_path: &Path,
    kind: GridKind,
    format: OutputFormat,
) -> Result<()> {
    let scheme = load_scheme(scheme_path)?;
    let mut reports = Vec::with_capacity(grids.len());
    for path in grids {
        reports.push(FileReport {
            file: path.display().to_string(),
            summary: check_file(path, &scheme, kind)?,
        });
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        OutputFormat::Text => {
            for report in &reports {
                println!("{}", render_summary_text(&report.file, &report.summary));
            }
        }
    }

    let failed = reports.iter().filter(|r| r.summary.has_errors).count();
    if failed > 0 {
        bail!("{failed} of {} file(s) failed the {kind} check", reports.len());
    }
    Ok(())
}

fn render_summary_text(file: &str, summary: &ErrorSummary) -> String {
    let mut out = String::new();
    if summary.is_empty() {
        out.push_str(&format!("{file}: OK"));
        return out;
    }
    let verdict = if summary.has_errors { "FAILED" } else { "OK (with warnings)" };
    out.push_str(&format!("{file}: {verdict}\n"));
    for error in &summary.structural {
        out.push_str(&format!("  ! {}\n", error.msg));
    }
    for (tier, errors) in &summary.annot {
        for error in errors {
            out.push_str(&format!(
                "  ! {tier}[{}] {:?} ({:.3}-{:.3}): {}\n",
                error.index, error.label, error.start, error.end, error.msg
            ));
        }
    }
    for mismatch in &summary.annot_mismatch {
        out.push_str(&format!(
            "  ~ {} / {} differ at interval {}: {:?} vs {:?}\n",
            mismatch.ref_tier,
            mismatch.target_tier,
            mismatch.index,
            mismatch.ref_label,
            mismatch.target_label
        ));
    }
    out.push_str(&render_conflicts_text(&summary.time_conflict));
    out.trim_end().to_string()
}

fn render_conflicts_text(conflicts: &[TimeConflict]) -> String {
    conflicts
        .iter()
        .map(|c| {
            format!(
                "  ~ {} / {} frontier between intervals {} and {}: {:.3} vs {:.3} (threshold {})\n",
                c.tier_a, c.tier_b, c.index_before, c.index_after, c.time_a, c.time_b, c.threshold
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// template
// ---------------------------------------------------------------------------

fn cmd_template(scheme_path: &Path, duration: f64, name: &str, output: Option<&Path>) -> Result<()> {
    if !(duration.is_finite() && duration > 0.0) {
        bail!("Duration must be a positive number of seconds, got {duration}");
    }
    let scheme = load_scheme(scheme_path)?;
    let grid = scheme.gen_template(duration, name);
    write_output(output, &grid.to_text())
}

// ---------------------------------------------------------------------------
// merge / merge-times
// ---------------------------------------------------------------------------

/// Stack two annotations; fails with the tier disagreement if their tier
/// sets differ.
fn merge_annotations(reference: &TextGrid, target: &TextGrid) -> Result<TextGrid> {
    let mut log = ErrorLog::new();
    match build_merged_annots(reference, target, &mut log) {
        Some(merged) => Ok(merged),
        None => {
            let reasons: Vec<&str> = log.structural().iter().map(|e| e.msg.as_str()).collect();
            bail!("Cannot merge the two annotations:\n  {}", reasons.join("\n  "))
        }
    }
}

fn cmd_merge(reference: &Path, target: &Path, output: Option<&Path>) -> Result<()> {
    let merged = merge_annotations(&read_grid(reference)?, &read_grid(target)?)?;
    write_output(output, &merged.to_text())
}

/// Check an agreed grid the way a submission would be checked, then derive
/// the times-merging grid.
fn merge_times(merged: &TextGrid, scheme: &CheckingScheme) -> Result<(TextGrid, MergeResults)> {
    let summary = GridKind::MergedAnnots.check(merged, scheme);
    if summary.has_errors || !summary.annot_mismatch.is_empty() {
        bail!(
            "The annotations are not merged yet:\n{}",
            render_summary_text("merged annotations", &summary)
        );
    }
    Ok(derive_merged_times(merged, scheme)?)
}

fn cmd_merge_times(
    merged_path: &Path,
    scheme_path: &Path,
    output: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let scheme = load_scheme(scheme_path)?;
    let (grid, results) = merge_times(&read_grid(merged_path)?, &scheme)?;
    write_output(output, &grid.to_text())?;

    let conflicts = results.conflicts();
    match format {
        OutputFormat::Json => eprintln!("{}", serde_json::to_string_pretty(&conflicts)?),
        OutputFormat::Text if conflicts.is_empty() => {
            eprintln!("All frontiers were merged automatically")
        }
        OutputFormat::Text => {
            eprintln!("{} frontier(s) to resolve by hand:", conflicts.len());
            eprint!("{}", render_conflicts_text(&conflicts));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// scheme / parsers
// ---------------------------------------------------------------------------

fn render_scheme(path: &Path, as_json: bool) -> Result<String> {
    let normalized = load_scheme(path)?.to_file();
    if as_json {
        Ok(serde_json::to_string_pretty(&normalized)?)
    } else {
        toml::to_string_pretty(&normalized).context("Failed to render scheme as TOML")
    }
}

fn cmd_scheme(path: &Path, as_json: bool) -> Result<()> {
    println!("{}", render_scheme(path, as_json)?);
    Ok(())
}

fn cmd_parsers() -> Result<()> {
    for key in ParserRegistry::with_builtins().keys() {
        println!("{key}");
    }
    Ok(())
}
