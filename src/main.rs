//! DLL Checker CLI
//!
//! Command-line tool for auditing a folder of libraries and executables
//! for AnyCPU / 32-bit / 64-bit mismatches.

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use dll_checker::formatter::{HumanFormatter, JsonFormatter, ReportFormatter, ShortFormatter};
use dll_checker::scan::{self, Candidate, ScanOptions};
use dll_checker::{ArchitectureVerdict, ScanRecord, Summary, SummaryPolicy};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Classify PE libraries and executables by the architectures they run on.
///
/// Folders are scanned recursively for .dll and .exe files; files are
/// classified as given.
#[derive(Parser, Debug)]
#[command(name = "dllcheck")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Folder(s) or file(s) to check
    #[arg(required = true, env = "DLLCHECK_ROOT")]
    paths: Vec<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "human")]
    format: OutputFormat,

    /// Worker threads (0 = one per CPU)
    #[arg(short, long, default_value = "0", env = "DLLCHECK_JOBS")]
    jobs: usize,

    /// Count "AnyCPU, 32-bit preferred" separately in the summary
    #[arg(long)]
    split_prefer32: bool,

    /// Follow symbolic links while scanning folders
    #[arg(long)]
    follow_links: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (one line per file)
    #[arg(short, long)]
    quiet: bool,
}

/// Output format options.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable report
    Human,
    /// JSON document
    Json,
    /// Tab-separated, one line per file
    Short,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("dll_checker=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Returns whether every file was read successfully.
fn run(args: &Args) -> anyhow::Result<bool> {
    let options = ScanOptions {
        follow_links: args.follow_links,
        jobs: args.jobs,
    };

    let mut candidates = collect_candidates(&args.paths, &options)?;
    scan::sort_candidates(&mut candidates);
    let records = scan::classify_candidates(candidates, &options);

    let policy = SummaryPolicy {
        split_prefer32: args.split_prefer32,
    };
    let summary = Summary::from_classifications(records.iter().map(|r| &r.classification), policy);

    print!("{}", render(args, &records, &summary));

    Ok(records
        .iter()
        .all(|r| !matches!(r.classification.verdict, ArchitectureVerdict::DetectionFailed(_))))
}

fn collect_candidates(paths: &[PathBuf], options: &ScanOptions) -> anyhow::Result<Vec<Candidate>> {
    let mut candidates = Vec::new();
    for path in paths {
        if path.is_dir() {
            let found = scan::discover(path, options)
                .with_context(|| format!("cannot scan {}", path.display()))?;
            candidates.extend(found);
        } else if path.is_file() {
            candidates.push(Candidate::from_file(path));
        } else {
            bail!("{} is neither a folder nor a file", path.display());
        }
    }
    Ok(candidates)
}

fn render(args: &Args, records: &[ScanRecord], summary: &Summary) -> String {
    match args.format {
        OutputFormat::Human => {
            let formatter = HumanFormatter {
                verbose: args.verbose,
                quiet: args.quiet,
            };
            formatter.format_report(records, summary)
        }
        OutputFormat::Json => JsonFormatter { pretty: !args.quiet }.format_report(records, summary),
        OutputFormat::Short => ShortFormatter.format_report(records, summary),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::try_parse_from(["dllcheck", "C:/deploy"]).unwrap();
        assert_eq!(args.paths.len(), 1);
        assert_eq!(args.jobs, 0);
        assert!(!args.split_prefer32);
    }

    #[test]
    fn test_format_options() {
        let args =
            Args::try_parse_from(["dllcheck", "-f", "json", "--split-prefer32", "a.dll", "b.exe"])
                .unwrap();
        assert!(matches!(args.format, OutputFormat::Json));
        assert!(args.split_prefer32);
        assert_eq!(args.paths.len(), 2);
    }

    #[test]
    fn test_missing_path_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = collect_candidates(&[dir.path().join("nope")], &ScanOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("neither a folder nor a file"));
    }
}
