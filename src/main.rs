use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use tennis_store::config::{PipelineConfig, QualityThresholds, YearRange, parse_tours};
use tennis_store::logging;
use tennis_store::pipeline::{PipelineContext, PipelineSummary, run_pipeline, verify_only};
use tennis_store::progress::{PipelineProgress, ProgressTracker};

const PROGRESS_EVERY: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(
    name = "tennis_store",
    version,
    about = "Build a normalized SQLite store from historical tennis CSV exports",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "TENNIS_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Load every source file and rebuild the store (the default)
    Run(RunArgs),
    /// Re-check an existing store without reloading anything
    Verify(VerifyArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Directory holding the per-tour folders (tennis_atp, tennis_wta)
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Destination SQLite file
    #[arg(long)]
    db: Option<PathBuf>,
    /// Only load this year range, e.g. 1990-1999 or 2004
    #[arg(long, value_parser = parse_years)]
    years: Option<YearRange>,
    /// Tours to load, e.g. atp,wta or atp:custom_dir
    #[arg(long)]
    tours: Option<String>,
    /// Worker threads for loading and normalization
    #[arg(long)]
    parallelism: Option<usize>,
    /// Rows per insert transaction
    #[arg(long)]
    batch_size: Option<usize>,
    /// Write the JSON summary here (`-` for stdout)
    #[arg(long)]
    report: Option<PathBuf>,
    #[command(flatten)]
    thresholds: ThresholdArgs,
}

#[derive(Args)]
struct VerifyArgs {
    /// SQLite store to verify
    #[arg(long)]
    db: Option<PathBuf>,
    /// Write the JSON report here (`-` for stdout)
    #[arg(long)]
    report: Option<PathBuf>,
    #[command(flatten)]
    thresholds: ThresholdArgs,
}

#[derive(Args, Default)]
struct ThresholdArgs {
    #[arg(long)]
    max_unparsed_score_rate: Option<f64>,
    #[arg(long)]
    max_other_level_rate: Option<f64>,
    #[arg(long)]
    max_defaulted_surface_rate: Option<f64>,
    #[arg(long)]
    max_invalid_date_rate: Option<f64>,
    #[arg(long)]
    max_dangling_refs: Option<u64>,
}

impl ThresholdArgs {
    fn into_thresholds(self) -> QualityThresholds {
        QualityThresholds {
            max_dangling_refs: self.max_dangling_refs,
            max_unparsed_score_rate: self.max_unparsed_score_rate,
            max_other_level_rate: self.max_other_level_rate,
            max_defaulted_surface_rate: self.max_defaulted_surface_rate,
            max_invalid_date_rate: self.max_invalid_date_rate,
        }
    }
}

fn parse_years(raw: &str) -> Result<YearRange> {
    YearRange::parse(raw)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let result = match cli.command {
        Some(Commands::Run(args)) => run(args),
        Some(Commands::Verify(args)) => verify(args),
        None => run(cli.run),
    };
    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: RunArgs) -> Result<ExitCode> {
    let mut cfg = PipelineConfig::from_env();
    if let Some(dir) = args.data_dir {
        cfg.data_dir = dir;
    }
    if let Some(db) = args.db {
        cfg.db_path = db;
    }
    if let Some(raw) = args.tours.as_deref() {
        let tours = parse_tours(raw);
        if tours.is_empty() {
            return Err(anyhow!("no known tour in {raw:?}"));
        }
        cfg.tours = tours;
    }
    if let Some(n) = args.parallelism {
        cfg.parallelism = n;
    }
    if let Some(n) = args.batch_size {
        cfg.batch_size = n;
    }
    cfg.years = args.years;
    cfg.thresholds = args.thresholds.into_thresholds();

    let mut ctx = PipelineContext::new(cfg, ProgressTracker::new(progress_printer()));
    match run_pipeline(&mut ctx) {
        Ok(summary) => {
            emit(&summary_lines(&summary), args.report.as_deref());
            write_report(args.report.as_deref(), &summary)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("{err}");
            if let Some(report) = ctx.report() {
                write_report(args.report.as_deref(), report)?;
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

fn verify(args: VerifyArgs) -> Result<ExitCode> {
    let mut cfg = PipelineConfig::from_env();
    if let Some(db) = args.db {
        cfg.db_path = db;
    }
    cfg.thresholds = args.thresholds.into_thresholds();

    let mut ctx = PipelineContext::new(cfg, ProgressTracker::silent());
    match verify_only(&mut ctx) {
        Ok(report) => {
            emit(&report.summary_lines(), args.report.as_deref());
            write_report(args.report.as_deref(), &report)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("{err}");
            if let Some(report) = ctx.report() {
                emit(&report.summary_lines(), args.report.as_deref());
                write_report(args.report.as_deref(), report)?;
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

fn progress_printer() -> impl FnMut(&PipelineProgress) {
    let mut last_print: Option<Instant> = None;
    let mut last_stage = None;
    move |p: &PipelineProgress| {
        let stage_changed = last_stage != Some(p.stage);
        let due = last_print.is_none_or(|t| t.elapsed() >= PROGRESS_EVERY);
        if !stage_changed && !due {
            return;
        }
        last_stage = Some(p.stage);
        last_print = Some(Instant::now());
        let eta = p
            .stage_remaining
            .map(|d| format!(" eta {}s", d.as_secs()))
            .unwrap_or_default();
        if p.total > 0 {
            eprintln!(
                "[{}] {}/{} {}{eta}",
                p.stage, p.current, p.total, p.message
            );
        } else {
            eprintln!("[{}] {}", p.stage, p.message);
        }
    }
}

fn summary_lines(summary: &PipelineSummary) -> Vec<String> {
    let mut lines = vec![
        format!("Ingest complete in {:.1}s", summary.elapsed_ms as f64 / 1000.0),
        format!("DB: {}", summary.db_path.display()),
    ];
    if let Some(years) = summary.years {
        lines.push(format!("Years: {}-{}", years.from, years.to));
    }
    lines.push(format!(
        "Rows: matches={} players={} rankings={} doubles={}",
        summary.written.matches,
        summary.written.players,
        summary.written.rankings,
        summary.written.doubles_matches
    ));
    let diag = &summary.diagnostics;
    lines.push(format!(
        "Files: read={} errors={} row errors={}",
        diag.files_read(),
        diag.file_errors(),
        diag.row_errors()
    ));
    if !diag.players.collisions.is_empty() {
        lines.push(format!("Player id collisions: {}", diag.players.collisions.len()));
        for c in diag.players.collisions.iter().take(6) {
            lines.push(format!(
                "   - {} {} ({}) -> {} ({})",
                c.raw_id, c.moved_name, c.moved_tour, c.assigned_id, c.kept_name
            ));
        }
    }
    for timing in &summary.stage_timings {
        lines.push(format!("  {:<10} {:>8} ms", timing.stage.as_str(), timing.elapsed_ms));
    }
    lines.extend(summary.report.summary_lines());
    lines
}

fn report_on_stdout(dest: Option<&Path>) -> bool {
    dest == Some(Path::new("-"))
}

/// Human-readable text goes to stderr when stdout carries the JSON report.
fn emit(lines: &[String], report_dest: Option<&Path>) {
    let to_stderr = report_on_stdout(report_dest);
    for line in lines {
        if to_stderr {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }
}

/// JSON to `dest`, written through a temp file and renamed. `-` is stdout.
fn write_report<T: Serialize>(dest: Option<&Path>, value: &T) -> Result<()> {
    let Some(dest) = dest else {
        return Ok(());
    };
    let json = serde_json::to_string_pretty(value).context("serialize report")?;
    if report_on_stdout(Some(dest)) {
        println!("{json}");
        return Ok(());
    }
    let tmp = dest.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, dest).with_context(|| format!("move report into {}", dest.display()))?;
    Ok(())
}
