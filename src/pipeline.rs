//! Orchestrator: `Initialized → Loading → Processing → Writing → Verifying →
//! Done`, or `Aborted` from any non-terminal stage. All run state lives in a
//! [`PipelineContext`] owned by the caller.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::{EARLIEST_BIRTH_YEAR, PipelineConfig, YearRange};
use crate::db::{DatabaseBuilder, IngestRun, StoreContents, WriteSummary};
use crate::error::{IssueLog, PipelineError, StageError};
use crate::loaders::doubles::load_doubles;
use crate::loaders::matches::load_matches;
use crate::loaders::players::{PlayerCollision, load_players, merge_players};
use crate::loaders::rankings::load_rankings;
use crate::loaders::{LoadDiagnostics, LoadOutcome, build_worker_pool, with_worker_pool};
use crate::model::{NormalizedDoublesMatch, NormalizedMatch, NormalizedPlayer, NormalizedRanking};
use crate::paths::{EntityKind, SourceInventory, resolve_sources};
use crate::process::date::{DateBounds, resolve_date};
use crate::process::normalize::{
    ProcessingStats, normalize_doubles, normalize_matches, normalize_rankings,
};
use crate::progress::{ProgressTracker, StageTiming};
use crate::raw::{RawDoublesRecord, RawMatchRecord, RawPlayer, RawRanking};
use crate::verify::{VerificationReport, evaluate_thresholds, verify_store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Initialized,
    Loading,
    Processing,
    Writing,
    Verifying,
    Done,
    Aborted,
}

impl PipelineStage {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStage::Initialized => "initialized",
            PipelineStage::Loading => "loading",
            PipelineStage::Processing => "processing",
            PipelineStage::Writing => "writing",
            PipelineStage::Verifying => "verifying",
            PipelineStage::Done => "done",
            PipelineStage::Aborted => "aborted",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineStage::Done | PipelineStage::Aborted)
    }

    /// Legal transitions. `Initialized → Verifying` is the verify-only path.
    pub fn can_advance_to(self, next: PipelineStage) -> bool {
        use PipelineStage::*;
        match (self, next) {
            (from, Aborted) => !from.is_terminal(),
            (Initialized, Loading)
            | (Loading, Processing)
            | (Processing, Writing)
            | (Writing, Verifying)
            | (Initialized, Verifying)
            | (Verifying, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PlayerMergeStats {
    pub raw_records: usize,
    pub canonical_players: usize,
    pub duplicates_merged: usize,
    pub invalid_birth_dates: usize,
    pub collisions: Vec<PlayerCollision>,
}

/// Row- and file-level findings gathered along the way. Never fatal.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunDiagnostics {
    pub missing_dirs: Vec<PathBuf>,
    pub loads: BTreeMap<&'static str, LoadDiagnostics>,
    pub players: PlayerMergeStats,
    pub processing: BTreeMap<&'static str, ProcessingStats>,
    pub invalid_ranking_dates: IssueLog,
    /// Rows dropped because their date fell outside the requested year range.
    pub outside_year_range: usize,
}

impl RunDiagnostics {
    pub fn files_read(&self) -> usize {
        self.loads.values().map(|l| l.files_read).sum()
    }

    pub fn file_errors(&self) -> usize {
        self.loads.values().map(|l| l.file_errors.len()).sum()
    }

    pub fn row_errors(&self) -> usize {
        self.loads.values().map(|l| l.row_errors.count).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub terminal: PipelineStage,
    pub db_path: PathBuf,
    pub years: Option<YearRange>,
    pub written: WriteSummary,
    pub elapsed_ms: u64,
    pub stage_timings: Vec<StageTiming>,
    pub diagnostics: RunDiagnostics,
    pub report: VerificationReport,
}

/// Orchestrator-owned state for one run: configuration, stage, progress
/// clock, worker pool and accumulated diagnostics.
pub struct PipelineContext<'a> {
    config: PipelineConfig,
    stage: PipelineStage,
    progress: ProgressTracker<'a>,
    pool: Option<rayon::ThreadPool>,
    started_at: DateTime<Utc>,
    diagnostics: RunDiagnostics,
    stage_timings: Vec<StageTiming>,
    report: Option<VerificationReport>,
}

impl<'a> PipelineContext<'a> {
    pub fn new(config: PipelineConfig, progress: ProgressTracker<'a>) -> Self {
        let config = config.normalized();
        let pool = build_worker_pool(config.parallelism);
        Self {
            config,
            stage: PipelineStage::Initialized,
            progress,
            pool,
            started_at: Utc::now(),
            diagnostics: RunDiagnostics::default(),
            stage_timings: Vec::new(),
            report: None,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn diagnostics(&self) -> &RunDiagnostics {
        &self.diagnostics
    }

    /// Filled once the run reaches `Done` or `Aborted`.
    pub fn stage_timings(&self) -> &[StageTiming] {
        &self.stage_timings
    }

    /// The last verification report, kept even when the quality gate aborts.
    pub fn report(&self) -> Option<&VerificationReport> {
        self.report.as_ref()
    }

    fn bounds(&self) -> DateBounds {
        DateBounds::new(self.config.earliest_year, self.config.max_year)
    }

    fn advance(&mut self, next: PipelineStage) {
        debug_assert!(
            self.stage.can_advance_to(next),
            "illegal transition {} -> {next}",
            self.stage
        );
        info!(from = %self.stage, to = %next, "pipeline stage");
        self.stage = next;
        if next.is_terminal() {
            self.stage_timings = self.progress.finish(next);
        } else {
            self.progress.enter(next);
        }
    }

    fn abort(&mut self, error: PipelineError) -> StageError {
        let stage = self.stage;
        error!(stage = %stage, error = %error, "pipeline aborted");
        self.advance(PipelineStage::Aborted);
        StageError { stage, error }
    }
}

struct Loaded {
    players: LoadOutcome<RawPlayer>,
    rankings: LoadOutcome<RawRanking>,
    matches: LoadOutcome<RawMatchRecord>,
    doubles: LoadOutcome<RawDoublesRecord>,
}

struct Processed {
    players: Vec<NormalizedPlayer>,
    rankings: Vec<NormalizedRanking>,
    matches: Vec<NormalizedMatch>,
    doubles: Vec<NormalizedDoublesMatch>,
}

/// Full run. On failure the returned error names the stage that failed; the
/// context's stage is then `Aborted`.
pub fn run_pipeline(ctx: &mut PipelineContext<'_>) -> Result<PipelineSummary, StageError> {
    if let Err(err) = ctx.config.validate() {
        return Err(ctx.abort(PipelineError::Config(format!("{err:#}"))));
    }

    ctx.advance(PipelineStage::Loading);
    let loaded = load_stage(ctx)?;

    ctx.advance(PipelineStage::Processing);
    let processed = process_stage(ctx, loaded);

    ctx.advance(PipelineStage::Writing);
    let written = write_stage(ctx, &processed)?;
    drop(processed);

    ctx.advance(PipelineStage::Verifying);
    let report = verify_stage(ctx)?;

    let elapsed_ms = ctx.progress.elapsed().as_millis() as u64;
    ctx.advance(PipelineStage::Done);
    Ok(PipelineSummary {
        terminal: ctx.stage,
        db_path: ctx.config.db_path.clone(),
        years: ctx.config.years,
        written,
        elapsed_ms,
        stage_timings: ctx.stage_timings.clone(),
        diagnostics: ctx.diagnostics.clone(),
        report,
    })
}

/// Re-run verification (and the quality gate) against an existing store.
pub fn verify_only(ctx: &mut PipelineContext<'_>) -> Result<VerificationReport, StageError> {
    ctx.advance(PipelineStage::Verifying);
    let report = verify_stage(ctx)?;
    ctx.advance(PipelineStage::Done);
    Ok(report)
}

fn load_stage(ctx: &mut PipelineContext<'_>) -> Result<Loaded, StageError> {
    let inventory = resolve_sources(&ctx.config);
    ctx.diagnostics.missing_dirs = inventory.missing_dirs.clone();
    ctx.progress.report(
        0,
        inventory.total_files(),
        format!("{} source files found", inventory.total_files()),
    );

    let pool = ctx.pool.as_ref();
    let ((players, rankings), (matches, doubles)) = with_worker_pool(pool, || {
        rayon::join(
            || {
                rayon::join(
                    || load_players(&inventory.players, pool),
                    || load_rankings(&inventory.rankings, pool),
                )
            },
            || {
                rayon::join(
                    || load_matches(&inventory.matches, pool),
                    || load_doubles(&inventory.doubles, pool),
                )
            },
        )
    });

    let loaded = Loaded {
        players,
        rankings,
        matches,
        doubles,
    };
    let outcomes = [
        (EntityKind::Players, loaded.players.diagnostics()),
        (EntityKind::Rankings, loaded.rankings.diagnostics()),
        (EntityKind::Matches, loaded.matches.diagnostics()),
        (EntityKind::Doubles, loaded.doubles.diagnostics()),
    ];
    let mut files_done = 0;
    for (entity, diag) in outcomes {
        files_done += diag.files_seen;
        info!(
            entity = entity.as_str(),
            files = diag.files_read,
            file_errors = diag.file_errors.len(),
            records = diag.records,
            row_errors = diag.row_errors.count,
            "entity loaded"
        );
        ctx.progress.report(
            files_done,
            inventory.total_files(),
            format!("{}: {} records", entity.as_str(), diag.records),
        );
        ctx.diagnostics.loads.insert(entity.as_str(), diag);
    }

    for entity in [EntityKind::Players, EntityKind::Rankings, EntityKind::Matches] {
        let files_read = ctx
            .diagnostics
            .loads
            .get(entity.as_str())
            .map_or(0, |l| l.files_read);
        if files_read == 0 {
            let searched = searched_dirs(&ctx.config, &inventory, entity);
            return Err(ctx.abort(PipelineError::SourceGroupMissing {
                entity: entity.as_str(),
                searched,
            }));
        }
    }
    if loaded.doubles.files_read == 0 {
        warn!("no doubles files found; doubles_matches will be empty");
    }
    Ok(loaded)
}

fn searched_dirs(cfg: &PipelineConfig, inventory: &SourceInventory, entity: EntityKind) -> Vec<PathBuf> {
    let files = inventory.files(entity);
    if files.is_empty() {
        cfg.tours.iter().map(|t| cfg.tour_dir(t)).collect()
    } else {
        files.iter().map(|f| f.path.clone()).collect()
    }
}

fn process_stage(ctx: &mut PipelineContext<'_>, loaded: Loaded) -> Processed {
    let bounds = ctx.bounds();
    let years = ctx.config.years;
    let Loaded {
        players,
        rankings,
        matches,
        doubles,
    } = loaded;

    let raw_players = players.records.len();
    let birth_bounds = DateBounds::new(EARLIEST_BIRTH_YEAR, bounds.latest_year);
    let merge = merge_players(players.records, birth_bounds);
    ctx.diagnostics.players = PlayerMergeStats {
        raw_records: raw_players,
        canonical_players: merge.players.len(),
        duplicates_merged: merge.duplicates_merged,
        invalid_birth_dates: merge.invalid_birth_dates,
        collisions: merge.collisions.clone(),
    };
    ctx.progress.report(1, 4, format!("{} players merged", merge.players.len()));

    let mut dropped = 0;
    let raw_rankings = filter_years(rankings.records, years, bounds, &mut dropped, |r| {
        r.ranking_date.as_deref()
    });
    let raw_matches = filter_years(matches.records, years, bounds, &mut dropped, |m| {
        m.event.date.as_deref()
    });
    let raw_doubles = filter_years(doubles.records, years, bounds, &mut dropped, |d| {
        d.event.date.as_deref()
    });
    ctx.diagnostics.outside_year_range = dropped;

    let pool = ctx.pool.as_ref();
    let (rankings, invalid_ranking_dates) =
        with_worker_pool(pool, || normalize_rankings(raw_rankings, &merge.ids, bounds));
    ctx.progress.report(2, 4, format!("{} rankings normalized", rankings.len()));
    let (matches, match_stats) =
        with_worker_pool(pool, || normalize_matches(raw_matches, &merge.ids, bounds));
    ctx.progress.report(3, 4, format!("{} matches normalized", matches.len()));
    let (doubles, doubles_stats) =
        with_worker_pool(pool, || normalize_doubles(raw_doubles, &merge.ids, bounds));
    ctx.progress.report(4, 4, format!("{} doubles normalized", doubles.len()));

    info!(
        unparsed_scores = match_stats.unparsed_scores.count,
        invalid_dates = match_stats.invalid_dates.count,
        other_levels = match_stats.other_levels.count,
        collisions = merge.collisions.len(),
        "records normalized"
    );
    ctx.diagnostics.invalid_ranking_dates = invalid_ranking_dates;
    ctx.diagnostics
        .processing
        .insert(EntityKind::Matches.as_str(), match_stats);
    ctx.diagnostics
        .processing
        .insert(EntityKind::Doubles.as_str(), doubles_stats);

    Processed {
        players: merge.players,
        rankings,
        matches,
        doubles,
    }
}

/// With a year range set, drop rows whose date is valid but outside it.
/// Rows without a usable date stay; their file was already in range.
fn filter_years<T>(
    rows: Vec<T>,
    years: Option<YearRange>,
    bounds: DateBounds,
    dropped: &mut usize,
    date_of: impl Fn(&T) -> Option<&str>,
) -> Vec<T> {
    let Some(range) = years else {
        return rows;
    };
    let before = rows.len();
    let kept: Vec<T> = rows
        .into_iter()
        .filter(|row| {
            resolve_date(date_of(row), bounds)
                .parts()
                .is_none_or(|d| range.contains(d.year))
        })
        .collect();
    *dropped += before - kept.len();
    kept
}

fn write_stage(ctx: &mut PipelineContext<'_>, data: &Processed) -> Result<WriteSummary, StageError> {
    let diagnostics = match serde_json::to_value(&ctx.diagnostics) {
        Ok(value) => value,
        Err(err) => {
            return Err(ctx.abort(PipelineError::Write {
                path: ctx.config.db_path.clone(),
                source: anyhow::Error::new(err).context("serialize run diagnostics"),
            }));
        }
    };
    let contents = StoreContents {
        players: &data.players,
        rankings: &data.rankings,
        matches: &data.matches,
        doubles: &data.doubles,
    };
    let run = IngestRun {
        started_at: ctx.started_at,
        tours: ctx.config.tours.iter().map(|t| t.tour).collect(),
        years: ctx.config.years,
        files_read: ctx.diagnostics.files_read(),
        file_errors: ctx.diagnostics.file_errors(),
        row_errors: ctx.diagnostics.row_errors(),
        player_collisions: ctx.diagnostics.players.collisions.len(),
        diagnostics,
    };
    let total = contents.total_rows();
    let builder = DatabaseBuilder::new(&ctx.config.db_path, ctx.config.batch_size);
    let result = {
        let progress = &mut ctx.progress;
        let mut finished = 0usize;
        let mut table = "";
        let mut table_total = 0usize;
        builder.build(&contents, &run, |p| {
            if p.table != table {
                finished += table_total;
                table = p.table;
                table_total = p.total;
            }
            progress.report(
                finished + p.written,
                total,
                format!("{} {}/{}", p.table, p.written, p.total),
            );
        })
    };
    match result {
        Ok(summary) => Ok(summary),
        Err(source) => Err(ctx.abort(PipelineError::Write {
            path: ctx.config.db_path.clone(),
            source,
        })),
    }
}

fn verify_stage(ctx: &mut PipelineContext<'_>) -> Result<VerificationReport, StageError> {
    let report = match verify_store(&ctx.config.db_path) {
        Ok(report) => report,
        Err(source) => {
            return Err(ctx.abort(PipelineError::Verification {
                path: ctx.config.db_path.clone(),
                source,
            }));
        }
    };
    if !report.integrity.is_clean() {
        warn!(
            dangling = report.integrity.total_dangling(),
            sample = ?report.integrity.sample_dangling_ids,
            "dangling player references in store"
        );
    }
    let breaches = evaluate_thresholds(&report, &ctx.config.thresholds);
    ctx.report = Some(report.clone());
    if !breaches.is_empty() {
        return Err(ctx.abort(PipelineError::QualityGate { breaches }));
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_follow_the_state_machine() {
        use PipelineStage::*;
        assert!(Initialized.can_advance_to(Loading));
        assert!(Initialized.can_advance_to(Verifying));
        assert!(Writing.can_advance_to(Verifying));
        assert!(Loading.can_advance_to(Aborted));
        assert!(!Loading.can_advance_to(Writing));
        assert!(!Done.can_advance_to(Aborted));
        assert!(!Aborted.can_advance_to(Loading));
    }

    #[test]
    fn missing_data_dir_aborts_at_initialized() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let cfg = PipelineConfig {
            data_dir: dir.path().join("absent"),
            db_path: dir.path().join("out.sqlite"),
            ..PipelineConfig::default()
        };
        let mut ctx = PipelineContext::new(cfg, ProgressTracker::silent());
        let err = run_pipeline(&mut ctx).unwrap_err();
        assert_eq!(err.stage, PipelineStage::Initialized);
        assert!(matches!(err.error, PipelineError::Config(_)));
        assert_eq!(ctx.stage(), PipelineStage::Aborted);
    }

    #[test]
    fn year_filter_keeps_undated_rows() {
        let bounds = DateBounds::new(1877, 2026);
        let rows = vec![Some("19890101"), Some("19950101"), None, Some("garbage")];
        let mut dropped = 0;
        let kept = filter_years(
            rows,
            Some(YearRange { from: 1990, to: 1999 }),
            bounds,
            &mut dropped,
            |r| *r,
        );
        assert_eq!(kept, vec![Some("19950101"), None, Some("garbage")]);
        assert_eq!(dropped, 1);
    }
}
