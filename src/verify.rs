//! Read-only checks over a finished store. The verifier only reports;
//! deciding whether a report is acceptable is [`evaluate_thresholds`]'s job,
//! called by the orchestrator.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use tracing::info;

use crate::config::QualityThresholds;
use crate::db::{self, schema, views};

const DANGLING_SAMPLE: usize = 20;

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Rate {
    pub count: u64,
    pub rate: f64,
}

impl Rate {
    fn of(count: u64, total: u64) -> Self {
        let rate = if total == 0 {
            0.0
        } else {
            count as f64 / total as f64
        };
        Self { count, rate }
    }
}

/// Field-processor audit numbers for one match table.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct QualityMetrics {
    pub total: u64,
    pub surface_source: Rate,
    pub surface_inferred: Rate,
    pub surface_defaulted: Rate,
    pub other_level: Rate,
    pub unparsed_score: Rate,
    pub invalid_date: Rate,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct IntegrityReport {
    pub dangling_match_refs: u64,
    pub dangling_doubles_refs: u64,
    pub dangling_ranking_refs: u64,
    pub distinct_dangling_players: u64,
    pub sample_dangling_ids: Vec<i64>,
    /// Extra rows beyond the first for each repeated (tour, date, player).
    pub duplicate_ranking_rows: u64,
}

impl IntegrityReport {
    pub fn total_dangling(&self) -> u64 {
        self.dangling_match_refs + self.dangling_doubles_refs + self.dangling_ranking_refs
    }

    pub fn is_clean(&self) -> bool {
        self.total_dangling() == 0
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CoverageReport {
    pub by_tour: BTreeMap<String, u64>,
    pub by_era: BTreeMap<String, u64>,
    pub by_decade: BTreeMap<String, u64>,
    pub by_tier: BTreeMap<String, u64>,
    pub by_surface: BTreeMap<String, u64>,
    pub by_level: BTreeMap<String, u64>,
    pub first_match_date: Option<String>,
    pub last_match_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LastRun {
    pub run_id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub tours: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VerificationReport {
    pub path: PathBuf,
    pub row_counts: BTreeMap<String, u64>,
    pub missing_views: Vec<String>,
    pub integrity: IntegrityReport,
    pub coverage: CoverageReport,
    pub quality: BTreeMap<String, QualityMetrics>,
    pub last_run: Option<LastRun>,
}

impl VerificationReport {
    pub fn row_count(&self, table: &str) -> u64 {
        self.row_counts.get(table).copied().unwrap_or(0)
    }

    pub fn quality_for(&self, table: &str) -> Option<&QualityMetrics> {
        self.quality.get(table)
    }

    /// Short human-readable digest for the terminal.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![format!("store: {}", self.path.display())];
        for (table, count) in &self.row_counts {
            lines.push(format!("  {table:<16} {count:>10} rows"));
        }
        let integrity = &self.integrity;
        lines.push(format!(
            "  dangling refs: matches {} / doubles {} / rankings {} ({} distinct ids)",
            integrity.dangling_match_refs,
            integrity.dangling_doubles_refs,
            integrity.dangling_ranking_refs,
            integrity.distinct_dangling_players
        ));
        if integrity.duplicate_ranking_rows > 0 {
            lines.push(format!(
                "  duplicate ranking rows kept: {}",
                integrity.duplicate_ranking_rows
            ));
        }
        for (table, q) in &self.quality {
            lines.push(format!(
                "  {table}: surface inferred {:.2}% defaulted {:.2}%, other level {:.2}%, unparsed score {:.2}%, invalid date {:.2}%",
                q.surface_inferred.rate * 100.0,
                q.surface_defaulted.rate * 100.0,
                q.other_level.rate * 100.0,
                q.unparsed_score.rate * 100.0,
                q.invalid_date.rate * 100.0
            ));
        }
        if !self.missing_views.is_empty() {
            lines.push(format!("  missing views: {}", self.missing_views.join(", ")));
        }
        lines
    }
}

/// Open `path` read-only and report on it.
pub fn verify_store(path: &Path) -> Result<VerificationReport> {
    let conn = db::open_read_only(path)?;
    let report = build_report(&conn, path)?;
    info!(
        path = %path.display(),
        matches = report.row_count(schema::MATCHES),
        dangling = report.integrity.total_dangling(),
        "store verified"
    );
    Ok(report)
}

pub fn build_report(conn: &Connection, path: &Path) -> Result<VerificationReport> {
    let mut row_counts = BTreeMap::new();
    for table in schema::BASE_TABLES {
        row_counts.insert(table.to_string(), count(conn, &format!("SELECT COUNT(*) FROM {table}"))?);
    }

    let mut quality = BTreeMap::new();
    for table in [schema::MATCHES, schema::DOUBLES] {
        quality.insert(table.to_string(), quality_metrics(conn, table)?);
    }

    Ok(VerificationReport {
        path: path.to_path_buf(),
        row_counts,
        missing_views: missing_views(conn)?,
        integrity: integrity(conn)?,
        coverage: coverage(conn)?,
        quality,
        last_run: last_run(conn)?,
    })
}

fn count(conn: &Connection, sql: &str) -> Result<u64> {
    let n: i64 = conn
        .query_row(sql, [], |row| row.get(0))
        .with_context(|| format!("query: {sql}"))?;
    Ok(n.max(0) as u64)
}

fn grouped(conn: &Connection, sql: &str) -> Result<BTreeMap<String, u64>> {
    let mut stmt = conn.prepare(sql).with_context(|| format!("prepare: {sql}"))?;
    let rows = stmt
        .query_map([], |row| {
            let key: Option<String> = row.get(0)?;
            let n: i64 = row.get(1)?;
            Ok((key.unwrap_or_else(|| "unknown".to_string()), n.max(0) as u64))
        })
        .with_context(|| format!("query: {sql}"))?;
    let mut out = BTreeMap::new();
    for row in rows {
        let (key, n) = row?;
        *out.entry(key).or_insert(0) += n;
    }
    Ok(out)
}

fn dangling(conn: &Connection, table: &str, column: &str) -> Result<u64> {
    count(
        conn,
        &format!(
            "SELECT COUNT(*) FROM {table} t
             WHERE NOT EXISTS (SELECT 1 FROM players p WHERE p.player_id = t.{column})"
        ),
    )
}

fn integrity(conn: &Connection) -> Result<IntegrityReport> {
    let mut report = IntegrityReport::default();
    for column in ["winner_id", "loser_id"] {
        report.dangling_match_refs += dangling(conn, schema::MATCHES, column)?;
    }
    for side in schema::DOUBLES_SIDES {
        report.dangling_doubles_refs += dangling(conn, schema::DOUBLES, &format!("{side}_id"))?;
    }
    report.dangling_ranking_refs = dangling(conn, schema::RANKINGS, "player_id")?;

    let refs = "WITH refs(id) AS (
            SELECT winner_id FROM matches UNION SELECT loser_id FROM matches
            UNION SELECT winner1_id FROM doubles_matches UNION SELECT winner2_id FROM doubles_matches
            UNION SELECT loser1_id FROM doubles_matches UNION SELECT loser2_id FROM doubles_matches
            UNION SELECT player_id FROM rankings
        )
        SELECT id FROM refs WHERE id NOT IN (SELECT player_id FROM players)";
    report.distinct_dangling_players = count(conn, &format!("SELECT COUNT(*) FROM ({refs})"))?;
    let mut stmt = conn
        .prepare(&format!("{refs} ORDER BY id LIMIT {DANGLING_SAMPLE}"))
        .context("prepare dangling id sample")?;
    report.sample_dangling_ids = stmt
        .query_map([], |row| row.get(0))
        .context("query dangling id sample")?
        .collect::<rusqlite::Result<Vec<i64>>>()?;

    report.duplicate_ranking_rows = count(
        conn,
        "SELECT COALESCE(SUM(n - 1), 0) FROM (
             SELECT COUNT(*) AS n FROM rankings
             GROUP BY tour, ranking_date, player_id HAVING COUNT(*) > 1
         )",
    )?;
    Ok(report)
}

fn coverage(conn: &Connection) -> Result<CoverageReport> {
    let (first, last): (Option<String>, Option<String>) = conn
        .query_row(
            "SELECT MIN(tourney_date), MAX(tourney_date) FROM matches WHERE date_valid = 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .context("query match date span")?;
    Ok(CoverageReport {
        by_tour: grouped(conn, "SELECT tour, COUNT(*) FROM matches GROUP BY tour")?,
        by_era: grouped(conn, "SELECT era, COUNT(*) FROM matches GROUP BY era")?,
        by_decade: grouped(
            conn,
            "SELECT CASE WHEN tourney_year IS NULL THEN NULL
                         ELSE ((tourney_year / 10) * 10) || 's' END AS decade,
                    COUNT(*)
             FROM matches GROUP BY decade",
        )?,
        by_tier: grouped(
            conn,
            "SELECT competition_tier, COUNT(*) FROM matches GROUP BY competition_tier",
        )?,
        by_surface: grouped(conn, "SELECT surface, COUNT(*) FROM matches GROUP BY surface")?,
        by_level: grouped(
            conn,
            "SELECT tourney_level, COUNT(*) FROM matches GROUP BY tourney_level",
        )?,
        first_match_date: first,
        last_match_date: last,
    })
}

fn quality_metrics(conn: &Connection, table: &str) -> Result<QualityMetrics> {
    let sql = format!(
        "SELECT COUNT(*),
                COALESCE(SUM(surface_source = 'source'), 0),
                COALESCE(SUM(surface_source = 'inferred'), 0),
                COALESCE(SUM(surface_source = 'defaulted'), 0),
                COALESCE(SUM(tourney_level = 'other'), 0),
                COALESCE(SUM(score_status = 'unparsed'), 0),
                COALESCE(SUM(date_valid = 0), 0)
         FROM {table}"
    );
    let counts: [i64; 7] = conn
        .query_row(&sql, [], |row| {
            Ok([
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
            ])
        })
        .with_context(|| format!("quality metrics for {table}"))?;
    let [total, source, inferred, defaulted, other, unparsed, invalid] =
        counts.map(|n| n.max(0) as u64);
    Ok(QualityMetrics {
        total,
        surface_source: Rate::of(source, total),
        surface_inferred: Rate::of(inferred, total),
        surface_defaulted: Rate::of(defaulted, total),
        other_level: Rate::of(other, total),
        unparsed_score: Rate::of(unparsed, total),
        invalid_date: Rate::of(invalid, total),
    })
}

fn missing_views(conn: &Connection) -> Result<Vec<String>> {
    let mut missing = Vec::new();
    for view in views::VIEW_NAMES {
        let present: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'view' AND name = ?1",
                [view],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("look up view {view}"))?;
        if present.is_none() {
            missing.push(view.to_string());
        }
    }
    Ok(missing)
}

fn last_run(conn: &Connection) -> Result<Option<LastRun>> {
    conn.query_row(
        "SELECT run_id, started_at, finished_at, tours FROM ingest_runs
         ORDER BY run_id DESC LIMIT 1",
        [],
        |row| {
            Ok(LastRun {
                run_id: row.get(0)?,
                started_at: row.get(1)?,
                finished_at: row.get(2)?,
                tours: row.get(3)?,
            })
        },
    )
    .optional()
    .context("read last ingest run")
}

/// Every threshold the report exceeds, as readable messages. Empty means
/// the report is acceptable.
pub fn evaluate_thresholds(report: &VerificationReport, limits: &QualityThresholds) -> Vec<String> {
    let mut breaches = Vec::new();
    if let Some(max) = limits.max_dangling_refs {
        let dangling = report.integrity.total_dangling();
        if dangling > max {
            breaches.push(format!("{dangling} dangling player references (max {max})"));
        }
    }
    for (table, q) in &report.quality {
        let checks = [
            ("unparsed score rate", &q.unparsed_score, limits.max_unparsed_score_rate),
            ("other level rate", &q.other_level, limits.max_other_level_rate),
            ("defaulted surface rate", &q.surface_defaulted, limits.max_defaulted_surface_rate),
            ("invalid date rate", &q.invalid_date, limits.max_invalid_date_rate),
        ];
        for (label, rate, limit) in checks {
            if let Some(max) = limit
                && rate.rate > max
            {
                breaches.push(format!(
                    "{table} {label} {:.4} exceeds {max:.4} ({} rows)",
                    rate.rate, rate.count
                ));
            }
        }
    }
    breaches
}
