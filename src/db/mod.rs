//! Database builder: schema, batched bulk load, then indexes and views.
//!
//! The store is written to `<dest>.partial` and renamed over `dest` only once
//! every table, index and view exists. A failed build removes the partial
//! file and leaves `dest` as it was.

pub mod insert;
pub mod schema;
pub mod views;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags, params};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::YearRange;
use crate::model::{NormalizedDoublesMatch, NormalizedMatch, NormalizedPlayer, NormalizedRanking};
use crate::tour::Tour;

/// Everything the write phase persists, borrowed from the orchestrator.
pub struct StoreContents<'a> {
    pub players: &'a [NormalizedPlayer],
    pub rankings: &'a [NormalizedRanking],
    pub matches: &'a [NormalizedMatch],
    pub doubles: &'a [NormalizedDoublesMatch],
}

impl StoreContents<'_> {
    pub fn total_rows(&self) -> usize {
        self.players.len() + self.rankings.len() + self.matches.len() + self.doubles.len()
    }
}

/// Row for the `ingest_runs` table.
#[derive(Debug, Clone)]
pub struct IngestRun {
    pub started_at: DateTime<Utc>,
    pub tours: Vec<Tour>,
    pub years: Option<YearRange>,
    pub files_read: usize,
    pub file_errors: usize,
    pub row_errors: usize,
    pub player_collisions: usize,
    pub diagnostics: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WriteSummary {
    pub path: PathBuf,
    pub players: usize,
    pub rankings: usize,
    pub matches: usize,
    pub doubles_matches: usize,
    pub indexes: usize,
    pub views: usize,
}

pub struct WriteProgress {
    pub table: &'static str,
    pub written: usize,
    pub total: usize,
}

pub struct DatabaseBuilder {
    dest: PathBuf,
    batch_size: usize,
}

impl DatabaseBuilder {
    pub fn new(dest: impl Into<PathBuf>, batch_size: usize) -> Self {
        Self {
            dest: dest.into(),
            batch_size: batch_size.max(1),
        }
    }

    pub fn partial_path(&self) -> PathBuf {
        let mut name = self
            .dest
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".partial");
        self.dest.with_file_name(name)
    }

    pub fn build(
        &self,
        contents: &StoreContents<'_>,
        run: &IngestRun,
        mut on_progress: impl FnMut(WriteProgress),
    ) -> Result<WriteSummary> {
        if let Some(parent) = self.dest.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("create store directory {}", parent.display()))?;
        }
        let partial = self.partial_path();
        remove_if_present(&partial)?;

        let result = self
            .write_partial(&partial, contents, run, &mut on_progress)
            .and_then(|summary| {
                self.swap_into_place(&partial)?;
                Ok(summary)
            });
        let summary = match result {
            Ok(summary) => summary,
            Err(err) => {
                if let Err(cleanup) = remove_if_present(&partial) {
                    warn!(path = %partial.display(), error = %cleanup, "could not remove partial store");
                }
                return Err(err);
            }
        };
        info!(path = %self.dest.display(), "store written");
        Ok(WriteSummary {
            path: self.dest.clone(),
            ..summary
        })
    }

    fn swap_into_place(&self, partial: &Path) -> Result<()> {
        // Replaces an existing store in one step; readers never see it missing.
        fs::rename(partial, &self.dest).with_context(|| {
            format!("swap {} into {}", partial.display(), self.dest.display())
        })
    }

    fn write_partial(
        &self,
        partial: &Path,
        contents: &StoreContents<'_>,
        run: &IngestRun,
        on_progress: &mut impl FnMut(WriteProgress),
    ) -> Result<WriteSummary> {
        let mut conn = Connection::open(partial)
            .with_context(|| format!("open sqlite db {}", partial.display()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = OFF;
             PRAGMA synchronous = OFF;
             PRAGMA temp_store = MEMORY;",
        )
        .context("set bulk-load pragmas")?;
        schema::create_schema(&conn)?;

        let players = self.load_table(
            &mut conn,
            schema::PLAYERS,
            &schema::player_columns(),
            contents.players,
            insert::player_values,
            on_progress,
        )?;
        let rankings = self.load_table(
            &mut conn,
            schema::RANKINGS,
            &schema::ranking_columns(),
            contents.rankings,
            insert::ranking_values,
            on_progress,
        )?;
        let matches = self.load_table(
            &mut conn,
            schema::MATCHES,
            &schema::match_columns(),
            contents.matches,
            insert::match_values,
            on_progress,
        )?;
        let doubles_matches = self.load_table(
            &mut conn,
            schema::DOUBLES,
            &schema::doubles_columns(),
            contents.doubles,
            insert::doubles_values,
            on_progress,
        )?;

        let summary = WriteSummary {
            path: partial.to_path_buf(),
            players,
            rankings,
            matches,
            doubles_matches,
            indexes: views::build_indexes(&conn)?,
            views: views::build_views(&conn)?,
        };
        record_run(&conn, run)?;
        conn.execute_batch("PRAGMA journal_mode = DELETE; ANALYZE;")
            .context("finalize store")?;
        conn.close()
            .map_err(|(_, err)| err)
            .context("close sqlite db")?;
        Ok(summary)
    }

    fn load_table<T>(
        &self,
        conn: &mut Connection,
        table: &'static str,
        columns: &[schema::Column],
        rows: &[T],
        to_values: impl Fn(&T) -> Vec<rusqlite::types::Value>,
        on_progress: &mut impl FnMut(WriteProgress),
    ) -> Result<usize> {
        let total = rows.len();
        on_progress(WriteProgress {
            table,
            written: 0,
            total,
        });
        let written = insert::insert_batched(
            conn,
            table,
            columns,
            rows,
            self.batch_size,
            to_values,
            |written| {
                on_progress(WriteProgress {
                    table,
                    written,
                    total,
                })
            },
        )?;
        debug!(table, rows = written, "table loaded");
        Ok(written)
    }
}

fn record_run(conn: &Connection, run: &IngestRun) -> Result<()> {
    let tours: Vec<&str> = run.tours.iter().map(|t| t.tag()).collect();
    conn.execute(
        "INSERT INTO ingest_runs (started_at, finished_at, tours, year_from, year_to,
                                  files_read, file_errors, row_errors, player_collisions,
                                  diagnostics_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            run.started_at.to_rfc3339(),
            Utc::now().to_rfc3339(),
            tours.join(","),
            run.years.map(|y| y.from),
            run.years.map(|y| y.to),
            run.files_read as i64,
            run.file_errors as i64,
            run.row_errors as i64,
            run.player_collisions as i64,
            serde_json::to_string(&run.diagnostics).context("serialize run diagnostics")?,
        ],
    )
    .context("record ingest run")?;
    Ok(())
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("remove {}", path.display())),
    }
}

/// Read-only handle on a finished store.
pub fn open_read_only(path: &Path) -> Result<Connection> {
    if !path.is_file() {
        anyhow::bail!("store {} does not exist", path.display());
    }
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("open sqlite db {} read-only", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NormalizedPlayer;

    fn player(id: i64) -> NormalizedPlayer {
        NormalizedPlayer {
            player_id: id,
            source_id: id,
            tour: Tour::Atp,
            first_name: Some("Test".to_string()),
            last_name: Some(format!("Player{id}")),
            full_name: format!("Test Player{id}"),
            hand: Some("R".to_string()),
            birth_date: None,
            country_code: None,
            height_cm: None,
            wikidata_id: None,
        }
    }

    fn run() -> IngestRun {
        IngestRun {
            started_at: Utc::now(),
            tours: vec![Tour::Atp],
            years: None,
            files_read: 1,
            file_errors: 0,
            row_errors: 0,
            player_collisions: 0,
            diagnostics: serde_json::json!({}),
        }
    }

    #[test]
    fn builds_then_swaps_into_place() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let dest = dir.path().join("nested").join("tennis.sqlite");
        let players: Vec<_> = (1..=3).map(player).collect();
        let contents = StoreContents {
            players: &players,
            rankings: &[],
            matches: &[],
            doubles: &[],
        };
        let builder = DatabaseBuilder::new(&dest, 2);
        let mut progress = Vec::new();
        let summary = builder
            .build(&contents, &run(), |p| progress.push((p.table, p.written)))
            .expect("build");

        assert_eq!(summary.players, 3);
        assert_eq!(summary.views, views::VIEW_NAMES.len());
        assert!(dest.is_file());
        assert!(!builder.partial_path().exists());
        assert!(progress.contains(&("players", 3)));

        let conn = open_read_only(&dest).expect("open");
        let runs: i64 = conn
            .query_row("SELECT COUNT(*) FROM ingest_runs", [], |row| row.get(0))
            .expect("runs");
        assert_eq!(runs, 1);
    }

    #[test]
    fn failed_build_leaves_destination_untouched() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let dest = dir.path().join("tennis.sqlite");
        fs::write(&dest, b"previous store").expect("seed dest");
        // Duplicate primary keys make the players insert fail.
        let players = vec![player(1), player(1)];
        let contents = StoreContents {
            players: &players,
            rankings: &[],
            matches: &[],
            doubles: &[],
        };
        let builder = DatabaseBuilder::new(&dest, 10);
        let err = builder.build(&contents, &run(), |_| {}).unwrap_err();
        assert!(format!("{err:#}").contains("insert into players"));
        assert_eq!(fs::read(&dest).expect("read dest"), b"previous store");
        assert!(!builder.partial_path().exists());
    }

    #[test]
    fn rebuild_replaces_previous_store() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let dest = dir.path().join("tennis.sqlite");
        let first: Vec<_> = (1..=2).map(player).collect();
        let second: Vec<_> = (1..=5).map(player).collect();
        let builder = DatabaseBuilder::new(&dest, 10);
        for players in [&first, &second] {
            let contents = StoreContents {
                players,
                rankings: &[],
                matches: &[],
                doubles: &[],
            };
            builder.build(&contents, &run(), |_| {}).expect("build");
        }

        let conn = open_read_only(&dest).expect("open");
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM players", [], |row| row.get(0))
            .expect("players");
        assert_eq!(count, 5);
        assert!(!builder.partial_path().exists());
    }

    #[test]
    fn read_only_open_rejects_missing_store() {
        let dir = tempfile::tempdir().expect("tmp dir");
        assert!(open_read_only(&dir.path().join("absent.sqlite")).is_err());
    }
}
