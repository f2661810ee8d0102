use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::process::score::MAX_SETS;
use crate::raw::ServeStats;

pub const PLAYERS: &str = "players";
pub const RANKINGS: &str = "rankings";
pub const MATCHES: &str = "matches";
pub const DOUBLES: &str = "doubles_matches";
pub const INGEST_RUNS: &str = "ingest_runs";

pub const BASE_TABLES: [&str; 4] = [MATCHES, PLAYERS, RANKINGS, DOUBLES];

pub const DOUBLES_SIDES: [&str; 4] = ["winner1", "winner2", "loser1", "loser2"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub sql_type: &'static str,
}

fn col(out: &mut Vec<Column>, name: impl Into<String>, sql_type: &'static str) {
    out.push(Column {
        name: name.into(),
        sql_type,
    });
}

pub fn player_columns() -> Vec<Column> {
    let mut out = Vec::new();
    col(&mut out, "player_id", "INTEGER PRIMARY KEY");
    col(&mut out, "source_id", "INTEGER NOT NULL");
    col(&mut out, "tour", "TEXT NOT NULL");
    col(&mut out, "first_name", "TEXT NULL");
    col(&mut out, "last_name", "TEXT NULL");
    col(&mut out, "full_name", "TEXT NOT NULL");
    col(&mut out, "hand", "TEXT NULL");
    col(&mut out, "birth_date", "TEXT NULL");
    col(&mut out, "birth_year", "INTEGER NULL");
    col(&mut out, "country_code", "TEXT NULL");
    col(&mut out, "height_cm", "INTEGER NULL");
    col(&mut out, "wikidata_id", "TEXT NULL");
    out
}

pub fn ranking_columns() -> Vec<Column> {
    let mut out = Vec::new();
    col(&mut out, "tour", "TEXT NOT NULL");
    col(&mut out, "ranking_date", "TEXT NULL");
    col(&mut out, "ranking_year", "INTEGER NULL");
    col(&mut out, "ranking_month", "INTEGER NULL");
    col(&mut out, "ranking_day", "INTEGER NULL");
    col(&mut out, "date_valid", "INTEGER NOT NULL");
    col(&mut out, "rank", "INTEGER NULL");
    col(&mut out, "player_id", "INTEGER NOT NULL");
    col(&mut out, "points", "INTEGER NULL");
    col(&mut out, "tournaments", "INTEGER NULL");
    out
}

pub fn match_columns() -> Vec<Column> {
    let mut out = Vec::new();
    event_columns(&mut out);
    participant_columns(&mut out, "winner");
    participant_columns(&mut out, "loser");
    score_columns(&mut out);
    stats_columns(&mut out);
    out
}

pub fn doubles_columns() -> Vec<Column> {
    let mut out = Vec::new();
    event_columns(&mut out);
    for side in DOUBLES_SIDES {
        participant_columns(&mut out, side);
    }
    score_columns(&mut out);
    stats_columns(&mut out);
    out
}

fn event_columns(out: &mut Vec<Column>) {
    col(out, "tour", "TEXT NOT NULL");
    col(out, "source_file", "TEXT NOT NULL");
    col(out, "source_line", "INTEGER NOT NULL");
    col(out, "tourney_id", "TEXT NULL");
    col(out, "tourney_name", "TEXT NULL");
    col(out, "surface", "TEXT NOT NULL");
    col(out, "surface_raw", "TEXT NULL");
    col(out, "surface_source", "TEXT NOT NULL");
    col(out, "draw_size", "INTEGER NULL");
    col(out, "tourney_level_raw", "TEXT NULL");
    col(out, "tourney_level", "TEXT NOT NULL");
    col(out, "competition_tier", "TEXT NOT NULL");
    col(out, "era", "TEXT NOT NULL");
    col(out, "tourney_date_raw", "TEXT NULL");
    col(out, "tourney_date", "TEXT NULL");
    col(out, "tourney_year", "INTEGER NULL");
    col(out, "tourney_month", "INTEGER NULL");
    col(out, "tourney_day", "INTEGER NULL");
    col(out, "date_valid", "INTEGER NOT NULL");
    col(out, "date_issue", "TEXT NULL");
    col(out, "match_num", "INTEGER NULL");
    col(out, "round", "TEXT NULL");
    col(out, "best_of", "INTEGER NULL");
    col(out, "minutes", "INTEGER NULL");
}

fn participant_columns(out: &mut Vec<Column>, prefix: &str) {
    col(out, format!("{prefix}_id"), "INTEGER NOT NULL");
    col(out, format!("{prefix}_seed"), "TEXT NULL");
    col(out, format!("{prefix}_entry"), "TEXT NULL");
    col(out, format!("{prefix}_name"), "TEXT NULL");
    col(out, format!("{prefix}_hand"), "TEXT NULL");
    col(out, format!("{prefix}_ht"), "INTEGER NULL");
    col(out, format!("{prefix}_ioc"), "TEXT NULL");
    col(out, format!("{prefix}_age"), "REAL NULL");
    col(out, format!("{prefix}_rank"), "INTEGER NULL");
    col(out, format!("{prefix}_rank_points"), "INTEGER NULL");
}

fn score_columns(out: &mut Vec<Column>) {
    col(out, "score", "TEXT NULL");
    col(out, "score_status", "TEXT NOT NULL");
    col(out, "sets_played", "INTEGER NOT NULL");
    for n in 1..=MAX_SETS {
        col(out, format!("set{n}_kind"), "TEXT NULL");
        col(out, format!("set{n}_winner_games"), "INTEGER NULL");
        col(out, format!("set{n}_loser_games"), "INTEGER NULL");
        col(out, format!("set{n}_tiebreak"), "INTEGER NULL");
    }
}

fn stats_columns(out: &mut Vec<Column>) {
    for side in ['w', 'l'] {
        for stat in ServeStats::COLUMNS {
            col(out, format!("{side}_{stat}"), "INTEGER NULL");
        }
    }
}

/// `CREATE TABLE`; `key` adds a leading integer primary key when the column
/// list has none. No foreign keys: dangling references are reported by the
/// verifier rather than rejected on insert.
pub fn create_table_sql(table: &str, key: Option<&str>, columns: &[Column]) -> String {
    let mut defs: Vec<String> = Vec::with_capacity(columns.len() + 1);
    if let Some(key) = key {
        defs.push(format!("{key} INTEGER PRIMARY KEY"));
    }
    defs.extend(columns.iter().map(|c| format!("{} {}", c.name, c.sql_type)));
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (\n    {}\n)",
        defs.join(",\n    ")
    )
}

pub fn insert_sql(table: &str, columns: &[Column]) -> String {
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    let slots: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        names.join(", "),
        slots.join(", ")
    )
}

pub fn create_schema(conn: &Connection) -> Result<()> {
    let statements = [
        create_table_sql(PLAYERS, None, &player_columns()),
        create_table_sql(RANKINGS, Some("ranking_id"), &ranking_columns()),
        create_table_sql(MATCHES, Some("match_id"), &match_columns()),
        create_table_sql(DOUBLES, Some("match_id"), &doubles_columns()),
    ];
    for sql in &statements {
        conn.execute_batch(sql)
            .with_context(|| format!("create table: {}", first_line(sql)))?;
    }
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS ingest_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            tours TEXT NOT NULL,
            year_from INTEGER NULL,
            year_to INTEGER NULL,
            files_read INTEGER NOT NULL,
            file_errors INTEGER NOT NULL,
            row_errors INTEGER NOT NULL,
            player_collisions INTEGER NOT NULL,
            diagnostics_json TEXT NOT NULL
        );
        "#,
    )
    .context("create ingest_runs table")?;
    Ok(())
}

fn first_line(sql: &str) -> &str {
    sql.lines().next().unwrap_or(sql)
}
