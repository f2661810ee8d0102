use std::sync::Arc;

use crate::csv_rows::CsvRow;
use crate::paths::MatchFileKind;
use crate::tour::Tour;

/// Where a match row came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTag {
    pub tour: Tour,
    pub kind: MatchFileKind,
    pub file: Arc<str>,
    pub line: u64,
}

/// Tournament and match-level columns shared by singles and doubles rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTourney {
    pub tourney_id: Option<String>,
    pub tourney_name: Option<String>,
    pub surface: Option<String>,
    pub draw_size: Option<i64>,
    pub level: Option<String>,
    pub date: Option<String>,
    pub match_num: Option<i64>,
    pub score: Option<String>,
    pub best_of: Option<i64>,
    pub round: Option<String>,
    pub minutes: Option<i64>,
}

impl RawTourney {
    pub fn from_row(row: &CsvRow<'_>) -> Self {
        Self {
            tourney_id: row.string("tourney_id"),
            tourney_name: row.string("tourney_name"),
            surface: row.string("surface"),
            draw_size: row.int("draw_size"),
            level: row.string("tourney_level"),
            date: row.string("tourney_date"),
            match_num: row.int("match_num"),
            score: row.string("score"),
            best_of: row.int("best_of"),
            round: row.string("round"),
            minutes: row.int("minutes"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawParticipant {
    pub id: i64,
    pub seed: Option<String>,
    pub entry: Option<String>,
    pub name: Option<String>,
    pub hand: Option<String>,
    pub height: Option<i64>,
    pub country: Option<String>,
    pub age: Option<f64>,
    pub rank: Option<i64>,
    pub rank_points: Option<i64>,
}

impl RawParticipant {
    /// Columns `{prefix}_id`, `{prefix}_name`, ... . `None` without an id.
    pub fn from_row(row: &CsvRow<'_>, prefix: &str) -> Option<Self> {
        let col = |suffix: &str| format!("{prefix}_{suffix}");
        Some(Self {
            id: row.int(&col("id"))?,
            seed: row.string(&col("seed")),
            entry: row.string(&col("entry")),
            name: row.string(&col("name")),
            hand: row.string(&col("hand")),
            height: row.int(&col("ht")),
            country: row.string(&col("ioc")),
            age: row.float(&col("age")),
            rank: row.int(&col("rank")),
            rank_points: row.int(&col("rank_points")),
        })
    }
}

/// Per-side serve/return counters (`w_ace`, `l_bpFaced`, ...).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeStats {
    pub aces: Option<i64>,
    pub double_faults: Option<i64>,
    pub serve_points: Option<i64>,
    pub first_in: Option<i64>,
    pub first_won: Option<i64>,
    pub second_won: Option<i64>,
    pub service_games: Option<i64>,
    pub break_points_saved: Option<i64>,
    pub break_points_faced: Option<i64>,
}

impl ServeStats {
    pub const COLUMNS: [&'static str; 9] = [
        "ace", "df", "svpt", "1stin", "1stwon", "2ndwon", "svgms", "bpsaved", "bpfaced",
    ];

    pub fn from_row(row: &CsvRow<'_>, side: char) -> Self {
        let get = |name: &str| row.int(&format!("{side}_{name}"));
        Self {
            aces: get("ace"),
            double_faults: get("df"),
            serve_points: get("svpt"),
            first_in: get("1stin"),
            first_won: get("1stwon"),
            second_won: get("2ndwon"),
            service_games: get("svgms"),
            break_points_saved: get("bpsaved"),
            break_points_faced: get("bpfaced"),
        }
    }

    pub fn values(&self) -> [Option<i64>; 9] {
        [
            self.aces,
            self.double_faults,
            self.serve_points,
            self.first_in,
            self.first_won,
            self.second_won,
            self.service_games,
            self.break_points_saved,
            self.break_points_faced,
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawMatchRecord {
    pub source: SourceTag,
    pub event: RawTourney,
    pub winner: RawParticipant,
    pub loser: RawParticipant,
    pub winner_stats: ServeStats,
    pub loser_stats: ServeStats,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawDoublesRecord {
    pub source: SourceTag,
    pub event: RawTourney,
    pub winners: [RawParticipant; 2],
    pub losers: [RawParticipant; 2],
    pub winner_stats: ServeStats,
    pub loser_stats: ServeStats,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPlayer {
    pub tour: Tour,
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub hand: Option<String>,
    pub birth_date: Option<String>,
    pub country: Option<String>,
    pub height: Option<i64>,
    pub wikidata_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRanking {
    pub tour: Tour,
    pub ranking_date: Option<String>,
    pub rank: Option<i64>,
    pub player_id: i64,
    pub points: Option<i64>,
    pub tours: Option<i64>,
}
