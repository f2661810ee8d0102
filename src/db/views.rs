use anyhow::{Context, Result};
use rusqlite::Connection;

pub const VIEW_NAMES: [&str; 3] = [
    "matches_with_players",
    "matches_with_rankings",
    "player_ranking_trajectory",
];

const INDEXES: &[(&str, &str, &str)] = &[
    ("idx_matches_winner", "matches", "winner_id"),
    ("idx_matches_loser", "matches", "loser_id"),
    ("idx_matches_date", "matches", "tourney_date"),
    ("idx_matches_year", "matches", "tourney_year"),
    ("idx_matches_tourney_name", "matches", "tourney_name"),
    ("idx_matches_surface", "matches", "surface"),
    ("idx_matches_level", "matches", "tourney_level"),
    ("idx_matches_tier", "matches", "competition_tier"),
    ("idx_matches_era", "matches", "era"),
    ("idx_players_full_name", "players", "full_name"),
    ("idx_players_last_name", "players", "last_name"),
    ("idx_players_country", "players", "country_code"),
    ("idx_rankings_player", "rankings", "player_id"),
    ("idx_rankings_date", "rankings", "ranking_date"),
    ("idx_rankings_rank", "rankings", "rank"),
    ("idx_rankings_player_date", "rankings", "player_id, ranking_date"),
    ("idx_doubles_winner1", "doubles_matches", "winner1_id"),
    ("idx_doubles_winner2", "doubles_matches", "winner2_id"),
    ("idx_doubles_loser1", "doubles_matches", "loser1_id"),
    ("idx_doubles_loser2", "doubles_matches", "loser2_id"),
    ("idx_doubles_date", "doubles_matches", "tourney_date"),
    ("idx_doubles_surface", "doubles_matches", "surface"),
    ("idx_doubles_level", "doubles_matches", "tourney_level"),
];

/// Built after the bulk load, never before.
pub fn build_indexes(conn: &Connection) -> Result<usize> {
    for (name, table, columns) in INDEXES {
        conn.execute_batch(&format!(
            "CREATE INDEX IF NOT EXISTS {name} ON {table}({columns});"
        ))
        .with_context(|| format!("create index {name}"))?;
    }
    Ok(INDEXES.len())
}

fn ranking_lookup(side: &str, column: &str, alias: &str) -> String {
    format!(
        "(SELECT r.{column} FROM rankings r
          WHERE r.player_id = m.{side}_id AND r.tour = m.tour
            AND r.date_valid = 1 AND r.ranking_date <= m.tourney_date
          ORDER BY r.ranking_date DESC, r.rank IS NULL, r.rank
          LIMIT 1) AS {alias}"
    )
}

fn matches_with_rankings_sql() -> String {
    let lookups: Vec<String> = ["winner", "loser"]
        .into_iter()
        .flat_map(|side| {
            [
                ranking_lookup(side, "rank", &format!("{side}_ranking")),
                ranking_lookup(side, "points", &format!("{side}_ranking_points")),
                ranking_lookup(side, "ranking_date", &format!("{side}_ranking_date")),
            ]
        })
        .collect();
    format!(
        "CREATE VIEW IF NOT EXISTS matches_with_rankings AS
         SELECT m.match_id, m.tour, m.tourney_id, m.tourney_name, m.tourney_date,
                m.tourney_year, m.surface, m.tourney_level, m.competition_tier, m.round,
                m.winner_id, m.winner_name, m.loser_id, m.loser_name, m.score,
                {}
         FROM matches m;",
        lookups.join(",\n                ")
    )
}

const MATCHES_WITH_PLAYERS: &str = r#"
CREATE VIEW IF NOT EXISTS matches_with_players AS
SELECT m.*,
       wp.full_name AS winner_full_name,
       wp.birth_date AS winner_birth_date,
       wp.country_code AS winner_country_code,
       wp.height_cm AS winner_height_cm,
       wp.wikidata_id AS winner_wikidata_id,
       lp.full_name AS loser_full_name,
       lp.birth_date AS loser_birth_date,
       lp.country_code AS loser_country_code,
       lp.height_cm AS loser_height_cm,
       lp.wikidata_id AS loser_wikidata_id
FROM matches m
LEFT JOIN players wp ON wp.player_id = m.winner_id
LEFT JOIN players lp ON lp.player_id = m.loser_id;
"#;

// One row per (player, tour, date); `snapshot_rows` > 1 marks source duplicates.
// `rank_change` is positive when the player moved up.
const PLAYER_RANKING_TRAJECTORY: &str = r#"
CREATE VIEW IF NOT EXISTS player_ranking_trajectory AS
WITH snapshots AS (
    SELECT player_id, tour, ranking_date, ranking_year,
           MIN(rank) AS rank,
           MAX(points) AS points,
           MAX(tournaments) AS tournaments,
           COUNT(*) AS snapshot_rows
    FROM rankings
    WHERE date_valid = 1
    GROUP BY player_id, tour, ranking_date
)
SELECT s.player_id,
       p.full_name,
       s.tour,
       s.ranking_date,
       s.ranking_year,
       s.rank,
       s.points,
       s.tournaments,
       s.snapshot_rows,
       LAG(s.rank) OVER w AS previous_rank,
       LAG(s.rank) OVER w - s.rank AS rank_change,
       MIN(s.rank) OVER (PARTITION BY s.player_id, s.tour ORDER BY s.ranking_date
                         ROWS UNBOUNDED PRECEDING) AS best_rank_to_date
FROM snapshots s
LEFT JOIN players p ON p.player_id = s.player_id
WINDOW w AS (PARTITION BY s.player_id, s.tour ORDER BY s.ranking_date);
"#;

pub fn build_views(conn: &Connection) -> Result<usize> {
    conn.execute_batch(MATCHES_WITH_PLAYERS)
        .context("create view matches_with_players")?;
    conn.execute_batch(&matches_with_rankings_sql())
        .context("create view matches_with_rankings")?;
    conn.execute_batch(PLAYER_RANKING_TRAJECTORY)
        .context("create view player_ranking_trajectory")?;
    Ok(VIEW_NAMES.len())
}
