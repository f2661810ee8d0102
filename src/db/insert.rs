use anyhow::{Context, Result};
use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};

use crate::db::schema::{Column, insert_sql};
use crate::model::{
    DateResolution, DerivedFields, NormalizedDoublesMatch, NormalizedMatch, NormalizedPlayer,
    NormalizedRanking, ScoreStatus, SetSlot,
};
use crate::process::score::{MAX_SETS, canonical_score};
use crate::raw::{RawParticipant, RawTourney, ServeStats, SourceTag};

/// Insert `rows` in transactions of `batch_size`, reusing one cached
/// statement. `on_batch` receives the running total after each commit.
pub fn insert_batched<T>(
    conn: &mut Connection,
    table: &str,
    columns: &[Column],
    rows: &[T],
    batch_size: usize,
    to_values: impl Fn(&T) -> Vec<Value>,
    mut on_batch: impl FnMut(usize),
) -> Result<usize> {
    let sql = insert_sql(table, columns);
    let mut written = 0usize;
    for chunk in rows.chunks(batch_size.max(1)) {
        let tx = conn
            .transaction()
            .with_context(|| format!("begin {table} batch"))?;
        {
            let mut stmt = tx
                .prepare_cached(&sql)
                .with_context(|| format!("prepare insert into {table}"))?;
            for row in chunk {
                let values = to_values(row);
                debug_assert_eq!(values.len(), columns.len());
                stmt.execute(params_from_iter(values))
                    .with_context(|| format!("insert into {table} (row {})", written + 1))?;
                written += 1;
            }
        }
        tx.commit()
            .with_context(|| format!("commit {table} batch"))?;
        on_batch(written);
    }
    Ok(written)
}

fn text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |s| Value::Text(s.to_string()))
}

fn int(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Integer)
}

fn real(value: Option<f64>) -> Value {
    value.map_or(Value::Null, Value::Real)
}

fn push_date(out: &mut Vec<Value>, date: &DateResolution) {
    match date.parts() {
        Some(parts) => {
            out.push(Value::Text(parts.iso()));
            out.push(Value::Integer(parts.year.into()));
            out.push(Value::Integer(parts.month.into()));
            out.push(Value::Integer(parts.day.into()));
        }
        None => out.extend([Value::Null, Value::Null, Value::Null, Value::Null]),
    }
}

pub fn player_values(p: &NormalizedPlayer) -> Vec<Value> {
    vec![
        Value::Integer(p.player_id),
        Value::Integer(p.source_id),
        Value::Text(p.tour.tag().to_string()),
        text(p.first_name.as_deref()),
        text(p.last_name.as_deref()),
        Value::Text(p.full_name.clone()),
        text(p.hand.as_deref()),
        p.birth_date.map_or(Value::Null, |d| Value::Text(d.iso())),
        p.birth_date
            .map_or(Value::Null, |d| Value::Integer(d.year.into())),
        text(p.country_code.as_deref()),
        int(p.height_cm),
        text(p.wikidata_id.as_deref()),
    ]
}

pub fn ranking_values(r: &NormalizedRanking) -> Vec<Value> {
    let mut out = Vec::with_capacity(10);
    out.push(Value::Text(r.tour.tag().to_string()));
    push_date(&mut out, &r.date);
    out.push(Value::Integer(i64::from(r.date.is_valid())));
    out.push(int(r.rank));
    out.push(Value::Integer(r.player_id));
    out.push(int(r.points));
    out.push(int(r.tournaments));
    out
}

pub fn match_values(m: &NormalizedMatch) -> Vec<Value> {
    let mut out = Vec::with_capacity(120);
    push_event(&mut out, &m.raw.source, &m.raw.event, &m.derived);
    push_participant(&mut out, &m.raw.winner);
    push_participant(&mut out, &m.raw.loser);
    push_score(&mut out, &m.raw.event, &m.derived);
    push_stats(&mut out, &m.raw.winner_stats, &m.raw.loser_stats);
    out
}

pub fn doubles_values(d: &NormalizedDoublesMatch) -> Vec<Value> {
    let mut out = Vec::with_capacity(160);
    push_event(&mut out, &d.raw.source, &d.raw.event, &d.derived);
    for participant in d.raw.winners.iter().chain(d.raw.losers.iter()) {
        push_participant(&mut out, participant);
    }
    push_score(&mut out, &d.raw.event, &d.derived);
    push_stats(&mut out, &d.raw.winner_stats, &d.raw.loser_stats);
    out
}

fn push_event(out: &mut Vec<Value>, source: &SourceTag, event: &RawTourney, derived: &DerivedFields) {
    out.push(Value::Text(source.tour.tag().to_string()));
    out.push(Value::Text(source.file.to_string()));
    out.push(Value::Integer(source.line as i64));
    out.push(text(event.tourney_id.as_deref()));
    out.push(text(event.tourney_name.as_deref()));
    out.push(Value::Text(derived.surface.value.clone()));
    out.push(text(event.surface.as_deref()));
    out.push(Value::Text(derived.surface.source.as_str().to_string()));
    out.push(int(event.draw_size));
    out.push(text(event.level.as_deref()));
    out.push(Value::Text(derived.level.level.as_str().to_string()));
    out.push(Value::Text(derived.tier.as_str().to_string()));
    out.push(Value::Text(derived.era.as_str().to_string()));
    out.push(text(event.date.as_deref()));
    push_date(out, &derived.date);
    out.push(Value::Integer(i64::from(derived.date.is_valid())));
    out.push(text(derived.date.issue()));
    out.push(int(event.match_num));
    out.push(text(event.round.as_deref()));
    out.push(int(event.best_of));
    out.push(int(event.minutes));
}

fn push_participant(out: &mut Vec<Value>, p: &RawParticipant) {
    out.push(Value::Integer(p.id));
    out.push(text(p.seed.as_deref()));
    out.push(text(p.entry.as_deref()));
    out.push(text(p.name.as_deref()));
    out.push(text(p.hand.as_deref()));
    out.push(int(p.height));
    out.push(text(p.country.as_deref()));
    out.push(real(p.age));
    out.push(int(p.rank));
    out.push(int(p.rank_points));
}

/// Unparsed scores keep the raw text; everything else is stored canonically.
fn push_score(out: &mut Vec<Value>, event: &RawTourney, derived: &DerivedFields) {
    let score = &derived.score;
    let stored = match score.status {
        ScoreStatus::Missing => None,
        ScoreStatus::Unparsed => event.score.clone(),
        _ => Some(canonical_score(score)),
    };
    out.push(stored.map_or(Value::Null, Value::Text));
    out.push(Value::Text(score.status.as_str().to_string()));
    out.push(Value::Integer(score.set_count() as i64));
    for n in 0..MAX_SETS {
        match score.slots.get(n) {
            Some(SetSlot::Games(set)) => {
                let kind = if set.match_tiebreak { "match_tiebreak" } else { "set" };
                out.push(Value::Text(kind.to_string()));
                out.push(Value::Integer(set.winner_games.into()));
                out.push(Value::Integer(set.loser_games.into()));
                out.push(set.tiebreak.map_or(Value::Null, |tb| Value::Integer(tb.into())));
            }
            Some(SetSlot::Sentinel(term)) => {
                out.push(Value::Text(term.canonical().to_string()));
                out.extend([Value::Null, Value::Null, Value::Null]);
            }
            None => out.extend([Value::Null, Value::Null, Value::Null, Value::Null]),
        }
    }
}

fn push_stats(out: &mut Vec<Value>, winner: &ServeStats, loser: &ServeStats) {
    out.extend(winner.values().into_iter().map(int));
    out.extend(loser.values().into_iter().map(int));
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::db::schema::{
        self, doubles_columns, match_columns, player_columns, ranking_columns,
    };
    use crate::model::{DateParts, Era};
    use crate::paths::MatchFileKind;
    use crate::process::date::DateBounds;
    use crate::process::normalize::derive_fields;
    use crate::raw::{RawDoublesRecord, RawMatchRecord};
    use crate::tour::Tour;

    const BOUNDS: DateBounds = DateBounds {
        earliest_year: 1877,
        latest_year: 2026,
    };

    fn participant(id: i64) -> RawParticipant {
        RawParticipant {
            id,
            name: Some(format!("Player {id}")),
            ..RawParticipant::default()
        }
    }

    fn sample_match(score: &str) -> NormalizedMatch {
        let source = SourceTag {
            tour: Tour::Atp,
            kind: MatchFileKind::Main,
            file: Arc::from("atp_matches_2019.csv"),
            line: 2,
        };
        let event = RawTourney {
            tourney_name: Some("Wimbledon".to_string()),
            surface: Some("Grass".to_string()),
            level: Some("G".to_string()),
            date: Some("20190701".to_string()),
            score: Some(score.to_string()),
            ..RawTourney::default()
        };
        let derived = derive_fields(&source, &event, BOUNDS);
        NormalizedMatch {
            raw: RawMatchRecord {
                source,
                event,
                winner: participant(1),
                loser: participant(2),
                winner_stats: ServeStats::default(),
                loser_stats: ServeStats::default(),
            },
            derived,
        }
    }

    #[test]
    fn value_rows_match_column_lists() {
        let m = sample_match("7-6(5) 6-4 RET");
        assert_eq!(match_values(&m).len(), match_columns().len());

        let d = NormalizedDoublesMatch {
            raw: RawDoublesRecord {
                source: m.raw.source.clone(),
                event: m.raw.event.clone(),
                winners: [participant(1), participant(2)],
                losers: [participant(3), participant(4)],
                winner_stats: ServeStats::default(),
                loser_stats: ServeStats::default(),
            },
            derived: m.derived.clone(),
        };
        assert_eq!(doubles_values(&d).len(), doubles_columns().len());

        let p = NormalizedPlayer {
            player_id: 1,
            source_id: 1,
            tour: Tour::Atp,
            first_name: None,
            last_name: None,
            full_name: "Unknown 1".to_string(),
            hand: None,
            birth_date: None,
            country_code: None,
            height_cm: None,
            wikidata_id: None,
        };
        assert_eq!(player_values(&p).len(), player_columns().len());

        let r = NormalizedRanking {
            tour: Tour::Wta,
            date: DateResolution::Valid(DateParts {
                year: 2020,
                month: 1,
                day: 6,
            }),
            rank: Some(1),
            player_id: 200001,
            points: None,
            tournaments: None,
        };
        assert_eq!(ranking_values(&r).len(), ranking_columns().len());
    }

    #[test]
    fn batches_write_every_row() {
        let mut conn = Connection::open_in_memory().expect("open");
        schema::create_schema(&conn).expect("schema");
        let rows: Vec<NormalizedMatch> = (0..25).map(|_| sample_match("6-4 6-4 6-4")).collect();
        let mut commits = Vec::new();
        let written = insert_batched(
            &mut conn,
            schema::MATCHES,
            &match_columns(),
            &rows,
            10,
            match_values,
            |n| commits.push(n),
        )
        .expect("insert");
        assert_eq!(written, 25);
        assert_eq!(commits, vec![10, 20, 25]);

        let (surface, era, date, kind): (String, String, String, String) = conn
            .query_row(
                "SELECT surface, era, tourney_date, set1_kind FROM matches LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .expect("row");
        assert_eq!(surface, "Grass");
        assert_eq!(era, Era::Modern.as_str());
        assert_eq!(date, "2019-07-01");
        assert_eq!(kind, "set");
    }

    #[test]
    fn sentinel_slot_is_stored_as_kind() {
        let m = sample_match("6-3 W/O");
        let columns = match_columns();
        let values = match_values(&m);
        let idx = columns
            .iter()
            .position(|c| c.name == "set2_kind")
            .expect("set2_kind column");
        assert_eq!(values[idx], Value::Text("W/O".to_string()));
    }
}
