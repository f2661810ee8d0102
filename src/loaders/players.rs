use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use serde::Serialize;
use tracing::warn;

use crate::csv_rows::read_with_header;
use crate::loaders::{FileLoad, LoadOutcome, load_files, note_bad_records};
use crate::model::NormalizedPlayer;
use crate::paths::SourceFile;
use crate::process::date::{DateBounds, resolve_date};
use crate::raw::RawPlayer;
use crate::tour::Tour;

pub fn load_players(
    files: &[SourceFile],
    pool: Option<&rayon::ThreadPool>,
) -> LoadOutcome<RawPlayer> {
    load_files(files, pool, read_players_file)
}

pub fn read_players_file(file: &SourceFile) -> Result<FileLoad<RawPlayer>> {
    let table = read_with_header(&file.path)?;
    let mut load = FileLoad::new();
    note_bad_records(file, &table.bad_records, &mut load.row_errors);
    for row in table.rows() {
        let Some(id) = row.int("player_id").or_else(|| row.int("id")) else {
            load.row_errors
                .record(format!("{}:{} missing player_id", file.name, row.line));
            continue;
        };
        load.records.push(RawPlayer {
            tour: file.tour,
            id,
            first_name: row.string("name_first"),
            last_name: row.string("name_last"),
            hand: row.string("hand"),
            birth_date: row.string("dob").or_else(|| row.string("birthdate")),
            country: row.string("ioc").or_else(|| row.string("country_code")),
            height: row.int("height").filter(|h| *h > 0),
            wikidata_id: row.string("wikidata_id"),
        });
    }
    Ok(load)
}

/// Raw per-tour ids that had to be moved to a new canonical id. Ids not in
/// the map are already canonical.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerIdMap {
    remapped: HashMap<(Tour, i64), i64>,
}

impl PlayerIdMap {
    pub fn canonical(&self, tour: Tour, raw_id: i64) -> i64 {
        self.remapped.get(&(tour, raw_id)).copied().unwrap_or(raw_id)
    }

    pub fn len(&self) -> usize {
        self.remapped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remapped.is_empty()
    }
}

/// Same raw id claimed by two different people on different tours.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PlayerCollision {
    pub raw_id: i64,
    pub kept_tour: Tour,
    pub kept_name: String,
    pub moved_tour: Tour,
    pub moved_name: String,
    pub assigned_id: i64,
}

#[derive(Debug, Clone, Default)]
pub struct PlayerMerge {
    pub players: Vec<NormalizedPlayer>,
    pub ids: PlayerIdMap,
    pub collisions: Vec<PlayerCollision>,
    pub duplicates_merged: usize,
    pub invalid_birth_dates: usize,
}

/// Fold raw player rows (in source order) into one canonical population.
///
/// Within a tour an id is authoritative, so repeats are merged. Across tours a
/// repeated id is merged only when name and birth date agree; otherwise the
/// later record moves to `raw id + tour offset` and the move is recorded.
pub fn merge_players(raw: Vec<RawPlayer>, bounds: DateBounds) -> PlayerMerge {
    let mut by_id: BTreeMap<i64, NormalizedPlayer> = BTreeMap::new();
    let mut merge = PlayerMerge::default();

    for record in raw {
        let tour = record.tour;
        let raw_id = record.id;
        let had_birth_date = record.birth_date.is_some();
        let mut candidate = to_normalized(record, bounds);
        if had_birth_date && candidate.birth_date.is_none() {
            merge.invalid_birth_dates += 1;
        }

        if let Some(&canonical) = merge.ids.remapped.get(&(tour, raw_id)) {
            if let Some(existing) = by_id.get_mut(&canonical) {
                candidate.player_id = canonical;
                *existing = merge_player(existing, &candidate);
                merge.duplicates_merged += 1;
            }
            continue;
        }

        let Some(existing) = by_id.get_mut(&raw_id) else {
            by_id.insert(raw_id, candidate);
            continue;
        };
        if existing.tour == tour || same_person(existing, &candidate) {
            *existing = merge_player(existing, &candidate);
            merge.duplicates_merged += 1;
            continue;
        }

        let kept_tour = existing.tour;
        let kept_name = existing.full_name.clone();
        let offset = tour.layout().collision_offset();
        let mut assigned = raw_id + offset;
        while by_id.contains_key(&assigned) {
            assigned += offset;
        }
        warn!(
            raw_id,
            kept = %kept_name,
            moved = %candidate.full_name,
            assigned,
            "player id collision across tours"
        );
        merge.collisions.push(PlayerCollision {
            raw_id,
            kept_tour,
            kept_name,
            moved_tour: tour,
            moved_name: candidate.full_name.clone(),
            assigned_id: assigned,
        });
        merge.ids.remapped.insert((tour, raw_id), assigned);
        candidate.player_id = assigned;
        by_id.insert(assigned, candidate);
    }

    merge.players = by_id.into_values().collect();
    merge
}

pub fn to_normalized(raw: RawPlayer, bounds: DateBounds) -> NormalizedPlayer {
    let birth_date = resolve_date(raw.birth_date.as_deref(), bounds).parts();
    let hand = raw
        .hand
        .map(|h| h.trim().to_ascii_uppercase())
        .filter(|h| !h.is_empty() && h != "U");
    let mut player = NormalizedPlayer {
        player_id: raw.id,
        source_id: raw.id,
        tour: raw.tour,
        first_name: raw.first_name,
        last_name: raw.last_name,
        full_name: String::new(),
        hand,
        birth_date,
        country_code: raw.country,
        height_cm: raw.height,
        wikidata_id: raw.wikidata_id,
    };
    player.full_name = full_name(&player);
    player
}

/// Field-wise merge: the record with more populated fields wins (ties go to
/// `incoming`), and its gaps are filled from the other. The canonical id of
/// `existing` is kept. Merging the same pair again changes nothing.
pub fn merge_player(existing: &NormalizedPlayer, incoming: &NormalizedPlayer) -> NormalizedPlayer {
    let (primary, secondary) = if richness(incoming) >= richness(existing) {
        (incoming, existing)
    } else {
        (existing, incoming)
    };
    let mut merged = NormalizedPlayer {
        player_id: existing.player_id,
        source_id: existing.source_id,
        tour: primary.tour,
        first_name: primary.first_name.clone().or_else(|| secondary.first_name.clone()),
        last_name: primary.last_name.clone().or_else(|| secondary.last_name.clone()),
        full_name: String::new(),
        hand: primary.hand.clone().or_else(|| secondary.hand.clone()),
        birth_date: primary.birth_date.or(secondary.birth_date),
        country_code: primary
            .country_code
            .clone()
            .or_else(|| secondary.country_code.clone()),
        height_cm: primary.height_cm.or(secondary.height_cm),
        wikidata_id: primary
            .wikidata_id
            .clone()
            .or_else(|| secondary.wikidata_id.clone()),
    };
    merged.full_name = full_name(&merged);
    merged
}

fn richness(p: &NormalizedPlayer) -> usize {
    [
        p.first_name.is_some(),
        p.last_name.is_some(),
        p.hand.is_some(),
        p.birth_date.is_some(),
        p.country_code.is_some(),
        p.height_cm.is_some(),
        p.wikidata_id.is_some(),
    ]
    .into_iter()
    .filter(|present| *present)
    .count()
}

fn same_person(a: &NormalizedPlayer, b: &NormalizedPlayer) -> bool {
    let names_match = name_key(&a.full_name) == name_key(&b.full_name);
    let births_agree = match (a.birth_date, b.birth_date) {
        (Some(x), Some(y)) => x == y,
        _ => true,
    };
    names_match && births_agree
}

fn name_key(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn full_name(p: &NormalizedPlayer) -> String {
    let parts: Vec<&str> = [p.first_name.as_deref(), p.last_name.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        format!("Unknown {}", p.source_id)
    } else {
        parts.join(" ")
    }
}
