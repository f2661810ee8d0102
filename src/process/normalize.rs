use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;

use crate::error::IssueLog;
use crate::loaders::players::PlayerIdMap;
use crate::model::{
    DerivedFields, Era, LevelSource, NormalizedDoublesMatch, NormalizedMatch,
    NormalizedRanking, ScoreStatus, SurfaceSource,
};
use crate::paths::MatchFileKind;
use crate::process::date::{DateBounds, resolve_date};
use crate::process::level::{classify_tier, resolve_level};
use crate::process::score::parse_score;
use crate::process::surface::resolve_surface;
use crate::raw::{RawDoublesRecord, RawMatchRecord, RawRanking, RawTourney, SourceTag};

/// Tallies of every heuristic or failed field decision, per collection.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessingStats {
    pub records: usize,
    pub invalid_dates: IssueLog,
    pub unparsed_scores: IssueLog,
    pub other_levels: IssueLog,
    pub surface_sources: BTreeMap<SurfaceSource, usize>,
    pub score_statuses: BTreeMap<ScoreStatus, usize>,
}

impl ProcessingStats {
    fn observe(&mut self, source: &SourceTag, event: &RawTourney, derived: &DerivedFields) {
        self.records += 1;
        *self.surface_sources.entry(derived.surface.source).or_default() += 1;
        *self.score_statuses.entry(derived.score.status).or_default() += 1;
        if let Some(issue) = derived.date.issue() {
            self.invalid_dates.record(format!(
                "{}:{} tourney_date {:?} {issue}",
                source.file,
                source.line,
                event.date.as_deref().unwrap_or("")
            ));
        }
        if derived.score.status == ScoreStatus::Unparsed {
            self.unparsed_scores.record(format!(
                "{}:{} score {:?} (token {:?})",
                source.file,
                source.line,
                event.score.as_deref().unwrap_or(""),
                derived.score.unparsed_token.as_deref().unwrap_or("")
            ));
        }
        if derived.level.source != LevelSource::Mapped {
            self.other_levels.record(format!(
                "{}:{} tourney_level {:?}",
                source.file,
                source.line,
                event.level.as_deref().unwrap_or("")
            ));
        }
    }

    pub fn unparsed_score_count(&self) -> usize {
        self.unparsed_scores.count
    }
}

/// Run every field processor over one row's tournament columns.
pub fn derive_fields(source: &SourceTag, event: &RawTourney, bounds: DateBounds) -> DerivedFields {
    let date = resolve_date(event.date.as_deref(), bounds);
    let year = date.parts().map(|p| p.year);
    let era = match (year, source.kind) {
        (Some(year), _) => Era::from_year(year),
        (None, MatchFileKind::Amateur) => Era::Amateur,
        (None, _) => Era::Unknown,
    };
    let score = parse_score(event.score.as_deref());
    let surface = resolve_surface(
        event.surface.as_deref(),
        event.tourney_name.as_deref(),
        year,
        era,
    );
    let level = resolve_level(event.level.as_deref(), source.tour);
    let tier = classify_tier(level.level, event.round.as_deref(), source.kind);
    DerivedFields {
        date,
        score,
        surface,
        level,
        tier,
        era,
    }
}

pub fn normalize_matches(
    raw: Vec<RawMatchRecord>,
    ids: &PlayerIdMap,
    bounds: DateBounds,
) -> (Vec<NormalizedMatch>, ProcessingStats) {
    let normalized: Vec<NormalizedMatch> = raw
        .into_par_iter()
        .map(|mut record| {
            let tour = record.source.tour;
            record.winner.id = ids.canonical(tour, record.winner.id);
            record.loser.id = ids.canonical(tour, record.loser.id);
            let derived = derive_fields(&record.source, &record.event, bounds);
            NormalizedMatch {
                raw: record,
                derived,
            }
        })
        .collect();

    let mut stats = ProcessingStats::default();
    for m in &normalized {
        stats.observe(&m.raw.source, &m.raw.event, &m.derived);
    }
    (normalized, stats)
}

pub fn normalize_doubles(
    raw: Vec<RawDoublesRecord>,
    ids: &PlayerIdMap,
    bounds: DateBounds,
) -> (Vec<NormalizedDoublesMatch>, ProcessingStats) {
    let normalized: Vec<NormalizedDoublesMatch> = raw
        .into_par_iter()
        .map(|mut record| {
            let tour = record.source.tour;
            for p in record.winners.iter_mut().chain(record.losers.iter_mut()) {
                p.id = ids.canonical(tour, p.id);
            }
            let derived = derive_fields(&record.source, &record.event, bounds);
            NormalizedDoublesMatch {
                raw: record,
                derived,
            }
        })
        .collect();

    let mut stats = ProcessingStats::default();
    for m in &normalized {
        stats.observe(&m.raw.source, &m.raw.event, &m.derived);
    }
    (normalized, stats)
}

pub fn normalize_rankings(
    raw: Vec<RawRanking>,
    ids: &PlayerIdMap,
    bounds: DateBounds,
) -> (Vec<NormalizedRanking>, IssueLog) {
    let normalized: Vec<NormalizedRanking> = raw
        .into_par_iter()
        .map(|r| NormalizedRanking {
            tour: r.tour,
            date: resolve_date(r.ranking_date.as_deref(), bounds),
            rank: r.rank,
            player_id: ids.canonical(r.tour, r.player_id),
            points: r.points,
            tournaments: r.tours,
        })
        .collect();

    let mut invalid = IssueLog::default();
    for r in &normalized {
        if let Some(issue) = r.date.issue() {
            invalid.record(format!(
                "{} ranking for player {} has {issue} date",
                r.tour, r.player_id
            ));
        }
    }
    (normalized, invalid)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::{CompetitionTier, StandardLevel};
    use crate::raw::{RawParticipant, ServeStats};
    use crate::tour::Tour;

    const BOUNDS: DateBounds = DateBounds {
        earliest_year: 1877,
        latest_year: 2026,
    };

    fn record(name: &str, surface: Option<&str>, date: &str, score: &str) -> RawMatchRecord {
        RawMatchRecord {
            source: SourceTag {
                tour: Tour::Atp,
                kind: MatchFileKind::Main,
                file: Arc::from("atp_matches_test.csv"),
                line: 2,
            },
            event: RawTourney {
                tourney_name: Some(name.to_string()),
                surface: surface.map(str::to_string),
                level: Some("G".to_string()),
                date: Some(date.to_string()),
                score: Some(score.to_string()),
                round: Some("F".to_string()),
                ..RawTourney::default()
            },
            winner: RawParticipant {
                id: 1,
                ..RawParticipant::default()
            },
            loser: RawParticipant {
                id: 2,
                ..RawParticipant::default()
            },
            winner_stats: ServeStats::default(),
            loser_stats: ServeStats::default(),
        }
    }

    #[test]
    fn derives_all_fields_and_counts_quality() {
        let rows = vec![
            record("Roland Garros", None, "19850527", "6-3 6-4 6-2"),
            record("Wimbledon", Some("Grass"), "19901301", "6-x"),
        ];
        let (out, stats) = normalize_matches(rows, &PlayerIdMap::default(), BOUNDS);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].derived.surface.value, "Clay");
        assert_eq!(out[0].derived.era, Era::Open);
        assert_eq!(out[0].derived.level.level, StandardLevel::GrandSlam);
        assert_eq!(out[0].derived.tier, CompetitionTier::TopTier);
        assert_eq!(out[1].derived.era, Era::Unknown);

        assert_eq!(stats.records, 2);
        assert_eq!(stats.surface_sources.get(&SurfaceSource::Inferred), Some(&1));
        assert_eq!(stats.surface_sources.get(&SurfaceSource::Source), Some(&1));
        assert_eq!(stats.invalid_dates.count, 1);
        assert_eq!(stats.unparsed_score_count(), 1);
        assert!(stats.other_levels.is_empty());
    }

    #[test]
    fn output_order_matches_input_order() {
        let rows: Vec<_> = (0..200)
            .map(|i| {
                let mut r = record("Somewhere", Some("Hard"), "20000101", "6-0 6-0");
                r.event.match_num = Some(i);
                r
            })
            .collect();
        let (out, _) = normalize_matches(rows, &PlayerIdMap::default(), BOUNDS);
        let nums: Vec<_> = out.iter().filter_map(|m| m.raw.event.match_num).collect();
        assert_eq!(nums, (0..200).collect::<Vec<_>>());
    }
}
