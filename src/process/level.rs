use crate::model::{CompetitionTier, LevelSource, ResolvedLevel, StandardLevel};
use crate::paths::MatchFileKind;
use crate::tour::Tour;

/// Map a raw tour-level code through the tour's own vocabulary. Unknown or
/// absent codes land in `other`.
pub fn resolve_level(raw: Option<&str>, tour: Tour) -> ResolvedLevel {
    let Some(code) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return ResolvedLevel {
            level: StandardLevel::Other,
            source: LevelSource::Missing,
        };
    };
    let upper = code.to_ascii_uppercase();
    match tour.layout().map_level(&upper) {
        Some(level) => ResolvedLevel {
            level,
            source: LevelSource::Mapped,
        },
        None => ResolvedLevel {
            level: StandardLevel::Other,
            source: LevelSource::Unmapped,
        },
    }
}

/// Tier from the level first, then the round, then the file the row came from.
pub fn classify_tier(
    level: StandardLevel,
    round: Option<&str>,
    kind: MatchFileKind,
) -> CompetitionTier {
    match level {
        StandardLevel::Team => return CompetitionTier::TeamCompetition,
        StandardLevel::Challenger => return CompetitionTier::QualifyingChallenger,
        StandardLevel::Itf => return CompetitionTier::EntryLevel,
        _ => {}
    }
    if round.is_some_and(is_qualifying_round) {
        return CompetitionTier::QualifyingChallenger;
    }
    match kind {
        MatchFileKind::Main | MatchFileKind::Amateur => CompetitionTier::TopTier,
        MatchFileKind::Qualifying => CompetitionTier::QualifyingChallenger,
        MatchFileKind::Futures => CompetitionTier::EntryLevel,
        MatchFileKind::TeamCompetition => CompetitionTier::TeamCompetition,
    }
}

fn is_qualifying_round(round: &str) -> bool {
    let round = round.trim();
    round.len() >= 2
        && round.starts_with(['Q', 'q'])
        && round[1..].bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_each_tour_vocabulary() {
        let atp = resolve_level(Some("G"), Tour::Atp);
        assert_eq!(atp.level, StandardLevel::GrandSlam);
        assert_eq!(atp.source, LevelSource::Mapped);

        assert_eq!(resolve_level(Some("pm"), Tour::Wta).level, StandardLevel::Masters);
        assert_eq!(resolve_level(Some("I"), Tour::Wta).level, StandardLevel::Tour);
        assert_eq!(resolve_level(Some("15"), Tour::Atp).level, StandardLevel::Itf);
    }

    #[test]
    fn unmapped_and_missing_fall_into_other() {
        let unknown = resolve_level(Some("ZZ"), Tour::Atp);
        assert_eq!(unknown.level, StandardLevel::Other);
        assert_eq!(unknown.source, LevelSource::Unmapped);

        let missing = resolve_level(None, Tour::Wta);
        assert_eq!(missing.level, StandardLevel::Other);
        assert_eq!(missing.source, LevelSource::Missing);
    }

    #[test]
    fn level_resolution_is_total_over_taxonomy() {
        for code in ["G", "M", "A", "PM", "P", "T3", "W", "25", "", "??", "E", "J"] {
            for tour in Tour::ALL {
                let level = resolve_level(Some(code), tour).level;
                assert!(StandardLevel::ALL.contains(&level));
                assert!(!level.as_str().is_empty());
            }
        }
    }

    #[test]
    fn tier_rules() {
        assert_eq!(
            classify_tier(StandardLevel::Tour, Some("Q2"), MatchFileKind::Qualifying),
            CompetitionTier::QualifyingChallenger
        );
        assert_eq!(
            classify_tier(StandardLevel::Tour, Some("QF"), MatchFileKind::Main),
            CompetitionTier::TopTier
        );
        assert_eq!(
            classify_tier(StandardLevel::Team, Some("RR"), MatchFileKind::Main),
            CompetitionTier::TeamCompetition
        );
        assert_eq!(
            classify_tier(StandardLevel::Other, None, MatchFileKind::Futures),
            CompetitionTier::EntryLevel
        );
    }
}
