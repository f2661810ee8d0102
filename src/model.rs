use std::fmt;

use serde::Serialize;

use crate::raw::{RawDoublesRecord, RawMatchRecord};
use crate::tour::Tour;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DateParts {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl DateParts {
    pub fn iso(&self) -> String {
        format!("{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }

    pub fn compact(&self) -> String {
        format!("{:04}{:02}{:02}", self.year, self.month, self.day)
    }
}

/// Outcome of decoding a raw date. Only `Valid` populates date columns; every
/// other variant leaves them unset and flags the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateResolution {
    Valid(DateParts),
    Missing,
    Malformed,
    OutOfRange { year: i32 },
    ImpossibleCalendar,
}

impl DateResolution {
    pub fn parts(&self) -> Option<DateParts> {
        match self {
            DateResolution::Valid(parts) => Some(*parts),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, DateResolution::Valid(_))
    }

    pub fn issue(&self) -> Option<&'static str> {
        match self {
            DateResolution::Valid(_) => None,
            DateResolution::Missing => Some("missing"),
            DateResolution::Malformed => Some("malformed"),
            DateResolution::OutOfRange { .. } => Some("out_of_range"),
            DateResolution::ImpossibleCalendar => Some("impossible_calendar"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Termination {
    Walkover,
    Retirement,
    Default,
}

impl Termination {
    pub fn canonical(self) -> &'static str {
        match self {
            Termination::Walkover => "W/O",
            Termination::Retirement => "RET",
            Termination::Default => "DEF",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetScore {
    pub winner_games: u16,
    pub loser_games: u16,
    pub tiebreak: Option<u16>,
    /// Bracketed deciding tiebreak (`[10-8]`); games hold the points.
    pub match_tiebreak: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetSlot {
    Games(SetScore),
    Sentinel(Termination),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreStatus {
    Complete,
    Walkover,
    Retired,
    Defaulted,
    Unparsed,
    Missing,
}

impl ScoreStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ScoreStatus::Complete => "complete",
            ScoreStatus::Walkover => "walkover",
            ScoreStatus::Retired => "retired",
            ScoreStatus::Defaulted => "defaulted",
            ScoreStatus::Unparsed => "unparsed",
            ScoreStatus::Missing => "missing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedScore {
    pub slots: Vec<SetSlot>,
    pub status: ScoreStatus,
    pub unparsed_token: Option<String>,
}

impl ParsedScore {
    pub fn sets(&self) -> impl Iterator<Item = &SetScore> {
        self.slots.iter().filter_map(|slot| match slot {
            SetSlot::Games(set) => Some(set),
            SetSlot::Sentinel(_) => None,
        })
    }

    pub fn set_count(&self) -> usize {
        self.sets().count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceSource {
    Source,
    Inferred,
    Defaulted,
}

impl SurfaceSource {
    pub fn as_str(self) -> &'static str {
        match self {
            SurfaceSource::Source => "source",
            SurfaceSource::Inferred => "inferred",
            SurfaceSource::Defaulted => "defaulted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSurface {
    pub value: String,
    pub source: SurfaceSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StandardLevel {
    GrandSlam,
    TourFinals,
    Masters,
    Olympics,
    Tour,
    Challenger,
    Itf,
    Team,
    Other,
}

impl StandardLevel {
    pub const ALL: [StandardLevel; 9] = [
        StandardLevel::GrandSlam,
        StandardLevel::TourFinals,
        StandardLevel::Masters,
        StandardLevel::Olympics,
        StandardLevel::Tour,
        StandardLevel::Challenger,
        StandardLevel::Itf,
        StandardLevel::Team,
        StandardLevel::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StandardLevel::GrandSlam => "grand_slam",
            StandardLevel::TourFinals => "tour_finals",
            StandardLevel::Masters => "masters",
            StandardLevel::Olympics => "olympics",
            StandardLevel::Tour => "tour",
            StandardLevel::Challenger => "challenger",
            StandardLevel::Itf => "itf",
            StandardLevel::Team => "team",
            StandardLevel::Other => "other",
        }
    }
}

impl fmt::Display for StandardLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelSource {
    Mapped,
    Unmapped,
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedLevel {
    pub level: StandardLevel,
    pub source: LevelSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompetitionTier {
    TopTier,
    QualifyingChallenger,
    EntryLevel,
    TeamCompetition,
}

impl CompetitionTier {
    pub fn as_str(self) -> &'static str {
        match self {
            CompetitionTier::TopTier => "top_tier",
            CompetitionTier::QualifyingChallenger => "qualifying_challenger",
            CompetitionTier::EntryLevel => "entry_level",
            CompetitionTier::TeamCompetition => "team_competition",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Era {
    Amateur,
    Open,
    Modern,
    Unknown,
}

impl Era {
    pub const OPEN_ERA_START: i32 = 1968;
    pub const MODERN_ERA_START: i32 = 1990;

    pub fn from_year(year: i32) -> Self {
        if year < Self::OPEN_ERA_START {
            Era::Amateur
        } else if year < Self::MODERN_ERA_START {
            Era::Open
        } else {
            Era::Modern
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Era::Amateur => "amateur",
            Era::Open => "open",
            Era::Modern => "modern",
            Era::Unknown => "unknown",
        }
    }
}

/// Everything the field processors derive for one match row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedFields {
    pub date: DateResolution,
    pub score: ParsedScore,
    pub surface: ResolvedSurface,
    pub level: ResolvedLevel,
    pub tier: CompetitionTier,
    pub era: Era,
}

#[derive(Debug, Clone)]
pub struct NormalizedMatch {
    pub raw: RawMatchRecord,
    pub derived: DerivedFields,
}

#[derive(Debug, Clone)]
pub struct NormalizedDoublesMatch {
    pub raw: RawDoublesRecord,
    pub derived: DerivedFields,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPlayer {
    pub player_id: i64,
    pub source_id: i64,
    pub tour: Tour,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: String,
    pub hand: Option<String>,
    pub birth_date: Option<DateParts>,
    pub country_code: Option<String>,
    pub height_cm: Option<i64>,
    pub wikidata_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRanking {
    pub tour: Tour,
    pub date: DateResolution,
    pub rank: Option<i64>,
    pub player_id: i64,
    pub points: Option<i64>,
    pub tournaments: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn era_boundaries() {
        assert_eq!(Era::from_year(1877), Era::Amateur);
        assert_eq!(Era::from_year(1967), Era::Amateur);
        assert_eq!(Era::from_year(1968), Era::Open);
        assert_eq!(Era::from_year(1990), Era::Modern);
    }

    #[test]
    fn date_parts_format() {
        let d = DateParts {
            year: 1877,
            month: 7,
            day: 9,
        };
        assert_eq!(d.iso(), "1877-07-09");
        assert_eq!(d.compact(), "18770709");
    }
}
