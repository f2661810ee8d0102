use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{PipelineConfig, YearRange};
use crate::model::Era;
use crate::tour::{Tour, TourLayout};

/// Partition a match file belongs to, taken from its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchFileKind {
    Main,
    Qualifying,
    Futures,
    TeamCompetition,
    Amateur,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Players,
    Rankings,
    Matches(MatchFileKind),
    Doubles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Players,
    Rankings,
    Matches,
    Doubles,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Players => "players",
            EntityKind::Rankings => "rankings",
            EntityKind::Matches => "matches",
            EntityKind::Doubles => "doubles_matches",
        }
    }
}

impl SourceKind {
    pub fn entity(self) -> EntityKind {
        match self {
            SourceKind::Players => EntityKind::Players,
            SourceKind::Rankings => EntityKind::Rankings,
            SourceKind::Matches(_) => EntityKind::Matches,
            SourceKind::Doubles => EntityKind::Doubles,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub tour: Tour,
    pub kind: SourceKind,
    /// Year partition, or decade start for ranking slices.
    pub year: Option<i32>,
    pub path: PathBuf,
    pub name: Arc<str>,
}

/// Every source file found for the configured tours, grouped per entity and
/// kept in deterministic order (tour order, then file name).
#[derive(Debug, Clone, Default)]
pub struct SourceInventory {
    pub players: Vec<SourceFile>,
    pub rankings: Vec<SourceFile>,
    pub matches: Vec<SourceFile>,
    pub doubles: Vec<SourceFile>,
    pub missing_dirs: Vec<PathBuf>,
}

impl SourceInventory {
    pub fn files(&self, entity: EntityKind) -> &[SourceFile] {
        match entity {
            EntityKind::Players => &self.players,
            EntityKind::Rankings => &self.rankings,
            EntityKind::Matches => &self.matches,
            EntityKind::Doubles => &self.doubles,
        }
    }

    pub fn total_files(&self) -> usize {
        self.players.len() + self.rankings.len() + self.matches.len() + self.doubles.len()
    }
}

pub fn resolve_sources(cfg: &PipelineConfig) -> SourceInventory {
    let mut inventory = SourceInventory::default();
    for source in &cfg.tours {
        let dir = cfg.tour_dir(source);
        let names = match list_csv_names(&dir) {
            Some(names) => names,
            None => {
                warn!(tour = %source.tour, dir = %dir.display(), "tour directory missing");
                inventory.missing_dirs.push(dir);
                continue;
            }
        };
        let layout = source.tour.layout();
        let mut found: Vec<SourceFile> = names
            .into_iter()
            .filter_map(|name| classify_file(layout, &name).map(|(kind, year)| (name, kind, year)))
            .filter(|(_, kind, year)| keep_for_range(*kind, *year, cfg.years.as_ref()))
            .map(|(name, kind, year)| SourceFile {
                tour: source.tour,
                kind,
                year,
                path: dir.join(&name),
                name: Arc::from(name.as_str()),
            })
            .collect();
        found.sort_by(|a, b| {
            a.kind
                .cmp(&b.kind)
                .then(a.year.cmp(&b.year))
                .then(a.name.cmp(&b.name))
        });
        debug!(tour = %source.tour, files = found.len(), "resolved source files");
        for file in found {
            match file.kind.entity() {
                EntityKind::Players => inventory.players.push(file),
                EntityKind::Rankings => inventory.rankings.push(file),
                EntityKind::Matches => inventory.matches.push(file),
                EntityKind::Doubles => inventory.doubles.push(file),
            }
        }
    }
    inventory
}

fn list_csv_names(dir: &Path) -> Option<Vec<String>> {
    let entries = fs::read_dir(dir).ok()?;
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| name.to_ascii_lowercase().ends_with(".csv"))
        .collect();
    names.sort();
    Some(names)
}

/// Map a file name onto its entity and partition. Unknown names are ignored.
pub fn classify_file(layout: &dyn TourLayout, name: &str) -> Option<(SourceKind, Option<i32>)> {
    let lower = name.to_ascii_lowercase();
    let stem = lower.strip_suffix(".csv")?;
    let rest = stem.strip_prefix(layout.prefix())?.strip_prefix('_')?;

    if rest == "players" {
        return Some((SourceKind::Players, None));
    }
    if let Some(slice) = rest.strip_prefix("rankings_") {
        return Some((SourceKind::Rankings, ranking_slice_start(slice)));
    }
    let rest = rest.strip_prefix("matches_")?;
    if rest == "amateur" {
        return Some((SourceKind::Matches(MatchFileKind::Amateur), None));
    }
    if let Some(year) = rest.strip_prefix("doubles_") {
        return Some((SourceKind::Doubles, Some(parse_year(year)?)));
    }
    let qualifying = format!("{}_", layout.qualifying_infix());
    let (kind, year) = if let Some(year) = rest.strip_prefix(qualifying.as_str()) {
        (MatchFileKind::Qualifying, year)
    } else if let Some(year) = rest.strip_prefix("futures_") {
        (MatchFileKind::Futures, year)
    } else if let Some(year) = rest.strip_prefix("davis_cup_") {
        (MatchFileKind::TeamCompetition, year)
    } else {
        (MatchFileKind::Main, rest)
    };
    Some((SourceKind::Matches(kind), Some(parse_year(year)?)))
}

fn parse_year(raw: &str) -> Option<i32> {
    if raw.len() != 4 {
        return None;
    }
    raw.parse::<i32>().ok()
}

// "70s" -> 1970, "00s" -> 2000, "current" -> None (always kept).
fn ranking_slice_start(slice: &str) -> Option<i32> {
    let digits = slice.strip_suffix('s')?;
    let n = digits.parse::<i32>().ok()?;
    if digits.len() != 2 {
        return None;
    }
    Some(if n >= 70 { 1900 + n } else { 2000 + n })
}

fn keep_for_range(kind: SourceKind, year: Option<i32>, range: Option<&YearRange>) -> bool {
    let Some(range) = range else {
        return true;
    };
    match (kind, year) {
        (SourceKind::Players, _) => true,
        (SourceKind::Rankings, Some(decade)) => range.overlaps(decade, decade + 9),
        (SourceKind::Rankings, None) => true,
        (SourceKind::Matches(MatchFileKind::Amateur), _) => range.from < Era::OPEN_ERA_START,
        (_, Some(year)) => range.contains(year),
        (_, None) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_atp_file_names() {
        let atp = Tour::Atp.layout();
        assert_eq!(
            classify_file(atp, "atp_players.csv"),
            Some((SourceKind::Players, None))
        );
        assert_eq!(
            classify_file(atp, "atp_rankings_90s.csv"),
            Some((SourceKind::Rankings, Some(1990)))
        );
        assert_eq!(
            classify_file(atp, "atp_rankings_current.csv"),
            Some((SourceKind::Rankings, None))
        );
        assert_eq!(
            classify_file(atp, "atp_matches_1999.csv"),
            Some((SourceKind::Matches(MatchFileKind::Main), Some(1999)))
        );
        assert_eq!(
            classify_file(atp, "atp_matches_qual_chall_2003.csv"),
            Some((SourceKind::Matches(MatchFileKind::Qualifying), Some(2003)))
        );
        assert_eq!(
            classify_file(atp, "atp_matches_futures_2010.csv"),
            Some((SourceKind::Matches(MatchFileKind::Futures), Some(2010)))
        );
        assert_eq!(
            classify_file(atp, "atp_matches_amateur.csv"),
            Some((SourceKind::Matches(MatchFileKind::Amateur), None))
        );
        assert_eq!(
            classify_file(atp, "atp_matches_doubles_2001.csv"),
            Some((SourceKind::Doubles, Some(2001)))
        );
        assert_eq!(classify_file(atp, "wta_matches_2001.csv"), None);
        assert_eq!(classify_file(atp, "atp_matches_notes.csv"), None);
    }

    #[test]
    fn wta_qualifying_infix() {
        let wta = Tour::Wta.layout();
        assert_eq!(
            classify_file(wta, "wta_matches_qual_itf_2015.csv"),
            Some((SourceKind::Matches(MatchFileKind::Qualifying), Some(2015)))
        );
    }

    #[test]
    fn year_filter_rules() {
        let range = YearRange {
            from: 1995,
            to: 1999,
        };
        let main = SourceKind::Matches(MatchFileKind::Main);
        assert!(keep_for_range(main, Some(1997), Some(&range)));
        assert!(!keep_for_range(main, Some(2001), Some(&range)));
        assert!(keep_for_range(SourceKind::Rankings, Some(1990), Some(&range)));
        assert!(!keep_for_range(SourceKind::Rankings, Some(1980), Some(&range)));
        assert!(keep_for_range(SourceKind::Rankings, None, Some(&range)));
        assert!(!keep_for_range(
            SourceKind::Matches(MatchFileKind::Amateur),
            None,
            Some(&range)
        ));
        assert!(keep_for_range(SourceKind::Players, None, Some(&range)));
    }
}
