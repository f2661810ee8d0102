use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::StandardLevel;

/// A top-level organization whose exports share one file schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tour {
    Atp,
    Wta,
}

impl Tour {
    pub const ALL: [Tour; 2] = [Tour::Atp, Tour::Wta];

    pub fn tag(self) -> &'static str {
        match self {
            Tour::Atp => "ATP",
            Tour::Wta => "WTA",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "atp" | "a" => Some(Tour::Atp),
            "wta" | "b" => Some(Tour::Wta),
            _ => None,
        }
    }

    pub fn layout(self) -> &'static dyn TourLayout {
        match self {
            Tour::Atp => &AtpLayout,
            Tour::Wta => &WtaLayout,
        }
    }
}

impl fmt::Display for Tour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Per-tour file conventions. Loaders only talk to this trait, so a new tour
/// is one more implementation rather than more branching in the parsers.
pub trait TourLayout: Sync {
    fn tour(&self) -> Tour;

    /// Directory under the data root holding this tour's exports.
    fn default_dir(&self) -> &'static str;

    /// File name prefix (`atp`, `wta`).
    fn prefix(&self) -> &'static str;

    /// Infix used by the qualifying/challenger match files.
    fn qualifying_infix(&self) -> &'static str;

    /// Column order for ranking files exported without a header row.
    fn ranking_columns(&self) -> &'static [&'static str];

    /// Raw tournament level code to the shared taxonomy. `None` when the code
    /// is not part of this tour's vocabulary.
    fn map_level(&self, code: &str) -> Option<StandardLevel>;

    /// Offset added to raw ids when this tour's player collides with an
    /// already-merged player of the same raw id.
    fn collision_offset(&self) -> i64;
}

pub struct AtpLayout;
pub struct WtaLayout;

impl TourLayout for AtpLayout {
    fn tour(&self) -> Tour {
        Tour::Atp
    }

    fn default_dir(&self) -> &'static str {
        "tennis_atp"
    }

    fn prefix(&self) -> &'static str {
        "atp"
    }

    fn qualifying_infix(&self) -> &'static str {
        "qual_chall"
    }

    fn ranking_columns(&self) -> &'static [&'static str] {
        &["ranking_date", "rank", "player", "points"]
    }

    fn map_level(&self, code: &str) -> Option<StandardLevel> {
        let level = match code {
            "G" => StandardLevel::GrandSlam,
            "F" => StandardLevel::TourFinals,
            "M" => StandardLevel::Masters,
            "O" => StandardLevel::Olympics,
            "A" => StandardLevel::Tour,
            "C" => StandardLevel::Challenger,
            "S" => StandardLevel::Itf,
            "D" => StandardLevel::Team,
            _ if is_prize_level(code) => StandardLevel::Itf,
            _ => return None,
        };
        Some(level)
    }

    fn collision_offset(&self) -> i64 {
        1_000_000
    }
}

impl TourLayout for WtaLayout {
    fn tour(&self) -> Tour {
        Tour::Wta
    }

    fn default_dir(&self) -> &'static str {
        "tennis_wta"
    }

    fn prefix(&self) -> &'static str {
        "wta"
    }

    fn qualifying_infix(&self) -> &'static str {
        "qual_itf"
    }

    fn ranking_columns(&self) -> &'static [&'static str] {
        &["ranking_date", "rank", "player", "points", "tours"]
    }

    fn map_level(&self, code: &str) -> Option<StandardLevel> {
        let level = match code {
            "G" => StandardLevel::GrandSlam,
            "F" => StandardLevel::TourFinals,
            "PM" | "T1" => StandardLevel::Masters,
            "P" | "T2" | "T3" | "T4" | "T5" | "I" => StandardLevel::Tour,
            "O" => StandardLevel::Olympics,
            "C" => StandardLevel::Challenger,
            "W" => StandardLevel::Itf,
            "D" => StandardLevel::Team,
            _ if is_prize_level(code) => StandardLevel::Itf,
            _ => return None,
        };
        Some(level)
    }

    fn collision_offset(&self) -> i64 {
        2_000_000
    }
}

// Futures / ITF events are coded by prize money in thousands ("15", "25", "100").
fn is_prize_level(code: &str) -> bool {
    !code.is_empty() && code.len() <= 3 && code.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabularies_differ_per_tour() {
        assert_eq!(Tour::Atp.layout().map_level("M"), Some(StandardLevel::Masters));
        assert_eq!(Tour::Wta.layout().map_level("M"), None);
        assert_eq!(Tour::Wta.layout().map_level("PM"), Some(StandardLevel::Masters));
        assert_eq!(Tour::Atp.layout().map_level("PM"), None);
        assert_eq!(Tour::Wta.layout().map_level("25"), Some(StandardLevel::Itf));
    }

    #[test]
    fn parse_accepts_letter_aliases() {
        assert_eq!(Tour::parse("A"), Some(Tour::Atp));
        assert_eq!(Tour::parse(" wta "), Some(Tour::Wta));
        assert_eq!(Tour::parse("itf"), None);
    }
}
