use crate::model::{Era, ResolvedSurface, SurfaceSource};

pub const HARD: &str = "Hard";
pub const CLAY: &str = "Clay";
pub const GRASS: &str = "Grass";

struct SurfaceHint {
    keyword: &'static str,
    surface: &'static str,
    years: Option<(i32, i32)>,
}

const fn hint(keyword: &'static str, surface: &'static str) -> SurfaceHint {
    SurfaceHint {
        keyword,
        surface,
        years: None,
    }
}

const fn hint_between(
    keyword: &'static str,
    surface: &'static str,
    from: i32,
    to: i32,
) -> SurfaceHint {
    SurfaceHint {
        keyword,
        surface,
        years: Some((from, to)),
    }
}

// Checked in order; the first keyword found as whole words in the lower-cased
// tournament name wins. Windowed entries only apply when the year is known.
const HINTS: &[SurfaceHint] = &[
    hint_between("australian", GRASS, 1905, 1987),
    hint_between("australian", HARD, 1988, 9999),
    hint_between("us open", GRASS, 1881, 1974),
    hint_between("us open", CLAY, 1975, 1977),
    hint_between("us open", HARD, 1978, 9999),
    hint_between("us national", GRASS, 1881, 1974),
    hint_between("madrid", CLAY, 2009, 9999),
    hint_between("acapulco", CLAY, 1993, 2013),
    hint("roland garros", CLAY),
    hint("french open", CLAY),
    hint("french championships", CLAY),
    hint("monte carlo", CLAY),
    hint("monte-carlo", CLAY),
    hint("rome", CLAY),
    hint("italian", CLAY),
    hint("internazionali", CLAY),
    hint("hamburg", CLAY),
    hint("barcelona", CLAY),
    hint("buenos aires", CLAY),
    hint("kitzbuhel", CLAY),
    hint("kitzbühel", CLAY),
    hint("gstaad", CLAY),
    hint("umag", CLAY),
    hint("bastad", CLAY),
    hint("båstad", CLAY),
    hint("estoril", CLAY),
    hint("houston", CLAY),
    hint("munich", CLAY),
    hint("casablanca", CLAY),
    hint("marrakech", CLAY),
    hint("charleston", CLAY),
    hint("palermo", CLAY),
    hint("bogota", CLAY),
    hint("strasbourg", CLAY),
    hint("rabat", CLAY),
    hint("vina del mar", CLAY),
    hint("wimbledon", GRASS),
    hint("queen's", GRASS),
    hint("queens club", GRASS),
    hint("halle", GRASS),
    hint("eastbourne", GRASS),
    hint("newport", GRASS),
    hint("hertogenbosch", GRASS),
    hint("birmingham", GRASS),
    hint("nottingham", GRASS),
    hint_between("mallorca", CLAY, 1900, 2015),
    hint_between("mallorca", GRASS, 2016, 9999),
    hint("bad homburg", GRASS),
    hint("indian wells", HARD),
    hint("miami", HARD),
    hint("key biscayne", HARD),
    hint("cincinnati", HARD),
    hint("montreal", HARD),
    hint("toronto", HARD),
    hint("shanghai", HARD),
    hint("beijing", HARD),
    hint("dubai", HARD),
    hint("doha", HARD),
];

/// Most common surface of the era, used when nothing else resolves.
pub fn era_default(era: Era) -> &'static str {
    match era {
        Era::Amateur => GRASS,
        Era::Open => CLAY,
        Era::Modern | Era::Unknown => HARD,
    }
}

/// Keyword inference from the tournament name alone.
pub fn infer_from_name(tourney_name: &str, year: Option<i32>) -> Option<&'static str> {
    let name = tourney_name.to_lowercase();
    HINTS
        .iter()
        .filter(|h| match (h.years, year) {
            (None, _) => true,
            (Some((from, to)), Some(y)) => (from..=to).contains(&y),
            (Some(_), None) => false,
        })
        .find(|h| contains_words(&name, h.keyword))
        .map(|h| h.surface)
}

/// `keyword` occurs in `name` with no letter or digit touching either end.
fn contains_words(name: &str, keyword: &str) -> bool {
    name.match_indices(keyword).any(|(start, _)| {
        let before = name[..start].chars().next_back();
        let after = name[start + keyword.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// Source value when present, else a keyword match, else the era default.
/// Never returns an empty surface.
pub fn resolve_surface(
    raw: Option<&str>,
    tourney_name: Option<&str>,
    year: Option<i32>,
    era: Era,
) -> ResolvedSurface {
    if let Some(value) = raw.map(str::trim).filter(|s| !s.is_empty()) {
        return ResolvedSurface {
            value: value.to_string(),
            source: SurfaceSource::Source,
        };
    }
    if let Some(surface) = tourney_name.and_then(|name| infer_from_name(name, year)) {
        return ResolvedSurface {
            value: surface.to_string(),
            source: SurfaceSource::Inferred,
        };
    }
    ResolvedSurface {
        value: era_default(era).to_string(),
        source: SurfaceSource::Defaulted,
    }
}
