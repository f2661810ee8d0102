use crate::model::{ParsedScore, ScoreStatus, SetScore, SetSlot, Termination};

pub const MAX_SETS: usize = 5;

/// Split a raw score such as `6-4 7-6(4) RET` into set slots.
///
/// A walkover, retirement or default token ends parsing and occupies a slot of
/// its own. An unknown token marks the whole score `Unparsed`, keeping the
/// sets read before it.
pub fn parse_score(raw: Option<&str>) -> ParsedScore {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return ParsedScore {
            slots: Vec::new(),
            status: ScoreStatus::Missing,
            unparsed_token: None,
        };
    };

    let mut slots = Vec::with_capacity(MAX_SETS);
    let mut status = ScoreStatus::Complete;
    let mut unparsed_token = None;

    for token in raw.split_whitespace() {
        if let Some(termination) = termination_token(token) {
            status = match termination {
                Termination::Walkover => ScoreStatus::Walkover,
                Termination::Retirement => ScoreStatus::Retired,
                Termination::Default => ScoreStatus::Defaulted,
            };
            if slots.len() < MAX_SETS {
                slots.push(SetSlot::Sentinel(termination));
            }
            break;
        }
        match set_token(token) {
            Some(set) if slots.len() < MAX_SETS => slots.push(SetSlot::Games(set)),
            _ => {
                status = ScoreStatus::Unparsed;
                unparsed_token = Some(token.to_string());
                break;
            }
        }
    }

    ParsedScore {
        slots,
        status,
        unparsed_token,
    }
}

/// Canonical text for parsed slots; inverse of [`parse_score`] on well-formed input.
pub fn canonical_score(score: &ParsedScore) -> String {
    score
        .slots
        .iter()
        .map(|slot| match slot {
            SetSlot::Games(set) if set.match_tiebreak => {
                format!("[{}-{}]", set.winner_games, set.loser_games)
            }
            SetSlot::Games(set) => match set.tiebreak {
                Some(tb) => format!("{}-{}({tb})", set.winner_games, set.loser_games),
                None => format!("{}-{}", set.winner_games, set.loser_games),
            },
            SetSlot::Sentinel(t) => t.canonical().to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn termination_token(token: &str) -> Option<Termination> {
    let upper = token.trim_end_matches('.').to_ascii_uppercase();
    match upper.as_str() {
        "W/O" | "WO" | "W.O" | "WALKOVER" => Some(Termination::Walkover),
        "RET" | "RETIRED" | "RET'D" => Some(Termination::Retirement),
        "DEF" | "DEFAULT" | "DEFAULTED" | "DISQ" | "DQ" => Some(Termination::Default),
        _ => None,
    }
}

fn set_token(token: &str) -> Option<SetScore> {
    if let Some(inner) = token.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        let (w, l) = games_pair(inner)?;
        return Some(SetScore {
            winner_games: w,
            loser_games: l,
            tiebreak: None,
            match_tiebreak: true,
        });
    }

    let (games, tiebreak) = match token.split_once('(') {
        Some((games, rest)) => {
            let inner = rest.strip_suffix(')')?;
            (games, Some(tiebreak_points(inner)?))
        }
        None => (token, None),
    };
    let (w, l) = games_pair(games)?;
    Some(SetScore {
        winner_games: w,
        loser_games: l,
        tiebreak,
        match_tiebreak: false,
    })
}

fn games_pair(raw: &str) -> Option<(u16, u16)> {
    let (w, l) = raw.split_once('-')?;
    Some((small_number(w)?, small_number(l)?))
}

// "(4)" is the loser's tiebreak points; "(7-4)" spells both sides out.
fn tiebreak_points(raw: &str) -> Option<u16> {
    match raw.split_once('-') {
        Some((a, b)) => Some(small_number(a)?.min(small_number(b)?)),
        None => small_number(raw),
    }
}

fn small_number(raw: &str) -> Option<u16> {
    if raw.is_empty() || raw.len() > 3 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}
