use chrono::NaiveDate;

use crate::model::{DateParts, DateResolution};

/// Inclusive year window a date must fall in to be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateBounds {
    pub earliest_year: i32,
    pub latest_year: i32,
}

impl DateBounds {
    pub fn new(earliest_year: i32, latest_year: i32) -> Self {
        Self {
            earliest_year,
            latest_year,
        }
    }
}

/// Decode `YYYYMMDD`, `YYYY-MM-DD` or a float export like `19680527.0`.
///
/// Anything else is `Malformed`; parseable dates outside the bounds are
/// `OutOfRange`, and shapes that are fine but do not exist on the calendar
/// (month 13, Feb 30) are `ImpossibleCalendar`. None of these drop the record.
pub fn resolve_date(raw: Option<&str>, bounds: DateBounds) -> DateResolution {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return DateResolution::Missing;
    };
    let Some((year, month, day)) = split_date(raw) else {
        return DateResolution::Malformed;
    };
    if year < bounds.earliest_year || year > bounds.latest_year {
        return DateResolution::OutOfRange { year };
    }
    if NaiveDate::from_ymd_opt(year, month, day).is_none() {
        return DateResolution::ImpossibleCalendar;
    }
    DateResolution::Valid(DateParts { year, month, day })
}

fn split_date(raw: &str) -> Option<(i32, u32, u32)> {
    let compact = raw.strip_suffix(".0").unwrap_or(raw);
    if compact.len() == 8 && compact.bytes().all(|b| b.is_ascii_digit()) {
        let year = compact[0..4].parse().ok()?;
        let month = compact[4..6].parse().ok()?;
        let day = compact[6..8].parse().ok()?;
        return Some((year, month, day));
    }

    let mut parts = raw.split('-');
    let (y, m, d) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() || y.len() != 4 || m.is_empty() || m.len() > 2 || d.is_empty() || d.len() > 2 {
        return None;
    }
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !(all_digits(y) && all_digits(m) && all_digits(d)) {
        return None;
    }
    Some((y.parse().ok()?, m.parse().ok()?, d.parse().ok()?))
}
