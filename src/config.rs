use std::env;
use std::path::PathBuf;

use anyhow::{Result, anyhow};
use chrono::{Datelike, Utc};
use serde::Serialize;

use crate::tour::Tour;

pub const EARLIEST_YEAR: i32 = 1877;
/// Birth dates predate the first recorded match.
pub const EARLIEST_BIRTH_YEAR: i32 = 1840;
pub const DEFAULT_BATCH_SIZE: usize = 10_000;
const DEFAULT_DB_FILE: &str = "tennis.sqlite";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct YearRange {
    pub from: i32,
    pub to: i32,
}

impl YearRange {
    /// Accepts `1990-1999` or a single year `2004`.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let (from, to) = match raw.split_once(['-', ':']) {
            Some((a, b)) => (a.trim(), b.trim()),
            None => (raw, raw),
        };
        let from = from
            .parse::<i32>()
            .map_err(|_| anyhow!("invalid start year in range {raw:?}"))?;
        let to = to
            .parse::<i32>()
            .map_err(|_| anyhow!("invalid end year in range {raw:?}"))?;
        if from > to {
            return Err(anyhow!("year range {raw:?} is reversed"));
        }
        Ok(Self { from, to })
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.from..=self.to).contains(&year)
    }

    pub fn overlaps(&self, from: i32, to: i32) -> bool {
        from <= self.to && to >= self.from
    }
}

/// Optional limits checked against the verification report. Any breach aborts
/// the run; unset limits never do.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QualityThresholds {
    pub max_dangling_refs: Option<u64>,
    pub max_unparsed_score_rate: Option<f64>,
    pub max_other_level_rate: Option<f64>,
    pub max_defaulted_surface_rate: Option<f64>,
    pub max_invalid_date_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TourSource {
    pub tour: Tour,
    pub dir: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub tours: Vec<TourSource>,
    pub years: Option<YearRange>,
    pub parallelism: usize,
    pub batch_size: usize,
    pub earliest_year: i32,
    pub max_year: i32,
    pub thresholds: QualityThresholds,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            db_path: PathBuf::from(DEFAULT_DB_FILE),
            tours: Tour::ALL
                .iter()
                .map(|tour| TourSource {
                    tour: *tour,
                    dir: tour.layout().default_dir().to_string(),
                })
                .collect(),
            years: None,
            parallelism: 6,
            batch_size: DEFAULT_BATCH_SIZE,
            earliest_year: EARLIEST_YEAR,
            max_year: Utc::now().year(),
            thresholds: QualityThresholds::default(),
        }
    }
}

impl PipelineConfig {
    /// Defaults overlaid with `TENNIS_*` / `INGEST_*` environment variables.
    /// `.env.local` and `.env` are read first when present.
    pub fn from_env() -> Self {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");

        let mut cfg = Self::default();
        if let Some(dir) = env_nonempty("TENNIS_DATA_DIR") {
            cfg.data_dir = PathBuf::from(dir);
        }
        if let Some(path) = env_nonempty("TENNIS_DB_PATH") {
            cfg.db_path = PathBuf::from(path);
        }
        if let Some(n) = env_nonempty("INGEST_PARALLELISM").and_then(|v| v.parse::<usize>().ok()) {
            cfg.parallelism = n;
        }
        if let Some(n) = env_nonempty("INGEST_BATCH_SIZE").and_then(|v| v.parse::<usize>().ok()) {
            cfg.batch_size = n;
        }
        if let Some(raw) = env_nonempty("TENNIS_TOURS") {
            let tours = parse_tours(&raw);
            if !tours.is_empty() {
                cfg.tours = tours;
            }
        }
        cfg.normalized()
    }

    /// Clamp knobs into the ranges the pipeline supports.
    pub fn normalized(mut self) -> Self {
        self.parallelism = self.parallelism.clamp(1, 32);
        self.batch_size = self.batch_size.clamp(100, 1_000_000);
        if self.max_year < self.earliest_year {
            self.max_year = self.earliest_year;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.tours.is_empty() {
            return Err(anyhow!("no tours configured"));
        }
        if !self.data_dir.is_dir() {
            return Err(anyhow!(
                "data directory {} does not exist",
                self.data_dir.display()
            ));
        }
        if self.db_path.as_os_str().is_empty() {
            return Err(anyhow!("destination database path is empty"));
        }
        Ok(())
    }

    pub fn tour_dir(&self, source: &TourSource) -> PathBuf {
        self.data_dir.join(&source.dir)
    }
}

/// `atp,wta` or `atp:custom_dir,wta`.
pub fn parse_tours(raw: &str) -> Vec<TourSource> {
    let mut out: Vec<TourSource> = Vec::new();
    for part in raw.split([',', ';', ' ']) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (name, dir) = match part.split_once(':') {
            Some((name, dir)) => (name, Some(dir.trim())),
            None => (part, None),
        };
        let Some(tour) = Tour::parse(name) else {
            continue;
        };
        if out.iter().any(|s| s.tour == tour) {
            continue;
        }
        let dir = dir
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| tour.layout().default_dir().to_string());
        out.push(TourSource { tour, dir });
    }
    out
}

fn env_nonempty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_range_parses_span_and_single_year() {
        assert_eq!(
            YearRange::parse("1990-1999").unwrap(),
            YearRange {
                from: 1990,
                to: 1999
            }
        );
        assert_eq!(
            YearRange::parse("2004").unwrap(),
            YearRange {
                from: 2004,
                to: 2004
            }
        );
        assert!(YearRange::parse("2000-1990").is_err());
        assert!(YearRange::parse("abc").is_err());
    }

    #[test]
    fn parse_tours_dedups_and_keeps_custom_dirs() {
        let tours = parse_tours("wta:women, atp, wta, itf");
        assert_eq!(tours.len(), 2);
        assert_eq!(tours[0].tour, Tour::Wta);
        assert_eq!(tours[0].dir, "women");
        assert_eq!(tours[1].dir, "tennis_atp");
    }

    #[test]
    fn normalized_clamps_parallelism() {
        let cfg = PipelineConfig {
            parallelism: 0,
            batch_size: 1,
            ..PipelineConfig::default()
        }
        .normalized();
        assert_eq!(cfg.parallelism, 1);
        assert_eq!(cfg.batch_size, 100);
    }
}
