use anyhow::Result;

use crate::csv_rows::read_with_header;
use crate::loaders::{FileLoad, LoadOutcome, load_files, note_bad_records};
use crate::paths::{MatchFileKind, SourceFile, SourceKind};
use crate::raw::{RawMatchRecord, RawParticipant, RawTourney, ServeStats, SourceTag};

pub fn load_matches(
    files: &[SourceFile],
    pool: Option<&rayon::ThreadPool>,
) -> LoadOutcome<RawMatchRecord> {
    load_files(files, pool, read_matches_file)
}

pub fn read_matches_file(file: &SourceFile) -> Result<FileLoad<RawMatchRecord>> {
    let table = read_with_header(&file.path)?;
    let kind = match file.kind {
        SourceKind::Matches(kind) => kind,
        _ => MatchFileKind::Main,
    };
    let mut load = FileLoad::new();
    note_bad_records(file, &table.bad_records, &mut load.row_errors);
    for row in table.rows() {
        let winner = RawParticipant::from_row(&row, "winner");
        let loser = RawParticipant::from_row(&row, "loser");
        let (Some(winner), Some(loser)) = (winner, loser) else {
            load.row_errors.record(format!(
                "{}:{} missing winner_id or loser_id",
                file.name, row.line
            ));
            continue;
        };
        load.records.push(RawMatchRecord {
            source: SourceTag {
                tour: file.tour,
                kind,
                file: file.name.clone(),
                line: row.line,
            },
            event: RawTourney::from_row(&row),
            winner,
            loser,
            winner_stats: ServeStats::from_row(&row, 'w'),
            loser_stats: ServeStats::from_row(&row, 'l'),
        });
    }
    Ok(load)
}
