use anyhow::Result;

use crate::csv_rows::read_with_header;
use crate::loaders::{FileLoad, LoadOutcome, load_files, note_bad_records};
use crate::paths::{MatchFileKind, SourceFile};
use crate::raw::{RawDoublesRecord, RawParticipant, RawTourney, ServeStats, SourceTag};

pub fn load_doubles(
    files: &[SourceFile],
    pool: Option<&rayon::ThreadPool>,
) -> LoadOutcome<RawDoublesRecord> {
    load_files(files, pool, read_doubles_file)
}

pub fn read_doubles_file(file: &SourceFile) -> Result<FileLoad<RawDoublesRecord>> {
    let table = read_with_header(&file.path)?;
    let mut load = FileLoad::new();
    note_bad_records(file, &table.bad_records, &mut load.row_errors);
    for row in table.rows() {
        let side = |a: &str, b: &str| {
            Some([
                RawParticipant::from_row(&row, a)?,
                RawParticipant::from_row(&row, b)?,
            ])
        };
        let (Some(winners), Some(losers)) = (side("winner1", "winner2"), side("loser1", "loser2"))
        else {
            load.row_errors.record(format!(
                "{}:{} missing one of the four participant ids",
                file.name, row.line
            ));
            continue;
        };
        load.records.push(RawDoublesRecord {
            source: SourceTag {
                tour: file.tour,
                kind: MatchFileKind::Main,
                file: file.name.clone(),
                line: row.line,
            },
            event: RawTourney::from_row(&row),
            winners,
            losers,
            winner_stats: ServeStats::from_row(&row, 'w'),
            loser_stats: ServeStats::from_row(&row, 'l'),
        });
    }
    Ok(load)
}
