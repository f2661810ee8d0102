use anyhow::Result;

use crate::csv_rows::read_table;
use crate::loaders::{FileLoad, LoadOutcome, load_files, note_bad_records};
use crate::paths::SourceFile;
use crate::raw::RawRanking;

pub fn load_rankings(
    files: &[SourceFile],
    pool: Option<&rayon::ThreadPool>,
) -> LoadOutcome<RawRanking> {
    load_files(files, pool, read_rankings_file)
}

/// Older ranking exports ship without a header row; those are read with the
/// tour's default column order.
pub fn read_rankings_file(file: &SourceFile) -> Result<FileLoad<RawRanking>> {
    let layout = file.tour.layout();
    let table = read_table(&file.path, Some(layout.ranking_columns()), starts_with_date)?;
    let mut load = FileLoad::new();
    note_bad_records(file, &table.bad_records, &mut load.row_errors);
    for row in table.rows() {
        let Some(player_id) = row.int("player").or_else(|| row.int("player_id")) else {
            load.row_errors
                .record(format!("{}:{} missing player reference", file.name, row.line));
            continue;
        };
        load.records.push(RawRanking {
            tour: file.tour,
            ranking_date: row.string("ranking_date"),
            rank: row.int("rank"),
            player_id,
            points: row.int("points"),
            tours: row.int("tours"),
        });
    }
    Ok(load)
}

fn starts_with_date(fields: &[String]) -> bool {
    fields
        .first()
        .map(|f| f.trim())
        .is_some_and(|f| f.len() == 8 && f.bytes().all(|b| b.is_ascii_digit()))
}
