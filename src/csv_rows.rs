use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use csv::{ByteRecord, ReaderBuilder, Trim};

/// Column name (lower-cased) to position.
#[derive(Debug, Clone, Default)]
pub struct HeaderIndex {
    columns: HashMap<String, usize>,
}

impl HeaderIndex {
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let mut columns = HashMap::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            let key = name.as_ref().trim().trim_start_matches('\u{feff}').to_ascii_lowercase();
            if !key.is_empty() {
                columns.entry(key).or_insert(idx);
            }
        }
        Self { columns }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.get(&name.to_ascii_lowercase()).copied()
    }
}

/// One decoded data row with name-based accessors.
#[derive(Debug, Clone)]
pub struct CsvRow<'a> {
    pub line: u64,
    fields: &'a [String],
    header: &'a HeaderIndex,
}

impl<'a> CsvRow<'a> {
    pub fn new(line: u64, fields: &'a [String], header: &'a HeaderIndex) -> Self {
        Self {
            line,
            fields,
            header,
        }
    }

    /// Trimmed, non-empty field value.
    pub fn text(&self, column: &str) -> Option<&str> {
        let idx = self.header.position(column)?;
        let value = self.fields.get(idx)?.trim();
        if value.is_empty() { None } else { Some(value) }
    }

    pub fn string(&self, column: &str) -> Option<String> {
        self.text(column).map(str::to_string)
    }

    /// Integer field; float exports such as `183.0` are accepted when whole.
    pub fn int(&self, column: &str) -> Option<i64> {
        parse_int(self.text(column)?)
    }

    pub fn float(&self, column: &str) -> Option<f64> {
        self.text(column)?.parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

pub fn parse_int(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<i64>() {
        return Some(n);
    }
    let f = raw.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// All rows of a delimited file, decoded lossily so stray Latin-1 bytes do not
/// sink the file.
pub struct CsvTable {
    pub header: HeaderIndex,
    pub rows: Vec<(u64, Vec<String>)>,
    /// Records the reader rejected; the rest of the file is still usable.
    pub bad_records: Vec<String>,
}

impl CsvTable {
    pub fn rows(&self) -> impl Iterator<Item = CsvRow<'_>> {
        self.rows
            .iter()
            .map(|(line, fields)| CsvRow::new(*line, fields, &self.header))
    }
}

/// Read `path`. When `headerless` says the first record is data rather than a
/// header row, `fallback_columns` names the columns instead.
pub fn read_table(
    path: &Path,
    fallback_columns: Option<&[&str]>,
    headerless: impl Fn(&[String]) -> bool,
) -> Result<CsvTable> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(file);

    let mut header: Option<HeaderIndex> = None;
    let mut rows = Vec::new();
    let mut bad_records = Vec::new();
    let mut record = ByteRecord::new();
    loop {
        match reader.read_byte_record(&mut record) {
            Ok(false) => break,
            Ok(true) => {}
            Err(err) if err.is_io_error() => {
                return Err(err).with_context(|| format!("read {}", path.display()));
            }
            Err(err) => {
                bad_records.push(err.to_string());
                continue;
            }
        }
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let fields: Vec<String> = record
            .iter()
            .map(|f| String::from_utf8_lossy(f).into_owned())
            .collect();
        if fields.iter().all(|f| f.is_empty()) {
            continue;
        }
        if header.is_none() {
            match fallback_columns {
                Some(columns) if headerless(&fields) => {
                    header = Some(HeaderIndex::from_names(columns));
                    rows.push((line, fields));
                }
                _ => header = Some(HeaderIndex::from_names(&fields)),
            }
            continue;
        }
        rows.push((line, fields));
    }

    Ok(CsvTable {
        header: header.unwrap_or_default(),
        rows,
        bad_records,
    })
}

pub fn read_with_header(path: &Path) -> Result<CsvTable> {
    read_table(path, None, |_| false)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn write_tmp(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("tmp file");
        file.write_all(content).expect("write tmp");
        file
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let file = write_tmp(b"Player_ID,W_1stIn\n5,  42 \n");
        let table = read_with_header(file.path()).expect("read");
        let row = table.rows().next().expect("row");
        assert_eq!(row.int("player_id"), Some(5));
        assert_eq!(row.int("w_1stin"), Some(42));
        assert_eq!(row.text("missing"), None);
    }

    #[test]
    fn short_rows_and_float_ints_are_tolerated() {
        let file = write_tmp(b"a,b,c\n1.0\n2,,x\n");
        let table = read_with_header(file.path()).expect("read");
        let rows: Vec<_> = table.rows().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].int("a"), Some(1));
        assert_eq!(rows[0].text("c"), None);
        assert_eq!(rows[1].text("b"), None);
        assert_eq!(rows[1].int("c"), None);
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let file = write_tmp(b"name\nJos\xe9\n");
        let table = read_with_header(file.path()).expect("read");
        let row = table.rows().next().expect("row");
        assert!(row.text("name").expect("name").starts_with("Jos"));
    }

    #[test]
    fn headerless_files_use_fallback_columns() {
        let file = write_tmp(b"19900101,1,100001,3000\n");
        let table = read_table(
            file.path(),
            Some(&["ranking_date", "rank", "player", "points"]),
            |fields| fields.first().is_some_and(|f| f.len() == 8 && f.bytes().all(|b| b.is_ascii_digit())),
        )
        .expect("read");
        let row = table.rows().next().expect("row");
        assert_eq!(row.int("player"), Some(100001));
        assert_eq!(table.rows.len(), 1);
    }
}
