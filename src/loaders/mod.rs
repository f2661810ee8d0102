//! Source loaders: one reader per entity, each turning per-tour CSV exports
//! into raw records. A bad row or an unreadable file is recorded and skipped;
//! only an entity with no readable file at all is fatal, and that decision
//! belongs to the orchestrator.

pub mod doubles;
pub mod matches;
pub mod players;
pub mod rankings;

use anyhow::Result;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{FileError, IssueLog};
use crate::paths::SourceFile;

/// What one file contributed.
pub struct FileLoad<T> {
    pub records: Vec<T>,
    pub row_errors: IssueLog,
}

impl<T> FileLoad<T> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            row_errors: IssueLog::default(),
        }
    }
}

impl<T> Default for FileLoad<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Records of one entity across all tours, in source-file order.
#[derive(Debug)]
pub struct LoadOutcome<T> {
    pub records: Vec<T>,
    pub files_seen: usize,
    pub files_read: usize,
    pub file_errors: Vec<FileError>,
    pub row_errors: IssueLog,
}

impl<T> LoadOutcome<T> {
    pub fn diagnostics(&self) -> LoadDiagnostics {
        LoadDiagnostics {
            records: self.records.len(),
            files_seen: self.files_seen,
            files_read: self.files_read,
            file_errors: self.file_errors.clone(),
            row_errors: self.row_errors.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadDiagnostics {
    pub records: usize,
    pub files_seen: usize,
    pub files_read: usize,
    pub file_errors: Vec<FileError>,
    pub row_errors: IssueLog,
}

pub fn build_worker_pool(threads: usize) -> Option<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .ok()
}

pub fn with_worker_pool<T>(pool: Option<&rayon::ThreadPool>, action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    match pool {
        Some(pool) => pool.install(action),
        None => action(),
    }
}

/// Read `files` in parallel and concatenate in the order given, whatever
/// order the workers finish in.
pub fn load_files<T, F>(
    files: &[SourceFile],
    pool: Option<&rayon::ThreadPool>,
    read: F,
) -> LoadOutcome<T>
where
    T: Send,
    F: Fn(&SourceFile) -> Result<FileLoad<T>> + Sync,
{
    let results: Vec<Result<FileLoad<T>>> =
        with_worker_pool(pool, || files.par_iter().map(&read).collect());

    let mut outcome = LoadOutcome {
        records: Vec::new(),
        files_seen: files.len(),
        files_read: 0,
        file_errors: Vec::new(),
        row_errors: IssueLog::default(),
    };
    for (file, result) in files.iter().zip(results) {
        match result {
            Ok(load) => {
                debug!(
                    file = %file.name,
                    records = load.records.len(),
                    row_errors = load.row_errors.count,
                    "loaded source file"
                );
                outcome.files_read += 1;
                outcome.records.extend(load.records);
                outcome.row_errors.merge(load.row_errors);
            }
            Err(err) => {
                warn!(file = %file.path.display(), error = %format!("{err:#}"), "skipping unreadable source file");
                outcome.file_errors.push(FileError {
                    path: file.path.clone(),
                    message: format!("{err:#}"),
                });
            }
        }
    }
    outcome
}

/// Turn csv-level record rejections into row errors for `file`.
pub(crate) fn note_bad_records(file: &SourceFile, bad: &[String], row_errors: &mut IssueLog) {
    for message in bad {
        row_errors.record(format!("{}: {message}", file.name));
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use anyhow::bail;

    use super::*;
    use crate::paths::{MatchFileKind, SourceKind};
    use crate::tour::Tour;

    fn source(name: &str) -> SourceFile {
        SourceFile {
            tour: Tour::Atp,
            kind: SourceKind::Matches(MatchFileKind::Main),
            year: None,
            path: PathBuf::from(name),
            name: Arc::from(name),
        }
    }

    #[test]
    fn unreadable_file_is_skipped_and_others_keep_order() {
        let files = vec![source("a.csv"), source("broken.csv"), source("c.csv")];
        let pool = build_worker_pool(3);
        let outcome = load_files(&files, pool.as_ref(), |file| {
            if file.name.as_ref() == "broken.csv" {
                bail!("permission denied");
            }
            let mut load = FileLoad::new();
            load.records.push(format!("{}:1", file.name));
            load.records.push(format!("{}:2", file.name));
            Ok(load)
        });

        assert_eq!(outcome.records, vec!["a.csv:1", "a.csv:2", "c.csv:1", "c.csv:2"]);
        assert_eq!(outcome.files_seen, 3);
        assert_eq!(outcome.files_read, 2);
        assert_eq!(outcome.file_errors.len(), 1);
        assert_eq!(outcome.file_errors[0].path, PathBuf::from("broken.csv"));
        assert!(outcome.file_errors[0].message.contains("permission denied"));
        assert_eq!(outcome.row_errors.count, 0);
    }
}
