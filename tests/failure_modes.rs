use std::fs;
use std::path::{Path, PathBuf};

use tennis_store::config::{PipelineConfig, QualityThresholds};
use tennis_store::error::PipelineError;
use tennis_store::pipeline::{PipelineContext, PipelineStage, run_pipeline, verify_only};
use tennis_store::progress::{PipelineProgress, ProgressTracker};

fn fixture_data_dir() -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push("data");
    path
}

fn config(data_dir: &Path, db_path: &Path) -> PipelineConfig {
    PipelineConfig {
        data_dir: data_dir.to_path_buf(),
        db_path: db_path.to_path_buf(),
        parallelism: 2,
        ..PipelineConfig::default()
    }
}

/// Fixture tree without any rankings file.
fn tree_without_rankings(root: &Path) -> PathBuf {
    let data = root.join("data");
    for tour in ["tennis_atp", "tennis_wta"] {
        let from = fixture_data_dir().join(tour);
        let to = data.join(tour);
        fs::create_dir_all(&to).expect("create tour dir");
        for entry in fs::read_dir(&from).expect("read fixture dir") {
            let entry = entry.expect("dir entry");
            let name = entry.file_name();
            if name.to_string_lossy().contains("_rankings_") {
                continue;
            }
            fs::copy(entry.path(), to.join(&name)).expect("copy fixture");
        }
    }
    data
}

#[test]
fn missing_rankings_group_aborts_loading() {
    let tmp = tempfile::tempdir().expect("tmp dir");
    let data = tree_without_rankings(tmp.path());
    let db = tmp.path().join("tennis.sqlite");

    let mut ctx = PipelineContext::new(config(&data, &db), ProgressTracker::silent());
    let err = run_pipeline(&mut ctx).unwrap_err();

    assert_eq!(err.stage, PipelineStage::Loading);
    match &err.error {
        PipelineError::SourceGroupMissing { entity, searched } => {
            assert_eq!(*entity, "rankings");
            assert_eq!(searched.len(), 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(ctx.stage(), PipelineStage::Aborted);
    assert!(!db.exists());
}

#[test]
fn unwritable_destination_aborts_writing_without_partial_file() {
    let tmp = tempfile::tempdir().expect("tmp dir");
    // A directory where the store file should go makes the final swap fail.
    let db = tmp.path().join("tennis.sqlite");
    fs::create_dir_all(db.join("occupied")).expect("block destination");

    let mut ctx = PipelineContext::new(
        config(&fixture_data_dir(), &db),
        ProgressTracker::silent(),
    );
    let err = run_pipeline(&mut ctx).unwrap_err();

    assert_eq!(err.stage, PipelineStage::Writing);
    assert!(matches!(err.error, PipelineError::Write { .. }));
    assert_eq!(ctx.stage(), PipelineStage::Aborted);
    assert!(db.is_dir());
    assert!(!tmp.path().join("tennis.sqlite.partial").exists());
    assert!(ctx.report().is_none());
}

#[test]
fn quality_gate_aborts_verifying_but_keeps_report() {
    let tmp = tempfile::tempdir().expect("tmp dir");
    let db = tmp.path().join("tennis.sqlite");
    let cfg = PipelineConfig {
        thresholds: QualityThresholds {
            max_unparsed_score_rate: Some(0.01),
            ..QualityThresholds::default()
        },
        ..config(&fixture_data_dir(), &db)
    };

    let mut ctx = PipelineContext::new(cfg, ProgressTracker::silent());
    let err = run_pipeline(&mut ctx).unwrap_err();

    assert_eq!(err.stage, PipelineStage::Verifying);
    match &err.error {
        PipelineError::QualityGate { breaches } => {
            assert_eq!(breaches.len(), 1);
            assert!(breaches[0].contains("unparsed"));
        }
        other => panic!("unexpected error: {other}"),
    }
    let report = ctx.report().expect("report survives the abort");
    assert_eq!(report.row_count("matches"), 10);
    // The store itself was written before the gate ran.
    assert!(db.is_file());

    let timings: Vec<_> = ctx.stage_timings().iter().map(|t| t.stage).collect();
    assert_eq!(timings.last(), Some(&PipelineStage::Verifying));
}

#[test]
fn verify_only_reports_on_existing_store() {
    let tmp = tempfile::tempdir().expect("tmp dir");
    let db = tmp.path().join("tennis.sqlite");
    let mut ctx = PipelineContext::new(
        config(&fixture_data_dir(), &db),
        ProgressTracker::silent(),
    );
    let built = run_pipeline(&mut ctx).expect("pipeline should complete");

    // verify-only needs neither a data directory nor source files.
    let cfg = config(&tmp.path().join("no-data-here"), &db);
    let mut ctx = PipelineContext::new(cfg, ProgressTracker::silent());
    let report = verify_only(&mut ctx).expect("verify only");

    assert_eq!(ctx.stage(), PipelineStage::Done);
    assert_eq!(report.row_counts, built.report.row_counts);
    assert_eq!(report.integrity, built.report.integrity);
    let last = report.last_run.expect("ingest run recorded");
    assert_eq!(last.tours, "ATP,WTA");
}

#[test]
fn verify_only_on_missing_store_aborts() {
    let tmp = tempfile::tempdir().expect("tmp dir");
    let db = tmp.path().join("absent.sqlite");
    let mut ctx = PipelineContext::new(
        config(&fixture_data_dir(), &db),
        ProgressTracker::silent(),
    );
    let err = verify_only(&mut ctx).unwrap_err();

    assert_eq!(err.stage, PipelineStage::Verifying);
    assert!(matches!(err.error, PipelineError::Verification { .. }));
    assert_eq!(ctx.stage(), PipelineStage::Aborted);
    assert!(!db.exists());
}

#[test]
fn progress_ticks_walk_the_stages_in_order() {
    let tmp = tempfile::tempdir().expect("tmp dir");
    let db = tmp.path().join("tennis.sqlite");
    let mut stages: Vec<PipelineStage> = Vec::new();
    {
        let tracker = ProgressTracker::new(|p: &PipelineProgress| {
            if stages.last() != Some(&p.stage) {
                stages.push(p.stage);
            }
        });
        let mut ctx = PipelineContext::new(config(&fixture_data_dir(), &db), tracker);
        run_pipeline(&mut ctx).expect("pipeline should complete");
    }
    assert_eq!(
        stages,
        vec![
            PipelineStage::Loading,
            PipelineStage::Processing,
            PipelineStage::Writing,
            PipelineStage::Verifying
        ]
    );
}
