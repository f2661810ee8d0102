use std::fs;
use std::path::Path;

use rusqlite::Connection;

use tennis_store::config::PipelineConfig;
use tennis_store::pipeline::{PipelineContext, PipelineSummary, run_pipeline};
use tennis_store::progress::ProgressTracker;
use tennis_store::tour::{Tour, TourLayout};

const MATCH_HEADER: &str =
    "tourney_id,tourney_name,surface,tourney_level,tourney_date,match_num,winner_id,winner_name,loser_id,loser_name,score,best_of,round";
const PLAYER_HEADER: &str = "player_id,name_first,name_last,hand,dob,ioc,height,wikidata_id";
const RANKING_HEADER: &str = "ranking_date,rank,player,points";

fn write_file(dir: &Path, name: &str, lines: &[&str]) {
    fs::create_dir_all(dir).expect("create tour dir");
    let mut body = lines.join("\n");
    body.push('\n');
    fs::write(dir.join(name), body).expect("write fixture");
}

/// ATP and WTA trees whose player files share raw id 200005 for two
/// different people, plus one shared id for a player listed on both tours.
fn colliding_tree(root: &Path) {
    let atp = root.join("tennis_atp");
    let wta = root.join("tennis_wta");
    write_file(
        &atp,
        "atp_players.csv",
        &[
            PLAYER_HEADER,
            "200005,John,Doe,R,19900101,USA,180,",
            "100001,Max,Mustermann,L,19920202,GER,190,",
            "300001,Alex,Both,R,19950505,CAN,,",
        ],
    );
    write_file(
        &wta,
        "wta_players.csv",
        &[
            PLAYER_HEADER,
            "200005,Jane,Roe,R,19930303,GBR,170,",
            "200006,Ann,Other,L,19940404,AUS,168,",
            "300001,Alex,Both,R,19950505,CAN,178,Q1",
        ],
    );
    write_file(
        &atp,
        "atp_rankings_current.csv",
        &[RANKING_HEADER, "20190107,5,200005,3000", "20190107,9,100001,1500"],
    );
    write_file(
        &wta,
        "wta_rankings_current.csv",
        &[RANKING_HEADER, "20190107,7,200005,2500", "20190107,8,200006,2400"],
    );
    write_file(
        &atp,
        "atp_matches_2019.csv",
        &[
            MATCH_HEADER,
            "2019-1,Doha,Hard,A,20190101,1,200005,John Doe,100001,Max Mustermann,6-4 6-4,3,F",
        ],
    );
    write_file(
        &wta,
        "wta_matches_2019.csv",
        &[
            MATCH_HEADER,
            "2019-W-2,Brisbane,Hard,P,20190101,1,200005,Jane Roe,200006,Ann Other,7-5 6-1,3,F",
        ],
    );
}

fn build(data: &Path, db: &Path) -> PipelineSummary {
    let cfg = PipelineConfig {
        data_dir: data.to_path_buf(),
        db_path: db.to_path_buf(),
        parallelism: 2,
        ..PipelineConfig::default()
    };
    let mut ctx = PipelineContext::new(cfg, ProgressTracker::silent());
    run_pipeline(&mut ctx).expect("pipeline should complete")
}

#[test]
fn cross_tour_collision_is_remapped_everywhere() {
    let tmp = tempfile::tempdir().expect("tmp dir");
    let data = tmp.path().join("data");
    colliding_tree(&data);
    let db = tmp.path().join("tennis.sqlite");
    let summary = build(&data, &db);

    let remapped = 200005 + Tour::Wta.layout().collision_offset();
    let players = &summary.diagnostics.players;
    assert_eq!(players.raw_records, 6);
    assert_eq!(players.canonical_players, 5);
    assert_eq!(players.duplicates_merged, 1);
    assert_eq!(players.collisions.len(), 1);
    let collision = &players.collisions[0];
    assert_eq!(collision.kept_name, "John Doe");
    assert_eq!(collision.moved_name, "Jane Roe");
    assert_eq!(collision.assigned_id, remapped);

    let conn = Connection::open(&db).expect("open store");
    let (name, source_id, tour): (String, i64, String) = conn
        .query_row(
            "SELECT full_name, source_id, tour FROM players WHERE player_id = ?1",
            [remapped],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .expect("remapped player");
    assert_eq!(name, "Jane Roe");
    assert_eq!(source_id, 200005);
    assert_eq!(tour, "WTA");

    let winner: String = conn
        .query_row(
            "SELECT winner_full_name FROM matches_with_players WHERE tourney_name = 'Brisbane'",
            [],
            |r| r.get(0),
        )
        .expect("wta match");
    assert_eq!(winner, "Jane Roe");

    let wta_rank: i64 = conn
        .query_row(
            "SELECT rank FROM rankings WHERE tour = 'WTA' AND player_id = ?1",
            [remapped],
            |r| r.get(0),
        )
        .expect("wta ranking");
    assert_eq!(wta_rank, 7);

    let atp_rank: i64 = conn
        .query_row(
            "SELECT rank FROM rankings WHERE tour = 'ATP' AND player_id = 200005",
            [],
            |r| r.get(0),
        )
        .expect("atp ranking");
    assert_eq!(atp_rank, 5);

    assert!(summary.report.integrity.is_clean());
}

#[test]
fn same_person_on_both_tours_merges_into_one_row() {
    let tmp = tempfile::tempdir().expect("tmp dir");
    let data = tmp.path().join("data");
    colliding_tree(&data);
    let db = tmp.path().join("tennis.sqlite");
    build(&data, &db);

    let conn = Connection::open(&db).expect("open store");
    let (rows, height, wikidata): (i64, Option<i64>, Option<String>) = conn
        .query_row(
            "SELECT COUNT(*), MAX(height_cm), MAX(wikidata_id) FROM players WHERE source_id = 300001",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .expect("merged player");
    assert_eq!(rows, 1);
    assert_eq!(height, Some(178));
    assert_eq!(wikidata.as_deref(), Some("Q1"));
}
