//! End-to-end sweeps against an embedded SQLite database
//!
//! Builds a tiny two-table schema, shuffles it into numbered copies and runs
//! a join sweep over them with the real clock.

use std::fs;
use std::path::Path;

use joinprobe::averager::{average_summary_files, MissingValuePolicy, SummaryFormat};
use joinprobe::config::SweepConfig;
use joinprobe::cursor::{AnySession, Session, SqliteSession};
use joinprobe::shuffle::Shuffler;
use joinprobe::sweep::{SweepDriver, VariantStatus};
use joinprobe::timer::MonotonicClock;
use joinprobe::variant::Axis;

const ROWS: u32 = 300;

fn seeded_session() -> SqliteSession {
    let mut session = SqliteSession::open_in_memory().unwrap();
    session
        .execute_batch(&format!(
            "CREATE TABLE orders(o_orderkey INTEGER);
             CREATE TABLE lineitem(l_orderkey INTEGER);
             WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < {ROWS})
             INSERT INTO orders SELECT i FROM n;
             INSERT INTO lineitem SELECT o_orderkey FROM orders;"
        ))
        .unwrap();
    Shuffler::numbered(["orders", "lineitem"], 2)
        .unwrap()
        .run(&mut session)
        .unwrap();
    session
}

fn config(dir: &Path, shuffles: &[&str]) -> SweepConfig {
    SweepConfig {
        database: "sqlite::memory:".to_string(),
        checkpoints: vec![10, 50, 100, 1_000],
        repetitions: 2,
        query: "select o_orderkey, l_orderkey from orders{shuffle} join lineitem{shuffle} \
                on o_orderkey = l_orderkey;"
            .to_string(),
        axes: vec![
            Axis::new("shuffle", shuffles.iter().copied()),
            Axis::new("size", ["small"]),
        ],
        group_by: vec!["size".to_string()],
        detail_path: "{base}_{shuffle}.log".to_string(),
        summary_path: "{base}_{size}.dat".to_string(),
        report_path: Some(dir.join("report.json").display().to_string()),
        ..SweepConfig::default()
    }
}

#[test]
fn test_sweep_writes_detail_and_summary_files() {
    let dir = tempfile::tempdir().unwrap();
    let detail = dir.path().join("detail").display().to_string();
    let summary = dir.path().join("summary").display().to_string();

    let mut driver =
        SweepDriver::new(config(dir.path(), &["1", "2"]), seeded_session(), MonotonicClock::new())
            .unwrap();
    let report = driver.run(&detail, &summary);

    assert_eq!(report.completed(), 2);
    for outcome in &report.variants {
        assert_eq!(outcome.runs.len(), 2);
        for run in &outcome.runs {
            assert_eq!(run.fetched(), u64::from(ROWS));
            let counts: Vec<u64> = run.samples().iter().map(|s| s.count).collect();
            assert_eq!(counts, vec![10, 50, 100, 300]);
        }
    }

    let log = fs::read_to_string(format!("{detail}_1.log")).unwrap();
    assert_eq!(log.matches("Time of the test run:").count(), 2);
    assert!(log.contains("BNL: select o_orderkey, l_orderkey from orders1 join lineitem1"));
    assert!(log.contains("#2"));
    assert!(log.contains("Final fetch count before exit: 300"));
    assert!(log.contains("\tQuery: select"));
    assert!(log.contains("K val:100\tAverage time (unweighted):"));
    assert!(Path::new(&format!("{detail}_2.log")).exists());

    // 1000 is never reached; the default policy drops it from the summary
    let text = fs::read_to_string(format!("{summary}_small.dat")).unwrap();
    let keys: Vec<&str> = text
        .lines()
        .map(|l| l.split(',').next().unwrap().trim_start_matches('('))
        .collect();
    assert_eq!(keys, vec!["10", "50", "100"]);
    assert_eq!(report.summaries[0].variants, 2);

    let json = fs::read_to_string(dir.path().join("report.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["variants"].as_array().unwrap().len(), 2);
}

#[test]
fn test_sweep_continues_past_missing_table() {
    let dir = tempfile::tempdir().unwrap();
    let mut driver = SweepDriver::new(
        config(dir.path(), &["1", "9", "2"]),
        seeded_session(),
        MonotonicClock::new(),
    )
    .unwrap();
    let report = driver.run(
        &dir.path().join("d").display().to_string(),
        &dir.path().join("s").display().to_string(),
    );

    let statuses: Vec<VariantStatus> = report.variants.iter().map(|v| v.status).collect();
    assert_eq!(
        statuses,
        vec![VariantStatus::Completed, VariantStatus::Failed, VariantStatus::Completed]
    );
    assert!(report.variants[1]
        .error
        .as_deref()
        .unwrap()
        .contains("orders9"));
    assert_eq!(report.summaries[0].variants, 2);
}

#[test]
fn test_zero_policy_keeps_unreached_checkpoints() {
    let dir = tempfile::tempdir().unwrap();
    let config = SweepConfig {
        missing_values: MissingValuePolicy::Zero,
        summary_format: SummaryFormat::Weighted,
        ..config(dir.path(), &["1"])
    };
    let summary = dir.path().join("s").display().to_string();
    let mut driver = SweepDriver::new(config, seeded_session(), MonotonicClock::new()).unwrap();
    driver.run(&dir.path().join("d").display().to_string(), &summary);

    let entries = average_summary_files(&[format!("{summary}_small.dat")], MissingValuePolicy::Skip)
        .unwrap();
    let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, vec!["10", "50", "100", "1000"]);
    assert!(entries[3].value.abs() < f64::EPSILON);
}

#[test]
fn test_any_session_opens_sqlite_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bench.db");
    let url = format!("sqlite://{}", path.display());

    let mut session = AnySession::connect(&url).unwrap();
    session
        .execute_batch("CREATE TABLE t(x INTEGER); INSERT INTO t VALUES (1), (2), (3);")
        .unwrap();
    let rows = session
        .with_cursor("SELECT x FROM t", |cursor| {
            let mut n = 0;
            while cursor.next_row().unwrap() {
                n += 1;
            }
            n
        })
        .unwrap();
    assert_eq!(rows, 3);
    assert!(path.exists());
}

#[test]
fn test_unknown_scheme_rejected() {
    assert!(AnySession::connect("mysql://localhost/db").is_err());
}
