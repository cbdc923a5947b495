//! Backend telemetry aggregation over a synthetic data directory

mod common;

use common::{DataTree, TestReporter, TestUtils};
use flapbench::telemetry::backend::{
    aggregate, backend_graphs_dir, report, report_dir, AVERAGE_CSV, AVERAGE_PLOT, STATS_FILE, STATS_OLD_FILE,
    TRENDS_PLOT,
};
use std::fs;

#[test]
fn test_missing_service_is_skipped() {
    let tree = DataTree::new();
    let run = tree.run("run1", Some(&["microservices_local"]));
    tree.service_stats(&run, "collected_1", "engine", STATS_FILE, &[
        "initiator,StartGame,engine,Step,g1,100",
        "initiator,StartGame,engine,Step,g1,300",
    ]);
    tree.service_stats(&run, "collected_1", "worldgen", STATS_FILE, &["engine,Step,worldgen,Gen,g1,50"]);

    let summary = aggregate(tree.root()).unwrap();

    let combined = run.join("microservices_local_collected_1_combined.csv");
    assert_eq!(summary.combined, vec![combined.clone()]);
    assert_eq!(summary.skipped_runs, 0);
    assert_eq!(TestUtils::data_lines(&combined).len(), 3);

    // auth is created header-only, music stays absent
    let auth = run.join("collected_1").join("remote").join("auth").join(STATS_FILE);
    assert!(auth.is_file());
    assert!(TestUtils::data_lines(&auth).is_empty());
    assert!(!run.join("collected_1").join("remote").join("music").exists());

    TestReporter::success("test_missing_service_is_skipped");
}

#[test]
fn test_combined_order_follows_service_list() {
    let tree = DataTree::new();
    let run = tree.run("run1", Some(&["microservices_local"]));
    tree.service_stats(&run, "collected_1", "worldgen", STATS_FILE, &["engine,Step,worldgen,Gen,g1,5"]);
    tree.service_stats(&run, "collected_1", "auth", STATS_FILE, &["client,Login,auth,Check,g1,7"]);
    tree.service_stats(&run, "collected_1", "music", STATS_FILE, &["engine,Step,music,Play,g1,9"]);

    aggregate(tree.root()).unwrap();

    let lines = TestUtils::data_lines(&run.join("microservices_local_collected_1_combined.csv"));
    let sources: Vec<&str> = lines.iter().map(|l| l.split(',').nth(2).unwrap()).collect();
    assert_eq!(sources, vec!["auth", "music", "worldgen"]);
}

#[test]
fn test_report_outputs_written() {
    let tree = DataTree::new();
    let run = tree.run("run1", Some(&["microservices_local"]));
    tree.service_stats(&run, "collected_1", "engine", STATS_FILE, &[
        "initiator,StartGame,engine,Step,g1,100",
        "initiator,StartGame,engine,Step,g1,300",
        "initiator,StartGame,score,Save,g1,40",
    ]);

    let summary = aggregate(tree.root()).unwrap();
    assert_eq!(summary.reports.len(), 1);

    let graphs = backend_graphs_dir(tree.root());
    assert!(graphs.join("microservices_local_collected_1_combined.csv").is_file());

    let out = graphs.join("microservices_local_collected_1_combined");
    assert_eq!(summary.reports[0], out);
    assert!(out.join(AVERAGE_PLOT).is_file());
    assert!(out.join(TRENDS_PLOT).is_file());

    let averages = fs::read_to_string(out.join(AVERAGE_CSV)).unwrap();
    let lines: Vec<&str> = averages.lines().collect();
    assert_eq!(lines, vec!["DestSvcName,AverageLatency", "engine,200.0", "score,40.0"]);
}

#[test]
fn test_monolith_combines_current_then_old() {
    let tree = DataTree::new();
    let run = tree.run("run1", Some(&["monolith_single_instance"]));
    tree.service_stats(&run, "collected_a", "monolith", STATS_OLD_FILE, &["engine,Step,score,Save,g0,2"]);
    tree.service_stats(&run, "collected_a", "monolith", STATS_FILE, &["engine,Step,score,Save,g1,1"]);

    let summary = aggregate(tree.root()).unwrap();

    let combined = run.join("monolith_single_instance_collected_a_combined.csv");
    assert_eq!(summary.combined, vec![combined.clone()]);
    let games: Vec<String> = TestUtils::data_lines(&combined)
        .iter()
        .map(|l| l.split(',').nth(4).unwrap().to_string())
        .collect();
    assert_eq!(games, vec!["g1", "g0"]);
}

#[test]
fn test_runs_without_deploy_type_are_skipped() {
    let tree = DataTree::new();
    let unmarked = tree.run("run0", None);
    tree.service_stats(&unmarked, "collected_1", "engine", STATS_FILE, &["a,b,engine,d,g,1"]);
    let marked = tree.run("run1", Some(&["serverless"]));
    tree.service_stats(&marked, "collected_1", "engine", STATS_FILE, &["a,b,engine,d,g,1"]);

    let summary = aggregate(tree.root()).unwrap();

    assert_eq!(summary.skipped_runs, 1);
    // unknown deploy types produce nothing
    assert!(summary.combined.is_empty());
    assert!(summary.reports.is_empty());
}

#[test]
fn test_empty_telemetry_report_has_header_only() {
    let tree = DataTree::new();
    let csv = tree.root().join("empty_combined.csv");
    fs::write(&csv, TestUtils::telemetry_csv(&[])).unwrap();

    let out = report(&csv, tree.root()).unwrap();

    let averages = fs::read_to_string(out.join(AVERAGE_CSV)).unwrap();
    assert_eq!(averages.trim(), "DestSvcName,AverageLatency");
    assert!(!out.join(AVERAGE_PLOT).exists());
}

#[test]
fn test_report_dir_skips_bad_files() {
    let tree = DataTree::new();
    fs::write(
        tree.root().join("good.csv"),
        TestUtils::telemetry_csv(&["a,b,auth,d,g,10", "a,b,auth,d,g,20"]),
    )
    .unwrap();
    fs::write(tree.root().join("bad.csv"), "SrcSvcName,ReqTime\nx,not-a-number\n").unwrap();
    fs::write(tree.root().join("notes.txt"), "ignored").unwrap();

    let reported = report_dir(tree.root()).unwrap();

    assert_eq!(reported, 1);
    assert!(tree.root().join("good").join(AVERAGE_CSV).is_file());
}

#[test]
fn test_report_dir_missing_folder() {
    let tree = DataTree::new();
    assert!(report_dir(&tree.root().join("nope")).is_err());
}

#[test]
fn test_corrupt_service_file_does_not_stop_aggregation() {
    let tree = DataTree::new();
    let broken = tree.run("run1", Some(&["microservices_local"]));
    tree.service_stats(&broken, "collected_1", "engine", STATS_FILE, &["initiator,StartGame,engine,Step,g1,100"]);
    let music = tree.service_stats(&broken, "collected_1", "music", STATS_FILE, &[]);
    let mut bytes = fs::read(&music).unwrap();
    bytes.extend_from_slice(b"engine,Step,music,Play,g1,\xff\xfe\n");
    fs::write(&music, bytes).unwrap();

    let healthy = tree.run("run2", Some(&["microservices_local"]));
    tree.service_stats(&healthy, "collected_1", "score", STATS_FILE, &["engine,Step,score,Save,g2,40"]);

    let summary = aggregate(tree.root()).unwrap();

    let broken_combined = broken.join("microservices_local_collected_1_combined.csv");
    let healthy_combined = healthy.join("microservices_local_collected_1_combined.csv");
    assert_eq!(summary.combined, vec![broken_combined.clone(), healthy_combined.clone()]);
    // the unreadable music file adds no rows at all
    assert_eq!(
        TestUtils::data_lines(&broken_combined),
        vec!["initiator,StartGame,engine,Step,g1,100".to_string()]
    );
    assert_eq!(TestUtils::data_lines(&healthy_combined).len(), 1);
    assert_eq!(summary.reports.len(), 2);
}

#[test]
fn test_short_row_keeps_rest_of_report() {
    let tree = DataTree::new();
    let run = tree.run("run1", Some(&["microservices_local"]));
    tree.service_stats(&run, "collected_1", "engine", STATS_FILE, &[
        "initiator,StartGame,engine,Step,g1,100",
        "initiator,StartGame,engine,Step,g1",
    ]);

    let summary = aggregate(tree.root()).unwrap();

    assert_eq!(summary.reports.len(), 1);
    let averages = fs::read_to_string(summary.reports[0].join(AVERAGE_CSV)).unwrap();
    let lines: Vec<&str> = averages.lines().collect();
    assert_eq!(lines, vec!["DestSvcName,AverageLatency", "engine,100.0"]);
    assert!(summary.reports[0].join(AVERAGE_PLOT).is_file());
}
