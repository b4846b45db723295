use std::io::Write;
use std::path::PathBuf;

use hotspot_advisor::{ClusterSnapshot, HotspotDetector, HotspotError, NodeReading, RuleSet};

fn rules_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("rules/tidb_hotspot.toml")
}

fn detector() -> HotspotDetector {
    let rules = RuleSet::from_file(rules_path(), "TiDBHotspot", "1.0.0").unwrap();
    HotspotDetector::new(rules)
}

fn cluster(readings: &[(f64, f64)]) -> ClusterSnapshot {
    ClusterSnapshot::new(
        readings
            .iter()
            .enumerate()
            .map(|(i, &(w, r))| NodeReading::new(format!("tikv-{}", i + 1), w, r))
            .collect(),
    )
}

fn rule_file(text: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

#[test]
fn write_and_read_hotspots() {
    let mut snap = cluster(&[
        (30.5, 25.3),
        (32.1, 28.7),
        (85.2, 22.1),
        (29.8, 26.5),
        (31.2, 90.4),
    ]);
    let verdict = detector().evaluate(&mut snap).unwrap().clone();

    let stats = snap.stats.as_ref().unwrap();
    assert_eq!(stats.write.max, 85.2);
    assert!((stats.write.avg - 41.76).abs() < 1e-9);
    assert!(verdict.write_hotspot_detected);
    assert!((verdict.write_hotspot_ratio - 2.04).abs() < 0.01);
    assert_eq!(snap.write_hotspot_node(), Some("tikv-3"));
    assert!(verdict.read_hotspot_detected);
    assert_eq!(snap.read_hotspot_node(), Some("tikv-5"));
}

#[test]
fn balanced_cluster_has_no_hotspot() {
    let mut snap = cluster(&[
        (30.5, 25.3),
        (32.1, 28.7),
        (31.8, 27.1),
        (29.8, 26.5),
        (31.2, 28.4),
    ]);
    let verdict = detector().evaluate(&mut snap).unwrap();

    assert!(!verdict.write_hotspot_detected);
    assert!(!verdict.read_hotspot_detected);
    assert!(verdict.fired.is_empty());
}

#[test]
fn skew_below_threshold_is_not_a_hotspot() {
    let mut snap = cluster(&[
        (30.0, 25.0),
        (32.0, 28.0),
        (45.0, 22.0),
        (29.0, 26.0),
        (31.0, 28.0),
    ])
    .with_non_clustered_index(true);
    let verdict = detector().evaluate(&mut snap).unwrap().clone();

    let stats = snap.stats.as_ref().unwrap();
    assert!((stats.write.avg - 33.4).abs() < 1e-9);
    assert!((stats.write.skew_ratio() - 1.347).abs() < 0.001);
    assert!(!verdict.write_hotspot_detected);
    assert!(!verdict.recommend_shard_bits);
}

#[test]
fn ratio_just_under_threshold_is_not_a_hotspot() {
    let mut snap = cluster(&[
        (30.0, 25.0),
        (32.0, 28.0),
        (50.0, 22.0),
        (29.0, 26.0),
        (31.0, 28.0),
    ])
    .with_non_clustered_index(true);
    let verdict = detector().evaluate(&mut snap).unwrap();

    assert!(!verdict.write_hotspot_detected);
    assert!(!verdict.recommend_shard_bits);
}

#[test]
fn non_clustered_index_hotspot_gets_shard_bits() {
    let mut snap = cluster(&[
        (25.3, 22.1),
        (28.7, 24.5),
        (95.8, 23.2),
        (26.2, 25.1),
        (27.5, 24.8),
    ])
    .with_non_clustered_index(true);
    let verdict = detector().evaluate(&mut snap).unwrap();

    assert!(verdict.write_hotspot_detected);
    assert!(verdict.recommend_shard_bits);
    // ratio ≈ 2.35, ceil(log2(2.35)) = 2
    assert_eq!(verdict.shard_row_id_bits, 2);
    assert!(!verdict.read_hotspot_detected);
}

#[test]
fn clustered_index_hotspot_gets_no_shard_bits() {
    let mut snap = cluster(&[
        (30.0, 25.0),
        (32.0, 28.0),
        (85.0, 22.0),
        (29.0, 26.0),
        (31.0, 28.0),
    ]);
    let verdict = detector().evaluate(&mut snap).unwrap();

    assert!(verdict.write_hotspot_detected);
    assert!(!verdict.recommend_shard_bits);
    assert_eq!(verdict.shard_row_id_bits, 0);
}

#[test]
fn exact_threshold_fires_with_inclusive_comparison() {
    let mut snap = cluster(&[(15.0, 1.0), (5.0, 1.0), (10.0, 1.0)]);
    let verdict = detector().evaluate(&mut snap).unwrap();
    assert!(verdict.write_hotspot_detected);
    assert_eq!(verdict.write_hotspot_ratio, 1.5);

    let mut snap = cluster(&[(14.99, 1.0), (5.01, 1.0), (10.0, 1.0)]);
    let verdict = detector().evaluate(&mut snap).unwrap();
    assert!(!verdict.write_hotspot_detected);
}

#[test]
fn exact_threshold_does_not_fire_with_strict_comparison() {
    let file = rule_file(
        r#"
[[rule]]
kind = "detect-write-hotspot"
comparison = "greater-than"
"#,
    );
    let detector = HotspotDetector::new(RuleSet::from_file(file.path(), "strict", "1").unwrap());

    let mut snap = cluster(&[(15.0, 1.0), (5.0, 1.0), (10.0, 1.0)]);
    assert!(!detector.evaluate(&mut snap).unwrap().write_hotspot_detected);

    let mut snap = cluster(&[(15.1, 1.0), (5.0, 1.0), (10.0, 1.0)]);
    assert!(detector.evaluate(&mut snap).unwrap().write_hotspot_detected);
}

#[test]
fn read_check_disabled_ignores_read_skew() {
    let mut snap = cluster(&[(30.0, 10.0), (31.0, 10.0), (90.0, 95.0)]).with_checks(true, false);
    let verdict = detector().evaluate(&mut snap).unwrap();

    assert!(verdict.write_hotspot_detected);
    assert!(!verdict.read_hotspot_detected);
    assert_eq!(verdict.read_hotspot_ratio, 0.0);
}

#[test]
fn same_snapshot_across_ticks() {
    let detector = detector();
    let mut snap = cluster(&[(30.0, 20.0), (31.0, 20.0), (32.0, 20.0)]).with_non_clustered_index(true);
    assert!(!detector.evaluate(&mut snap).unwrap().write_hotspot_detected);

    snap.nodes[1].raftstore_cpu = 95.0;
    let verdict = detector.evaluate(&mut snap).unwrap();
    assert!(verdict.write_hotspot_detected);
    assert!(verdict.recommend_shard_bits);
    assert_eq!(snap.write_hotspot_node(), Some("tikv-2"));

    snap.nodes[1].raftstore_cpu = 31.0;
    let verdict = detector.evaluate(&mut snap).unwrap();
    assert!(!verdict.write_hotspot_detected);
    assert!(!verdict.recommend_shard_bits);
}

#[test]
fn rule_files_merge_into_one_rule_set() {
    let detection = rule_file(
        r#"
[[rule]]
kind = "detect-write-hotspot"

[[rule]]
kind = "detect-read-hotspot"
"#,
    );
    let advice = rule_file(
        r#"
[[rule]]
kind = "recommend-shard-bits"
mapping = { tiers = [{ min_ratio = 1.5, bits = 4 }, { min_ratio = 3.0, bits = 8 }] }
"#,
    );

    let rules = RuleSet::from_files(&[detection.path(), advice.path()], "TiDBHotspot", "2.0.0")
        .unwrap();
    assert_eq!(rules.version(), "2.0.0");
    assert_eq!(rules.len(), 3);

    let detector = HotspotDetector::new(rules);
    let mut snap = cluster(&[(25.3, 22.1), (28.7, 24.5), (95.8, 23.2), (26.2, 25.1), (27.5, 24.8)])
        .with_non_clustered_index(true);
    assert_eq!(detector.evaluate(&mut snap).unwrap().shard_row_id_bits, 4);
}

#[test]
fn rule_set_configuration_errors() {
    let empty: [PathBuf; 0] = [];
    let err = RuleSet::from_files(&empty, "TiDBHotspot", "1.0.0").unwrap_err();
    assert!(matches!(err, HotspotError::NoRuleFiles));

    let err = RuleSet::from_file("/nonexistent/tidb.toml", "TiDBHotspot", "1.0.0").unwrap_err();
    assert!(matches!(err, HotspotError::Resource { .. }));
    assert!(err.is_configuration());

    let first = rule_file("[[rule]]\nkind = \"detect-write-hotspot\"\n");
    let second = rule_file("[[rule]]\nkind = \"detect-write-hotspot\"\nthreshold = 2.0\n");
    let err = RuleSet::from_files(&[first.path(), second.path()], "TiDBHotspot", "1.0.0")
        .unwrap_err();
    assert!(matches!(err, HotspotError::InvalidRule { .. }));
}

#[test]
fn parallel_evaluation_matches_sequential() {
    let detector = detector();
    let base: Vec<ClusterSnapshot> = (0..32)
        .map(|i| {
            let hot = 30.0 + i as f64 * 2.0;
            cluster(&[(30.0, 20.0), (hot, 20.0 + i as f64), (31.0, 21.0), (29.5, 19.0)])
                .with_non_clustered_index(i % 3 == 0)
        })
        .collect();

    let mut parallel = base.clone();
    detector.evaluate_all(&mut parallel).unwrap();

    for (mut snap, par) in base.into_iter().zip(&parallel) {
        let verdict = detector.evaluate(&mut snap).unwrap();
        assert_eq!(verdict, &par.verdict);
    }
}
