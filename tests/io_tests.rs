use ecg_denoise::config::PipelineConfig;
use ecg_denoise::data_loading::{load_intervals, load_signal};
use ecg_denoise::intervals::Interval;
use ecg_denoise::output::{save_intervals_json, save_signal_csv, write_run};
use ecg_denoise::pipeline::Pipeline;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_load_text_intervals_with_bound() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("gaps.txt");
    fs::write(
        &path,
        "# start end\n40 60\n0, 5\ngarbage\n55 70\n95 200\n300 400\n",
    )
    .unwrap();

    let raw = load_intervals(&path, None).unwrap();
    assert_eq!(raw.len(), 5);

    let bounded = load_intervals(&path, Some(100)).unwrap();
    assert_eq!(
        bounded,
        vec![
            Interval::new(0, 5),
            Interval::new(40, 70),
            Interval::new(95, 99)
        ]
    );
}

#[test]
fn test_load_json_intervals() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("gaps.json");
    fs::write(&path, "[[10, 20], [25.0, 22.0], [-3, 2]]").unwrap();
    let spans = load_intervals(&path, None).unwrap();
    assert_eq!(
        spans,
        vec![
            Interval::new(10, 20),
            Interval::new(22, 25),
            Interval::new(0, 2)
        ]
    );
}

#[test]
fn test_malformed_json_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("gaps.json");
    fs::write(&path, "[[10, 20], [1]]").unwrap();
    assert!(load_intervals(&path, None).is_err());
    assert!(load_intervals(&dir.path().join("missing.txt"), None).is_err());
}

#[test]
fn test_intervals_json_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("out.json");
    let spans = vec![Interval::new(1, 4), Interval::new(9, 9)];
    save_intervals_json(&spans, &path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    let parsed: Vec<Vec<usize>> = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, vec![vec![1, 4], vec![9, 9]]);
    assert_eq!(load_intervals(&path, None).unwrap(), spans);
}

#[test]
fn test_load_signal_formats() {
    let dir = tempdir().unwrap();

    let csv_path = dir.path().join("ecg.csv");
    fs::write(&csv_path, "value\n# comment\n0.5\n-1.25,extra\n\nnan-ish\n3\n").unwrap();
    assert_eq!(load_signal(&csv_path).unwrap(), vec![0.5, -1.25, 3.0]);

    let json_path = dir.path().join("ecg.json");
    fs::write(&json_path, "[1.0, 2, -3.5]").unwrap();
    assert_eq!(load_signal(&json_path).unwrap(), vec![1.0, 2.0, -3.5]);

    let written = dir.path().join("copy.csv");
    save_signal_csv(&[0.25, -4.0, 7.5], &written).unwrap();
    assert_eq!(load_signal(&written).unwrap(), vec![0.25, -4.0, 7.5]);
}

#[test]
fn test_write_run_outputs() {
    let dir = tempdir().unwrap();
    let signal: Vec<f64> = (0..400).map(|i| ((i as f64) * 0.3).sin()).collect();
    let gaps = vec![Interval::new(100, 149)];

    let mut config = PipelineConfig::default();
    config.filter.enabled = false;
    let result = Pipeline::new(config).run(&signal, &gaps).unwrap();

    let summary = write_run(&result, dir.path(), true).unwrap();
    let summary: serde_json::Value = serde_json::from_str(&summary).unwrap();
    assert_eq!(summary["len_original"], 400);
    assert_eq!(summary["len_start"], 350);
    assert_eq!(summary["gaps_count"], 1);

    for name in [
        "gaps_on_orig.json",
        "outliers_on_orig.json",
        "rdropouts_on_orig.json",
        "motions_on_orig.json",
        "outliers_on_start.json",
        "rdropouts_on_start.json",
        "motions_on_start.json",
        "summary.json",
        "signal_start.csv",
        "signal_final.csv",
    ] {
        assert!(dir.path().join(name).exists(), "{name} missing");
    }
    assert!(!dir.path().join("gaps_on_start.json").exists());

    let gaps_back = load_intervals(&dir.path().join("gaps_on_orig.json"), None).unwrap();
    assert_eq!(gaps_back, gaps);
    assert_eq!(
        load_signal(&dir.path().join("signal_final.csv")).unwrap(),
        result.signal_final
    );
}
