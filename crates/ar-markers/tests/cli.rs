use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;

fn write_fixtures(dir: &Path) {
    let config = r#"{
        "calibration": {
            "width": 8,
            "height": 6,
            "marker_size_m": 0.05,
            "intrinsics_path": "camera.yml"
        },
        "drain_timeout_ms": 2000
    }"#;
    let cycles = r#"[
        [{ "id": 1, "position": [0.0, 0.0, 0.5], "orientation": [0.0, 0.0, 0.0, 1.0] }],
        []
    ]"#;
    fs::write(dir.join("session.json"), config).unwrap();
    fs::write(dir.join("cycles.json"), cycles).unwrap();
}

#[test]
fn replay_prints_json_report() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());

    let output = Command::cargo_bin("ar-markers")
        .unwrap()
        .current_dir(dir.path())
        .args(["replay", "--config", "session.json", "--cycles", "cycles.json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["frames"].as_array().unwrap().len(), 2);
    assert_eq!(report["frames"][1]["hidden"][0], 1);
    assert_eq!(report["objects"][0]["id"], 1);
    assert_eq!(report["objects"][0]["visible"], false);
    assert_eq!(report["worker_cycles"], 2);
}

#[test]
fn replay_writes_report_file() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());

    Command::cargo_bin("ar-markers")
        .unwrap()
        .current_dir(dir.path())
        .args([
            "replay",
            "--config",
            "session.json",
            "--cycles",
            "cycles.json",
            "--report",
            "report.json",
            "--viewport-fov",
            "38",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote report for 2 frames"));

    let report = ar_markers::ReplayReport::load_json(dir.path().join("report.json")).unwrap();
    assert_eq!(report.viewport_fov_deg, 38.0);
    assert_eq!(report.objects.len(), 1);
    // Equal fovs, 1.0 / 0.05 scene units per meter.
    assert!((report.objects[0].position[2] - 10.0).abs() < 1e-9);
}

#[test]
fn init_config_writes_loadable_config() {
    let dir = tempfile::tempdir().unwrap();

    Command::cargo_bin("ar-markers")
        .unwrap()
        .current_dir(dir.path())
        .args([
            "init-config",
            "--out",
            "session.json",
            "--intrinsics",
            "camera.yml",
            "--width",
            "1280",
            "--height",
            "720",
        ])
        .assert()
        .success();

    let config = ar_markers::SessionConfig::load_json(dir.path().join("session.json")).unwrap();
    assert_eq!(config.calibration.width, 1280);
    assert_eq!(config.camera_fov_deg, 38.0);
}

#[test]
fn missing_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("ar-markers")
        .unwrap()
        .current_dir(dir.path())
        .args(["replay", "--config", "nope.json", "--cycles", "nope.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[cfg(not(feature = "tracing"))]
#[test]
fn verbose_replay_logs_debug_lines_to_stderr() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());

    let output = Command::cargo_bin("ar-markers")
        .unwrap()
        .current_dir(dir.path())
        .args(["--verbose", "replay", "--config", "session.json", "--cycles", "cycles.json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("DEBUG"));
    assert!(stderr.contains("applied cycle 1"));
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["worker_cycles"], 2);
}
