use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

const SCENARIO: &str = r#"
epoch: 0.0
bodies:
  - name: Earth
    mu_km3_s2: 398600.0
    radius_km: 6371.0
  - name: Moon
    mu_km3_s2: 4902.8
    radius_km: 1737.4
    parent: Earth
    orbit:
      semi_major_axis_km: 384400.0
      true_anomaly_deg: 120.0
vessel:
  body: Earth
  orbit:
    semi_major_axis_km: 7000.0
target:
  body: Earth
  orbit:
    semi_major_axis_km: 9000.0
    true_anomaly_deg: 60.0
planner:
  annealing:
    max_iterations: 15
    cooling_rate: 0.8
"#;

fn write_scenario(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("scenario.yaml");
    fs::write(&path, SCENARIO).expect("write scenario");
    path
}

#[test]
fn hohmann_prints_analytic_burns() {
    Command::cargo_bin("maneuver")
        .expect("maneuver bin")
        .args(["hohmann", "--mu", "398600", "--r1", "6671", "--r2", "26571", "--phase-deg", "30"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dv1 = 2.04"))
        .stdout(predicate::str::contains("Next window"));
}

#[test]
fn hohmann_window_uses_planner_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let planner = dir.path().join("planner.yaml");
    fs::write(&planner, "window_search:\n  immediate_window_deg: 2.0\n").expect("write planner");

    // About one degree past the 90.95 deg departure phase.
    let args = ["hohmann", "--mu", "398600", "--r1", "6671", "--r2", "26571", "--phase-deg", "89.95"];
    Command::cargo_bin("maneuver")
        .expect("maneuver bin")
        .args(args)
        .assert()
        .success()
        .stdout(predicate::str::contains("Next window    : t = 0.0 s").not());
    Command::cargo_bin("maneuver")
        .expect("maneuver bin")
        .args(args)
        .arg("--planner")
        .arg(&planner)
        .assert()
        .success()
        .stdout(predicate::str::contains("Next window    : t = 0.0 s"));
}

#[test]
fn hohmann_rejects_negative_radius() {
    Command::cargo_bin("maneuver")
        .expect("maneuver bin")
        .args(["hohmann", "--mu", "398600", "--r1=-10", "--r2", "26571"])
        .assert()
        .failure();
}

#[test]
fn transfer_writes_json_plan() {
    let dir = tempfile::tempdir().expect("tempdir");
    let scenario = write_scenario(&dir);
    let output = dir.path().join("plans/plan.json");

    Command::cargo_bin("maneuver")
        .expect("maneuver bin")
        .args(["transfer", "--seed", "5", "--scenario"])
        .arg(&scenario)
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Seed           : 5"));

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).expect("plan written")).expect("valid json");
    assert_eq!(json["seed"], 5);
    assert!(json["total_delta_v_km_s"].as_f64().expect("cost") > 0.0);
    assert!(json["arrival"].is_object());
}

#[test]
fn patches_emit_csv_header() {
    let dir = tempfile::tempdir().expect("tempdir");
    let scenario = write_scenario(&dir);

    Command::cargo_bin("maneuver")
        .expect("maneuver bin")
        .args(["patches", "--horizon-days", "1", "--scenario"])
        .arg(&scenario)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("index,body,start_epoch_s"))
        .stdout(predicate::str::contains("Earth"));
}

#[test]
fn correct_prints_burn() {
    let dir = tempfile::tempdir().expect("tempdir");
    let scenario = write_scenario(&dir);

    Command::cargo_bin("maneuver")
        .expect("maneuver bin")
        .args(["correct", "--arrival-hours", "1", "--scenario"])
        .arg(&scenario)
        .assert()
        .success()
        .stdout(predicate::str::contains("Correction     : t = "))
        .stdout(predicate::str::contains("Δv vector"));
}

#[test]
fn missing_scenario_fails() {
    Command::cargo_bin("maneuver")
        .expect("maneuver bin")
        .args(["patches", "--scenario", "does/not/exist.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("loading scenario"));
}
