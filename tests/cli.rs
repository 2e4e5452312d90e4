use assert_cmd::Command;
use serde_json::Value;
use tempfile::tempdir;

fn cardspot(config_dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("cardspot").unwrap();
    cmd.arg("--config")
        .arg(config_dir.join("config.json"))
        .env("CARDSPOT_LOG", "warn");
    cmd
}

#[test]
fn simulate_prints_the_report_message() {
    let dir = tempdir().unwrap();
    let output = cardspot(dir.path())
        .args(["--simulate", "perfect", "--seed", "1", "--no-history"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let message: Value = serde_json::from_str(stdout.lines().next().unwrap()).unwrap();
    assert_eq!(message["iterationType"], "ANIMATION_GAME");
    assert_eq!(message["input"]["message"], "Success");
    assert_eq!(message["successInteractions"], 9);
    assert_eq!(message["score"], 100.0);
    assert_eq!(message["response"].as_array().unwrap().len(), 9);
}

#[test]
fn simulate_idle_times_out_and_appends_report_file() {
    let dir = tempdir().unwrap();
    let reports = dir.path().join("reports.jsonl");
    for _ in 0..2 {
        cardspot(dir.path())
            .args(["--simulate", "idle", "--no-history", "--report-file"])
            .arg(&reports)
            .assert()
            .success();
    }

    let written = std::fs::read_to_string(&reports).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines.len(), 2);
    let message: Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(message["input"]["message"], "TimeOut");
    assert_eq!(message["attemptCount"], 4);
}

#[test]
fn list_items_names_embedded_sets() {
    let dir = tempdir().unwrap();
    let output = cardspot(dir.path()).arg("--list-items").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("healthcare: Dentist, Doctor, Nurse"));
    assert!(stdout.contains("animals"));
}

#[test]
fn unknown_item_set_fails() {
    let dir = tempdir().unwrap();
    cardspot(dir.path())
        .args(["--simulate", "perfect", "--no-history", "--items", "planets"])
        .assert()
        .failure();
}

#[test]
fn unknown_item_set_is_never_saved() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.json");
    cardspot(dir.path())
        .args(["--simulate", "perfect", "--no-history", "--items", "planets", "--save-config"])
        .assert()
        .failure();
    assert!(!config.exists());

    cardspot(dir.path())
        .args(["--simulate", "perfect", "--no-history", "--seed", "2"])
        .assert()
        .success();
}

#[test]
fn save_config_persists_overrides() {
    let dir = tempdir().unwrap();
    cardspot(dir.path())
        .args([
            "--simulate",
            "perfect",
            "--no-history",
            "--miss-penalty",
            "25",
            "--save-config",
        ])
        .assert()
        .success();

    let saved: Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("config.json")).unwrap())
            .unwrap();
    assert_eq!(saved["rules"]["miss_penalty"], 25);
}
