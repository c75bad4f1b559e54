//! CLI contract tests
//!
//! Runs the built binary and checks exit codes, output formats and the
//! global flags.

use std::path::Path;
use std::process::{Command, Output};

fn defectrisk(args: &[&str], models: &Path, cwd: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_defectrisk"))
        .args(args)
        .current_dir(cwd)
        .env("DEFECTRISK_MODEL_DIR", models)
        .env_remove("RUST_LOG")
        .output()
        .expect("run defectrisk")
}

#[test]
fn test_predict_text_json() {
    let dir = tempfile::tempdir().unwrap();
    let out = defectrisk(
        &["predict", "--text", "def f(x):\n    return x * 2\n", "--format", "json"],
        dir.path(),
        dir.path(),
    );
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let json: serde_json::Value = serde_json::from_slice(&out.stdout).expect("valid JSON");
    assert_eq!(json["artifact"]["name"], "Pasted Code");
    assert_eq!(json["scoring"]["kind"], "heuristic_only");
    let risk = json["risk_score"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&risk));
}

#[test]
fn test_invalid_input_exits_2() {
    let dir = tempfile::tempdir().unwrap();

    let out = defectrisk(&["predict", "--text", "asdf"], dir.path(), dir.path());
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("too short"));

    let exe = dir.path().join("tool.exe");
    std::fs::write(&exe, b"MZ\x90\x00").unwrap();
    let out = defectrisk(
        &["predict", "--file", exe.to_str().unwrap()],
        dir.path(),
        dir.path(),
    );
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("Unsupported file type: .exe"));
}

#[test]
fn test_missing_file_exits_1() {
    let dir = tempfile::tempdir().unwrap();
    let out = defectrisk(
        &["predict", "--file", "does/not/exist.py"],
        dir.path(),
        dir.path(),
    );
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn test_scan_local_json_with_top() {
    let models = tempfile::tempdir().unwrap();
    let repo = tempfile::tempdir().unwrap();
    for (name, body) in [
        ("small.py", "def f(x):\n    return x + 1\n"),
        (
            "branchy.py",
            "def g(x):\n    if x > 1:\n        return 1\n    elif x < 0:\n        return 2\n    while x:\n        x -= 1\n    return x\n",
        ),
        ("main.go", "package main\n\nfunc main() {\n\tprintln(\"hi\")\n}\n"),
    ] {
        std::fs::write(repo.path().join(name), body).unwrap();
    }

    let out = defectrisk(
        &[
            "scan",
            repo.path().to_str().unwrap(),
            "--top",
            "2",
            "--format",
            "json",
        ],
        models.path(),
        repo.path(),
    );
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let json: serde_json::Value = serde_json::from_slice(&out.stdout).expect("valid JSON");
    assert_eq!(json["scored"], 3);
    assert_eq!(json["files"].as_array().unwrap().len(), 2);
}

#[test]
fn test_scan_missing_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");
    let out = defectrisk(
        &["scan", missing.to_str().unwrap()],
        dir.path(),
        dir.path(),
    );
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn test_model_reports_missing_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let out = defectrisk(&["model"], dir.path(), dir.path());
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("not loaded"));
    assert!(stdout.contains("feature_names.json"));
}

#[test]
fn test_init_writes_config_once() {
    let dir = tempfile::tempdir().unwrap();
    let out = defectrisk(&["init"], dir.path(), dir.path());
    assert!(out.status.success());
    let config = dir.path().join("defectrisk.toml");
    assert!(config.exists());

    std::fs::write(&config, "[scan]\nmax_files = 5\n").unwrap();
    let out = defectrisk(&["init"], dir.path(), dir.path());
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("already exists"));
    assert_eq!(
        std::fs::read_to_string(&config).unwrap(),
        "[scan]\nmax_files = 5\n"
    );
}
