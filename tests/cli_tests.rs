use std::fs;
use std::process::Command;

const MANIFEST: &str = r#"
routes:
  - { method: USE, path: /api, name: api-mw }
  - { method: GET, path: /api/users/list, name: list }
  - { method: GET, path: /api/users/:id, name: user }
  - { method: POST, path: /api/users }
"#;

fn manifest_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("routes.yaml"), MANIFEST).unwrap();
    dir
}

fn triroute(args: &[&str], dir: &std::path::Path) -> (bool, String, String) {
    let exe = env!("CARGO_BIN_EXE_triroute");
    let output = Command::new(exe)
        .current_dir(dir)
        .env("TRIROUTE_LOG_LEVEL", "error")
        .args(args)
        .output()
        .expect("run cli");
    (
        output.status.success(),
        String::from_utf8_lossy(&output.stdout).into_owned(),
        String::from_utf8_lossy(&output.stderr).into_owned(),
    )
}

#[test]
fn test_cli_resolve_prints_chain() {
    let dir = manifest_dir();
    let (ok, stdout, _) = triroute(&["resolve", "routes.yaml", "get", "/api/users/42"], dir.path());
    assert!(ok);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["status"], 200);
    assert_eq!(report["route"], "/api/users/:id");
    assert_eq!(report["handlers"], serde_json::json!(["api-mw", "user"]));
    assert_eq!(report["params"]["id"], "42");
}

#[test]
fn test_cli_resolve_reports_method_not_allowed() {
    let dir = manifest_dir();
    let (ok, stdout, _) = triroute(&["resolve", "routes.yaml", "DELETE", "/api/users/list"], dir.path());
    assert!(ok);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["status"], 405);
    assert_eq!(report["handlers"], serde_json::json!(["api-mw"]));
}

#[test]
fn test_cli_routes_json() {
    let dir = manifest_dir();
    let (ok, stdout, _) = triroute(&["routes", "routes.yaml", "--json"], dir.path());
    assert!(ok);
    let routes: Vec<serde_json::Value> = serde_json::from_str(&stdout).unwrap();
    assert!(routes
        .iter()
        .any(|r| r["method"] == "POST" && r["path"] == "/api/users"));
}

#[test]
fn test_cli_missing_manifest_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (ok, stdout, stderr) = triroute(&["routes", "nope.yaml"], dir.path());
    assert!(!ok);
    assert!(stdout.is_empty());
    assert!(stderr.contains("nope.yaml"));
}
