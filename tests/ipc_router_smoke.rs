mod test_support;

use serde_json::json;
use test_support::{request_err, request_ok, spawn_sidecar, temp_dir};

#[test]
fn unknown_methods_answer_not_implemented() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "no.such.method",
        json!({}),
        "not_implemented",
    );
}

#[test]
fn health_works_before_a_workspace_is_selected() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health.get("version").and_then(|v| v.as_str()).is_some());
    assert!(health
        .get("workspacePath")
        .map(|v| v.is_null())
        .unwrap_or(false));
}

#[test]
fn data_methods_require_a_workspace() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    for (i, method) in ["import.sheet", "exams.list", "analytics.overview"]
        .iter()
        .enumerate()
    {
        let _ = request_err(
            &mut stdin,
            &mut reader,
            &format!("{}", i),
            method,
            json!({ "path": "/tmp/nowhere.xlsx" }),
            "no_workspace",
        );
    }
}

#[test]
fn workspace_select_requires_a_path() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({}),
        "bad_params",
    );
}

#[test]
fn workspace_reports_after_selection() {
    let workspace = temp_dir("scorebook-smoke-workspace");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let selected = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(
        selected.get("workspacePath").and_then(|v| v.as_str()),
        Some(workspace.to_string_lossy().as_ref())
    );
    let health = request_ok(&mut stdin, &mut reader, "2", "health", json!({}));
    assert_eq!(
        health.get("workspacePath").and_then(|v| v.as_str()),
        Some(workspace.to_string_lossy().as_ref())
    );
}
