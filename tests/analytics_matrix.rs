mod test_support;

use serde_json::json;
use std::io::BufReader;
use std::process::{ChildStdin, ChildStdout};
use test_support::{request_ok, spawn_sidecar, temp_dir, write_sheet, Cell};

fn import_fixture_exams(
    workspace: &std::path::Path,
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
) {
    // Alphabetical names match import order so the matrix's
    // upload-time/name ordering is deterministic.
    let sheets = [
        ("exam_a.xlsx", 60.0, 95.0),
        ("exam_b.xlsx", 70.0, 92.0),
        ("exam_c.xlsx", 80.0, 98.0),
    ];
    for (i, (file, li, wang)) in sheets.iter().enumerate() {
        let path = workspace.join(file);
        write_sheet(
            &path,
            &["identifier", "display_name", "score"],
            &[
                vec![Cell::Num(1001.0), Cell::Text("Li"), Cell::Num(*li)],
                vec![Cell::Num(1002.0), Cell::Text("Wang"), Cell::Num(*wang)],
            ],
        );
        let _ = request_ok(
            stdin,
            reader,
            &format!("import-{}", i),
            "import.sheet",
            json!({ "path": path.to_string_lossy() }),
        );
    }
}

#[test]
fn matrix_rows_carry_scores_average_trend_and_level() {
    let workspace = temp_dir("scorebook-analytics-matrix");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    import_fixture_exams(&workspace, &mut stdin, &mut reader);

    let matrix = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "analytics.matrix",
        json!({ "exams": ["exam_a", "exam_b", "exam_c"] }),
    );

    let exams = matrix
        .get("exams")
        .and_then(|v| v.as_array())
        .expect("exams");
    let exam_names: Vec<&str> = exams
        .iter()
        .map(|e| e.get("name").and_then(|v| v.as_str()).expect("name"))
        .collect();
    assert_eq!(exam_names, ["exam_a", "exam_b", "exam_c"]);

    let rows = matrix.get("rows").and_then(|v| v.as_array()).expect("rows");
    assert_eq!(rows.len(), 2);

    let li = &rows[0];
    assert_eq!(li.get("name").and_then(|v| v.as_str()), Some("Li"));
    assert_eq!(
        li.get("scores").and_then(|v| v.as_array()).expect("scores"),
        &[json!(60.0), json!(70.0), json!(80.0)]
    );
    assert_eq!(li.get("average").and_then(|v| v.as_f64()), Some(70.0));
    assert_eq!(li.get("trend").and_then(|v| v.as_str()), Some("overall_up"));
    assert_eq!(li.get("level").and_then(|v| v.as_str()), Some("average"));

    let wang = &rows[1];
    assert_eq!(wang.get("name").and_then(|v| v.as_str()), Some("Wang"));
    assert_eq!(wang.get("average").and_then(|v| v.as_f64()), Some(95.0));
    assert_eq!(
        wang.get("trend").and_then(|v| v.as_str()),
        Some("fluctuating")
    );
    assert_eq!(wang.get("level").and_then(|v| v.as_str()), Some("excellent"));
}

#[test]
fn matrix_orders_exams_by_upload_chronology_not_selection_order() {
    let workspace = temp_dir("scorebook-analytics-order");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    import_fixture_exams(&workspace, &mut stdin, &mut reader);

    let matrix = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "analytics.matrix",
        json!({ "exams": ["exam_b", "exam_a"] }),
    );
    let exams = matrix
        .get("exams")
        .and_then(|v| v.as_array())
        .expect("exams");
    let exam_names: Vec<&str> = exams
        .iter()
        .map(|e| e.get("name").and_then(|v| v.as_str()).expect("name"))
        .collect();
    assert_eq!(exam_names, ["exam_a", "exam_b"]);
}

#[test]
fn distributions_count_levels_trends_and_bands() {
    let workspace = temp_dir("scorebook-analytics-dist");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    import_fixture_exams(&workspace, &mut stdin, &mut reader);

    let dist = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "analytics.distributions",
        json!({ "exams": ["exam_a", "exam_b", "exam_c"] }),
    );

    assert_eq!(dist.get("studentCount").and_then(|v| v.as_u64()), Some(2));
    let level_counts = dist.get("levelCounts").expect("levelCounts");
    assert_eq!(level_counts.get("average").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(
        level_counts.get("excellent").and_then(|v| v.as_u64()),
        Some(1)
    );

    let trend_counts = dist.get("trendCounts").expect("trendCounts");
    assert_eq!(
        trend_counts.get("overall_up").and_then(|v| v.as_u64()),
        Some(1)
    );
    assert_eq!(
        trend_counts.get("fluctuating").and_then(|v| v.as_u64()),
        Some(1)
    );

    let bands = dist.get("examBands").and_then(|v| v.as_array()).expect("bands");
    assert_eq!(bands.len(), 3);
    let first = &bands[0];
    assert_eq!(first.get("exam").and_then(|v| v.as_str()), Some("exam_a"));
    // exam_a: Li 60 (pass), Wang 95 (excellent)
    assert_eq!(
        first
            .get("bands")
            .and_then(|b| b.get("pass"))
            .and_then(|v| v.as_u64()),
        Some(1)
    );
    assert_eq!(
        first
            .get("bands")
            .and_then(|b| b.get("excellent"))
            .and_then(|v| v.as_u64()),
        Some(1)
    );
}

#[test]
fn exam_detail_sorts_scores_descending_with_stats() {
    let workspace = temp_dir("scorebook-analytics-detail");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    import_fixture_exams(&workspace, &mut stdin, &mut reader);

    let detail = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "exams.detail",
        json!({ "name": "exam_a" }),
    );
    assert_eq!(detail.get("count").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(detail.get("average").and_then(|v| v.as_f64()), Some(77.5));
    assert_eq!(detail.get("max").and_then(|v| v.as_f64()), Some(95.0));
    assert_eq!(detail.get("min").and_then(|v| v.as_f64()), Some(60.0));

    let rows = detail.get("rows").and_then(|v| v.as_array()).expect("rows");
    assert_eq!(
        rows[0].get("studentName").and_then(|v| v.as_str()),
        Some("Wang")
    );
    assert_eq!(rows[0].get("value").and_then(|v| v.as_f64()), Some(95.0));
    assert_eq!(
        rows[1].get("studentName").and_then(|v| v.as_str()),
        Some("Li")
    );
}

#[test]
fn overview_aggregates_exam_roster_sizes() {
    let workspace = temp_dir("scorebook-analytics-overview");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    import_fixture_exams(&workspace, &mut stdin, &mut reader);

    let overview = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "analytics.overview",
        json!({}),
    );
    assert_eq!(overview.get("examCount").and_then(|v| v.as_u64()), Some(3));
    assert_eq!(
        overview.get("totalStudents").and_then(|v| v.as_u64()),
        Some(6)
    );
    assert_eq!(
        overview.get("averageParticipation").and_then(|v| v.as_f64()),
        Some(2.0)
    );
    assert!(overview
        .get("latestExam")
        .and_then(|v| v.as_str())
        .is_some());
}
