mod test_support;

use rusqlite::Connection;
use serde_json::json;
use test_support::{db_path, request_err, request_ok, spawn_sidecar, temp_dir, write_sheet, Cell};

#[test]
fn missing_score_column_rejects_the_whole_batch_before_any_write() {
    let workspace = temp_dir("scorebook-schema-no-score");
    let sheet = workspace.join("broken_export.xlsx");
    write_sheet(
        &sheet,
        &["identifier", "display_name"],
        &[vec![Cell::Num(1001.0), Cell::Text("Li")]],
    );

    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let error = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "import.sheet",
        json!({ "path": sheet.to_string_lossy() }),
        "sheet_schema",
    );
    let missing = error
        .get("details")
        .and_then(|d| d.get("missingColumns"))
        .and_then(|v| v.as_array())
        .expect("missing columns");
    assert_eq!(missing, &[json!("score")]);

    // Zero rows processed: no exam row, no students, no scores.
    let conn = Connection::open(db_path(&workspace)).expect("open db");
    for table in ["exams", "students", "scores"] {
        let count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
            .expect("count");
        assert_eq!(count, 0, "{} should be empty", table);
    }
}

#[test]
fn schema_error_names_every_missing_column() {
    let workspace = temp_dir("scorebook-schema-both-missing");
    let sheet = workspace.join("unrelated.xlsx");
    write_sheet(&sheet, &["comment"], &[vec![Cell::Text("n/a")]]);

    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let error = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "import.sheet",
        json!({ "path": sheet.to_string_lossy(), "requireIdentifier": true }),
        "sheet_schema",
    );
    let missing = error
        .get("details")
        .and_then(|d| d.get("missingColumns"))
        .and_then(|v| v.as_array())
        .expect("missing columns");
    assert_eq!(missing, &[json!("score"), json!("identifier")]);
}

#[test]
fn display_name_is_required_when_identifiers_are_not() {
    let workspace = temp_dir("scorebook-schema-no-name");
    let sheet = workspace.join("nameless.xlsx");
    write_sheet(&sheet, &["score"], &[vec![Cell::Num(50.0)]]);

    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let error = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "import.sheet",
        json!({ "path": sheet.to_string_lossy(), "requireIdentifier": false }),
        "sheet_schema",
    );
    let missing = error
        .get("details")
        .and_then(|d| d.get("missingColumns"))
        .and_then(|v| v.as_array())
        .expect("missing columns");
    assert_eq!(missing, &[json!("display_name")]);
}

#[test]
fn unreadable_sheet_is_a_format_error() {
    let workspace = temp_dir("scorebook-schema-unreadable");
    let sheet = workspace.join("not_a_workbook.xlsx");
    std::fs::write(&sheet, b"this is not a spreadsheet").expect("write junk");

    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "import.sheet",
        json!({ "path": sheet.to_string_lossy() }),
        "sheet_format",
    );
}
