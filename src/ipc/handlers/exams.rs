use crate::analytics;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_exams_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let search = optional_str(req, "search");

    let result = (|| -> anyhow::Result<serde_json::Value> {
        let mut exams = Vec::new();
        let sql = "SELECT id, name, source_file, student_count, uploaded_at
                   FROM exams
                   WHERE (?1 IS NULL OR name LIKE '%' || ?1 || '%')
                   ORDER BY uploaded_at DESC, name";
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query([&search])?;
        while let Some(row) = rows.next()? {
            exams.push(json!({
                "id": row.get::<_, String>(0)?,
                "name": row.get::<_, String>(1)?,
                "sourceFile": row.get::<_, String>(2)?,
                "studentCount": row.get::<_, i64>(3)?,
                "uploadedAt": row.get::<_, String>(4)?,
            }));
        }
        Ok(json!({ "examCount": exams.len(), "exams": exams }))
    })();

    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_exams_detail(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match analytics::exam_detail(conn, &name) {
        Ok(Some(detail)) => ok(&req.id, json!(detail)),
        Ok(None) => err(
            &req.id,
            "not_found",
            format!("exam '{}' does not exist", name),
            None,
        ),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_exams_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let source_file = optional_str(req, "sourceFile").unwrap_or_default();
    let student_count = req
        .params
        .get("studentCount")
        .and_then(|v| v.as_i64())
        .unwrap_or(0);

    match db::find_exam_by_name(conn, &name) {
        Ok(Some(_)) => {
            return err(
                &req.id,
                "exam_exists",
                format!("exam '{}' already exists", name),
                None,
            )
        }
        Ok(None) => {}
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    match db::create_exam(conn, &name, &source_file, student_count) {
        Ok(id) => ok(&req.id, json!({ "examId": id })),
        Err(e) => err(&req.id, "db_insert_failed", e.to_string(), None),
    }
}

fn handle_exams_rename(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let exam_id = match required_str(req, "examId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let new_name = match required_str(req, "newName") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match conn.execute(
        "UPDATE exams SET name = ?, uploaded_at = ? WHERE id = ?",
        (&new_name, db::now_ts(), &exam_id),
    ) {
        Ok(0) => err(&req.id, "not_found", format!("exam {} not found", exam_id), None),
        Ok(_) => ok(&req.id, json!({ "examId": exam_id, "name": new_name })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

// Deleting an exam removes its scores but never touches students; they may
// simply have no marks for a while.
fn handle_exams_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let exam = match db::find_exam_by_name(conn, &name) {
        Ok(Some(e)) => e,
        Ok(None) => {
            return err(
                &req.id,
                "not_found",
                format!("exam '{}' does not exist", name),
                None,
            )
        }
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let result = (|| -> anyhow::Result<usize> {
        let scores = conn.execute("DELETE FROM scores WHERE exam_id = ?", [&exam.id])?;
        conn.execute("DELETE FROM exams WHERE id = ?", [&exam.id])?;
        Ok(scores)
    })();

    match result {
        Ok(scores_deleted) => ok(
            &req.id,
            json!({ "deletedExam": name, "deletedScores": scores_deleted }),
        ),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "exams.list" => Some(handle_exams_list(state, req)),
        "exams.detail" => Some(handle_exams_detail(state, req)),
        "exams.create" => Some(handle_exams_create(state, req)),
        "exams.rename" => Some(handle_exams_rename(state, req)),
        "exams.delete" => Some(handle_exams_delete(state, req)),
        _ => None,
    }
}
