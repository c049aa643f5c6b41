use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, optional_str, required_f64, required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::{params_from_iter, types::Value};
use serde_json::json;

fn handle_scores_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let student_id = optional_str(req, "studentId");
    let exam_id = optional_str(req, "examId");
    let class_id = optional_str(req, "classId");

    let result = (|| -> anyhow::Result<serde_json::Value> {
        let mut sql = String::from(
            "SELECT sc.id, s.id, s.student_no, s.name, e.id, e.name, sc.value, sc.recorded_at, s.class_id
             FROM scores sc
             JOIN students s ON sc.student_id = s.id
             JOIN exams e ON sc.exam_id = e.id",
        );
        let mut conditions = Vec::new();
        let mut params: Vec<Value> = Vec::new();
        if let Some(v) = student_id {
            conditions.push("s.id = ?");
            params.push(Value::from(v));
        }
        if let Some(v) = exam_id {
            conditions.push("e.id = ?");
            params.push(Value::from(v));
        }
        if let Some(v) = class_id {
            conditions.push("s.class_id = ?");
            params.push(Value::from(v));
        }
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY sc.recorded_at DESC");

        let mut scores = Vec::new();
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(params))?;
        while let Some(row) = rows.next()? {
            scores.push(json!({
                "scoreId": row.get::<_, String>(0)?,
                "studentId": row.get::<_, String>(1)?,
                "studentNo": row.get::<_, String>(2)?,
                "studentName": row.get::<_, String>(3)?,
                "examId": row.get::<_, String>(4)?,
                "examName": row.get::<_, String>(5)?,
                "value": row.get::<_, f64>(6)?,
                "recordedAt": row.get::<_, String>(7)?,
                "classId": row.get::<_, Option<String>>(8)?,
            }));
        }
        Ok(json!({ "scoreCount": scores.len(), "scores": scores }))
    })();

    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_scores_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let exam_id = match required_str(req, "examId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let value = match required_f64(req, "value") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match db::upsert_score(conn, &student_id, &exam_id, value) {
        Ok(()) => ok(
            &req.id,
            json!({ "studentId": student_id, "examId": exam_id, "value": value }),
        ),
        Err(e) => err(&req.id, "db_write_failed", e.to_string(), None),
    }
}

// Accepts either a score id or the (student, exam) pair.
fn handle_scores_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    if let Some(score_id) = optional_str(req, "scoreId") {
        return match conn.execute("DELETE FROM scores WHERE id = ?", [&score_id]) {
            Ok(0) => err(
                &req.id,
                "not_found",
                format!("score {} not found", score_id),
                None,
            ),
            Ok(n) => ok(&req.id, json!({ "deleted": n })),
            Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
        };
    }

    let (Some(student_id), Some(exam_id)) =
        (optional_str(req, "studentId"), optional_str(req, "examId"))
    else {
        return err(
            &req.id,
            "bad_params",
            "provide scoreId or studentId and examId",
            None,
        );
    };

    match conn.execute(
        "DELETE FROM scores WHERE student_id = ? AND exam_id = ?",
        [&student_id, &exam_id],
    ) {
        Ok(0) => err(&req.id, "not_found", "no matching score", None),
        Ok(n) => ok(&req.id, json!({ "deleted": n })),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "scores.list" => Some(handle_scores_list(state, req)),
        "scores.upsert" => Some(handle_scores_upsert(state, req)),
        "scores.delete" => Some(handle_scores_delete(state, req)),
        _ => None,
    }
}
