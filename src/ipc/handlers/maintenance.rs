use crate::ipc::error::{err, ok};
use crate::ipc::helpers::db_conn;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_data_clear(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let result = (|| -> anyhow::Result<(usize, usize, usize)> {
        let scores = conn.execute("DELETE FROM scores", [])?;
        let exams = conn.execute("DELETE FROM exams", [])?;
        let students = conn.execute("DELETE FROM students", [])?;
        Ok((scores, exams, students))
    })();

    match result {
        Ok((scores, exams, students)) => ok(
            &req.id,
            json!({
                "deletedScores": scores,
                "deletedExams": exams,
                "deletedStudents": students,
            }),
        ),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

// Defensive sweep for workspaces that predate foreign key enforcement:
// scores pointing at vanished exams or students, then students left with
// no scores at all.
fn handle_data_cleanup(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let result = (|| -> anyhow::Result<(usize, usize, usize)> {
        let orphan_exam_scores = conn.execute(
            "DELETE FROM scores WHERE exam_id NOT IN (SELECT id FROM exams)",
            [],
        )?;
        let orphan_student_scores = conn.execute(
            "DELETE FROM scores WHERE student_id NOT IN (SELECT id FROM students)",
            [],
        )?;
        let scoreless_students = conn.execute(
            "DELETE FROM students WHERE id NOT IN (SELECT DISTINCT student_id FROM scores)",
            [],
        )?;
        Ok((orphan_exam_scores, orphan_student_scores, scoreless_students))
    })();

    match result {
        Ok((orphan_exam_scores, orphan_student_scores, scoreless_students)) => ok(
            &req.id,
            json!({
                "orphanExamScores": orphan_exam_scores,
                "orphanStudentScores": orphan_student_scores,
                "scorelessStudents": scoreless_students,
            }),
        ),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "data.clear" => Some(handle_data_clear(state, req)),
        "data.cleanup" => Some(handle_data_cleanup(state, req)),
        _ => None,
    }
}
