use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let result = (|| -> anyhow::Result<serde_json::Value> {
        let mut students = Vec::new();
        let mut stmt = conn.prepare(
            "SELECT s.id, s.student_no, s.name, s.class_id, c.name, s.created_at
             FROM students s
             LEFT JOIN classes c ON s.class_id = c.id
             ORDER BY s.created_at DESC, s.student_no",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            students.push(json!({
                "id": row.get::<_, String>(0)?,
                "studentNo": row.get::<_, String>(1)?,
                "name": row.get::<_, String>(2)?,
                "classId": row.get::<_, Option<String>>(3)?,
                "className": row.get::<_, Option<String>>(4)?,
                "createdAt": row.get::<_, String>(5)?,
            }));
        }
        Ok(json!({ "studentCount": students.len(), "students": students }))
    })();

    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let student_no = match required_str(req, "studentNo") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let class_id = optional_str(req, "classId");

    let id = db::new_id();
    match conn.execute(
        "INSERT INTO students(id, student_no, name, class_id, created_at)
         VALUES(?, ?, ?, ?, ?)",
        (&id, &student_no, &name, &class_id, db::now_ts()),
    ) {
        Ok(_) => ok(&req.id, json!({ "studentId": id })),
        Err(e) => err(&req.id, "db_insert_failed", e.to_string(), None),
    }
}

fn handle_students_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let student_no = match required_str(req, "studentNo") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let class_id = optional_str(req, "classId");

    match conn.execute(
        "UPDATE students SET student_no = ?, name = ?, class_id = ? WHERE id = ?",
        (&student_no, &name, &class_id, &student_id),
    ) {
        Ok(0) => err(
            &req.id,
            "not_found",
            format!("student {} not found", student_id),
            None,
        ),
        Ok(_) => ok(&req.id, json!({ "studentId": student_id })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let result = (|| -> anyhow::Result<(usize, usize)> {
        let scores = conn.execute("DELETE FROM scores WHERE student_id = ?", [&student_id])?;
        let students = conn.execute("DELETE FROM students WHERE id = ?", [&student_id])?;
        Ok((scores, students))
    })();

    match result {
        Ok((_, 0)) => err(
            &req.id,
            "not_found",
            format!("student {} not found", student_id),
            None,
        ),
        Ok((scores, _)) => ok(
            &req.id,
            json!({ "deletedStudent": student_id, "deletedScores": scores }),
        ),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.update" => Some(handle_students_update(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        _ => None,
    }
}
