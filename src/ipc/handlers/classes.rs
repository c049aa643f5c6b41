use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let result = (|| -> anyhow::Result<serde_json::Value> {
        let mut classes = Vec::new();
        let mut stmt = conn.prepare(
            "SELECT c.id, c.name, c.created_at, COUNT(s.id)
             FROM classes c
             LEFT JOIN students s ON s.class_id = c.id
             GROUP BY c.id, c.name, c.created_at
             ORDER BY c.name",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            classes.push(json!({
                "id": row.get::<_, String>(0)?,
                "name": row.get::<_, String>(1)?,
                "createdAt": row.get::<_, String>(2)?,
                "studentCount": row.get::<_, i64>(3)?,
            }));
        }
        Ok(json!({ "classes": classes }))
    })();

    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_classes_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let id = db::new_id();
    match conn.execute(
        "INSERT INTO classes(id, name, created_at) VALUES(?, ?, ?)",
        (&id, &name, db::now_ts()),
    ) {
        Ok(_) => ok(&req.id, json!({ "classId": id })),
        Err(e) => err(&req.id, "db_insert_failed", e.to_string(), None),
    }
}

fn handle_classes_rename(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let new_name = match required_str(req, "newName") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match conn.execute(
        "UPDATE classes SET name = ? WHERE id = ?",
        (&new_name, &class_id),
    ) {
        Ok(0) => err(
            &req.id,
            "not_found",
            format!("class {} not found", class_id),
            None,
        ),
        Ok(_) => ok(&req.id, json!({ "classId": class_id, "name": new_name })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

// Members are detached, not deleted.
fn handle_classes_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let result = (|| -> anyhow::Result<usize> {
        let detached = conn.execute(
            "UPDATE students SET class_id = NULL WHERE class_id = ?",
            [&class_id],
        )?;
        let deleted = conn.execute("DELETE FROM classes WHERE id = ?", [&class_id])?;
        anyhow::ensure!(deleted == 1, "class {} not found", class_id);
        Ok(detached)
    })();

    match result {
        Ok(detached) => ok(
            &req.id,
            json!({ "deletedClass": class_id, "detachedStudents": detached }),
        ),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(handle_classes_list(state, req)),
        "classes.create" => Some(handle_classes_create(state, req)),
        "classes.rename" => Some(handle_classes_rename(state, req)),
        "classes.delete" => Some(handle_classes_delete(state, req)),
        _ => None,
    }
}
