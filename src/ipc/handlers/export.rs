use crate::analytics;
use crate::export;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, required_str, required_str_array};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_export_xlsx(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let exam_names = match required_str_array(req, "exams") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let out_path = match required_str(req, "outPath") {
        Ok(v) => PathBuf::from(v),
        Err(resp) => return resp,
    };

    let matrix = match analytics::score_matrix(conn, &exam_names) {
        Ok(m) => m,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    match export::export_matrix_xlsx(&matrix, &out_path) {
        Ok(()) => ok(
            &req.id,
            json!({
                "outPath": out_path.to_string_lossy(),
                "examCount": matrix.exams.len(),
                "rowCount": matrix.rows.len(),
            }),
        ),
        Err(e) => err(&req.id, "export_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "export.xlsx" => Some(handle_export_xlsx(state, req)),
        _ => None,
    }
}
