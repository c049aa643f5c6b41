use crate::analytics;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, required_str_array};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn matrix_exams_json(matrix: &analytics::Matrix) -> Vec<serde_json::Value> {
    matrix
        .exams
        .iter()
        .map(|e| {
            json!({
                "id": e.id,
                "name": e.name,
                "studentCount": e.student_count,
                "uploadedAt": e.uploaded_at,
            })
        })
        .collect()
}

fn handle_matrix(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let exam_names = match required_str_array(req, "exams") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match analytics::score_matrix(conn, &exam_names) {
        Ok(matrix) => ok(
            &req.id,
            json!({
                "exams": matrix_exams_json(&matrix),
                "rows": matrix.rows,
            }),
        ),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_distributions(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let exam_names = match required_str_array(req, "exams") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match analytics::score_matrix(conn, &exam_names) {
        Ok(matrix) => {
            let dist = analytics::distributions(&matrix);
            ok(
                &req.id,
                json!({
                    "exams": matrix_exams_json(&matrix),
                    "studentCount": matrix.rows.len(),
                    "levelCounts": dist.level_counts,
                    "trendCounts": dist.trend_counts,
                    "examBands": dist.exam_bands,
                }),
            )
        }
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_overview(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match analytics::overview(conn) {
        Ok(overview) => ok(&req.id, json!(overview)),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "analytics.matrix" => Some(handle_matrix(state, req)),
        "analytics.distributions" => Some(handle_distributions(state, req)),
        "analytics.overview" => Some(handle_overview(state, req)),
        _ => None,
    }
}
