use crate::import::{self, ImportError, ImportOptions};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{bool_or, db_conn, required_str, required_str_array};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn parse_options(req: &Request) -> Result<ImportOptions, serde_json::Value> {
    let defaults = ImportOptions::default();
    Ok(ImportOptions {
        require_identifier: bool_or(req, "requireIdentifier", defaults.require_identifier)?,
        auto_generate_id: bool_or(req, "autoGenerateId", defaults.auto_generate_id)?,
    })
}

fn import_error_response(req: &Request, e: ImportError) -> serde_json::Value {
    let details = match &e {
        ImportError::Schema(missing) => Some(json!({ "missingColumns": missing })),
        _ => None,
    };
    err(&req.id, e.code(), e.to_string(), details)
}

fn handle_import_sheet(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let path = match required_str(req, "path") {
        Ok(p) => PathBuf::from(p),
        Err(resp) => return resp,
    };
    let opts = match parse_options(req) {
        Ok(o) => o,
        Err(resp) => return resp,
    };

    match import::import_sheet(conn, &path, &opts) {
        Ok(report) => ok(&req.id, json!(report)),
        Err(e) => import_error_response(req, e),
    }
}

fn handle_import_batch(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let paths = match required_str_array(req, "paths") {
        Ok(v) => v.into_iter().map(PathBuf::from).collect::<Vec<_>>(),
        Err(resp) => return resp,
    };
    if paths.is_empty() {
        return err(&req.id, "bad_params", "paths must not be empty", None);
    }
    let opts = match parse_options(req) {
        Ok(o) => o,
        Err(resp) => return resp,
    };
    let skip_existing = match bool_or(req, "skipExisting", true) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let files = import::import_batch(conn, &paths, &opts, skip_existing);
    let imported = files
        .iter()
        .filter(|f| f.status == import::BatchFileStatus::Imported)
        .count();
    let skipped = files
        .iter()
        .filter(|f| f.status == import::BatchFileStatus::Skipped)
        .count();
    let failed = files
        .iter()
        .filter(|f| f.status == import::BatchFileStatus::Failed)
        .count();

    ok(
        &req.id,
        json!({
            "files": files,
            "importedCount": imported,
            "skippedCount": skipped,
            "failedCount": failed,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "import.sheet" => Some(handle_import_sheet(state, req)),
        "import.batch" => Some(handle_import_batch(state, req)),
        _ => None,
    }
}
