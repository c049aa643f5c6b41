// Score sheet import: reconcile uploaded rows against the persisted
// student/exam roster and commit scores idempotently. Batch-fatal failures
// (unreadable sheet, bad header, exam registration) abort the whole import;
// everything row-level folds into the report counters instead.

use crate::db;
use crate::sheet::{SheetTable, COL_DISPLAY_NAME, COL_IDENTIFIER, COL_SCORE};
use log::{info, warn};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("cannot read sheet: {0}")]
    Format(String),

    #[error("sheet is missing required columns: {}", .0.join(", "))]
    Schema(Vec<String>),

    #[error("exam registration failed: {0}")]
    Persistence(anyhow::Error),
}

impl ImportError {
    pub fn code(&self) -> &'static str {
        match self {
            ImportError::Format(_) => "sheet_format",
            ImportError::Schema(_) => "sheet_schema",
            ImportError::Persistence(_) => "store_rejected",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ImportOptions {
    pub require_identifier: bool,
    pub auto_generate_id: bool,
}

impl Default for ImportOptions {
    fn default() -> ImportOptions {
        ImportOptions {
            require_identifier: true,
            auto_generate_id: false,
        }
    }
}

/// How rows are keyed to students, fixed once per batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityMode {
    /// Business key is the sheet's identifier column.
    ExplicitIdentifier,
    /// Business key is a sequential token derived from row position.
    AutoGenerated,
    /// The display name doubles as the business key.
    NameAsIdentifier,
}

impl IdentityMode {
    pub fn from_options(opts: &ImportOptions) -> IdentityMode {
        if opts.require_identifier {
            IdentityMode::ExplicitIdentifier
        } else if opts.auto_generate_id {
            IdentityMode::AutoGenerated
        } else {
            IdentityMode::NameAsIdentifier
        }
    }

    fn required_columns(self) -> [&'static str; 2] {
        match self {
            IdentityMode::ExplicitIdentifier => [COL_SCORE, COL_IDENTIFIER],
            IdentityMode::AutoGenerated | IdentityMode::NameAsIdentifier => {
                [COL_SCORE, COL_DISPLAY_NAME]
            }
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub overall_success: bool,
    pub success_count: usize,
    pub error_count: usize,
    pub existing_student_count: usize,
    pub new_student_count: usize,
    pub message: String,
}

pub fn validate_columns(table: &SheetTable, mode: IdentityMode) -> Result<(), ImportError> {
    let missing: Vec<String> = mode
        .required_columns()
        .iter()
        .filter(|c| !table.has_column(c))
        .map(|c| c.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ImportError::Schema(missing))
    }
}

/// Resolve the sheet's exam identity: one exam row per name, metadata
/// overwritten in place on re-import.
pub fn register_exam(conn: &Connection, table: &SheetTable) -> anyhow::Result<String> {
    let row_count = table.row_count() as i64;
    match db::find_exam_by_name(conn, &table.exam_name)? {
        Some(exam) => {
            db::update_exam(conn, &exam.id, &table.source_name, row_count)?;
            info!(
                "exam '{}' already registered ({}), updating metadata",
                table.exam_name, exam.id
            );
            Ok(exam.id)
        }
        None => {
            let id = db::create_exam(conn, &table.exam_name, &table.source_name, row_count)?;
            info!("registered new exam '{}' ({})", table.exam_name, id);
            Ok(id)
        }
    }
}

#[derive(Debug, Clone)]
struct RowIdentity {
    key: String,
    name: String,
}

// Blank cells in the key/name positions coerce to the literal "nan",
// matching what the legacy importer stored for them. Blank-identifier rows
// therefore share one student; the resolver warns when that happens.
fn row_identity(table: &SheetTable, row: usize, mode: IdentityMode) -> RowIdentity {
    match mode {
        IdentityMode::ExplicitIdentifier => {
            let key = match table.text(row, COL_IDENTIFIER) {
                Some(v) => v,
                None => {
                    warn!("row {}: blank identifier, keying as \"nan\"", row + 1);
                    "nan".to_string()
                }
            };
            let name = if table.has_column(COL_DISPLAY_NAME) {
                table.text(row, COL_DISPLAY_NAME).unwrap_or_else(|| "nan".to_string())
            } else {
                format!("学生{}", key)
            };
            RowIdentity { key, name }
        }
        IdentityMode::AutoGenerated => {
            let key = format!("ST{:03}", row + 1);
            let name = table
                .text(row, COL_DISPLAY_NAME)
                .unwrap_or_else(|| "nan".to_string());
            RowIdentity { key, name }
        }
        IdentityMode::NameAsIdentifier => {
            let name = table
                .text(row, COL_DISPLAY_NAME)
                .unwrap_or_else(|| "nan".to_string());
            RowIdentity {
                key: name.clone(),
                name,
            }
        }
    }
}

struct ResolvedStudents {
    identities: Vec<RowIdentity>,
    /// business key -> student id, for every key that resolved.
    map: HashMap<String, String>,
    existing_count: usize,
    new_count: usize,
}

/// Walk every row once, building the batch-scoped identity map. Each
/// distinct business key costs at most one lookup/create; a key that fails
/// to create stays out of the map and its rows surface as commit errors.
fn resolve_students(conn: &Connection, table: &SheetTable, mode: IdentityMode) -> ResolvedStudents {
    let mut resolved = ResolvedStudents {
        identities: Vec::with_capacity(table.row_count()),
        map: HashMap::new(),
        existing_count: 0,
        new_count: 0,
    };

    for row in 0..table.row_count() {
        let identity = row_identity(table, row, mode);

        if !resolved.map.contains_key(&identity.key) {
            match db::find_student_by_no(conn, &identity.key) {
                Ok(Some(student_id)) => {
                    info!(
                        "student exists: {} (no: {}) -> {}",
                        identity.name, identity.key, student_id
                    );
                    resolved.map.insert(identity.key.clone(), student_id);
                    resolved.existing_count += 1;
                }
                Ok(None) => match db::create_student(conn, &identity.key, &identity.name) {
                    Ok(student_id) => {
                        info!(
                            "new student: {} (no: {}) -> {}",
                            identity.name, identity.key, student_id
                        );
                        resolved.map.insert(identity.key.clone(), student_id);
                        resolved.new_count += 1;
                    }
                    Err(e) => {
                        warn!(
                            "row {}: failed to create student (no: {}, name: {}): {}",
                            row + 1,
                            identity.key,
                            identity.name,
                            e
                        );
                    }
                },
                Err(e) => {
                    warn!(
                        "row {}: student lookup failed (no: {}): {}",
                        row + 1,
                        identity.key,
                        e
                    );
                }
            }
        }

        resolved.identities.push(identity);
    }

    resolved
}

struct CommitTally {
    success_count: usize,
    error_count: usize,
}

/// Commit one score per row. Rows without a resolved identity, without a
/// numeric score, or rejected by the store count as errors without
/// interrupting the rest of the batch.
fn commit_scores(
    conn: &Connection,
    table: &SheetTable,
    resolved: &ResolvedStudents,
    exam_id: &str,
) -> CommitTally {
    let mut tally = CommitTally {
        success_count: 0,
        error_count: 0,
    };

    for (row, identity) in resolved.identities.iter().enumerate() {
        let Some(student_id) = resolved.map.get(&identity.key) else {
            warn!(
                "row {}: no resolved student for key {}, skipping score",
                row + 1,
                identity.key
            );
            tally.error_count += 1;
            continue;
        };

        let Some(value) = table.number(row, COL_SCORE) else {
            warn!("row {}: score missing or not numeric", row + 1);
            tally.error_count += 1;
            continue;
        };

        match db::upsert_score(conn, student_id, exam_id, value) {
            Ok(()) => {
                tally.success_count += 1;
            }
            Err(e) => {
                warn!("row {}: score write rejected: {}", row + 1, e);
                tally.error_count += 1;
            }
        }
    }

    tally
}

pub fn import_sheet(
    conn: &Connection,
    path: &Path,
    opts: &ImportOptions,
) -> Result<ImportReport, ImportError> {
    info!("importing score sheet {}", path.display());

    let table = SheetTable::open(path).map_err(ImportError::Format)?;
    let mode = IdentityMode::from_options(opts);
    validate_columns(&table, mode)?;

    let exam_id = register_exam(conn, &table).map_err(ImportError::Persistence)?;

    let resolved = resolve_students(conn, &table, mode);
    info!(
        "resolved {} students ({} existing, {} new)",
        resolved.map.len(),
        resolved.existing_count,
        resolved.new_count
    );

    let tally = commit_scores(conn, &table, &resolved, &exam_id);

    let message = if tally.error_count == 0 {
        format!(
            "imported {} scores ({} existing students, {} new)",
            tally.success_count, resolved.existing_count, resolved.new_count
        )
    } else if tally.success_count > 0 {
        format!(
            "partial import: {} succeeded, {} failed ({} existing students, {} new)",
            tally.success_count,
            tally.error_count,
            resolved.existing_count,
            resolved.new_count
        )
    } else {
        format!(
            "import failed: all {} rows failed ({} existing students, {} new)",
            tally.error_count, resolved.existing_count, resolved.new_count
        )
    };

    Ok(ImportReport {
        overall_success: tally.error_count == 0,
        success_count: tally.success_count,
        error_count: tally.error_count,
        existing_student_count: resolved.existing_count,
        new_student_count: resolved.new_count,
        message,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchFileStatus {
    Imported,
    Skipped,
    Failed,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFileReport {
    pub file: String,
    pub status: BatchFileStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ImportReport>,
}

/// Multi-sheet upload: each file imports independently; with
/// `skip_existing`, sheets whose exam name is already registered are
/// skipped up front instead of overwriting it.
pub fn import_batch(
    conn: &Connection,
    paths: &[PathBuf],
    opts: &ImportOptions,
    skip_existing: bool,
) -> Vec<BatchFileReport> {
    let mut out = Vec::with_capacity(paths.len());

    for path in paths {
        let file = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_string();

        if skip_existing {
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
            // A failed precheck falls through to the import attempt.
            if let Ok(Some(exam)) = db::find_exam_by_name(conn, stem) {
                info!("skipping {}: exam '{}' already exists", file, exam.name);
                out.push(BatchFileReport {
                    file,
                    status: BatchFileStatus::Skipped,
                    message: format!("exam '{}' already exists", exam.name),
                    report: None,
                });
                continue;
            }
        }

        match import_sheet(conn, path, opts) {
            Ok(report) => {
                let status = if report.overall_success {
                    BatchFileStatus::Imported
                } else {
                    BatchFileStatus::Failed
                };
                out.push(BatchFileReport {
                    file,
                    status,
                    message: report.message.clone(),
                    report: Some(report),
                });
            }
            Err(e) => {
                warn!("{}: {}", file, e);
                out.push(BatchFileReport {
                    file,
                    status: BatchFileStatus::Failed,
                    message: e.to_string(),
                    report: None,
                });
            }
        }
    }

    out
}
