use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use uuid::Uuid;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("scorebook.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            student_no TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            class_id TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;

    // Workspaces created before roster grouping landed have no class_id.
    ensure_students_class_id(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS exams(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            source_file TEXT NOT NULL,
            student_count INTEGER NOT NULL DEFAULT 0,
            uploaded_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS scores(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            exam_id TEXT NOT NULL,
            value REAL NOT NULL,
            recorded_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(exam_id) REFERENCES exams(id),
            UNIQUE(student_id, exam_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_scores_student ON scores(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_scores_exam ON scores(exam_id)",
        [],
    )?;

    Ok(conn)
}

fn ensure_students_class_id(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "students", "class_id")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE students ADD COLUMN class_id TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn now_ts() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone)]
pub struct ExamRecord {
    pub id: String,
    pub name: String,
    pub source_file: String,
    pub student_count: i64,
    pub uploaded_at: String,
}

pub fn find_exam_by_name(conn: &Connection, name: &str) -> anyhow::Result<Option<ExamRecord>> {
    let rec = conn
        .query_row(
            "SELECT id, name, source_file, student_count, uploaded_at
             FROM exams WHERE name = ?",
            [name],
            |row| {
                Ok(ExamRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    source_file: row.get(2)?,
                    student_count: row.get(3)?,
                    uploaded_at: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(rec)
}

pub fn create_exam(
    conn: &Connection,
    name: &str,
    source_file: &str,
    student_count: i64,
) -> anyhow::Result<String> {
    let id = new_id();
    conn.execute(
        "INSERT INTO exams(id, name, source_file, student_count, uploaded_at)
         VALUES(?, ?, ?, ?, ?)",
        (&id, name, source_file, student_count, now_ts()),
    )?;
    Ok(id)
}

pub fn update_exam(
    conn: &Connection,
    exam_id: &str,
    source_file: &str,
    student_count: i64,
) -> anyhow::Result<()> {
    let n = conn.execute(
        "UPDATE exams SET source_file = ?, student_count = ?, uploaded_at = ? WHERE id = ?",
        (source_file, student_count, now_ts(), exam_id),
    )?;
    anyhow::ensure!(n == 1, "exam {} not found", exam_id);
    Ok(())
}

pub fn find_student_by_no(conn: &Connection, student_no: &str) -> anyhow::Result<Option<String>> {
    let id = conn
        .query_row(
            "SELECT id FROM students WHERE student_no = ?",
            [student_no],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(id)
}

pub fn create_student(conn: &Connection, student_no: &str, name: &str) -> anyhow::Result<String> {
    let id = new_id();
    conn.execute(
        "INSERT INTO students(id, student_no, name, class_id, created_at)
         VALUES(?, ?, ?, NULL, ?)",
        (&id, student_no, name, now_ts()),
    )?;
    Ok(id)
}

pub fn upsert_score(
    conn: &Connection,
    student_id: &str,
    exam_id: &str,
    value: f64,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO scores(id, student_id, exam_id, value, recorded_at)
         VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(student_id, exam_id) DO UPDATE SET
           value = excluded.value,
           recorded_at = excluded.recorded_at",
        (new_id(), student_id, exam_id, value, now_ts()),
    )?;
    Ok(())
}
