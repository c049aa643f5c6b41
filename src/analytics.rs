// Analytical views over committed scores: the per-student matrix across a
// set of exams, trend/level classification, distributions, and per-exam
// detail stats. All reads; nothing here mutates the store.

use crate::db::ExamRecord;
use rusqlite::{params_from_iter, types::Value, Connection};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Insufficient,
    Up,
    Down,
    Flat,
    OverallUp,
    OverallDown,
    Fluctuating,
}

impl Trend {
    pub fn as_str(self) -> &'static str {
        match self {
            Trend::Insufficient => "insufficient",
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Flat => "flat",
            Trend::OverallUp => "overall_up",
            Trend::OverallDown => "overall_down",
            Trend::Fluctuating => "fluctuating",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Excellent,
    Good,
    Average,
    Pass,
    Fail,
}

impl Level {
    pub fn from_score(score: f64) -> Level {
        if score >= 90.0 {
            Level::Excellent
        } else if score >= 80.0 {
            Level::Good
        } else if score >= 70.0 {
            Level::Average
        } else if score >= 60.0 {
            Level::Pass
        } else {
            Level::Fail
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Excellent => "excellent",
            Level::Good => "good",
            Level::Average => "average",
            Level::Pass => "pass",
            Level::Fail => "fail",
        }
    }
}

pub fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Trend over a student's scores in exam order. Two data points compare
/// directly; three or more compare first-half vs second-half means with a
/// two-point dead band.
pub fn trend_of(scores: &[f64]) -> Trend {
    if scores.len() < 2 {
        return Trend::Insufficient;
    }
    if scores.len() == 2 {
        return if scores[1] > scores[0] {
            Trend::Up
        } else if scores[1] < scores[0] {
            Trend::Down
        } else {
            Trend::Flat
        };
    }

    let half = scores.len() / 2;
    let first_avg = mean(&scores[..half]);
    let second_avg = mean(&scores[half..]);

    if second_avg > first_avg + 2.0 {
        Trend::OverallUp
    } else if second_avg < first_avg - 2.0 {
        Trend::OverallDown
    } else {
        Trend::Fluctuating
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixRow {
    pub student_no: String,
    pub name: String,
    /// One slot per exam, in the matrix's exam order.
    pub scores: Vec<Option<f64>>,
    pub average: f64,
    pub trend: Trend,
    pub level: Level,
}

pub struct Matrix {
    pub exams: Vec<ExamRecord>,
    pub rows: Vec<MatrixRow>,
}

/// Pivot scores for the selected exams into one row per student. Exams are
/// ordered by upload time so trends read chronologically regardless of
/// selection order; unknown exam names are simply absent from the result.
pub fn score_matrix(conn: &Connection, exam_names: &[String]) -> anyhow::Result<Matrix> {
    if exam_names.is_empty() {
        return Ok(Matrix {
            exams: Vec::new(),
            rows: Vec::new(),
        });
    }

    let placeholders = vec!["?"; exam_names.len()].join(",");
    let sql = format!(
        "SELECT id, name, source_file, student_count, uploaded_at
         FROM exams WHERE name IN ({}) ORDER BY uploaded_at, name",
        placeholders
    );
    let mut stmt = conn.prepare(&sql)?;
    let exams = stmt
        .query_map(
            params_from_iter(exam_names.iter().map(|n| Value::from(n.clone()))),
            |row| {
                Ok(ExamRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    source_file: row.get(2)?,
                    student_count: row.get(3)?,
                    uploaded_at: row.get(4)?,
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;

    if exams.is_empty() {
        return Ok(Matrix {
            exams,
            rows: Vec::new(),
        });
    }

    let exam_slot: HashMap<&str, usize> = exams
        .iter()
        .enumerate()
        .map(|(i, e)| (e.id.as_str(), i))
        .collect();

    let placeholders = vec!["?"; exams.len()].join(",");
    let sql = format!(
        "SELECT s.student_no, s.name, sc.exam_id, sc.value
         FROM scores sc
         JOIN students s ON sc.student_id = s.id
         WHERE sc.exam_id IN ({})",
        placeholders
    );
    let mut stmt = conn.prepare(&sql)?;
    let score_rows = stmt
        .query_map(
            params_from_iter(exams.iter().map(|e| Value::from(e.id.clone()))),
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, f64>(3)?,
                ))
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;

    let mut per_student: HashMap<String, (String, Vec<Option<f64>>)> = HashMap::new();
    for (student_no, name, exam_id, value) in score_rows {
        let slot = exam_slot[exam_id.as_str()];
        let entry = per_student
            .entry(student_no)
            .or_insert_with(|| (name.clone(), vec![None; exams.len()]));
        entry.1[slot] = Some(round1(value));
    }

    let mut rows: Vec<MatrixRow> = per_student
        .into_iter()
        .map(|(student_no, (name, scores))| {
            let present: Vec<f64> = scores.iter().filter_map(|s| *s).collect();
            let average = round1(mean(&present));
            MatrixRow {
                student_no,
                name,
                trend: trend_of(&present),
                level: Level::from_score(average),
                average,
                scores,
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then_with(|| a.student_no.cmp(&b.student_no))
    });

    Ok(Matrix { exams, rows })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamBandCounts {
    pub exam: String,
    pub bands: BTreeMap<&'static str, usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Distributions {
    pub level_counts: BTreeMap<&'static str, usize>,
    pub trend_counts: BTreeMap<&'static str, usize>,
    pub exam_bands: Vec<ExamBandCounts>,
}

/// Level distribution over row averages, trend distribution, and per-exam
/// score band counts, all derived from an already-built matrix.
pub fn distributions(matrix: &Matrix) -> Distributions {
    let mut level_counts = BTreeMap::new();
    let mut trend_counts = BTreeMap::new();
    for row in &matrix.rows {
        *level_counts.entry(row.level.as_str()).or_insert(0) += 1;
        *trend_counts.entry(row.trend.as_str()).or_insert(0) += 1;
    }

    let exam_bands = matrix
        .exams
        .iter()
        .enumerate()
        .map(|(slot, exam)| {
            let mut bands = BTreeMap::new();
            for row in &matrix.rows {
                if let Some(value) = row.scores[slot] {
                    *bands.entry(Level::from_score(value).as_str()).or_insert(0) += 1;
                }
            }
            ExamBandCounts {
                exam: exam.name.clone(),
                bands,
            }
        })
        .collect();

    Distributions {
        level_counts,
        trend_counts,
        exam_bands,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub exam_count: usize,
    pub total_students: i64,
    pub average_participation: f64,
    pub latest_exam: Option<String>,
}

pub fn overview(conn: &Connection) -> anyhow::Result<Overview> {
    let mut stmt = conn.prepare(
        "SELECT name, student_count FROM exams ORDER BY uploaded_at DESC, name",
    )?;
    let exams = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let total_students: i64 = exams.iter().map(|(_, c)| c).sum();
    let average_participation = if exams.is_empty() {
        0.0
    } else {
        round1(total_students as f64 / exams.len() as f64)
    };

    Ok(Overview {
        exam_count: exams.len(),
        total_students,
        average_participation,
        latest_exam: exams.first().map(|(name, _)| name.clone()),
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamScoreRow {
    pub student_no: String,
    pub student_name: String,
    pub value: f64,
    pub recorded_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamDetail {
    pub exam: String,
    pub source_file: String,
    pub uploaded_at: String,
    pub rows: Vec<ExamScoreRow>,
    pub average: f64,
    pub max: f64,
    pub min: f64,
    pub count: usize,
}

pub fn exam_detail(conn: &Connection, name: &str) -> anyhow::Result<Option<ExamDetail>> {
    let Some(exam) = crate::db::find_exam_by_name(conn, name)? else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT s.student_no, s.name, sc.value, sc.recorded_at
         FROM scores sc
         JOIN students s ON sc.student_id = s.id
         WHERE sc.exam_id = ?
         ORDER BY sc.value DESC, s.name",
    )?;
    let rows = stmt
        .query_map([&exam.id], |row| {
            Ok(ExamScoreRow {
                student_no: row.get(0)?,
                student_name: row.get(1)?,
                value: row.get(2)?,
                recorded_at: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let values: Vec<f64> = rows.iter().map(|r| r.value).collect();
    let average = round1(mean(&values));
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);

    Ok(Some(ExamDetail {
        exam: exam.name,
        source_file: exam.source_file,
        uploaded_at: exam.uploaded_at,
        count: rows.len(),
        average,
        max: if values.is_empty() { 0.0 } else { max },
        min: if values.is_empty() { 0.0 } else { min },
        rows,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trend_needs_two_scores() {
        assert_eq!(trend_of(&[]), Trend::Insufficient);
        assert_eq!(trend_of(&[85.0]), Trend::Insufficient);
    }

    #[test]
    fn trend_two_scores_compares_directly() {
        assert_eq!(trend_of(&[70.0, 80.0]), Trend::Up);
        assert_eq!(trend_of(&[80.0, 70.0]), Trend::Down);
        assert_eq!(trend_of(&[75.0, 75.0]), Trend::Flat);
    }

    #[test]
    fn trend_halves_use_two_point_dead_band() {
        // halves: [60] vs mean(70, 80) = 75
        assert_eq!(trend_of(&[60.0, 70.0, 80.0]), Trend::OverallUp);
        assert_eq!(trend_of(&[80.0, 70.0, 60.0]), Trend::OverallDown);
        // halves: [70] vs mean(71, 69) = 70 -> inside the band
        assert_eq!(trend_of(&[70.0, 71.0, 69.0]), Trend::Fluctuating);
    }

    #[test]
    fn level_boundaries() {
        assert_eq!(Level::from_score(90.0), Level::Excellent);
        assert_eq!(Level::from_score(89.9), Level::Good);
        assert_eq!(Level::from_score(80.0), Level::Good);
        assert_eq!(Level::from_score(70.0), Level::Average);
        assert_eq!(Level::from_score(60.0), Level::Pass);
        assert_eq!(Level::from_score(59.9), Level::Fail);
    }

    #[test]
    fn round1_keeps_one_decimal() {
        assert_eq!(round1(85.25), 85.3);
        assert_eq!(round1(85.0), 85.0);
    }
}
