// Styled xlsx export of the analytics matrix. Presentation snapshot for
// sharing, not a round-trip format.

use crate::analytics::{Level, Matrix};
use rust_xlsxwriter::{Color, Format, Workbook};
use std::path::Path;

const HEADER_FILL: Color = Color::RGB(0x366092);

fn level_fill(level: Level) -> Color {
    match level {
        Level::Excellent => Color::RGB(0x2E8B57),
        Level::Good => Color::RGB(0x4169E1),
        Level::Average => Color::RGB(0xFF8C00),
        Level::Pass => Color::RGB(0xFFD700),
        Level::Fail => Color::RGB(0xDC143C),
    }
}

pub fn export_matrix_xlsx(matrix: &Matrix, out_path: &Path) -> anyhow::Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("score analysis")?;

    let header = Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(HEADER_FILL);

    let mut col: u16 = 0;
    for label in ["student_no", "display_name"] {
        sheet.write_string_with_format(0, col, label, &header)?;
        col += 1;
    }
    for exam in &matrix.exams {
        sheet.write_string_with_format(0, col, &exam.name, &header)?;
        col += 1;
    }
    for label in ["average", "trend", "level"] {
        sheet.write_string_with_format(0, col, label, &header)?;
        col += 1;
    }

    for (r, row) in matrix.rows.iter().enumerate() {
        let fill = Format::new().set_background_color(level_fill(row.level));
        let r = (r + 1) as u32;

        sheet.write_string_with_format(r, 0, &row.student_no, &fill)?;
        sheet.write_string_with_format(r, 1, &row.name, &fill)?;

        let mut col: u16 = 2;
        for value in &row.scores {
            match value {
                Some(v) => sheet.write_number_with_format(r, col, *v, &fill)?,
                None => sheet.write_string_with_format(r, col, "", &fill)?,
            };
            col += 1;
        }

        sheet.write_number_with_format(r, col, row.average, &fill)?;
        sheet.write_string_with_format(r, col + 1, row.trend.as_str(), &fill)?;
        sheet.write_string_with_format(r, col + 2, row.level.as_str(), &fill)?;
    }

    workbook.save(out_path)?;
    Ok(())
}
