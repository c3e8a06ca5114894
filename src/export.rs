use std::io::Write;

use serde::Serialize;

use crate::grades::{self, GradeSheetRow};

#[derive(Serialize)]
struct ExportRow<'a> {
    student: &'a str,
    corte_1: String,
    corte_2: String,
    corte_3: String,
    final_grade: String,
}

/// Grade sheet as CSV, grades shown with one decimal.
pub fn write_grade_sheet<W: Write>(writer: W, rows: &[GradeSheetRow]) -> anyhow::Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(ExportRow {
            student: &row.student_name,
            corte_1: grades::display_grade(row.cortes[0]),
            corte_2: grades::display_grade(row.cortes[1]),
            corte_3: grades::display_grade(row.cortes[2]),
            final_grade: grades::display_grade(row.final_grade),
        })?;
    }
    if rows.is_empty() {
        csv_writer.write_record(["student", "corte_1", "corte_2", "corte_3", "final_grade"])?;
    }
    csv_writer.flush()?;
    Ok(())
}
