use std::fmt::Write;

use chrono::NaiveDate;

use crate::alerts;
use crate::attendance;
use crate::calendar::AcademicCalendar;
use crate::events;
use crate::grades;
use crate::models::{Course, Dataset};
use crate::risk;

pub fn build_report(
    dataset: &Dataset,
    calendar: &AcademicCalendar,
    course: &Course,
    today: NaiveDate,
) -> String {
    let sheet = grades::grade_sheet(course, dataset);
    let risks = risk::assess_course(dataset, course);
    let course_alerts = alerts::course_alerts(dataset, course);
    let upcoming = events::upcoming_institutional(calendar, today, 5);

    let mut output = String::new();

    let _ = writeln!(output, "# {} · {}", course.code, course.name);
    let corte_label = calendar
        .corte_for(today)
        .map(|corte| corte.to_string())
        .unwrap_or_else(|| "outside the corte periods".to_string());
    let _ = writeln!(
        output,
        "Semester {} as of {} ({})",
        calendar.semester, today, corte_label
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Grades");

    if sheet.is_empty() {
        let _ = writeln!(output, "No students enrolled.");
    } else {
        let _ = writeln!(output, "| Student | Corte 1 | Corte 2 | Corte 3 | Final | Attendance |");
        let _ = writeln!(output, "|---|---|---|---|---|---|");
        for row in &sheet {
            let records =
                attendance::records_for(&dataset.attendance, row.student_id, Some(course.id));
            let summary = attendance::summarize(records);
            let attendance_label = if summary.has_data() {
                format!("{}%", summary.percentage)
            } else {
                "no data".to_string()
            };
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | {} | {} |",
                row.student_name,
                grades::display_grade(row.cortes[0]),
                grades::display_grade(row.cortes[1]),
                grades::display_grade(row.cortes[2]),
                grades::display_grade(row.final_grade),
                attendance_label
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk");

    if risks.is_empty() {
        let _ = writeln!(output, "No students to score.");
    } else {
        for record in &risks {
            let name = dataset
                .student(record.student_id)
                .map(|student| student.full_name.as_str())
                .unwrap_or("unknown student");
            let _ = writeln!(
                output,
                "- {} {} score {:.1} (attendance {:.0}, grades {:.0})",
                name,
                record.level.as_str(),
                record.total_score,
                record.attendance_risk_score,
                record.grade_risk_score
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Alerts");

    if course_alerts.is_empty() {
        let _ = writeln!(output, "No alerts.");
    } else {
        for alert in &course_alerts {
            let _ = writeln!(output, "- {}", alert.message);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Upcoming Dates");

    if upcoming.is_empty() {
        let _ = writeln!(output, "Nothing left in the semester calendar.");
    } else {
        for event in &upcoming {
            if event.starts_on == event.ends_on {
                let _ = writeln!(output, "- {}: {}", event.starts_on, event.title);
            } else {
                let _ = writeln!(
                    output,
                    "- {} to {}: {}",
                    event.starts_on, event.ends_on, event.title
                );
            }
        }
    }

    output
}
