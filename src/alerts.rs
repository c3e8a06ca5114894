use crate::attendance;
use crate::grades;
use crate::models::{Alert, AlertKind, Course, Dataset, RiskLevel};
use crate::risk;

/// Attendance below this percentage raises an alert.
pub const ATTENDANCE_ALERT_THRESHOLD: u32 = 80;

pub fn course_alerts(dataset: &Dataset, course: &Course) -> Vec<Alert> {
    let components = dataset.components_for(course.id);
    let mut alerts = Vec::new();

    for student in dataset.enrolled_students(course.id) {
        let records = attendance::records_for(&dataset.attendance, student.id, Some(course.id));
        let summary = attendance::summarize(records);
        if summary.has_data() && summary.percentage < ATTENDANCE_ALERT_THRESHOLD {
            alerts.push(Alert {
                student_id: student.id,
                course_id: course.id,
                kind: AlertKind::LowAttendance,
                message: format!(
                    "{} attends {}% of {} sessions in {}",
                    student.full_name, summary.percentage, summary.total, course.code
                ),
            });
        }

        let average = grades::average_grade(&components, &dataset.activity_grades, student.id);
        if let Some(average) = average.filter(|avg| *avg < grades::PASSING_GRADE) {
            alerts.push(Alert {
                student_id: student.id,
                course_id: course.id,
                kind: AlertKind::FailingGrade,
                message: format!(
                    "{} averages {} on graded activities in {}",
                    student.full_name,
                    grades::display_grade(average),
                    course.code
                ),
            });
        }

        let record = risk::score(
            student.id,
            course.id,
            risk::factors_for(dataset, course, student.id),
        );
        if record.level == RiskLevel::High {
            alerts.push(Alert {
                student_id: student.id,
                course_id: course.id,
                kind: AlertKind::HighRisk,
                message: format!(
                    "{} is at high risk in {} (score {:.1})",
                    student.full_name, course.code, record.total_score
                ),
            });
        }
    }

    alerts
}
