use serde::Serialize;
use uuid::Uuid;

use crate::models::{AttendanceRecord, AttendanceStatus};

/// Percentage reported when there are no records at all. It means "no data",
/// not "full attendance".
pub const NO_DATA_PERCENTAGE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AttendanceSummary {
    pub present: usize,
    pub late: usize,
    pub absent: usize,
    pub total: usize,
    pub percentage: u32,
    pub absence_percentage: f64,
}

impl AttendanceSummary {
    pub fn has_data(&self) -> bool {
        self.total > 0
    }
}

/// `round((present + 0.5 * late) / total * 100)`, or
/// [`NO_DATA_PERCENTAGE`] for an empty list.
pub fn attendance_percentage<'a, I>(records: I) -> u32
where
    I: IntoIterator<Item = &'a AttendanceRecord>,
{
    summarize(records).percentage
}

pub fn summarize<'a, I>(records: I) -> AttendanceSummary
where
    I: IntoIterator<Item = &'a AttendanceRecord>,
{
    let mut present = 0usize;
    let mut late = 0usize;
    let mut absent = 0usize;

    for record in records {
        match record.status {
            AttendanceStatus::Present => present += 1,
            AttendanceStatus::Late => late += 1,
            AttendanceStatus::Absent => absent += 1,
        }
    }

    let total = present + late + absent;
    if total == 0 {
        return AttendanceSummary {
            present,
            late,
            absent,
            total,
            percentage: NO_DATA_PERCENTAGE,
            absence_percentage: 0.0,
        };
    }

    let credited = present as f64 + 0.5 * late as f64;
    let percentage = ((credited / total as f64) * 100.0).round() as u32;

    AttendanceSummary {
        present,
        late,
        absent,
        total,
        percentage: percentage.min(100),
        absence_percentage: absent as f64 / total as f64 * 100.0,
    }
}

/// Records for one student, optionally narrowed to one course.
pub fn records_for(
    records: &[AttendanceRecord],
    student_id: Uuid,
    course_id: Option<Uuid>,
) -> Vec<&AttendanceRecord> {
    records
        .iter()
        .filter(|record| record.student_id == student_id)
        .filter(|record| course_id.map_or(true, |id| record.course_id == id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(status: AttendanceStatus) -> AttendanceRecord {
        record_on(Uuid::nil(), Uuid::nil(), 2, status)
    }

    fn record_on(
        student_id: Uuid,
        course_id: Uuid,
        day: u32,
        status: AttendanceStatus,
    ) -> AttendanceRecord {
        AttendanceRecord {
            student_id,
            course_id,
            date: NaiveDate::from_ymd_opt(2026, 2, day).unwrap(),
            status,
        }
    }

    #[test]
    fn empty_list_reports_no_data_default() {
        let summary = summarize(&[]);
        assert_eq!(summary.percentage, 100);
        assert!(!summary.has_data());
        assert_eq!(summary.absence_percentage, 0.0);
        assert_eq!(attendance_percentage(&[]), 100);
    }

    #[test]
    fn late_counts_as_half() {
        use AttendanceStatus::*;
        assert_eq!(attendance_percentage(&[record(Present), record(Present)]), 100);
        assert_eq!(attendance_percentage(&[record(Present), record(Late)]), 75);
        assert_eq!(attendance_percentage(&[record(Absent)]), 0);
        assert_eq!(
            attendance_percentage(&[record(Present), record(Late), record(Absent), record(Absent)]),
            38
        );
    }

    #[test]
    fn percentage_stays_in_bounds() {
        use AttendanceStatus::*;
        let statuses = [Present, Late, Absent];
        for n in 1..=12usize {
            let records: Vec<AttendanceRecord> =
                (0..n).map(|i| record(statuses[(i * 7 + n) % 3])).collect();
            let percentage = attendance_percentage(&records);
            assert!(percentage <= 100);
        }
    }

    #[test]
    fn absence_percentage_ignores_late() {
        use AttendanceStatus::*;
        let records = [record(Absent), record(Late), record(Present), record(Present)];
        let summary = summarize(&records);
        assert_eq!(summary.absence_percentage, 25.0);
        assert_eq!(summary.late, 1);
    }

    #[test]
    fn records_are_scoped_by_student_and_course() {
        let student = Uuid::new_v4();
        let other = Uuid::new_v4();
        let course = Uuid::new_v4();
        let records = vec![
            record_on(student, course, 2, AttendanceStatus::Present),
            record_on(student, Uuid::new_v4(), 3, AttendanceStatus::Absent),
            record_on(other, course, 2, AttendanceStatus::Absent),
        ];
        assert_eq!(records_for(&records, student, None).len(), 2);
        let scoped = records_for(&records, student, Some(course));
        assert_eq!(scoped.len(), 1);
        assert_eq!(attendance_percentage(scoped), 100);
    }
}
