use uuid::Uuid;

use crate::attendance;
use crate::grades;
use crate::models::{Course, Dataset, RiskLevel, RiskRecord};

pub const ATTENDANCE_WEIGHT: f64 = 0.25;
pub const GRADES_WEIGHT: f64 = 0.20;
pub const RESOURCES_WEIGHT: f64 = 0.15;
pub const ASSIGNMENTS_WEIGHT: f64 = 0.20;

pub const HIGH_RISK_THRESHOLD: f64 = 60.0;
pub const MEDIUM_RISK_THRESHOLD: f64 = 30.0;

/// Factor scores on a 0-100 scale. Resource engagement and assignment
/// completion are not tracked yet and stay `None`, which scores as 0.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RiskFactors {
    pub attendance: f64,
    pub grades: f64,
    pub resources: Option<f64>,
    pub assignments: Option<f64>,
}

impl RiskFactors {
    pub fn total(&self) -> f64 {
        self.attendance * ATTENDANCE_WEIGHT
            + self.grades * GRADES_WEIGHT
            + self.resources.unwrap_or(0.0) * RESOURCES_WEIGHT
            + self.assignments.unwrap_or(0.0) * ASSIGNMENTS_WEIGHT
    }
}

/// A 20% absence rate already maps to the maximum.
pub fn attendance_risk(absence_percentage: f64) -> f64 {
    (absence_percentage * 5.0).clamp(0.0, 100.0)
}

/// No recorded grade scores as no risk.
pub fn grade_risk(average_grade: Option<f64>) -> f64 {
    match average_grade {
        None => 0.0,
        Some(avg) if avg < 3.0 => (80.0 + (3.0 - avg) * 10.0).min(100.0),
        Some(avg) if avg < 3.5 => 40.0,
        Some(_) => 0.0,
    }
}

pub fn risk_level(total_score: f64) -> RiskLevel {
    if total_score >= HIGH_RISK_THRESHOLD {
        RiskLevel::High
    } else if total_score >= MEDIUM_RISK_THRESHOLD {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

pub fn score(student_id: Uuid, course_id: Uuid, factors: RiskFactors) -> RiskRecord {
    let total_score = factors.total();
    RiskRecord {
        student_id,
        course_id,
        attendance_risk_score: factors.attendance,
        grade_risk_score: factors.grades,
        resources_risk_score: factors.resources,
        assignments_risk_score: factors.assignments,
        total_score,
        level: risk_level(total_score),
    }
}

pub fn factors_for(dataset: &Dataset, course: &Course, student_id: Uuid) -> RiskFactors {
    let components = dataset.components_for(course.id);
    let records = attendance::records_for(&dataset.attendance, student_id, Some(course.id));
    let summary = attendance::summarize(records);
    let average = grades::average_grade(&components, &dataset.activity_grades, student_id);

    RiskFactors {
        attendance: attendance_risk(summary.absence_percentage),
        grades: grade_risk(average),
        resources: None,
        assignments: None,
    }
}

/// Risk for every enrolled student of a course, highest first.
pub fn assess_course(dataset: &Dataset, course: &Course) -> Vec<RiskRecord> {
    let records = dataset
        .enrolled_students(course.id)
        .into_iter()
        .map(|student| score(student.id, course.id, factors_for(dataset, course, student.id)))
        .collect();
    rank(records)
}

pub fn rank(mut records: Vec<RiskRecord>) -> Vec<RiskRecord> {
    records.sort_by(|a, b| {
        b.total_score
            .partial_cmp(&a.total_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    records
}
