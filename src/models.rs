use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub weekdays: Vec<Weekday>,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
}

impl Course {
    pub fn meets_on(&self, date: NaiveDate) -> bool {
        date >= self.starts_on
            && date <= self.ends_on
            && self.weekdays.contains(&chrono::Datelike::weekday(&date))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub course_id: Uuid,
    pub student_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Absent => "absent",
        }
    }
}

impl FromStr for AttendanceStatus {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "present" | "presente" => Ok(AttendanceStatus::Present),
            "late" | "tarde" => Ok(AttendanceStatus::Late),
            "absent" | "ausente" => Ok(AttendanceStatus::Absent),
            other => Err(ValidationError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

/// One of the three grading periods of a semester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Corte {
    First,
    Second,
    Third,
}

impl Corte {
    pub const ALL: [Corte; 3] = [Corte::First, Corte::Second, Corte::Third];

    pub fn number(&self) -> u8 {
        match self {
            Corte::First => 1,
            Corte::Second => 2,
            Corte::Third => 3,
        }
    }

    /// Share of the semester final carried by this corte.
    pub fn weight(&self) -> f64 {
        match self {
            Corte::First => 0.30,
            Corte::Second => 0.30,
            Corte::Third => 0.40,
        }
    }

    pub fn index(&self) -> usize {
        usize::from(self.number() - 1)
    }
}

impl TryFrom<i64> for Corte {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Corte::First),
            2 => Ok(Corte::Second),
            3 => Ok(Corte::Third),
            other => Err(ValidationError::UnknownCorte(other)),
        }
    }
}

impl From<Corte> for i64 {
    fn from(corte: Corte) -> Self {
        i64::from(corte.number())
    }
}

impl fmt::Display for Corte {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "corte {}", self.number())
    }
}

/// A grade on the 0.0-5.0 scale. Only constructed through `TryFrom<f64>`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct GradeValue(f64);

impl GradeValue {
    pub const MIN: f64 = 0.0;
    pub const MAX: f64 = 5.0;

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for GradeValue {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if value.is_finite() && (Self::MIN..=Self::MAX).contains(&value) {
            Ok(GradeValue(value))
        } else {
            Err(ValidationError::GradeOutOfRange(value))
        }
    }
}

impl From<GradeValue> for f64 {
    fn from(grade: GradeValue) -> Self {
        grade.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeComponent {
    pub id: Uuid,
    pub course_id: Uuid,
    pub name: String,
    pub weight_percent: f64,
    pub corte: Corte,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivityGrade {
    pub component_id: Uuid,
    pub student_id: Uuid,
    pub value: GradeValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskRecord {
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub attendance_risk_score: f64,
    pub grade_risk_score: f64,
    pub resources_risk_score: Option<f64>,
    pub assignments_risk_score: Option<f64>,
    pub total_score: f64,
    pub level: RiskLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Class,
    Corte,
    Exam,
    GradeDeadline,
    Habilitacion,
    Recess,
    Holiday,
    Personal,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Class => "class",
            EventKind::Corte => "corte",
            EventKind::Exam => "exam",
            EventKind::GradeDeadline => "grade_deadline",
            EventKind::Habilitacion => "habilitacion",
            EventKind::Recess => "recess",
            EventKind::Holiday => "holiday",
            EventKind::Personal => "personal",
        }
    }
}

impl FromStr for EventKind {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "class" | "clase" => Ok(EventKind::Class),
            "corte" => Ok(EventKind::Corte),
            "exam" => Ok(EventKind::Exam),
            "grade_deadline" => Ok(EventKind::GradeDeadline),
            "habilitacion" => Ok(EventKind::Habilitacion),
            "recess" => Ok(EventKind::Recess),
            "holiday" => Ok(EventKind::Holiday),
            "personal" => Ok(EventKind::Personal),
            other => Err(ValidationError::UnknownEventKind(other.to_string())),
        }
    }
}

/// Where a calendar event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    Generated,
    Institutional,
    User,
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSource::Generated => "generated",
            EventSource::Institutional => "institutional",
            EventSource::User => "user",
        }
    }
}

impl FromStr for EventSource {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "generated" => Ok(EventSource::Generated),
            "institutional" => Ok(EventSource::Institutional),
            "user" => Ok(EventSource::User),
            other => Err(ValidationError::UnknownEventSource(other.to_string())),
        }
    }
}

/// Identity of a calendar event, used to keep merged event lists free of
/// duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum EventKey {
    Class { course_id: Uuid, date: NaiveDate },
    Institutional(String),
    Stored(Uuid),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEvent {
    pub key: EventKey,
    pub title: String,
    pub kind: EventKind,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub course_id: Option<Uuid>,
    pub source: EventSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    LowAttendance,
    FailingGrade,
    HighRisk,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub kind: AlertKind,
    pub message: String,
}

/// Everything the tracker reads from the backend in one load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub students: Vec<Student>,
    pub courses: Vec<Course>,
    pub enrollments: Vec<Enrollment>,
    pub components: Vec<GradeComponent>,
    pub activity_grades: Vec<ActivityGrade>,
    pub attendance: Vec<AttendanceRecord>,
    pub events: Vec<CalendarEvent>,
}

impl Dataset {
    pub fn course_by_code(&self, code: &str) -> Option<&Course> {
        self.courses
            .iter()
            .find(|course| course.code.eq_ignore_ascii_case(code))
    }

    pub fn student_by_email(&self, email: &str) -> Option<&Student> {
        self.students
            .iter()
            .find(|student| student.email.eq_ignore_ascii_case(email))
    }

    pub fn student(&self, id: Uuid) -> Option<&Student> {
        self.students.iter().find(|student| student.id == id)
    }

    pub fn course(&self, id: Uuid) -> Option<&Course> {
        self.courses.iter().find(|course| course.id == id)
    }

    pub fn enrolled_students(&self, course_id: Uuid) -> Vec<&Student> {
        let mut students: Vec<&Student> = self
            .enrollments
            .iter()
            .filter(|enrollment| enrollment.course_id == course_id)
            .filter_map(|enrollment| self.student(enrollment.student_id))
            .collect();
        students.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        students
    }

    pub fn components_for(&self, course_id: Uuid) -> Vec<GradeComponent> {
        self.components
            .iter()
            .filter(|component| component.course_id == course_id)
            .cloned()
            .collect()
    }
}
