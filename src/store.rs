//! Backend boundary: where the dataset comes from and where edits go.

use anyhow::Context;
use chrono::{NaiveDate, Weekday};
use uuid::Uuid;

use crate::models::{
    ActivityGrade, AttendanceRecord, AttendanceStatus, CalendarEvent, Corte, Course, Dataset,
    Enrollment, GradeComponent, GradeValue, Student,
};

#[allow(async_fn_in_trait)]
pub trait AcademicStore {
    async fn load_dataset(&self) -> anyhow::Result<Dataset>;

    /// Insert or replace the grade for (component, student).
    async fn upsert_activity_grade(&mut self, grade: ActivityGrade) -> anyhow::Result<()>;

    /// Insert or correct the status for (course, student, date).
    async fn upsert_attendance(&mut self, record: AttendanceRecord) -> anyhow::Result<()>;

    async fn insert_component(&mut self, component: GradeComponent) -> anyhow::Result<()>;

    async fn insert_event(&mut self, event: CalendarEvent) -> anyhow::Result<()>;
}

/// Whether a dataset came from the backend or from the built-in copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOrigin {
    Backend,
    Fallback,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    dataset: Dataset,
}

impl MemoryStore {
    pub fn new(dataset: Dataset) -> Self {
        Self { dataset }
    }

    pub fn with_default_dataset() -> anyhow::Result<Self> {
        Ok(Self::new(default_dataset()?))
    }
}

impl AcademicStore for MemoryStore {
    async fn load_dataset(&self) -> anyhow::Result<Dataset> {
        Ok(self.dataset.clone())
    }

    async fn upsert_activity_grade(&mut self, grade: ActivityGrade) -> anyhow::Result<()> {
        upsert_grade(&mut self.dataset.activity_grades, grade);
        Ok(())
    }

    async fn upsert_attendance(&mut self, record: AttendanceRecord) -> anyhow::Result<()> {
        upsert_record(&mut self.dataset.attendance, record);
        Ok(())
    }

    async fn insert_component(&mut self, component: GradeComponent) -> anyhow::Result<()> {
        self.dataset.components.push(component);
        Ok(())
    }

    async fn insert_event(&mut self, event: CalendarEvent) -> anyhow::Result<()> {
        self.dataset.events.push(event);
        Ok(())
    }
}

pub fn upsert_grade(grades: &mut Vec<ActivityGrade>, grade: ActivityGrade) {
    match grades.iter_mut().find(|existing| {
        existing.component_id == grade.component_id && existing.student_id == grade.student_id
    }) {
        Some(existing) => existing.value = grade.value,
        None => grades.push(grade),
    }
}

pub fn upsert_record(records: &mut Vec<AttendanceRecord>, record: AttendanceRecord) {
    match records.iter_mut().find(|existing| {
        existing.course_id == record.course_id
            && existing.student_id == record.student_id
            && existing.date == record.date
    }) {
        Some(existing) => existing.status = record.status,
        None => records.push(record),
    }
}

/// What the primary store resolved to at startup.
pub enum Primary<P> {
    Unconfigured,
    Unreachable(anyhow::Error),
    Ready(P),
}

/// Serves the built-in dataset when the primary store is missing, unreachable
/// or fails to load. Writes are never redirected to the fallback.
pub struct FallbackStore<P> {
    primary: Primary<P>,
    fallback: MemoryStore,
}

impl<P: AcademicStore> FallbackStore<P> {
    pub fn new(primary: Primary<P>, fallback: MemoryStore) -> Self {
        Self { primary, fallback }
    }

    pub async fn load(&self) -> anyhow::Result<(Dataset, DataOrigin)> {
        match &self.primary {
            Primary::Ready(primary) => match primary.load_dataset().await {
                Ok(dataset) => return Ok((dataset, DataOrigin::Backend)),
                Err(err) => {
                    tracing::warn!(error = %err, "backend load failed, serving built-in dataset");
                }
            },
            Primary::Unreachable(err) => {
                tracing::warn!(error = %err, "backend unreachable, serving built-in dataset");
            }
            Primary::Unconfigured => {
                tracing::info!("no backend configured, serving built-in dataset");
            }
        }
        let dataset = self.fallback.load_dataset().await?;
        Ok((dataset, DataOrigin::Fallback))
    }

    fn primary_mut(&mut self) -> anyhow::Result<&mut P> {
        match &mut self.primary {
            Primary::Ready(primary) => Ok(primary),
            Primary::Unreachable(err) => {
                anyhow::bail!("backend unreachable ({err:#}); changes were not saved")
            }
            Primary::Unconfigured => {
                anyhow::bail!("no backend configured; set DATABASE_URL to save changes")
            }
        }
    }

    pub async fn upsert_activity_grade(&mut self, grade: ActivityGrade) -> anyhow::Result<()> {
        let result = self.primary_mut()?.upsert_activity_grade(grade).await;
        if let Err(err) = &result {
            tracing::error!(error = %err, component_id = %grade.component_id, "grade was not saved");
        }
        result
    }

    pub async fn upsert_attendance(&mut self, record: AttendanceRecord) -> anyhow::Result<()> {
        let result = self.primary_mut()?.upsert_attendance(record).await;
        if let Err(err) = &result {
            tracing::error!(error = %err, course_id = %record.course_id, "attendance was not saved");
        }
        result
    }

    pub async fn insert_component(&mut self, component: GradeComponent) -> anyhow::Result<()> {
        let name = component.name.clone();
        let result = self.primary_mut()?.insert_component(component).await;
        if let Err(err) = &result {
            tracing::error!(error = %err, name = %name, "grade component was not saved");
        }
        result
    }

    pub async fn insert_event(&mut self, event: CalendarEvent) -> anyhow::Result<()> {
        let title = event.title.clone();
        let result = self.primary_mut()?.insert_event(event).await;
        if let Err(err) = &result {
            tracing::error!(error = %err, title = %title, "event was not saved");
        }
        result
    }
}

const COMPONENT_ID_BASE: u128 = 0x9f3c_51e0_77a2_4c0b_8d15_000000000000;

fn date(year: i32, month: u32, day: u32) -> anyhow::Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day).context("invalid date")
}

/// Built-in dataset for 2026-1, used for seeding and when the backend is
/// unavailable.
pub fn default_dataset() -> anyhow::Result<Dataset> {
    let students = vec![
        Student {
            id: Uuid::from_u128(0x3d7f5d6f_24f7_4e8e_8b4b_3e7e44b4a7b2),
            full_name: "Avery Lee".to_string(),
            email: "avery.lee@example.edu".to_string(),
        },
        Student {
            id: Uuid::from_u128(0x0c22f1f1_9184_4fd4_9b21_28c68a6a89dc),
            full_name: "Jules Moreno".to_string(),
            email: "jules.moreno@example.edu".to_string(),
        },
        Student {
            id: Uuid::from_u128(0xd5a0a1a2_2a3c_44c2_8f73_60b7897a9dd2),
            full_name: "Kiara Patel".to_string(),
            email: "kiara.patel@example.edu".to_string(),
        },
    ];

    let courses = vec![
        Course {
            id: Uuid::from_u128(0x6b1e2c44_0d1f_4a51_9a7c_1f0b8f2d3e01),
            code: "MAT101".to_string(),
            name: "Cálculo diferencial".to_string(),
            weekdays: vec![Weekday::Mon, Weekday::Wed],
            starts_on: date(2026, 2, 2)?,
            ends_on: date(2026, 5, 30)?,
        },
        Course {
            id: Uuid::from_u128(0x6b1e2c44_0d1f_4a51_9a7c_1f0b8f2d3e02),
            code: "FIS201".to_string(),
            name: "Física mecánica".to_string(),
            weekdays: vec![Weekday::Tue, Weekday::Thu],
            starts_on: date(2026, 2, 2)?,
            ends_on: date(2026, 5, 30)?,
        },
    ];

    let enrollments = courses
        .iter()
        .flat_map(|course| {
            students.iter().map(move |student| Enrollment {
                course_id: course.id,
                student_id: student.id,
            })
        })
        .collect();

    let plan: [(&str, f64, Corte); 6] = [
        ("Quiz 1", 40.0, Corte::First),
        ("Parcial 1", 60.0, Corte::First),
        ("Taller", 50.0, Corte::Second),
        ("Parcial 2", 50.0, Corte::Second),
        ("Proyecto", 40.0, Corte::Third),
        ("Examen final", 60.0, Corte::Third),
    ];
    let mut components = Vec::new();
    for (course_index, course) in courses.iter().enumerate() {
        for (index, (name, weight, corte)) in plan.iter().enumerate() {
            components.push(GradeComponent {
                id: Uuid::from_u128(COMPONENT_ID_BASE + (course_index * plan.len() + index) as u128),
                course_id: course.id,
                name: name.to_string(),
                weight_percent: *weight,
                corte: *corte,
            });
        }
    }

    // First-corte grades only: Avery is doing well, Jules is struggling.
    let first_corte_grades = [(0usize, [4.5, 4.2]), (1, [2.1, 2.6]), (2, [3.4, 3.1])];
    let mut activity_grades = Vec::new();
    for course_components in components.chunks(plan.len()) {
        for (student_index, values) in first_corte_grades {
            for (component, value) in course_components.iter().take(2).zip(values) {
                activity_grades.push(ActivityGrade {
                    component_id: component.id,
                    student_id: students[student_index].id,
                    value: GradeValue::try_from(value)?,
                });
            }
        }
    }

    let sessions = [
        (2u32, 2u32),
        (2, 4),
        (2, 9),
        (2, 11),
        (2, 16),
        (2, 18),
    ];
    let patterns = [
        [AttendanceStatus::Present; 6],
        [
            AttendanceStatus::Absent,
            AttendanceStatus::Present,
            AttendanceStatus::Absent,
            AttendanceStatus::Late,
            AttendanceStatus::Absent,
            AttendanceStatus::Present,
        ],
        [
            AttendanceStatus::Present,
            AttendanceStatus::Late,
            AttendanceStatus::Present,
            AttendanceStatus::Present,
            AttendanceStatus::Late,
            AttendanceStatus::Present,
        ],
    ];
    let mut attendance = Vec::new();
    for (student, pattern) in students.iter().zip(patterns) {
        for ((month, day), status) in sessions.iter().zip(pattern) {
            attendance.push(AttendanceRecord {
                student_id: student.id,
                course_id: courses[0].id,
                date: date(2026, *month, *day)?,
                status,
            });
        }
    }

    Ok(Dataset {
        students,
        courses,
        enrollments,
        components,
        activity_grades,
        attendance,
        events: Vec::new(),
    })
}
