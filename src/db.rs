use anyhow::Context;
use chrono::{NaiveDate, Weekday};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::models::{
    ActivityGrade, AttendanceRecord, AttendanceStatus, CalendarEvent, Corte, Course, Dataset,
    Enrollment, EventKey, EventKind, EventSource, GradeComponent, GradeValue, Student,
};
use crate::store::{default_dataset, AcademicStore};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed store. Every write is a single upsert keyed by the
/// natural identifiers of the row, so the last write wins.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct StudentRow {
    id: Uuid,
    full_name: String,
    email: String,
}

impl From<StudentRow> for Student {
    fn from(row: StudentRow) -> Self {
        Student {
            id: row.id,
            full_name: row.full_name,
            email: row.email,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CourseRow {
    id: Uuid,
    code: String,
    name: String,
    weekdays: Vec<String>,
    starts_on: NaiveDate,
    ends_on: NaiveDate,
}

impl TryFrom<CourseRow> for Course {
    type Error = ValidationError;

    fn try_from(row: CourseRow) -> Result<Self, Self::Error> {
        let weekdays = row
            .weekdays
            .iter()
            .map(|day| {
                day.parse::<Weekday>()
                    .map_err(|_| ValidationError::UnknownWeekday(day.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if row.ends_on < row.starts_on {
            return Err(ValidationError::InvalidRange {
                start: row.starts_on,
                end: row.ends_on,
            });
        }
        Ok(Course {
            id: row.id,
            code: row.code,
            name: row.name,
            weekdays,
            starts_on: row.starts_on,
            ends_on: row.ends_on,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ComponentRow {
    id: Uuid,
    course_id: Uuid,
    name: String,
    weight_percent: f64,
    corte: i16,
}

impl TryFrom<ComponentRow> for GradeComponent {
    type Error = ValidationError;

    fn try_from(row: ComponentRow) -> Result<Self, Self::Error> {
        if !(0.0..=100.0).contains(&row.weight_percent) {
            return Err(ValidationError::WeightOutOfRange(row.weight_percent));
        }
        Ok(GradeComponent {
            id: row.id,
            course_id: row.course_id,
            name: row.name,
            weight_percent: row.weight_percent,
            corte: Corte::try_from(i64::from(row.corte))?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct GradeRow {
    component_id: Uuid,
    student_id: Uuid,
    value: f64,
}

impl TryFrom<GradeRow> for ActivityGrade {
    type Error = ValidationError;

    fn try_from(row: GradeRow) -> Result<Self, Self::Error> {
        Ok(ActivityGrade {
            component_id: row.component_id,
            student_id: row.student_id,
            value: GradeValue::try_from(row.value)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AttendanceRow {
    course_id: Uuid,
    student_id: Uuid,
    session_date: NaiveDate,
    status: String,
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = ValidationError;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        Ok(AttendanceRecord {
            student_id: row.student_id,
            course_id: row.course_id,
            date: row.session_date,
            status: row.status.parse()?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    title: String,
    kind: String,
    starts_on: NaiveDate,
    ends_on: NaiveDate,
    course_id: Option<Uuid>,
    source: String,
}

impl TryFrom<EventRow> for CalendarEvent {
    type Error = ValidationError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let kind: EventKind = row.kind.parse()?;
        let source: EventSource = row.source.parse()?;
        // Class sessions persisted by older clients share the key of the
        // session derived for the same course and day.
        let key = match (source, kind, row.course_id) {
            (EventSource::Generated, EventKind::Class, Some(course_id)) => EventKey::Class {
                course_id,
                date: row.starts_on,
            },
            _ => EventKey::Stored(row.id),
        };
        Ok(CalendarEvent {
            key,
            title: row.title,
            kind,
            starts_on: row.starts_on,
            ends_on: row.ends_on,
            course_id: row.course_id,
            source,
        })
    }
}

fn parse_rows<R, T>(rows: Vec<R>, table: &str) -> anyhow::Result<Vec<T>>
where
    T: TryFrom<R, Error = ValidationError>,
{
    rows.into_iter()
        .map(|row| T::try_from(row).with_context(|| format!("invalid row in {table}")))
        .collect()
}

impl AcademicStore for PgStore {
    async fn load_dataset(&self) -> anyhow::Result<Dataset> {
        let students: Vec<StudentRow> = sqlx::query_as(
            "SELECT id, full_name, email FROM academic.students ORDER BY full_name",
        )
        .fetch_all(&self.pool)
        .await?;

        let courses: Vec<CourseRow> = sqlx::query_as(
            "SELECT id, code, name, weekdays, starts_on, ends_on FROM academic.courses ORDER BY code",
        )
        .fetch_all(&self.pool)
        .await?;

        let enrollments: Vec<(Uuid, Uuid)> =
            sqlx::query_as("SELECT course_id, student_id FROM academic.enrollments")
                .fetch_all(&self.pool)
                .await?;

        let components: Vec<ComponentRow> = sqlx::query_as(
            "SELECT id, course_id, name, weight_percent, corte \
             FROM academic.grade_components ORDER BY corte, name",
        )
        .fetch_all(&self.pool)
        .await?;

        let grades: Vec<GradeRow> = sqlx::query_as(
            "SELECT component_id, student_id, value FROM academic.activity_grades",
        )
        .fetch_all(&self.pool)
        .await?;

        let attendance: Vec<AttendanceRow> = sqlx::query_as(
            "SELECT course_id, student_id, session_date, status \
             FROM academic.attendance ORDER BY session_date",
        )
        .fetch_all(&self.pool)
        .await?;

        let events: Vec<EventRow> = sqlx::query_as(
            "SELECT id, title, kind, starts_on, ends_on, course_id, source \
             FROM academic.calendar_events ORDER BY starts_on",
        )
        .fetch_all(&self.pool)
        .await?;

        let dataset = Dataset {
            students: students.into_iter().map(Student::from).collect(),
            courses: parse_rows(courses, "courses")?,
            enrollments: enrollments
                .into_iter()
                .map(|(course_id, student_id)| Enrollment {
                    course_id,
                    student_id,
                })
                .collect(),
            components: parse_rows(components, "grade_components")?,
            activity_grades: parse_rows(grades, "activity_grades")?,
            attendance: parse_rows(attendance, "attendance")?,
            events: parse_rows(events, "calendar_events")?,
        };

        tracing::debug!(
            students = dataset.students.len(),
            courses = dataset.courses.len(),
            grades = dataset.activity_grades.len(),
            "dataset loaded from backend"
        );
        Ok(dataset)
    }

    async fn upsert_activity_grade(&mut self, grade: ActivityGrade) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO academic.activity_grades (component_id, student_id, value)
            VALUES ($1, $2, $3)
            ON CONFLICT (component_id, student_id) DO UPDATE
            SET value = EXCLUDED.value, updated_at = now()
            "#,
        )
        .bind(grade.component_id)
        .bind(grade.student_id)
        .bind(grade.value.value())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_attendance(&mut self, record: AttendanceRecord) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO academic.attendance (course_id, student_id, session_date, status)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (course_id, student_id, session_date) DO UPDATE
            SET status = EXCLUDED.status
            "#,
        )
        .bind(record.course_id)
        .bind(record.student_id)
        .bind(record.date)
        .bind(record.status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_component(&mut self, component: GradeComponent) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO academic.grade_components (id, course_id, name, weight_percent, corte)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(component.id)
        .bind(component.course_id)
        .bind(&component.name)
        .bind(component.weight_percent)
        .bind(i16::from(component.corte.number()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_event(&mut self, event: CalendarEvent) -> anyhow::Result<()> {
        match &event.key {
            EventKey::Stored(id) => {
                let source = match event.source {
                    EventSource::Generated => EventSource::Generated,
                    _ => EventSource::User,
                };
                sqlx::query(
                    r#"
                    INSERT INTO academic.calendar_events
                    (id, title, kind, starts_on, ends_on, course_id, source)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    ON CONFLICT (id) DO UPDATE
                    SET title = EXCLUDED.title, kind = EXCLUDED.kind,
                        starts_on = EXCLUDED.starts_on, ends_on = EXCLUDED.ends_on,
                        course_id = EXCLUDED.course_id
                    "#,
                )
                .bind(*id)
                .bind(&event.title)
                .bind(event.kind.as_str())
                .bind(event.starts_on)
                .bind(event.ends_on)
                .bind(event.course_id)
                .bind(source.as_str())
                .execute(&self.pool)
                .await?;
            }
            // One row per course and day, whatever id a previous save used.
            EventKey::Class { course_id, date } => {
                sqlx::query(
                    r#"
                    INSERT INTO academic.calendar_events
                    (id, title, kind, starts_on, ends_on, course_id, source)
                    VALUES ($1, $2, $3, $4, $4, $5, $6)
                    ON CONFLICT (course_id, starts_on)
                        WHERE source = 'generated' AND kind = 'class'
                    DO UPDATE SET title = EXCLUDED.title
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(&event.title)
                .bind(EventKind::Class.as_str())
                .bind(*date)
                .bind(*course_id)
                .bind(EventSource::Generated.as_str())
                .execute(&self.pool)
                .await?;
            }
            EventKey::Institutional(key) => {
                anyhow::bail!("institutional date '{key}' comes from the calendar table")
            }
        }
        Ok(())
    }
}

/// Writes the built-in dataset. Safe to run repeatedly.
pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let dataset = default_dataset()?;
    let mut tx = pool.begin().await?;

    for student in &dataset.students {
        sqlx::query(
            r#"
            INSERT INTO academic.students (id, full_name, email)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE SET full_name = EXCLUDED.full_name
            "#,
        )
        .bind(student.id)
        .bind(&student.full_name)
        .bind(&student.email)
        .execute(&mut *tx)
        .await?;
    }

    for course in &dataset.courses {
        let weekdays: Vec<String> = course.weekdays.iter().map(|day| day.to_string()).collect();
        sqlx::query(
            r#"
            INSERT INTO academic.courses (id, code, name, weekdays, starts_on, ends_on)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (code) DO UPDATE
            SET name = EXCLUDED.name, weekdays = EXCLUDED.weekdays,
                starts_on = EXCLUDED.starts_on, ends_on = EXCLUDED.ends_on
            "#,
        )
        .bind(course.id)
        .bind(&course.code)
        .bind(&course.name)
        .bind(weekdays)
        .bind(course.starts_on)
        .bind(course.ends_on)
        .execute(&mut *tx)
        .await?;
    }

    for enrollment in &dataset.enrollments {
        sqlx::query(
            "INSERT INTO academic.enrollments (course_id, student_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(enrollment.course_id)
        .bind(enrollment.student_id)
        .execute(&mut *tx)
        .await?;
    }

    for component in &dataset.components {
        sqlx::query(
            r#"
            INSERT INTO academic.grade_components (id, course_id, name, weight_percent, corte)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(component.id)
        .bind(component.course_id)
        .bind(&component.name)
        .bind(component.weight_percent)
        .bind(i16::from(component.corte.number()))
        .execute(&mut *tx)
        .await?;
    }

    for grade in &dataset.activity_grades {
        sqlx::query(
            r#"
            INSERT INTO academic.activity_grades (component_id, student_id, value)
            VALUES ($1, $2, $3)
            ON CONFLICT (component_id, student_id) DO NOTHING
            "#,
        )
        .bind(grade.component_id)
        .bind(grade.student_id)
        .bind(grade.value.value())
        .execute(&mut *tx)
        .await?;
    }

    for record in &dataset.attendance {
        sqlx::query(
            r#"
            INSERT INTO academic.attendance (course_id, student_id, session_date, status)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (course_id, student_id, session_date) DO NOTHING
            "#,
        )
        .bind(record.course_id)
        .bind(record.student_id)
        .bind(record.date)
        .bind(record.status.as_str())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Reads attendance rows (`email,course_code,date,status`) and resolves them
/// against the loaded dataset. Any unknown student, course or status fails
/// the whole file so nothing is written partially.
pub fn read_attendance_csv<R: std::io::Read>(
    reader: R,
    dataset: &Dataset,
) -> anyhow::Result<Vec<AttendanceRecord>> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        email: String,
        course_code: String,
        date: NaiveDate,
        status: String,
    }

    let mut reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let line = index + 2;
        let row = result.with_context(|| format!("line {line}: malformed row"))?;
        let student = dataset
            .student_by_email(&row.email)
            .with_context(|| format!("line {line}: unknown student {}", row.email))?;
        let course = dataset
            .course_by_code(&row.course_code)
            .with_context(|| format!("line {line}: unknown course {}", row.course_code))?;
        let status: AttendanceStatus = row
            .status
            .parse()
            .with_context(|| format!("line {line}: bad status"))?;

        records.push(AttendanceRecord {
            student_id: student.id,
            course_id: course.id,
            date: row.date,
            status,
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, month, day).unwrap()
    }

    #[test]
    fn course_rows_parse_weekday_names() {
        let row = CourseRow {
            id: Uuid::new_v4(),
            code: "MAT101".to_string(),
            name: "Calculus".to_string(),
            weekdays: vec!["Mon".to_string(), "wednesday".to_string()],
            starts_on: ymd(2, 2),
            ends_on: ymd(5, 30),
        };
        let course = Course::try_from(row).unwrap();
        assert_eq!(course.weekdays, vec![Weekday::Mon, Weekday::Wed]);

        let bad = CourseRow {
            id: Uuid::new_v4(),
            code: "X".to_string(),
            name: "X".to_string(),
            weekdays: vec!["someday".to_string()],
            starts_on: ymd(2, 2),
            ends_on: ymd(5, 30),
        };
        assert_eq!(
            Course::try_from(bad),
            Err(ValidationError::UnknownWeekday("someday".to_string()))
        );
    }

    #[test]
    fn grade_rows_outside_scale_are_rejected() {
        let row = GradeRow {
            component_id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            value: 7.0,
        };
        assert_eq!(
            ActivityGrade::try_from(row),
            Err(ValidationError::GradeOutOfRange(7.0))
        );
    }

    #[test]
    fn component_rows_check_corte() {
        let row = ComponentRow {
            id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            name: "Quiz".to_string(),
            weight_percent: 20.0,
            corte: 4,
        };
        assert_eq!(
            GradeComponent::try_from(row),
            Err(ValidationError::UnknownCorte(4))
        );
    }

    #[test]
    fn generated_class_rows_share_the_derived_key() {
        let course_id = Uuid::new_v4();
        let row = EventRow {
            id: Uuid::new_v4(),
            title: "MAT101".to_string(),
            kind: "clase".to_string(),
            starts_on: ymd(2, 9),
            ends_on: ymd(2, 9),
            course_id: Some(course_id),
            source: "generated".to_string(),
        };
        let event = CalendarEvent::try_from(row).unwrap();
        assert_eq!(
            event.key,
            EventKey::Class {
                course_id,
                date: ymd(2, 9)
            }
        );

        let id = Uuid::new_v4();
        let personal = EventRow {
            id,
            title: "Study group".to_string(),
            kind: "personal".to_string(),
            starts_on: ymd(2, 9),
            ends_on: ymd(2, 9),
            course_id: None,
            source: "user".to_string(),
        };
        assert_eq!(CalendarEvent::try_from(personal).unwrap().key, EventKey::Stored(id));
    }

    #[test]
    fn attendance_csv_resolves_students_and_courses() {
        let dataset = default_dataset().unwrap();
        let input = "email,course_code,date,status\n\
                     avery.lee@example.edu,MAT101,2026-02-23,tarde\n\
                     kiara.patel@example.edu,fis201,2026-02-24,absent\n";
        let records = read_attendance_csv(input.as_bytes(), &dataset).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].status, AttendanceStatus::Late);
        assert_eq!(records[1].course_id, dataset.courses[1].id);
    }

    #[test]
    fn attendance_csv_rejects_unknown_student() {
        let dataset = default_dataset().unwrap();
        let input = "email,course_code,date,status\nnobody@example.edu,MAT101,2026-02-23,present\n";
        let err = read_attendance_csv(input.as_bytes(), &dataset).unwrap_err();
        assert!(err.to_string().contains("unknown student"));
    }
}
