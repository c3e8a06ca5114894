use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

mod alerts;
mod attendance;
mod calendar;
mod config;
mod db;
mod error;
mod events;
mod export;
mod grades;
mod models;
mod report;
mod risk;
mod state;
mod store;

use calendar::AcademicCalendar;
use config::Config;
use db::PgStore;
use models::{
    ActivityGrade, AttendanceRecord, AttendanceStatus, CalendarEvent, Corte, Course, Dataset,
    EventKey, EventKind, EventSource, GradeComponent, GradeValue, Student,
};
use state::{Action, AppState, Notice, NoticeLevel};
use store::{FallbackStore, MemoryStore, Primary};

#[derive(Parser)]
#[command(name = "academic-tracker")]
#[command(about = "Grades, attendance, risk and calendar for one semester", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load the built-in sample semester into the database
    Seed,
    /// Import attendance from a CSV file (email,course_code,date,status)
    ImportAttendance {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Attendance percentage per student
    Attendance {
        #[arg(long)]
        course: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Record or correct one attendance entry
    MarkAttendance {
        #[arg(long)]
        course: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        status: AttendanceStatus,
    },
    /// Corte and final grades for a course
    Grades {
        #[arg(long)]
        course: String,
        #[arg(long)]
        json: bool,
    },
    /// Record a grade (0.0-5.0) for one component
    SetGrade {
        #[arg(long)]
        component: Uuid,
        #[arg(long)]
        email: String,
        #[arg(long)]
        value: f64,
    },
    /// Add a grade component to a course corte
    AddComponent {
        #[arg(long)]
        course: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        weight: f64,
        #[arg(long)]
        corte: i64,
    },
    /// Rank students by risk score
    Risk {
        #[arg(long)]
        course: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Attendance, grade and risk alerts
    Alerts {
        #[arg(long)]
        course: Option<String>,
    },
    /// Courses a student can take a habilitación for
    Habilitacion {
        #[arg(long)]
        email: String,
    },
    /// Class sessions and institutional dates for a month
    Calendar {
        #[arg(long)]
        year: i32,
        #[arg(long)]
        month: u32,
        #[arg(long)]
        course: Option<String>,
    },
    /// Add a personal calendar event
    AddEvent {
        #[arg(long)]
        title: String,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        until: Option<NaiveDate>,
        #[arg(long)]
        course: Option<String>,
    },
    /// Export a course grade sheet as CSV
    Export {
        #[arg(long)]
        course: String,
        #[arg(long, default_value = "grades.csv")]
        out: PathBuf,
    },
    /// Generate a markdown course report
    Report {
        #[arg(long)]
        course: String,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env();
    config::init_tracing(&config);
    let calendar = config.calendar()?;

    let connection = match &config.database_url {
        Some(url) => Some(
            PgPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(5))
                .connect(url)
                .await,
        ),
        None => None,
    };

    match cli.command {
        Commands::InitDb => {
            let pool = require_pool(connection)?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = require_pool(connection)?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        command => {
            let primary = match connection {
                Some(Ok(pool)) => Primary::Ready(PgStore::new(pool)),
                Some(Err(err)) => Primary::Unreachable(
                    anyhow::Error::new(err).context("failed to connect to Postgres"),
                ),
                None => Primary::Unconfigured,
            };
            let mut store = FallbackStore::new(primary, MemoryStore::with_default_dataset()?);
            let (dataset, origin) = store.load().await?;
            let state = state::reduce(AppState::default(), Action::DatasetLoaded { dataset, origin })?;
            run(command, &mut store, state, &calendar).await?;
        }
    }

    Ok(())
}

async fn run(
    command: Commands,
    store: &mut FallbackStore<PgStore>,
    mut state: AppState,
    calendar: &AcademicCalendar,
) -> anyhow::Result<()> {
    flush_notices(&mut state);

    match command {
        Commands::InitDb | Commands::Seed => {
            anyhow::bail!("schema and seed commands run before the dataset is loaded")
        }
        Commands::ImportAttendance { csv } => {
            let file = std::fs::File::open(&csv)
                .with_context(|| format!("failed to open {}", csv.display()))?;
            let records = db::read_attendance_csv(file, &state.dataset)?;
            let count = records.len();
            for record in records {
                store.upsert_attendance(record).await?;
                state = state::reduce(state, Action::AttendanceRecorded(record))?;
            }
            println!("Imported {count} attendance records from {}.", csv.display());
        }
        Commands::Attendance { course, email } => {
            let dataset = &state.dataset;
            let course_filter = course
                .as_deref()
                .map(|code| find_course(dataset, code))
                .transpose()?;
            let student_filter = email
                .as_deref()
                .map(|email| find_student(dataset, email))
                .transpose()?;

            for course in dataset.courses.iter() {
                if course_filter.is_some_and(|wanted| wanted.id != course.id) {
                    continue;
                }
                println!("{} · {}", course.code, course.name);
                for student in dataset.enrolled_students(course.id) {
                    if student_filter.is_some_and(|wanted| wanted.id != student.id) {
                        continue;
                    }
                    let records =
                        attendance::records_for(&dataset.attendance, student.id, Some(course.id));
                    let summary = attendance::summarize(records);
                    if summary.has_data() {
                        println!(
                            "- {} ({}) {}% across {} sessions ({} present, {} late, {} absent)",
                            student.full_name,
                            student.email,
                            summary.percentage,
                            summary.total,
                            summary.present,
                            summary.late,
                            summary.absent
                        );
                    } else {
                        println!("- {} ({}) no attendance recorded", student.full_name, student.email);
                    }
                }
            }
        }
        Commands::MarkAttendance {
            course,
            email,
            date,
            status,
        } => {
            let course = find_course(&state.dataset, &course)?.clone();
            let student = find_student(&state.dataset, &email)?.clone();
            if !calendar.is_class_day(date) || !course.meets_on(date) {
                state = state::reduce(
                    state,
                    Action::Notified(Notice {
                        level: NoticeLevel::Warning,
                        message: format!("{} does not meet on {date}", course.code),
                    }),
                )?;
            }
            let record = AttendanceRecord {
                student_id: student.id,
                course_id: course.id,
                date,
                status,
            };
            store.upsert_attendance(record).await?;
            state = state::reduce(state, Action::AttendanceRecorded(record))?;
            let records = attendance::records_for(&state.dataset.attendance, student.id, Some(course.id));
            println!(
                "{} marked {} on {} in {}; attendance now {}%.",
                student.full_name,
                status.as_str(),
                date,
                course.code,
                attendance::attendance_percentage(records)
            );
            flush_notices(&mut state);
        }
        Commands::Grades { course, json } => {
            let course = find_course(&state.dataset, &course)?;
            let sheet = grades::grade_sheet(course, &state.dataset);
            if json {
                println!("{}", serde_json::to_string_pretty(&sheet)?);
                return Ok(());
            }

            let components = state.dataset.components_for(course.id);
            for corte in Corte::ALL {
                let allocation = grades::check_allocation(&components, corte, 0.0)?;
                if !allocation.complete {
                    println!(
                        "warning: {} allocates {:.1}% of its grade",
                        corte, allocation.total_percent
                    );
                }
            }
            println!("{} · {}", course.code, course.name);
            for row in &sheet {
                println!(
                    "- {}: {} / {} / {} final {}",
                    row.student_name,
                    grades::display_grade(row.cortes[0]),
                    grades::display_grade(row.cortes[1]),
                    grades::display_grade(row.cortes[2]),
                    grades::display_grade(row.final_grade)
                );
            }
        }
        Commands::SetGrade {
            component,
            email,
            value,
        } => {
            let value = GradeValue::try_from(value)?;
            let component = state
                .dataset
                .components
                .iter()
                .find(|item| item.id == component)
                .cloned()
                .with_context(|| format!("unknown grade component {component}"))?;
            let student = find_student(&state.dataset, &email)?.clone();
            let grade = ActivityGrade {
                component_id: component.id,
                student_id: student.id,
                value,
            };
            store.upsert_activity_grade(grade).await?;
            state = state::reduce(state, Action::GradeRecorded(grade))?;

            let components = state.dataset.components_for(component.course_id);
            let cortes = grades::corte_totals(&components, &state.dataset.activity_grades, student.id);
            println!(
                "{} scored {} on {}; {} now {}, running final {}.",
                student.full_name,
                grades::display_grade(value.value()),
                component.name,
                component.corte,
                grades::display_grade(cortes[component.corte.index()]),
                grades::display_grade(grades::final_grade(cortes))
            );
        }
        Commands::AddComponent {
            course,
            name,
            weight,
            corte,
        } => {
            let course = find_course(&state.dataset, &course)?.clone();
            let component = GradeComponent {
                id: Uuid::new_v4(),
                course_id: course.id,
                name,
                weight_percent: weight,
                corte: Corte::try_from(corte)?,
            };
            state = state::reduce(state, Action::ComponentAdded(component.clone()))?;
            store.insert_component(component.clone()).await?;
            println!(
                "Added {} ({}, {:.1}%) to {} as {}.",
                component.name, component.corte, component.weight_percent, course.code, component.id
            );
            flush_notices(&mut state);
        }
        Commands::Risk { course, limit } => {
            let dataset = &state.dataset;
            let courses = selected_courses(dataset, course.as_deref())?;
            let records = risk::rank(
                courses
                    .iter()
                    .flat_map(|course| risk::assess_course(dataset, course))
                    .collect(),
            );

            if records.is_empty() {
                println!("No enrolled students to score.");
                return Ok(());
            }

            println!("Top students by risk score:");
            for record in records.iter().take(limit) {
                let student = dataset.student(record.student_id);
                let course = dataset.course(record.course_id);
                println!(
                    "- {} ({}) in {} score {:.1} [{}]",
                    student.map_or("unknown", |s| s.full_name.as_str()),
                    student.map_or("unknown", |s| s.email.as_str()),
                    course.map_or("unknown", |c| c.code.as_str()),
                    record.total_score,
                    record.level.as_str()
                );
            }
            println!("Resource engagement and assignment completion are not tracked and score 0.");
        }
        Commands::Alerts { course } => {
            let dataset = &state.dataset;
            let mut found = 0usize;
            for course in selected_courses(dataset, course.as_deref())? {
                for alert in alerts::course_alerts(dataset, course) {
                    println!("- {}", alert.message);
                    found += 1;
                }
            }
            if found == 0 {
                println!("No alerts.");
            }
        }
        Commands::Habilitacion { email } => {
            let student = find_student(&state.dataset, &email)?;
            let finals = grades::student_finals(&state.dataset, student.id);
            let candidates = grades::habilitacion_candidates(&finals);
            if candidates.is_empty() {
                println!("{} has no courses eligible for habilitación.", student.full_name);
            } else {
                println!("{} may take a habilitación in:", student.full_name);
                for candidate in candidates {
                    println!(
                        "- {} (final {})",
                        candidate.course_code,
                        grades::display_grade(candidate.final_grade)
                    );
                }
            }
        }
        Commands::Calendar {
            year,
            month,
            course,
        } => {
            let dataset = &state.dataset;
            let courses: Vec<Course> = selected_courses(dataset, course.as_deref())?
                .into_iter()
                .cloned()
                .collect();
            let month_events = events::month_events(calendar, &courses, &dataset.events, year, month)?;
            if month_events.is_empty() {
                println!("Nothing scheduled for {year}-{month:02}.");
            }
            for event in &month_events {
                let span = if event.starts_on == event.ends_on {
                    String::new()
                } else {
                    format!(" (until {})", event.ends_on)
                };
                println!(
                    "{} {} [{}] {}{}",
                    event.starts_on,
                    events::weekday_label(event.starts_on),
                    event.kind.as_str(),
                    event.title,
                    span
                );
            }
        }
        Commands::AddEvent {
            title,
            date,
            until,
            course,
        } => {
            let course_id = course
                .as_deref()
                .map(|code| find_course(&state.dataset, code).map(|course| course.id))
                .transpose()?;
            let event = CalendarEvent {
                key: EventKey::Stored(Uuid::new_v4()),
                title,
                kind: EventKind::Personal,
                starts_on: date,
                ends_on: until.unwrap_or(date),
                course_id,
                source: EventSource::User,
            };
            state = state::reduce(state, Action::EventAdded(event.clone()))?;
            store.insert_event(event.clone()).await?;
            println!("Added '{}' on {}.", event.title, event.starts_on);
            flush_notices(&mut state);
        }
        Commands::Export { course, out } => {
            let course = find_course(&state.dataset, &course)?;
            let sheet = grades::grade_sheet(course, &state.dataset);
            let file = std::fs::File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            export::write_grade_sheet(file, &sheet)?;
            println!("Exported {} rows to {}.", sheet.len(), out.display());
        }
        Commands::Report { course, date, out } => {
            let course = find_course(&state.dataset, &course)?;
            let today = date.unwrap_or_else(|| Utc::now().date_naive());
            let report = report::build_report(&state.dataset, calendar, course, today);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn flush_notices(state: &mut AppState) {
    for notice in state.notices.drain(..) {
        match notice.level {
            NoticeLevel::Info => println!("note: {}", notice.message),
            NoticeLevel::Warning => println!("warning: {}", notice.message),
        }
    }
}

fn require_pool(connection: Option<Result<PgPool, sqlx::Error>>) -> anyhow::Result<PgPool> {
    let pool = connection
        .context("DATABASE_URL must be set")?
        .context("failed to connect to Postgres")?;
    Ok(pool)
}

fn find_course<'a>(dataset: &'a Dataset, code: &str) -> anyhow::Result<&'a Course> {
    dataset
        .course_by_code(code)
        .with_context(|| format!("unknown course {code}"))
}

fn find_student<'a>(dataset: &'a Dataset, email: &str) -> anyhow::Result<&'a Student> {
    dataset
        .student_by_email(email)
        .with_context(|| format!("unknown student {email}"))
}

fn selected_courses<'a>(dataset: &'a Dataset, code: Option<&str>) -> anyhow::Result<Vec<&'a Course>> {
    match code {
        Some(code) => Ok(vec![find_course(dataset, code)?]),
        None => Ok(dataset.courses.iter().collect()),
    }
}
