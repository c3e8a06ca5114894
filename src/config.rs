use std::path::PathBuf;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::calendar::AcademicCalendar;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub database_url: Option<String>,
    pub log_json: bool,
    pub calendar_path: Option<PathBuf>,
}

impl Config {
    /// Reads `DATABASE_URL`, `ACADEMIC_LOG_JSON` and `ACADEMIC_CALENDAR_PATH`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Self {
            database_url: non_empty("DATABASE_URL"),
            log_json: non_empty("ACADEMIC_LOG_JSON")
                .map(|value| matches!(value.trim(), "1" | "true" | "yes" | "on"))
                .unwrap_or(false),
            calendar_path: non_empty("ACADEMIC_CALENDAR_PATH").map(PathBuf::from),
        }
    }

    pub fn calendar(&self) -> anyhow::Result<AcademicCalendar> {
        match &self.calendar_path {
            Some(path) => AcademicCalendar::from_json_file(path),
            None => AcademicCalendar::semester_2026_1(),
        }
    }
}

/// Logs go to stderr so command output on stdout stays clean.
pub fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
