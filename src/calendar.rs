//! Institutional calendar for one semester: class period, corte periods,
//! exam windows, grade-upload deadlines, recesses and national holidays.
//!
//! The built-in table covers 2026-1. A different semester can be loaded from
//! a JSON file with the same shape (see [`AcademicCalendar::from_json_file`]).

use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::models::{Corte, EventKind};

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDateRange")]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Deserialize)]
struct RawDateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<RawDateRange> for DateRange {
    type Error = ValidationError;

    fn try_from(raw: RawDateRange) -> Result<Self, Self::Error> {
        DateRange::new(raw.start, raw.end)
    }
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ValidationError> {
        if end < start {
            return Err(ValidationError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start <= end && self.end >= start
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstitutionalDate {
    pub key: String,
    pub title: String,
    pub kind: EventKind,
    pub range: DateRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcademicCalendar {
    pub semester: String,
    pub class_period: DateRange,
    pub cortes: [DateRange; 3],
    pub entries: Vec<InstitutionalDate>,
}

fn date(year: i32, month: u32, day: u32) -> anyhow::Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
        .with_context(|| format!("invalid calendar date {year}-{month:02}-{day:02}"))
}

fn span(start: (u32, u32), end: (u32, u32)) -> anyhow::Result<DateRange> {
    let range = DateRange::new(date(2026, start.0, start.1)?, date(2026, end.0, end.1)?)?;
    Ok(range)
}

impl AcademicCalendar {
    pub fn semester_2026_1() -> anyhow::Result<Self> {
        let cortes = [
            span((2, 2), (3, 14))?,
            span((3, 16), (4, 25))?,
            span((4, 27), (5, 30))?,
        ];

        let table: [(&str, &str, EventKind, (u32, u32), (u32, u32)); 17] = [
            ("exam-c1", "Parciales primer corte", EventKind::Exam, (3, 9), (3, 14)),
            ("exam-c2", "Parciales segundo corte", EventKind::Exam, (4, 20), (4, 25)),
            ("exam-final", "Exámenes finales", EventKind::Exam, (5, 25), (5, 30)),
            ("grades-c1", "Cierre de notas primer corte", EventKind::GradeDeadline, (3, 18), (3, 18)),
            ("grades-c2", "Cierre de notas segundo corte", EventKind::GradeDeadline, (4, 29), (4, 29)),
            ("grades-c3", "Cierre de notas tercer corte", EventKind::GradeDeadline, (6, 3), (6, 3)),
            ("habilitaciones", "Habilitaciones", EventKind::Habilitacion, (6, 9), (6, 12)),
            ("recess-holy-week", "Receso de Semana Santa", EventKind::Recess, (3, 30), (4, 4)),
            ("holiday-reyes", "Día de los Reyes Magos", EventKind::Holiday, (1, 12), (1, 12)),
            ("holiday-san-jose", "Día de San José", EventKind::Holiday, (3, 23), (3, 23)),
            ("holiday-jueves-santo", "Jueves Santo", EventKind::Holiday, (4, 2), (4, 2)),
            ("holiday-viernes-santo", "Viernes Santo", EventKind::Holiday, (4, 3), (4, 3)),
            ("holiday-trabajo", "Día del Trabajo", EventKind::Holiday, (5, 1), (5, 1)),
            ("holiday-ascension", "Día de la Ascensión", EventKind::Holiday, (5, 18), (5, 18)),
            ("holiday-corpus", "Corpus Christi", EventKind::Holiday, (6, 8), (6, 8)),
            ("holiday-sagrado-corazon", "Sagrado Corazón", EventKind::Holiday, (6, 15), (6, 15)),
            ("holiday-san-pedro", "San Pedro y San Pablo", EventKind::Holiday, (6, 29), (6, 29)),
        ];

        let mut entries = Vec::with_capacity(table.len() + cortes.len());
        for (corte, range) in Corte::ALL.iter().zip(cortes.iter()) {
            entries.push(InstitutionalDate {
                key: format!("corte-{}", corte.number()),
                title: format!("Periodo de {corte}"),
                kind: EventKind::Corte,
                range: *range,
            });
        }
        for (key, title, kind, start, end) in table {
            entries.push(InstitutionalDate {
                key: key.to_string(),
                title: title.to_string(),
                kind,
                range: span(start, end)?,
            });
        }

        Ok(Self {
            semester: "2026-1".to_string(),
            class_period: span((2, 2), (5, 30))?,
            cortes,
            entries,
        })
    }

    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read calendar file {}", path.display()))?;
        let calendar: AcademicCalendar = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse calendar file {}", path.display()))?;
        Ok(calendar)
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.kind == EventKind::Holiday && entry.range.contains(date))
    }

    pub fn in_recess(&self, date: NaiveDate) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.kind == EventKind::Recess && entry.range.contains(date))
    }

    /// Whether classes can be held on `date` at all, independent of any
    /// course schedule.
    pub fn is_class_day(&self, date: NaiveDate) -> bool {
        self.class_period.contains(date) && !self.is_holiday(date) && !self.in_recess(date)
    }

    pub fn corte_for(&self, date: NaiveDate) -> Option<Corte> {
        Corte::ALL
            .into_iter()
            .find(|corte| self.cortes[corte.index()].contains(date))
    }

    pub fn entries_overlapping(&self, start: NaiveDate, end: NaiveDate) -> Vec<&InstitutionalDate> {
        self.entries
            .iter()
            .filter(|entry| entry.range.overlaps(start, end))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn builtin_semester_is_consistent() {
        let calendar = AcademicCalendar::semester_2026_1().unwrap();
        assert_eq!(calendar.class_period.start, calendar.cortes[0].start);
        assert_eq!(calendar.class_period.end, calendar.cortes[2].end);
        for pair in calendar.cortes.windows(2) {
            assert!(pair[0].end < pair[1].start);
        }
    }

    #[test]
    fn holidays_and_recesses_are_not_class_days() {
        let calendar = AcademicCalendar::semester_2026_1().unwrap();
        assert!(calendar.is_holiday(ymd(2026, 3, 23)));
        assert!(!calendar.is_class_day(ymd(2026, 3, 23)));
        assert!(calendar.in_recess(ymd(2026, 3, 31)));
        assert!(!calendar.is_class_day(ymd(2026, 3, 31)));
        assert!(calendar.is_class_day(ymd(2026, 2, 9)));
        assert!(!calendar.is_class_day(ymd(2026, 6, 1)));
    }

    #[test]
    fn corte_lookup_follows_periods() {
        let calendar = AcademicCalendar::semester_2026_1().unwrap();
        assert_eq!(calendar.corte_for(ymd(2026, 2, 2)), Some(Corte::First));
        assert_eq!(calendar.corte_for(ymd(2026, 4, 1)), Some(Corte::Second));
        assert_eq!(calendar.corte_for(ymd(2026, 5, 30)), Some(Corte::Third));
        assert_eq!(calendar.corte_for(ymd(2026, 3, 15)), None);
    }

    #[test]
    fn overlapping_entries_include_ranges_crossing_month_edges() {
        let calendar = AcademicCalendar::semester_2026_1().unwrap();
        let april = calendar.entries_overlapping(ymd(2026, 4, 1), ymd(2026, 4, 30));
        assert!(april.iter().any(|entry| entry.key == "recess-holy-week"));
        assert!(april.iter().any(|entry| entry.key == "corte-3"));
        assert!(!april.iter().any(|entry| entry.key == "holiday-trabajo"));
    }

    #[test]
    fn rejects_inverted_range() {
        assert!(DateRange::new(ymd(2026, 2, 2), ymd(2026, 2, 1)).is_err());
    }

    #[test]
    fn calendar_roundtrips_through_json_file() {
        let calendar = AcademicCalendar::semester_2026_1().unwrap();
        let path = std::env::temp_dir().join(format!("calendar-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, serde_json::to_string(&calendar).unwrap()).unwrap();
        let loaded = AcademicCalendar::from_json_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, calendar);
    }

    #[test]
    fn calendar_file_with_inverted_range_is_rejected() {
        let mut raw = serde_json::to_value(AcademicCalendar::semester_2026_1().unwrap()).unwrap();
        raw["class_period"] = serde_json::json!({ "start": "2026-05-30", "end": "2026-02-02" });
        let path = std::env::temp_dir().join(format!("calendar-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, raw.to_string()).unwrap();
        let result = AcademicCalendar::from_json_file(&path);
        std::fs::remove_file(&path).ok();

        let err = format!("{:#}", result.unwrap_err());
        assert!(err.contains("2026-05-30"), "{err}");
    }
}
