use std::collections::HashSet;

use chrono::{Datelike, NaiveDate};

use crate::calendar::AcademicCalendar;
use crate::error::ValidationError;
use crate::models::{CalendarEvent, Course, EventKey, EventKind, EventSource};

/// First and last day of a month.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), ValidationError> {
    let invalid = ValidationError::InvalidMonth { year, month };
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| invalid.clone())?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    let last = next.and_then(|date| date.pred_opt()).ok_or(invalid)?;
    Ok((first, last))
}

/// One class event per course per day it meets in the month, skipping days
/// outside the class period, holidays and recesses.
pub fn class_sessions(
    calendar: &AcademicCalendar,
    courses: &[Course],
    year: i32,
    month: u32,
) -> Result<Vec<CalendarEvent>, ValidationError> {
    let (first, last) = month_bounds(year, month)?;
    let mut listed = HashSet::new();
    let courses: Vec<&Course> = courses.iter().filter(|course| listed.insert(course.id)).collect();
    let mut events = Vec::new();

    for date in first.iter_days().take_while(|date| *date <= last) {
        if !calendar.is_class_day(date) {
            continue;
        }
        for course in courses.iter().filter(|course| course.meets_on(date)) {
            events.push(CalendarEvent {
                key: EventKey::Class {
                    course_id: course.id,
                    date,
                },
                title: format!("{} · {}", course.code, course.name),
                kind: EventKind::Class,
                starts_on: date,
                ends_on: date,
                course_id: Some(course.id),
                source: EventSource::Generated,
            });
        }
    }

    Ok(events)
}

pub fn institutional_events(
    calendar: &AcademicCalendar,
    year: i32,
    month: u32,
) -> Result<Vec<CalendarEvent>, ValidationError> {
    let (first, last) = month_bounds(year, month)?;
    Ok(calendar
        .entries_overlapping(first, last)
        .into_iter()
        .map(|entry| CalendarEvent {
            key: EventKey::Institutional(entry.key.clone()),
            title: entry.title.clone(),
            kind: entry.kind,
            starts_on: entry.range.start,
            ends_on: entry.range.end,
            course_id: None,
            source: EventSource::Institutional,
        })
        .collect())
}

/// Stored events win over derived ones; within either list the first event
/// with a given key is kept and later ones are dropped.
pub fn merge_events(stored: &[CalendarEvent], derived: Vec<CalendarEvent>) -> Vec<CalendarEvent> {
    let mut seen: HashSet<EventKey> = HashSet::new();
    let mut merged = Vec::new();

    for event in stored.iter().cloned().chain(derived) {
        if seen.insert(event.key.clone()) {
            merged.push(event);
        }
    }

    merged.sort_by(|a, b| {
        a.starts_on
            .cmp(&b.starts_on)
            .then(a.kind.cmp(&b.kind))
            .then_with(|| a.title.cmp(&b.title))
    });
    merged
}

/// Every event to show for a month: stored events overlapping it, class
/// sessions and institutional dates.
pub fn month_events(
    calendar: &AcademicCalendar,
    courses: &[Course],
    stored: &[CalendarEvent],
    year: i32,
    month: u32,
) -> Result<Vec<CalendarEvent>, ValidationError> {
    let (first, last) = month_bounds(year, month)?;
    let in_month: Vec<CalendarEvent> = stored
        .iter()
        .filter(|event| event.starts_on <= last && event.ends_on >= first)
        .cloned()
        .collect();

    let mut derived = class_sessions(calendar, courses, year, month)?;
    derived.extend(institutional_events(calendar, year, month)?);
    Ok(merge_events(&in_month, derived))
}

/// Upcoming institutional dates from `today`, soonest first.
pub fn upcoming_institutional(
    calendar: &AcademicCalendar,
    today: NaiveDate,
    limit: usize,
) -> Vec<CalendarEvent> {
    let mut entries: Vec<_> = calendar
        .entries
        .iter()
        .filter(|entry| entry.kind != EventKind::Corte && entry.range.end >= today)
        .collect();
    entries.sort_by_key(|entry| entry.range.start);
    entries
        .into_iter()
        .take(limit)
        .map(|entry| CalendarEvent {
            key: EventKey::Institutional(entry.key.clone()),
            title: entry.title.clone(),
            kind: entry.kind,
            starts_on: entry.range.start,
            ends_on: entry.range.end,
            course_id: None,
            source: EventSource::Institutional,
        })
        .collect()
}

pub fn weekday_label(date: NaiveDate) -> &'static str {
    match date.weekday() {
        chrono::Weekday::Mon => "lun",
        chrono::Weekday::Tue => "mar",
        chrono::Weekday::Wed => "mié",
        chrono::Weekday::Thu => "jue",
        chrono::Weekday::Fri => "vie",
        chrono::Weekday::Sat => "sáb",
        chrono::Weekday::Sun => "dom",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{DateRange, InstitutionalDate};
    use chrono::Weekday;
    use uuid::Uuid;

    fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn monday_course() -> Course {
        Course {
            id: Uuid::new_v4(),
            code: "MAT101".to_string(),
            name: "Calculus".to_string(),
            weekdays: vec![Weekday::Mon],
            starts_on: ymd(2026, 2, 2),
            ends_on: ymd(2026, 5, 30),
        }
    }

    fn calendar_with_february_recess() -> AcademicCalendar {
        let mut calendar = AcademicCalendar::semester_2026_1().unwrap();
        calendar.entries.push(InstitutionalDate {
            key: "recess-carnival".to_string(),
            title: "Receso de carnaval".to_string(),
            kind: EventKind::Recess,
            range: DateRange::new(ymd(2026, 2, 16), ymd(2026, 2, 17)).unwrap(),
        });
        calendar
    }

    #[test]
    fn month_bounds_handle_december_and_leap_years() {
        assert_eq!(month_bounds(2026, 12).unwrap(), (ymd(2026, 12, 1), ymd(2026, 12, 31)));
        assert_eq!(month_bounds(2028, 2).unwrap().1, ymd(2028, 2, 29));
        assert_eq!(
            month_bounds(2026, 13),
            Err(ValidationError::InvalidMonth {
                year: 2026,
                month: 13
            })
        );
    }

    #[test]
    fn february_mondays_skip_recess() {
        let calendar = calendar_with_february_recess();
        let course = monday_course();
        let events = class_sessions(&calendar, &[course.clone()], 2026, 2).unwrap();
        let dates: Vec<NaiveDate> = events.iter().map(|event| event.starts_on).collect();
        assert_eq!(dates, vec![ymd(2026, 2, 2), ymd(2026, 2, 9), ymd(2026, 2, 23)]);
        assert!(events.iter().all(|event| event.course_id == Some(course.id)));

        let unique: HashSet<&EventKey> = events.iter().map(|event| &event.key).collect();
        assert_eq!(unique.len(), events.len());
    }

    #[test]
    fn holidays_drop_sessions() {
        let calendar = AcademicCalendar::semester_2026_1().unwrap();
        let events = class_sessions(&calendar, &[monday_course()], 2026, 3).unwrap();
        let dates: Vec<NaiveDate> = events.iter().map(|event| event.starts_on).collect();
        // 23rd is San José, 30th falls in Holy Week recess.
        assert_eq!(dates, vec![ymd(2026, 3, 2), ymd(2026, 3, 9), ymd(2026, 3, 16)]);
    }

    #[test]
    fn nothing_outside_the_class_period() {
        let calendar = AcademicCalendar::semester_2026_1().unwrap();
        let events = class_sessions(&calendar, &[monday_course()], 2026, 7).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn institutional_events_overlap_month() {
        let calendar = AcademicCalendar::semester_2026_1().unwrap();
        let events = institutional_events(&calendar, 2026, 4).unwrap();
        assert!(events
            .iter()
            .any(|event| event.key == EventKey::Institutional("recess-holy-week".to_string())));
        assert!(events.iter().all(|event| event.source == EventSource::Institutional));
    }

    #[test]
    fn stored_generated_sessions_are_not_duplicated() {
        let calendar = AcademicCalendar::semester_2026_1().unwrap();
        let course = monday_course();
        let persisted = CalendarEvent {
            key: EventKey::Class {
                course_id: course.id,
                date: ymd(2026, 2, 9),
            },
            title: "MAT101 · Calculus".to_string(),
            kind: EventKind::Class,
            starts_on: ymd(2026, 2, 9),
            ends_on: ymd(2026, 2, 9),
            course_id: Some(course.id),
            source: EventSource::Generated,
        };
        let personal = CalendarEvent {
            key: EventKey::Stored(Uuid::new_v4()),
            title: "Study group".to_string(),
            kind: EventKind::Personal,
            starts_on: ymd(2026, 2, 9),
            ends_on: ymd(2026, 2, 9),
            course_id: None,
            source: EventSource::User,
        };
        let events = month_events(
            &calendar,
            &[course.clone()],
            &[persisted, personal],
            2026,
            2,
        )
        .unwrap();

        let on_ninth: Vec<&CalendarEvent> = events
            .iter()
            .filter(|event| event.kind == EventKind::Class && event.starts_on == ymd(2026, 2, 9))
            .collect();
        assert_eq!(on_ninth.len(), 1);
        assert!(events.iter().any(|event| event.kind == EventKind::Personal));

        for pair in events.windows(2) {
            assert!(pair[0].starts_on <= pair[1].starts_on);
        }
    }

    #[test]
    fn double_persisted_session_shows_once() {
        let calendar = AcademicCalendar::semester_2026_1().unwrap();
        let course = monday_course();
        let persisted = CalendarEvent {
            key: EventKey::Class {
                course_id: course.id,
                date: ymd(2026, 2, 9),
            },
            title: "MAT101 · Calculus".to_string(),
            kind: EventKind::Class,
            starts_on: ymd(2026, 2, 9),
            ends_on: ymd(2026, 2, 9),
            course_id: Some(course.id),
            source: EventSource::Generated,
        };
        let events = month_events(
            &calendar,
            &[course.clone()],
            &[persisted.clone(), persisted],
            2026,
            2,
        )
        .unwrap();

        let on_ninth = events
            .iter()
            .filter(|event| event.kind == EventKind::Class && event.starts_on == ymd(2026, 2, 9))
            .count();
        assert_eq!(on_ninth, 1);
    }

    #[test]
    fn course_listed_twice_gets_one_session_per_day() {
        let calendar = AcademicCalendar::semester_2026_1().unwrap();
        let course = monday_course();
        let events = class_sessions(&calendar, &[course.clone(), course], 2026, 2).unwrap();
        let dates: Vec<NaiveDate> = events.iter().map(|event| event.starts_on).collect();
        assert_eq!(
            dates,
            vec![ymd(2026, 2, 2), ymd(2026, 2, 9), ymd(2026, 2, 16), ymd(2026, 2, 23)]
        );
    }

    #[test]
    fn upcoming_skips_past_and_corte_entries() {
        let calendar = AcademicCalendar::semester_2026_1().unwrap();
        let upcoming = upcoming_institutional(&calendar, ymd(2026, 5, 20), 3);
        assert_eq!(upcoming.len(), 3);
        assert!(upcoming.iter().all(|event| event.kind != EventKind::Corte));
        assert!(upcoming.iter().all(|event| event.ends_on >= ymd(2026, 5, 20)));
        assert_eq!(weekday_label(ymd(2026, 2, 2)), "lun");
    }
}
