//! Application state container. Every change goes through [`reduce`], which
//! returns the next state or rejects the action without touching anything.

use crate::error::ValidationError;
use crate::grades;
use crate::models::{ActivityGrade, AttendanceRecord, CalendarEvent, Dataset, GradeComponent};
use crate::store::{self, DataOrigin};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub dataset: Dataset,
    pub origin: DataOrigin,
    pub notices: Vec<Notice>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            dataset: Dataset::default(),
            origin: DataOrigin::Fallback,
            notices: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Action {
    DatasetLoaded { dataset: Dataset, origin: DataOrigin },
    GradeRecorded(ActivityGrade),
    AttendanceRecorded(AttendanceRecord),
    ComponentAdded(GradeComponent),
    EventAdded(CalendarEvent),
    Notified(Notice),
}

pub fn reduce(mut state: AppState, action: Action) -> Result<AppState, ValidationError> {
    match action {
        Action::DatasetLoaded { dataset, origin } => {
            if origin == DataOrigin::Fallback {
                state.notices.push(Notice {
                    level: NoticeLevel::Warning,
                    message: "Backend unavailable: showing the built-in sample data".to_string(),
                });
            }
            state.dataset = dataset;
            state.origin = origin;
        }
        Action::GradeRecorded(grade) => {
            store::upsert_grade(&mut state.dataset.activity_grades, grade);
        }
        Action::AttendanceRecorded(record) => {
            store::upsert_record(&mut state.dataset.attendance, record);
        }
        Action::ComponentAdded(component) => {
            let existing = state.dataset.components_for(component.course_id);
            let allocation =
                grades::check_allocation(&existing, component.corte, component.weight_percent)?;
            if !allocation.complete {
                state.notices.push(Notice {
                    level: NoticeLevel::Info,
                    message: format!(
                        "{} now allocates {:.1}% of its grade",
                        component.corte, allocation.total_percent
                    ),
                });
            }
            state.dataset.components.push(component);
        }
        Action::EventAdded(event) => {
            if event.ends_on < event.starts_on {
                return Err(ValidationError::InvalidRange {
                    start: event.starts_on,
                    end: event.ends_on,
                });
            }
            state.dataset.events.push(event);
        }
        Action::Notified(notice) => state.notices.push(notice),
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Corte, EventKey, EventKind, EventSource, GradeValue};
    use crate::store::default_dataset;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn loaded(origin: DataOrigin) -> AppState {
        reduce(
            AppState::default(),
            Action::DatasetLoaded {
                dataset: default_dataset().unwrap(),
                origin,
            },
        )
        .unwrap()
    }

    #[test]
    fn fallback_load_leaves_a_warning() {
        let state = loaded(DataOrigin::Fallback);
        assert_eq!(state.notices.len(), 1);
        assert_eq!(state.notices[0].level, NoticeLevel::Warning);
        assert!(loaded(DataOrigin::Backend).notices.is_empty());
    }

    #[test]
    fn recording_a_grade_twice_keeps_latest() {
        let state = loaded(DataOrigin::Backend);
        let first = state.dataset.activity_grades[0];
        let count = state.dataset.activity_grades.len();
        let next = ActivityGrade {
            value: GradeValue::try_from(2.0).unwrap(),
            ..first
        };
        let state = reduce(state, Action::GradeRecorded(next)).unwrap();
        assert_eq!(state.dataset.activity_grades.len(), count);
        assert_eq!(state.dataset.activity_grades[0].value, next.value);
    }

    #[test]
    fn over_allocated_component_is_rejected() {
        let state = loaded(DataOrigin::Backend);
        let course_id = state.dataset.courses[0].id;
        let component = GradeComponent {
            id: Uuid::new_v4(),
            course_id,
            name: "Extra quiz".to_string(),
            weight_percent: 10.0,
            corte: Corte::First,
        };
        let before = state.dataset.components.len();
        let err = reduce(state.clone(), Action::ComponentAdded(component)).unwrap_err();
        assert!(matches!(err, ValidationError::AllocationExceeded { corte: 1, .. }));
        assert_eq!(state.dataset.components.len(), before);
    }

    #[test]
    fn partial_allocation_is_accepted_with_notice() {
        let state = reduce(
            AppState::default(),
            Action::ComponentAdded(GradeComponent {
                id: Uuid::new_v4(),
                course_id: Uuid::new_v4(),
                name: "Quiz".to_string(),
                weight_percent: 30.0,
                corte: Corte::Second,
            }),
        )
        .unwrap();
        assert_eq!(state.dataset.components.len(), 1);
        assert_eq!(state.notices[0].level, NoticeLevel::Info);
    }

    #[test]
    fn notices_queue_without_touching_data() {
        let state = loaded(DataOrigin::Backend);
        let dataset = state.dataset.clone();
        let notice = Notice {
            level: NoticeLevel::Warning,
            message: "MAT101 does not meet on 2026-02-10".to_string(),
        };
        let state = reduce(state, Action::Notified(notice.clone())).unwrap();
        assert_eq!(state.notices, vec![notice]);
        assert_eq!(state.dataset, dataset);
    }

    #[test]
    fn inverted_event_is_rejected() {
        let day = |d| NaiveDate::from_ymd_opt(2026, 3, d).unwrap();
        let event = CalendarEvent {
            key: EventKey::Stored(Uuid::new_v4()),
            title: "Review".to_string(),
            kind: EventKind::Personal,
            starts_on: day(10),
            ends_on: day(9),
            course_id: None,
            source: EventSource::User,
        };
        assert!(reduce(AppState::default(), Action::EventAdded(event)).is_err());
    }
}
