use std::fmt;

/// Input rejected at the boundary. Nothing is written when one of these is
/// returned.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    GradeOutOfRange(f64),
    WeightOutOfRange(f64),
    AllocationExceeded { corte: u8, total: f64 },
    UnknownCorte(i64),
    UnknownStatus(String),
    UnknownWeekday(String),
    UnknownEventKind(String),
    UnknownEventSource(String),
    InvalidMonth { year: i32, month: u32 },
    InvalidRange { start: chrono::NaiveDate, end: chrono::NaiveDate },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::GradeOutOfRange(value) => {
                write!(f, "grade {value} is outside the 0.0-5.0 scale")
            }
            ValidationError::WeightOutOfRange(value) => {
                write!(f, "weight {value}% is outside 0-100")
            }
            ValidationError::AllocationExceeded { corte, total } => write!(
                f,
                "corte {corte} would allocate {total:.1}% of the grade, more than 100%"
            ),
            ValidationError::UnknownCorte(value) => {
                write!(f, "corte must be 1, 2 or 3 (got {value})")
            }
            ValidationError::UnknownStatus(value) => {
                write!(f, "unknown attendance status '{value}'")
            }
            ValidationError::UnknownWeekday(value) => write!(f, "unknown weekday '{value}'"),
            ValidationError::UnknownEventKind(value) => {
                write!(f, "unknown event kind '{value}'")
            }
            ValidationError::UnknownEventSource(value) => {
                write!(f, "unknown event source '{value}'")
            }
            ValidationError::InvalidMonth { year, month } => {
                write!(f, "{year}-{month:02} is not a valid month")
            }
            ValidationError::InvalidRange { start, end } => {
                write!(f, "range {start}..{end} ends before it starts")
            }
        }
    }
}

impl std::error::Error for ValidationError {}
