use serde::Serialize;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::models::{ActivityGrade, Corte, Course, Dataset, GradeComponent};

/// Lowest final grade that still qualifies for a habilitación.
pub const HABILITACION_MIN: f64 = 2.0;
/// Passing grade.
pub const PASSING_GRADE: f64 = 3.0;
pub const MAX_HABILITACIONES: usize = 2;

/// Weighted total for one corte.
///
/// Only graded components contribute; an ungraded component adds nothing but
/// its weight is still part of the corte, so a partially graded corte reads
/// lower than the student's eventual result.
pub fn corte_total(
    components: &[GradeComponent],
    grades: &[ActivityGrade],
    student_id: Uuid,
    corte: Corte,
) -> f64 {
    components
        .iter()
        .filter(|component| component.corte == corte)
        .filter_map(|component| {
            grades
                .iter()
                .find(|grade| grade.component_id == component.id && grade.student_id == student_id)
                .map(|grade| grade.value.value() * component.weight_percent / 100.0)
        })
        .sum()
}

pub fn corte_totals(
    components: &[GradeComponent],
    grades: &[ActivityGrade],
    student_id: Uuid,
) -> [f64; 3] {
    Corte::ALL.map(|corte| corte_total(components, grades, student_id, corte))
}

pub fn final_grade(cortes: [f64; 3]) -> f64 {
    Corte::ALL
        .iter()
        .map(|corte| cortes[corte.index()] * corte.weight())
        .sum()
}

pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn display_grade(value: f64) -> String {
    format!("{:.1}", round_one_decimal(value))
}

/// Mean of the recorded activity grades of a student among `components`.
pub fn average_grade(
    components: &[GradeComponent],
    grades: &[ActivityGrade],
    student_id: Uuid,
) -> Option<f64> {
    let values: Vec<f64> = grades
        .iter()
        .filter(|grade| grade.student_id == student_id)
        .filter(|grade| components.iter().any(|c| c.id == grade.component_id))
        .map(|grade| grade.value.value())
        .collect();

    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeSheetRow {
    pub student_id: Uuid,
    pub student_name: String,
    pub cortes: [f64; 3],
    pub final_grade: f64,
}

/// One row per enrolled student, sorted by name.
pub fn grade_sheet(course: &Course, dataset: &Dataset) -> Vec<GradeSheetRow> {
    let components = dataset.components_for(course.id);
    dataset
        .enrolled_students(course.id)
        .into_iter()
        .map(|student| {
            let cortes = corte_totals(&components, &dataset.activity_grades, student.id);
            GradeSheetRow {
                student_id: student.id,
                student_name: student.full_name.clone(),
                cortes,
                final_grade: final_grade(cortes),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeightAllocation {
    pub corte: Corte,
    pub total_percent: f64,
    pub complete: bool,
}

/// Total weight of a corte once `extra_weight` is added. Over-allocation is
/// rejected; an allocation below 100 is allowed and reported incomplete.
pub fn check_allocation(
    components: &[GradeComponent],
    corte: Corte,
    extra_weight: f64,
) -> Result<WeightAllocation, ValidationError> {
    if !extra_weight.is_finite() || !(0.0..=100.0).contains(&extra_weight) {
        return Err(ValidationError::WeightOutOfRange(extra_weight));
    }

    let total: f64 = components
        .iter()
        .filter(|component| component.corte == corte)
        .map(|component| component.weight_percent)
        .sum::<f64>()
        + extra_weight;

    if total > 100.0 + 1e-9 {
        return Err(ValidationError::AllocationExceeded {
            corte: corte.number(),
            total,
        });
    }

    Ok(WeightAllocation {
        corte,
        total_percent: total,
        complete: (total - 100.0).abs() < 1e-9,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseFinal {
    pub course_id: Uuid,
    pub course_code: String,
    pub final_grade: f64,
}

/// Courses a student may sit a habilitación for: final in [2.0, 3.0), at
/// most two, closest to passing first.
pub fn habilitacion_candidates(finals: &[CourseFinal]) -> Vec<CourseFinal> {
    let mut eligible: Vec<CourseFinal> = finals
        .iter()
        .filter(|item| item.final_grade >= HABILITACION_MIN && item.final_grade < PASSING_GRADE)
        .cloned()
        .collect();
    eligible.sort_by(|a, b| {
        b.final_grade
            .partial_cmp(&a.final_grade)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    eligible.truncate(MAX_HABILITACIONES);
    eligible
}

/// Final grade per enrolled course for one student.
pub fn student_finals(dataset: &Dataset, student_id: Uuid) -> Vec<CourseFinal> {
    dataset
        .enrollments
        .iter()
        .filter(|enrollment| enrollment.student_id == student_id)
        .filter_map(|enrollment| dataset.course(enrollment.course_id))
        .map(|course| {
            let components = dataset.components_for(course.id);
            let cortes = corte_totals(&components, &dataset.activity_grades, student_id);
            CourseFinal {
                course_id: course.id,
                course_code: course.code.clone(),
                final_grade: final_grade(cortes),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GradeValue;

    fn component(corte: Corte, weight: f64) -> GradeComponent {
        GradeComponent {
            id: Uuid::new_v4(),
            course_id: Uuid::nil(),
            name: format!("{corte} {weight}%"),
            weight_percent: weight,
            corte,
        }
    }

    fn grade(component: &GradeComponent, student_id: Uuid, value: f64) -> ActivityGrade {
        ActivityGrade {
            component_id: component.id,
            student_id,
            value: GradeValue::try_from(value).unwrap(),
        }
    }

    #[test]
    fn final_grade_weights_cortes_30_30_40() {
        let value = final_grade([4.0, 3.0, 5.0]);
        assert!((value - 4.1).abs() < 1e-9);
        assert_eq!(display_grade(value), "4.1");
    }

    #[test]
    fn corte_total_weights_components() {
        let student = Uuid::new_v4();
        let quiz = component(Corte::First, 40.0);
        let exam = component(Corte::First, 60.0);
        let later = component(Corte::Second, 100.0);
        let grades = vec![
            grade(&quiz, student, 4.0),
            grade(&exam, student, 3.0),
            grade(&later, student, 5.0),
        ];
        let components = vec![quiz, exam, later];
        let total = corte_total(&components, &grades, student, Corte::First);
        assert!((total - 3.4).abs() < 1e-9);
        let totals = corte_totals(&components, &grades, student);
        assert!((totals[1] - 5.0).abs() < 1e-9);
        assert_eq!(totals[2], 0.0);
    }

    #[test]
    fn partial_grading_understates_running_total() {
        let student = Uuid::new_v4();
        let graded = component(Corte::First, 50.0);
        let pending = component(Corte::First, 50.0);
        let grades = vec![grade(&graded, student, 5.0)];
        let components = vec![graded, pending];
        let total = corte_total(&components, &grades, student, Corte::First);
        assert!((total - 2.5).abs() < 1e-9);
    }

    #[test]
    fn grades_of_other_students_are_ignored() {
        let student = Uuid::new_v4();
        let quiz = component(Corte::Third, 100.0);
        let grades = vec![grade(&quiz, Uuid::new_v4(), 5.0)];
        let components = vec![quiz];
        assert_eq!(corte_total(&components, &grades, student, Corte::Third), 0.0);
        assert_eq!(average_grade(&components, &grades, student), None);
    }

    #[test]
    fn average_uses_recorded_grades_only() {
        let student = Uuid::new_v4();
        let a = component(Corte::First, 50.0);
        let b = component(Corte::Second, 50.0);
        let c = component(Corte::Third, 50.0);
        let grades = vec![grade(&a, student, 2.0), grade(&b, student, 4.0)];
        let components = vec![a, b, c];
        assert_eq!(average_grade(&components, &grades, student), Some(3.0));
    }

    #[test]
    fn allocation_over_100_is_rejected() {
        let components = vec![component(Corte::First, 60.0), component(Corte::Second, 90.0)];
        let partial = check_allocation(&components, Corte::First, 30.0).unwrap();
        assert!(!partial.complete);
        assert!((partial.total_percent - 90.0).abs() < 1e-9);
        let full = check_allocation(&components, Corte::First, 40.0).unwrap();
        assert!(full.complete);
        assert!(matches!(
            check_allocation(&components, Corte::First, 41.0),
            Err(ValidationError::AllocationExceeded { corte: 1, .. })
        ));
        assert_eq!(
            check_allocation(&components, Corte::Third, -5.0),
            Err(ValidationError::WeightOutOfRange(-5.0))
        );
    }

    #[test]
    fn habilitacion_keeps_two_closest_to_passing() {
        let finals: Vec<CourseFinal> = [("A", 2.9), ("B", 1.9), ("C", 2.0), ("D", 2.5), ("E", 3.0)]
            .into_iter()
            .map(|(code, final_grade)| CourseFinal {
                course_id: Uuid::new_v4(),
                course_code: code.to_string(),
                final_grade,
            })
            .collect();
        let picked = habilitacion_candidates(&finals);
        let codes: Vec<&str> = picked.iter().map(|item| item.course_code.as_str()).collect();
        assert_eq!(codes, vec!["A", "D"]);
    }
}
