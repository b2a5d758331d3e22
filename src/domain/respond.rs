use crate::domain::models::{RunStatus, SurveyQuestion};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Why a token-gated request was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateRefusal {
    AlreadyCompleted,
    NotActive,
    Expired,
}

/// The four token gates, shared by form retrieval and submission. Token
/// resolution (NotFound) happens before this, against the database.
pub fn check_gates(
    run_status: RunStatus,
    due_date: DateTime<Utc>,
    response_exists: bool,
    now: DateTime<Utc>,
) -> Result<(), GateRefusal> {
    if response_exists {
        return Err(GateRefusal::AlreadyCompleted);
    }
    if run_status != RunStatus::Active {
        return Err(GateRefusal::NotActive);
    }
    if due_date < now {
        return Err(GateRefusal::Expired);
    }
    Ok(())
}

/// Validate a submitted answer map against the survey's question list.
/// Violations accumulate into one list.
pub fn validate_answers(
    answers: &HashMap<String, i32>,
    questions: &[SurveyQuestion],
) -> Vec<String> {
    let mut errors = Vec::new();

    let missing: Vec<&str> = questions
        .iter()
        .filter(|q| q.required && !answers.contains_key(&q.id))
        .map(|q| q.id.as_str())
        .collect();
    if !missing.is_empty() {
        errors.push(format!(
            "missing responses for required questions: {}",
            missing.join(", ")
        ));
    }

    let mut keys: Vec<&String> = answers.keys().collect();
    keys.sort();
    for question_id in keys {
        let rating = answers[question_id];
        if !(1..=5).contains(&rating) {
            errors.push(format!(
                "question {question_id}: rating must be between 1 and 5, got {rating}"
            ));
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn question(id: &str, required: bool) -> SurveyQuestion {
        SurveyQuestion {
            id: id.to_string(),
            text: format!("Question {id}"),
            question_type: "rating".to_string(),
            required,
        }
    }

    fn answers(pairs: &[(&str, i32)]) -> HashMap<String, i32> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn gates_pass_for_fresh_active_run() {
        let now = Utc::now();
        assert!(check_gates(RunStatus::Active, now + Duration::days(1), false, now).is_ok());
    }

    #[test]
    fn existing_response_wins_over_everything() {
        let now = Utc::now();
        // Even on an expired, inactive run the duplicate check reports first.
        let refusal =
            check_gates(RunStatus::Expired, now - Duration::days(1), true, now).unwrap_err();
        assert_eq!(refusal, GateRefusal::AlreadyCompleted);
    }

    #[test]
    fn inactive_run_is_refused() {
        let now = Utc::now();
        for status in [RunStatus::Completed, RunStatus::Cancelled, RunStatus::Expired] {
            let refusal = check_gates(status, now + Duration::days(1), false, now).unwrap_err();
            assert_eq!(refusal, GateRefusal::NotActive);
        }
    }

    #[test]
    fn overdue_active_run_is_expired_even_with_unused_token() {
        let now = Utc::now();
        let refusal =
            check_gates(RunStatus::Active, now - Duration::hours(1), false, now).unwrap_err();
        assert_eq!(refusal, GateRefusal::Expired);
    }

    #[test]
    fn accepts_complete_valid_answers() {
        let questions = [question("q1", true), question("q2", false)];
        assert!(validate_answers(&answers(&[("q1", 5), ("q2", 4)]), &questions).is_empty());
        // Optional question may be skipped.
        assert!(validate_answers(&answers(&[("q1", 3)]), &questions).is_empty());
    }

    #[test]
    fn missing_required_question_is_rejected() {
        let questions = [question("q1", true), question("q2", true)];
        let errors = validate_answers(&answers(&[("q1", 3)]), &questions);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("q2"));
    }

    #[test]
    fn out_of_range_ratings_are_rejected() {
        let questions = [question("q1", true)];
        for bad in [0, 6, -1] {
            let errors = validate_answers(&answers(&[("q1", bad)]), &questions);
            assert!(
                errors.iter().any(|e| e.contains("between 1 and 5")),
                "rating {bad} should be rejected"
            );
        }
    }

    #[test]
    fn violations_accumulate() {
        let questions = [question("q1", true), question("q2", true)];
        let errors = validate_answers(&answers(&[("q2", 9)]), &questions);
        assert_eq!(errors.len(), 2);
    }
}
