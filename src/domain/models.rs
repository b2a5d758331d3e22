use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "account_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    SysAdmin,
    DomainAdmin,
    Account,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "survey_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SurveyStatus {
    Draft,
    PendingApproval,
    Approved,
    Rejected,
    Active,
    Paused,
    Completed,
    Archived,
    Inactive,
}

impl sqlx::postgres::PgHasArrayType for SurveyStatus {
    fn array_type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("_survey_status")
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "run_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Active,
    Completed,
    Cancelled,
    Expired,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "assignment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Pending,
    Completed,
}

/// One question of a survey template, stored as JSONB on the survey row.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SurveyQuestion {
    pub id: String,
    pub text: String,
    #[serde(rename = "type", default = "default_question_type")]
    pub question_type: String,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_question_type() -> String {
    "rating".to_string()
}

fn default_required() -> bool {
    true
}

/// Completion counters derived from a run's assignment statuses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionStats {
    pub completed: i32,
    pub total: i32,
    pub completion_rate: f64,
}

impl CompletionStats {
    pub fn from_statuses(statuses: &[AssignmentStatus]) -> Self {
        let total = statuses.len() as i32;
        let completed = statuses
            .iter()
            .filter(|s| **s == AssignmentStatus::Completed)
            .count() as i32;
        let completion_rate = if total > 0 {
            f64::from(completed) / f64::from(total) * 100.0
        } else {
            0.0
        };
        Self {
            completed,
            total,
            completion_rate,
        }
    }

    pub fn all_completed(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }
}

pub fn is_overdue(due_date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    due_date < now
}

pub fn days_until_due(due_date: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (due_date - now).num_days()
}

/// Respondent roster entry carried inside a validated launch plan.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RosterEntry {
    pub respondent_id: Uuid,
    pub weight: i32,
    pub relationship: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn completion_stats_empty_roster() {
        let stats = CompletionStats::from_statuses(&[]);
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.completion_rate, 0.0);
        assert!(!stats.all_completed());
    }

    #[test]
    fn completion_stats_partial_and_full() {
        let mut statuses = vec![
            AssignmentStatus::Completed,
            AssignmentStatus::Pending,
            AssignmentStatus::Pending,
        ];
        let stats = CompletionStats::from_statuses(&statuses);
        assert_eq!(stats.completed, 1);
        assert!((stats.completion_rate - 33.333).abs() < 0.01);
        assert!(!stats.all_completed());

        statuses[1] = AssignmentStatus::Completed;
        statuses[2] = AssignmentStatus::Completed;
        let stats = CompletionStats::from_statuses(&statuses);
        assert_eq!(stats.completed, 3);
        assert_eq!(stats.completion_rate, 100.0);
        assert!(stats.all_completed());
    }

    #[test]
    fn overdue_and_days_until_due() {
        let now = Utc::now();
        assert!(is_overdue(now - Duration::minutes(1), now));
        assert!(!is_overdue(now + Duration::minutes(1), now));
        assert_eq!(days_until_due(now + Duration::days(7), now), 7);
        assert_eq!(days_until_due(now - Duration::days(2), now), -2);
    }

    #[test]
    fn question_defaults_apply() {
        let q: SurveyQuestion =
            serde_json::from_str(r#"{"id":"q1","text":"Leads well?"}"#).unwrap();
        assert_eq!(q.question_type, "rating");
        assert!(q.required);
    }
}
