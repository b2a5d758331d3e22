use crate::domain::models::RosterEntry;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

/// Raw launch request body. Fields are optional so that every missing or
/// malformed piece can be reported in one pass instead of failing on the
/// first deserialization error.
#[derive(Debug, Deserialize)]
pub struct LaunchRequest {
    pub subject_id: Option<Uuid>,
    pub due_date: Option<String>,
    #[serde(default)]
    pub respondents: Vec<RespondentEntry>,
}

#[derive(Debug, Deserialize)]
pub struct RespondentEntry {
    pub respondent_id: Option<Uuid>,
    pub weight: Option<i32>,
    #[serde(default)]
    pub relationship: String,
}

/// A launch request that passed validation.
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub subject_id: Uuid,
    pub due_date: DateTime<Utc>,
    pub roster: Vec<RosterEntry>,
}

/// Validate a launch request, accumulating every violation. The
/// duplicate-active-run check is a database concern and runs after this,
/// in the handler.
pub fn validate_launch(req: &LaunchRequest, now: DateTime<Utc>) -> Result<LaunchPlan, Vec<String>> {
    let mut errors = Vec::new();

    if req.subject_id.is_none() {
        errors.push("subject_id is required".to_string());
    }
    if req.due_date.is_none() {
        errors.push("due_date is required".to_string());
    }
    if req.respondents.is_empty() {
        errors.push("respondents must be a non-empty list".to_string());
    }

    if !req.respondents.is_empty() {
        let total_weight: i64 = req
            .respondents
            .iter()
            .filter_map(|r| r.weight)
            .map(i64::from)
            .sum();
        if total_weight != 100 {
            errors.push(format!(
                "total respondent weights must equal 100, got {total_weight}"
            ));
        }
    }

    for (idx, entry) in req.respondents.iter().enumerate() {
        if entry.respondent_id.is_none() {
            errors.push(format!("respondent #{}: respondent_id is required", idx + 1));
        }
        match entry.weight {
            Some(w) if w > 0 => {}
            Some(w) => errors.push(format!(
                "respondent #{}: weight must be positive, got {w}",
                idx + 1
            )),
            None => errors.push(format!("respondent #{}: weight is required", idx + 1)),
        }
    }

    let due_date = match req.due_date.as_deref() {
        Some(raw) => match DateTime::parse_from_rfc3339(raw) {
            Ok(parsed) => {
                let parsed = parsed.with_timezone(&Utc);
                if parsed <= now {
                    errors.push("due_date must be in the future".to_string());
                    None
                } else {
                    Some(parsed)
                }
            }
            Err(_) => {
                errors.push(format!("due_date is not a valid RFC 3339 timestamp: {raw}"));
                None
            }
        },
        None => None,
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    // All options are guaranteed present once errors is empty.
    let roster = req
        .respondents
        .iter()
        .map(|r| RosterEntry {
            respondent_id: r.respondent_id.unwrap(),
            weight: r.weight.unwrap(),
            relationship: r.relationship.clone(),
        })
        .collect();

    Ok(LaunchPlan {
        subject_id: req.subject_id.unwrap(),
        due_date: due_date.unwrap(),
        roster,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(weight: Option<i32>) -> RespondentEntry {
        RespondentEntry {
            respondent_id: Some(Uuid::new_v4()),
            weight,
            relationship: "peer".to_string(),
        }
    }

    fn request(weights: &[i32], due_in: Duration) -> LaunchRequest {
        LaunchRequest {
            subject_id: Some(Uuid::new_v4()),
            due_date: Some((Utc::now() + due_in).to_rfc3339()),
            respondents: weights.iter().map(|w| entry(Some(*w))).collect(),
        }
    }

    #[test]
    fn accepts_weights_summing_to_exactly_100() {
        let req = request(&[60, 40], Duration::days(1));
        let plan = validate_launch(&req, Utc::now()).unwrap();
        assert_eq!(plan.roster.len(), 2);
        assert_eq!(plan.roster[0].weight, 60);
    }

    #[test]
    fn rejects_weight_sums_of_99_and_101() {
        for weights in [&[60, 39][..], &[60, 41][..]] {
            let req = request(weights, Duration::days(1));
            let errors = validate_launch(&req, Utc::now()).unwrap_err();
            assert!(
                errors.iter().any(|e| e.contains("must equal 100")),
                "missing weight-sum error in {errors:?}"
            );
        }
    }

    #[test]
    fn rejects_non_positive_weights() {
        let req = request(&[100, 0], Duration::days(1));
        let errors = validate_launch(&req, Utc::now()).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("weight must be positive")));
    }

    #[test]
    fn rejects_empty_roster_and_missing_fields() {
        let req = LaunchRequest {
            subject_id: None,
            due_date: None,
            respondents: vec![],
        };
        let errors = validate_launch(&req, Utc::now()).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].contains("subject_id"));
        assert!(errors[1].contains("due_date"));
        assert!(errors[2].contains("non-empty"));
    }

    #[test]
    fn rejects_past_due_date() {
        let req = request(&[50, 50], Duration::days(-1));
        let errors = validate_launch(&req, Utc::now()).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("must be in the future")));
    }

    #[test]
    fn rejects_unparseable_due_date() {
        let mut req = request(&[50, 50], Duration::days(1));
        req.due_date = Some("next tuesday".to_string());
        let errors = validate_launch(&req, Utc::now()).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("RFC 3339")));
    }

    #[test]
    fn collects_all_violations_at_once() {
        let req = LaunchRequest {
            subject_id: None,
            due_date: Some("garbage".to_string()),
            respondents: vec![entry(Some(30)), entry(None)],
        };
        let errors = validate_launch(&req, Utc::now()).unwrap_err();
        // missing subject, bad sum, missing weight, bad date
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn missing_respondent_id_is_reported_per_entry() {
        let mut req = request(&[50, 50], Duration::days(1));
        req.respondents[1].respondent_id = None;
        let errors = validate_launch(&req, Utc::now()).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("respondent #2")));
    }
}
