//! Read-only aggregation over a run's submitted answer maps. Everything
//! here is recomputed per request; nothing caches or mutates.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Aggregates for one question across all responses of a run.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QuestionStats {
    pub question_id: String,
    pub average_rating: f64,
    pub total_responses: usize,
    pub ratings_distribution: BTreeMap<u8, u32>,
}

/// Run-level rollup across every rating of every response.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CompletionSummary {
    pub total_responses: usize,
    pub total_ratings: usize,
    pub average_rating: f64,
    pub rating_distribution: BTreeMap<u8, u32>,
    pub highest_rating: i32,
    pub lowest_rating: i32,
}

/// Summary of a single submitted answer map, returned in the submission
/// receipt.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResponseSummary {
    pub average_rating: f64,
    pub response_count: usize,
    pub highest_rating: i32,
    pub lowest_rating: i32,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn empty_distribution() -> BTreeMap<u8, u32> {
    (1..=5).map(|r| (r, 0)).collect()
}

fn distribution(ratings: &[i32]) -> BTreeMap<u8, u32> {
    let mut dist = empty_distribution();
    for rating in ratings {
        if (1..=5).contains(rating) {
            *dist.entry(*rating as u8).or_default() += 1;
        }
    }
    dist
}

/// Mean, count and histogram per question id across all responses,
/// ordered by question id.
pub fn per_question_stats(responses: &[HashMap<String, i32>]) -> Vec<QuestionStats> {
    let mut by_question: BTreeMap<&str, Vec<i32>> = BTreeMap::new();
    for response in responses {
        for (question_id, rating) in response {
            by_question.entry(question_id).or_default().push(*rating);
        }
    }

    by_question
        .into_iter()
        .map(|(question_id, ratings)| QuestionStats {
            question_id: question_id.to_string(),
            average_rating: round2(ratings.iter().sum::<i32>() as f64 / ratings.len() as f64),
            total_responses: ratings.len(),
            ratings_distribution: distribution(&ratings),
        })
        .collect()
}

pub fn completion_summary(responses: &[HashMap<String, i32>]) -> CompletionSummary {
    let all_ratings: Vec<i32> = responses
        .iter()
        .flat_map(|r| r.values().copied())
        .collect();

    if all_ratings.is_empty() {
        return CompletionSummary {
            total_responses: responses.len(),
            total_ratings: 0,
            average_rating: 0.0,
            rating_distribution: empty_distribution(),
            highest_rating: 0,
            lowest_rating: 0,
        };
    }

    CompletionSummary {
        total_responses: responses.len(),
        total_ratings: all_ratings.len(),
        average_rating: round2(
            all_ratings.iter().sum::<i32>() as f64 / all_ratings.len() as f64,
        ),
        rating_distribution: distribution(&all_ratings),
        highest_rating: *all_ratings.iter().max().unwrap(),
        lowest_rating: *all_ratings.iter().min().unwrap(),
    }
}

pub fn response_summary(answers: &HashMap<String, i32>) -> ResponseSummary {
    let ratings: Vec<i32> = answers.values().copied().collect();
    if ratings.is_empty() {
        return ResponseSummary {
            average_rating: 0.0,
            response_count: 0,
            highest_rating: 0,
            lowest_rating: 0,
        };
    }
    ResponseSummary {
        average_rating: round2(ratings.iter().sum::<i32>() as f64 / ratings.len() as f64),
        response_count: ratings.len(),
        highest_rating: *ratings.iter().max().unwrap(),
        lowest_rating: *ratings.iter().min().unwrap(),
    }
}

/// Response-rate percentage out of the expected respondent count.
pub fn response_rate(actual: usize, expected: usize) -> f64 {
    if expected == 0 {
        return 0.0;
    }
    round2(actual as f64 / expected as f64 * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resp(pairs: &[(&str, i32)]) -> HashMap<String, i32> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn per_question_means_and_histograms() {
        let responses = vec![
            resp(&[("q1", 5), ("q2", 4)]),
            resp(&[("q1", 3), ("q2", 4)]),
            resp(&[("q1", 4)]),
        ];
        let stats = per_question_stats(&responses);
        assert_eq!(stats.len(), 2);

        let q1 = &stats[0];
        assert_eq!(q1.question_id, "q1");
        assert_eq!(q1.average_rating, 4.0);
        assert_eq!(q1.total_responses, 3);
        assert_eq!(q1.ratings_distribution[&3], 1);
        assert_eq!(q1.ratings_distribution[&4], 1);
        assert_eq!(q1.ratings_distribution[&5], 1);
        assert_eq!(q1.ratings_distribution[&1], 0);

        let q2 = &stats[1];
        assert_eq!(q2.average_rating, 4.0);
        assert_eq!(q2.total_responses, 2);
    }

    #[test]
    fn completion_summary_rollup() {
        let responses = vec![resp(&[("q1", 5), ("q2", 4)]), resp(&[("q1", 1)])];
        let summary = completion_summary(&responses);
        assert_eq!(summary.total_responses, 2);
        assert_eq!(summary.total_ratings, 3);
        assert_eq!(summary.average_rating, 3.33);
        assert_eq!(summary.highest_rating, 5);
        assert_eq!(summary.lowest_rating, 1);
        assert_eq!(summary.rating_distribution[&1], 1);
        assert_eq!(summary.rating_distribution[&2], 0);
    }

    #[test]
    fn empty_inputs_produce_zeroed_summaries() {
        let summary = completion_summary(&[]);
        assert_eq!(summary.total_responses, 0);
        assert_eq!(summary.average_rating, 0.0);
        assert_eq!(summary.rating_distribution.len(), 5);
        assert!(per_question_stats(&[]).is_empty());
    }

    #[test]
    fn single_response_summary() {
        let summary = response_summary(&resp(&[("q1", 5), ("q2", 4)]));
        assert_eq!(summary.average_rating, 4.5);
        assert_eq!(summary.response_count, 2);
        assert_eq!(summary.highest_rating, 5);
        assert_eq!(summary.lowest_rating, 4);
    }

    #[test]
    fn response_rate_percentage() {
        assert_eq!(response_rate(1, 2), 50.0);
        assert_eq!(response_rate(2, 3), 66.67);
        assert_eq!(response_rate(0, 0), 0.0);
    }
}
