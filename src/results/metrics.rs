use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::result::{DetectionResult, ProcessingSession, ResultStatus};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyBucket {
    /// Monday of the week this bucket covers.
    pub week_start: NaiveDate,
    pub detected: usize,
    pub added_to_catalog: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsMetrics {
    pub total_results: usize,
    pub total_sessions: usize,
    pub status_counts: HashMap<String, usize>,
    /// added-to-catalog results over all results, in [0, 1].
    pub conversion_rate: f64,
    pub average_confidence: f64,
    pub average_processing_ms: f64,
    pub category_distribution: HashMap<String, usize>,
    /// Most frequent rejection reasons, descending.
    pub top_rejection_reasons: Vec<(String, usize)>,
    pub weekly_series: Vec<WeeklyBucket>,
}

const TOP_REASONS: usize = 5;

pub fn compute_metrics<'a, R, S>(results: R, sessions: S) -> ResultsMetrics
where
    R: IntoIterator<Item = &'a DetectionResult>,
    S: IntoIterator<Item = &'a ProcessingSession>,
{
    let results: Vec<&DetectionResult> = results.into_iter().collect();

    let mut status_counts: HashMap<String, usize> = HashMap::new();
    let mut category_distribution: HashMap<String, usize> = HashMap::new();
    let mut rejection_counts: HashMap<String, usize> = HashMap::new();
    let mut weekly: HashMap<NaiveDate, WeeklyBucket> = HashMap::new();
    let mut confidence_sum = 0.0;
    let mut added = 0usize;

    for result in &results {
        *status_counts
            .entry(result.status.as_str().to_string())
            .or_default() += 1;
        if let Some(category) = result.category() {
            *category_distribution.entry(category.to_string()).or_default() += 1;
        }
        if result.status == ResultStatus::Rejected {
            if let Some(reason) = &result.rejection_reason {
                *rejection_counts.entry(reason.clone()).or_default() += 1;
            }
        }
        if result.in_catalog() {
            added += 1;
        }
        confidence_sum += result.confidence();

        let week_start = monday_of(result.created_at.date_naive());
        let bucket = weekly.entry(week_start).or_insert_with(|| WeeklyBucket {
            week_start,
            detected: 0,
            added_to_catalog: 0,
        });
        bucket.detected += 1;
        if result.in_catalog() {
            bucket.added_to_catalog += 1;
        }
    }

    let mut top_rejection_reasons: Vec<(String, usize)> = rejection_counts.into_iter().collect();
    top_rejection_reasons.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top_rejection_reasons.truncate(TOP_REASONS);

    let mut weekly_series: Vec<WeeklyBucket> = weekly.into_values().collect();
    weekly_series.sort_by_key(|b| b.week_start);

    let sessions: Vec<&ProcessingSession> = sessions.into_iter().collect();
    let average_processing_ms = if sessions.is_empty() {
        0.0
    } else {
        sessions.iter().map(|s| s.processing_ms as f64).sum::<f64>() / sessions.len() as f64
    };

    let total = results.len();
    ResultsMetrics {
        total_results: total,
        total_sessions: sessions.len(),
        status_counts,
        conversion_rate: if total == 0 {
            0.0
        } else {
            added as f64 / total as f64
        },
        average_confidence: if total == 0 {
            0.0
        } else {
            confidence_sum / total as f64
        },
        average_processing_ms,
        category_distribution,
        top_rejection_reasons,
        weekly_series,
    }
}

fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}
