use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::result::{DetectionResult, ResultStatus};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    Date,
    Confidence,
    Category,
    Status,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultFilter {
    pub session_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub statuses: Option<Vec<ResultStatus>>,
    pub min_confidence: Option<f64>,
    pub category: Option<String>,
    pub in_catalog: Option<bool>,
    /// Case-insensitive match against name, description, notes, and tags.
    pub search: Option<String>,
    pub tags: Option<Vec<String>>,
    pub sort_key: Option<SortKey>,
    pub sort_direction: Option<SortDirection>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl ResultFilter {
    pub fn matches(&self, result: &DetectionResult) -> bool {
        if let Some(session_id) = &self.session_id {
            if &result.session_id != session_id {
                return false;
            }
        }
        if let Some(from) = &self.from {
            if result.created_at < *from {
                return false;
            }
        }
        if let Some(to) = &self.to {
            if result.created_at > *to {
                return false;
            }
        }
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&result.status) {
                return false;
            }
        }
        if let Some(min) = self.min_confidence {
            if result.confidence() < min {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if result.category() != Some(category.as_str()) {
                return false;
            }
        }
        if let Some(in_catalog) = self.in_catalog {
            if result.in_catalog() != in_catalog {
                return false;
            }
        }
        if let Some(tags) = &self.tags {
            if !tags.iter().all(|t| result.tags.contains(t)) {
                return false;
            }
        }
        if let Some(search) = &self.search {
            if !free_text_matches(result, search) {
                return false;
            }
        }
        true
    }
}

fn free_text_matches(result: &DetectionResult, search: &str) -> bool {
    let needle = search.to_lowercase();
    if let Some(info) = &result.information {
        if info.name.text.to_lowercase().contains(&needle)
            || info.description.text.to_lowercase().contains(&needle)
        {
            return true;
        }
    }
    if let Some(notes) = &result.notes {
        if notes.to_lowercase().contains(&needle) {
            return true;
        }
    }
    result.tags.iter().any(|t| t.to_lowercase().contains(&needle))
}

pub fn sort_results(results: &mut [DetectionResult], key: SortKey, direction: SortDirection) {
    results.sort_by(|a, b| {
        let order = match key {
            SortKey::Date => a.created_at.cmp(&b.created_at),
            SortKey::Confidence => a
                .confidence()
                .partial_cmp(&b.confidence())
                .unwrap_or(std::cmp::Ordering::Equal),
            SortKey::Category => a.category().unwrap_or("").cmp(b.category().unwrap_or("")),
            SortKey::Status => a.status.as_str().cmp(b.status.as_str()),
        };
        match direction {
            SortDirection::Ascending => order,
            SortDirection::Descending => order.reverse(),
        }
    });
}
