pub mod filter;
pub mod metrics;

use std::collections::HashMap;

use anyhow::{bail, Result};
use chrono::Utc;
use uuid::Uuid;

pub use filter::{ResultFilter, SortDirection, SortKey};
pub use metrics::{compute_metrics, ResultsMetrics, WeeklyBucket};

use crate::models::detection::DetectedProduct;
use crate::models::product::ProductInformation;
use crate::models::result::{
    DetectionResult, HistoryEntry, ProcessingSession, ProcessingStatus, ResultStatus,
};

#[derive(Debug, Clone, Default)]
pub struct StatusChange {
    pub catalog_product_id: Option<String>,
    pub rejection_reason: Option<String>,
    pub note: Option<String>,
}

/// In-memory bookkeeping over processing sessions and detection results.
/// Filtering and aggregation are pure reads of current state.
#[derive(Default)]
pub struct ResultsStore {
    results: HashMap<String, DetectionResult>,
    sessions: HashMap<String, ProcessingSession>,
}

impl ResultsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_processing_session(&mut self, frame_count: usize) -> ProcessingSession {
        let session = ProcessingSession {
            id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            completed_at: None,
            status: ProcessingStatus::Running,
            frame_count,
            product_count: 0,
            added_count: 0,
            processing_ms: 0,
        };
        self.sessions.insert(session.id.clone(), session.clone());
        session
    }

    pub fn update_processing_session(
        &mut self,
        id: &str,
        frame_count: usize,
        product_count: usize,
    ) -> bool {
        match self.sessions.get_mut(id) {
            Some(session) => {
                session.frame_count = frame_count;
                session.product_count = product_count;
                true
            }
            None => false,
        }
    }

    pub fn complete_processing_session(&mut self, id: &str, status: ProcessingStatus) -> bool {
        match self.sessions.get_mut(id) {
            Some(session) => {
                let now = Utc::now();
                session.processing_ms = (now - session.started_at).num_milliseconds().max(0) as u64;
                session.completed_at = Some(now);
                session.status = status;
                true
            }
            None => false,
        }
    }

    pub fn get_processing_session(&self, id: &str) -> Option<ProcessingSession> {
        self.sessions.get(id).cloned()
    }

    pub fn list_processing_sessions(&self) -> Vec<ProcessingSession> {
        let mut sessions: Vec<_> = self.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        sessions
    }

    /// Initial status is derived from whether information was already
    /// generated for the detection.
    pub fn add_result(
        &mut self,
        session_id: &str,
        product: DetectedProduct,
        information: Option<ProductInformation>,
    ) -> DetectionResult {
        let status = if information.is_some() {
            ResultStatus::Processed
        } else {
            ResultStatus::Detected
        };
        let now = Utc::now();
        let result = DetectionResult {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            product,
            information,
            status,
            catalog_product_id: None,
            rejection_reason: None,
            notes: None,
            tags: Vec::new(),
            history: vec![HistoryEntry {
                timestamp: now,
                from: None,
                to: status,
                note: None,
            }],
            created_at: now,
        };
        if let Some(session) = self.sessions.get_mut(session_id) {
            session.product_count += 1;
        }
        self.results.insert(result.id.clone(), result.clone());
        result
    }

    pub fn get_result(&self, id: &str) -> Option<DetectionResult> {
        self.results.get(id).cloned()
    }

    pub fn delete_result(&mut self, id: &str) -> bool {
        self.results.remove(id).is_some()
    }

    /// Moves a result to a new status, enforcing the side-effect rules:
    /// entering the catalog requires a catalog product id and bumps the
    /// owning session's added-count exactly once per result; rejection
    /// requires a reason. Unknown ids yield `Ok(None)`.
    pub fn update_result_status(
        &mut self,
        id: &str,
        status: ResultStatus,
        change: StatusChange,
    ) -> Result<Option<DetectionResult>> {
        let Some(result) = self.results.get_mut(id) else {
            return Ok(None);
        };

        match status {
            ResultStatus::AddedToCatalog if change.catalog_product_id.is_none() => {
                bail!("added_to_catalog requires a catalog product id");
            }
            ResultStatus::Rejected if change.rejection_reason.is_none() => {
                bail!("rejection requires a reason");
            }
            _ => {}
        }

        let previous = result.status;
        let entered_catalog_before = result
            .history
            .iter()
            .any(|entry| entry.to == ResultStatus::AddedToCatalog);

        result.status = status;
        if let Some(catalog_id) = change.catalog_product_id {
            result.catalog_product_id = Some(catalog_id);
        }
        if let Some(reason) = change.rejection_reason {
            result.rejection_reason = Some(reason);
        }
        result.history.push(HistoryEntry {
            timestamp: Utc::now(),
            from: Some(previous),
            to: status,
            note: change.note,
        });

        if status == ResultStatus::AddedToCatalog && !entered_catalog_before {
            let session_id = result.session_id.clone();
            if let Some(session) = self.sessions.get_mut(&session_id) {
                session.added_count += 1;
            }
        }

        Ok(Some(self.results[id].clone()))
    }

    pub fn add_tags(&mut self, id: &str, tags: &[String]) -> bool {
        match self.results.get_mut(id) {
            Some(result) => {
                for tag in tags {
                    if !result.tags.contains(tag) {
                        result.tags.push(tag.clone());
                    }
                }
                true
            }
            None => false,
        }
    }

    pub fn append_note(&mut self, id: &str, note: &str) -> bool {
        match self.results.get_mut(id) {
            Some(result) => {
                match &mut result.notes {
                    Some(existing) => {
                        existing.push('\n');
                        existing.push_str(note);
                    }
                    None => result.notes = Some(note.to_string()),
                }
                true
            }
            None => false,
        }
    }

    pub fn filter_results(&self, filter: &ResultFilter) -> Vec<DetectionResult> {
        let mut matched: Vec<DetectionResult> = self
            .results
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();

        let key = filter.sort_key.unwrap_or(SortKey::Date);
        let direction = filter.sort_direction.unwrap_or(SortDirection::Descending);
        filter::sort_results(&mut matched, key, direction);

        let offset = filter.offset.unwrap_or(0);
        let limit = filter.limit.unwrap_or(usize::MAX);
        matched.into_iter().skip(offset).take(limit).collect()
    }

    pub fn compute_metrics(&self) -> ResultsMetrics {
        compute_metrics(self.results.values(), self.sessions.values())
    }
}
