use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::detection::DetectedProduct;
use crate::models::product::ProductInformation;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ResultStatus {
    Detected,
    Processed,
    AddedToCatalog,
    Rejected,
    PendingReview,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Detected => "detected",
            ResultStatus::Processed => "processed",
            ResultStatus::AddedToCatalog => "added_to_catalog",
            ResultStatus::Rejected => "rejected",
            ResultStatus::PendingReview => "pending_review",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ProcessingStatus {
    Running,
    Completed,
    Failed,
}

/// Summary statistics for one batch-processing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingSession {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: ProcessingStatus,
    pub frame_count: usize,
    pub product_count: usize,
    /// Count of results that have entered the catalog; incremented exactly
    /// once per result.
    pub added_count: usize,
    pub processing_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub from: Option<ResultStatus>,
    pub to: ResultStatus,
    pub note: Option<String>,
}

/// Binds one detection (plus optional generated information) to a review
/// status. History is append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub id: String,
    pub session_id: String,
    pub product: DetectedProduct,
    pub information: Option<ProductInformation>,
    pub status: ResultStatus,
    pub catalog_product_id: Option<String>,
    pub rejection_reason: Option<String>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
}

impl DetectionResult {
    pub fn confidence(&self) -> f64 {
        self.product.confidence
    }

    pub fn category(&self) -> Option<&str> {
        self.product.category()
    }

    pub fn in_catalog(&self) -> bool {
        self.status == ResultStatus::AddedToCatalog
    }
}
