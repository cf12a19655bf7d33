use serde::{Deserialize, Serialize};

/// Tunable thresholds for the simulated detection stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionConfig {
    /// Process 1 of every N frames.
    pub frame_stride: usize,

    /// Candidate cap per sampled frame.
    pub max_products_per_frame: usize,

    /// Candidates below this confidence are discarded.
    pub min_confidence: f64,

    /// Bounding-box IoU above which two same-category detections are the
    /// same physical product.
    pub iou_threshold: f64,

    /// Combined IoU/attribute score above which a candidate merges into an
    /// existing track even without a category match.
    pub merge_score_threshold: f64,

    /// Attribute-agreement score above which two representatives are
    /// cross-linked as similar products.
    pub similarity_threshold: f64,

    /// Simulated per-frame processing delay.
    pub frame_delay_ms: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            frame_stride: 1,
            max_products_per_frame: 3,
            min_confidence: 0.55,
            iou_threshold: 0.45,
            merge_score_threshold: 0.65,
            similarity_threshold: 0.6,
            frame_delay_ms: 0,
        }
    }
}
