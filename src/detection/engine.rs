use std::time::{Duration, Instant};

use serde::Serialize;
use uuid::Uuid;

use crate::models::detection::DetectedProduct;
use crate::models::session::CapturedFrame;

use super::candidates::CandidateSource;
use super::config::DetectionConfig;
use super::tracking::{assign_candidate, attribute_agreement, dedupe_tracks, Track};

const SIMILARITY_KEYS: &[&str] = &["category", "type", "color", "pattern", "material"];

/// Emitted once per processed (sampled) frame.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionProgress {
    pub frame_index: usize,
    pub frames_total: usize,
    pub raw_detections: usize,
    pub tracked_products: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionStats {
    pub frames_total: usize,
    pub frames_processed: usize,
    pub raw_detections: usize,
    pub unique_products: usize,
    /// Mean confidence over the emitted representatives.
    pub average_confidence: f64,
    pub total_ms: u64,
    pub average_frame_ms: f64,
    /// Raw detections per processed frame.
    pub detection_rate: f64,
}

#[derive(Debug, Clone)]
pub struct DetectionOutcome {
    pub products: Vec<DetectedProduct>,
    pub stats: DetectionStats,
}

/// Runs candidates through cross-frame tracking and emits one representative
/// per physical product. Not real inference; the candidate source is a
/// scripted or randomized stand-in.
pub struct DetectionEngine<S: CandidateSource> {
    config: DetectionConfig,
    source: S,
}

impl<S: CandidateSource> DetectionEngine<S> {
    pub fn new(config: DetectionConfig, source: S) -> Self {
        Self { config, source }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub async fn detect(
        &mut self,
        frames: &[CapturedFrame],
        mut on_progress: impl FnMut(DetectionProgress),
    ) -> DetectionOutcome {
        let started = Instant::now();
        let stride = self.config.frame_stride.max(1);

        let mut tracks: Vec<Track> = Vec::new();
        let mut raw_detections = 0usize;
        let mut frames_processed = 0usize;

        for (index, frame) in frames.iter().enumerate() {
            if index % stride != 0 {
                continue;
            }
            frames_processed += 1;

            let mut candidates = self.source.candidates(frame, &self.config);
            candidates.truncate(self.config.max_products_per_frame);
            candidates.retain(|c| c.confidence >= self.config.min_confidence);

            for mut candidate in candidates {
                candidate.bounding_box = candidate.bounding_box.clamped();
                raw_detections += 1;
                assign_candidate(&mut tracks, candidate, &self.config);
            }

            if self.config.frame_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.frame_delay_ms)).await;
            }

            on_progress(DetectionProgress {
                frame_index: index,
                frames_total: frames.len(),
                raw_detections,
                tracked_products: tracks.len(),
            });
        }

        let tracks = dedupe_tracks(tracks, &self.config);

        let mut products: Vec<DetectedProduct> = tracks
            .into_iter()
            .map(|track| {
                let mut representative = track.representative;
                representative.group_id = Some(Uuid::new_v4().to_string());
                representative
            })
            .collect();

        cross_link_similar(&mut products, self.config.similarity_threshold);

        let total_ms = started.elapsed().as_millis() as u64;
        let average_confidence = if products.is_empty() {
            0.0
        } else {
            products.iter().map(|p| p.confidence).sum::<f64>() / products.len() as f64
        };

        let stats = DetectionStats {
            frames_total: frames.len(),
            frames_processed,
            raw_detections,
            unique_products: products.len(),
            average_confidence,
            total_ms,
            average_frame_ms: if frames_processed == 0 {
                0.0
            } else {
                total_ms as f64 / frames_processed as f64
            },
            detection_rate: if frames_processed == 0 {
                0.0
            } else {
                raw_detections as f64 / frames_processed as f64
            },
        };

        DetectionOutcome { products, stats }
    }
}

/// Cross-link representatives whose attribute agreement clears the
/// similarity threshold.
fn cross_link_similar(products: &mut [DetectedProduct], threshold: f64) {
    for i in 0..products.len() {
        for j in (i + 1)..products.len() {
            let score = attribute_agreement(&products[i], &products[j], SIMILARITY_KEYS);
            if score > threshold {
                let (left, right) = (products[i].id.clone(), products[j].id.clone());
                products[i].similar_product_ids.push(right);
                products[j].similar_product_ids.push(left);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::detection::BoundingBox;
    use chrono::Utc;

    /// Replays a script of per-frame candidate lists.
    struct Scripted {
        frames: Vec<Vec<DetectedProduct>>,
        cursor: usize,
    }

    impl Scripted {
        fn new(frames: Vec<Vec<DetectedProduct>>) -> Self {
            Self { frames, cursor: 0 }
        }
    }

    impl CandidateSource for Scripted {
        fn candidates(
            &mut self,
            _frame: &CapturedFrame,
            _config: &DetectionConfig,
        ) -> Vec<DetectedProduct> {
            let out = self.frames.get(self.cursor).cloned().unwrap_or_default();
            self.cursor += 1;
            out
        }
    }

    fn frame(index: usize) -> CapturedFrame {
        CapturedFrame {
            id: format!("frame-{index}"),
            timestamp: Utc::now(),
            data: vec![0u8; 8],
            width: 4,
            height: 4,
            battery_level: None,
            detections: None,
        }
    }

    use crate::detection::testing::detection;

    #[tokio::test]
    async fn stride_skips_frames_and_progress_fires_per_processed_frame() {
        let frames: Vec<_> = (0..6).map(frame).collect();
        let config = DetectionConfig {
            frame_stride: 2,
            ..Default::default()
        };
        let mut engine = DetectionEngine::new(config, Scripted::new(vec![Vec::new(); 6]));

        let mut notifications = Vec::new();
        let outcome = engine
            .detect(&frames, |progress| notifications.push(progress.frame_index))
            .await;

        assert_eq!(outcome.stats.frames_total, 6);
        assert_eq!(outcome.stats.frames_processed, 3);
        assert_eq!(notifications, vec![0, 2, 4]);
    }

    #[tokio::test]
    async fn repeated_detections_collapse_to_one_representative() {
        let bbox = BoundingBox::new(0.2, 0.2, 0.3, 0.3);
        let script = vec![
            vec![detection(bbox, 0.7, "apparel", "red")],
            vec![detection(BoundingBox::new(0.22, 0.2, 0.3, 0.3), 0.92, "apparel", "red")],
            vec![detection(BoundingBox::new(0.21, 0.21, 0.3, 0.3), 0.8, "apparel", "red")],
        ];
        let frames: Vec<_> = (0..3).map(frame).collect();
        let mut engine = DetectionEngine::new(DetectionConfig::default(), Scripted::new(script));

        let outcome = engine.detect(&frames, |_| {}).await;

        assert_eq!(outcome.stats.raw_detections, 3);
        assert_eq!(outcome.products.len(), 1);
        assert_eq!(outcome.products[0].confidence, 0.92);
        assert!(outcome.products[0].group_id.is_some());
    }

    #[tokio::test]
    async fn no_representative_pair_violates_the_overlap_invariant() {
        // A busy script with heavy overlap in both categories.
        let mut script = Vec::new();
        for step in 0..10 {
            let offset = step as f64 * 0.01;
            script.push(vec![
                detection(
                    BoundingBox::new(0.1 + offset, 0.1, 0.3, 0.3),
                    0.6 + offset,
                    "apparel",
                    "red",
                ),
                detection(
                    BoundingBox::new(0.12, 0.1 + offset, 0.3, 0.3),
                    0.9 - offset,
                    "footwear",
                    "black",
                ),
            ]);
        }
        let frames: Vec<_> = (0..10).map(frame).collect();
        let config = DetectionConfig::default();
        let mut engine = DetectionEngine::new(config.clone(), Scripted::new(script));

        let outcome = engine.detect(&frames, |_| {}).await;

        for i in 0..outcome.products.len() {
            for j in (i + 1)..outcome.products.len() {
                let a = &outcome.products[i];
                let b = &outcome.products[j];
                let iou = a.bounding_box.iou(&b.bounding_box);
                let same_category = a.category() == b.category();
                assert!(
                    iou <= config.iou_threshold || !same_category,
                    "representatives {i} and {j} overlap ({iou:.2}) with matching category"
                );
            }
        }
    }

    #[tokio::test]
    async fn matching_attribute_profiles_are_cross_linked() {
        // Same attributes, far apart: two tracks, linked as similar.
        let script = vec![vec![
            detection(BoundingBox::new(0.05, 0.05, 0.2, 0.2), 0.8, "apparel", "red"),
            detection(BoundingBox::new(0.7, 0.7, 0.2, 0.2), 0.85, "apparel", "red"),
        ]];
        let frames = vec![frame(0)];
        let mut engine = DetectionEngine::new(DetectionConfig::default(), Scripted::new(script));

        let outcome = engine.detect(&frames, |_| {}).await;

        assert_eq!(outcome.products.len(), 2);
        let (a, b) = (&outcome.products[0], &outcome.products[1]);
        assert!(a.similar_product_ids.contains(&b.id));
        assert!(b.similar_product_ids.contains(&a.id));
    }

    #[tokio::test]
    async fn stats_reflect_raw_and_unique_counts() {
        let bbox = BoundingBox::new(0.3, 0.3, 0.25, 0.25);
        let script = vec![
            vec![
                detection(bbox, 0.7, "apparel", "red"),
                detection(BoundingBox::new(0.7, 0.1, 0.2, 0.2), 0.9, "beauty", "white"),
            ],
            vec![detection(BoundingBox::new(0.31, 0.3, 0.25, 0.25), 0.75, "apparel", "red")],
        ];
        let frames: Vec<_> = (0..2).map(frame).collect();
        let mut engine = DetectionEngine::new(DetectionConfig::default(), Scripted::new(script));

        let outcome = engine.detect(&frames, |_| {}).await;

        assert_eq!(outcome.stats.raw_detections, 3);
        assert_eq!(outcome.stats.unique_products, 2);
        assert_eq!(outcome.stats.detection_rate, 1.5);
        let expected = (0.75 + 0.9) / 2.0;
        assert!((outcome.stats.average_confidence - expected).abs() < 1e-9);
    }
}
