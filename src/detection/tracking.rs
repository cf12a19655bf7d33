use crate::models::detection::DetectedProduct;

use super::config::DetectionConfig;

/// Detections across frames believed to be the same physical product. The
/// representative is always the highest-confidence member seen so far.
#[derive(Debug, Clone)]
pub struct Track {
    pub representative: DetectedProduct,
    pub detection_count: usize,
}

impl Track {
    fn new(detection: DetectedProduct) -> Self {
        Self {
            representative: detection,
            detection_count: 1,
        }
    }

    fn absorb(&mut self, detection: DetectedProduct) {
        self.detection_count += 1;
        if detection.confidence > self.representative.confidence {
            self.representative = detection;
        }
    }
}

/// Fraction of the named attributes on which both detections agree.
/// Attributes missing on either side are skipped; no comparable attribute
/// scores zero.
pub fn attribute_agreement(a: &DetectedProduct, b: &DetectedProduct, keys: &[&str]) -> f64 {
    let mut compared = 0usize;
    let mut matched = 0usize;
    for key in keys {
        if let (Some(left), Some(right)) = (a.attribute(key), b.attribute(key)) {
            compared += 1;
            if left == right {
                matched += 1;
            }
        }
    }
    if compared == 0 {
        0.0
    } else {
        matched as f64 / compared as f64
    }
}

fn same_category(a: &DetectedProduct, b: &DetectedProduct) -> bool {
    matches!((a.category(), b.category()), (Some(l), Some(r)) if l == r)
}

fn is_duplicate(a: &DetectedProduct, b: &DetectedProduct, config: &DetectionConfig) -> bool {
    let iou = a.bounding_box.iou(&b.bounding_box);
    if iou > config.iou_threshold && same_category(a, b) {
        return true;
    }
    // Overlap plus strong category/color agreement also counts, which picks
    // up near-threshold overlaps of visually identical items.
    let score = 0.6 * iou + 0.4 * attribute_agreement(a, b, &["category", "color"]);
    iou > 0.0 && score > config.merge_score_threshold
}

/// Merge a candidate into the best matching track, or open a new one.
pub fn assign_candidate(tracks: &mut Vec<Track>, candidate: DetectedProduct, config: &DetectionConfig) {
    let mut best: Option<(usize, f64)> = None;
    for (index, track) in tracks.iter().enumerate() {
        if !is_duplicate(&track.representative, &candidate, config) {
            continue;
        }
        let iou = track.representative.bounding_box.iou(&candidate.bounding_box);
        if best.map(|(_, score)| iou > score).unwrap_or(true) {
            best = Some((index, iou));
        }
    }

    match best {
        Some((index, _)) => tracks[index].absorb(candidate),
        None => tracks.push(Track::new(candidate)),
    }
}

/// Representatives drift as higher-confidence members replace them, so two
/// tracks can end up overlapping. Merge to a fixpoint so no two survivors
/// both exceed the IoU threshold and share a category.
pub fn dedupe_tracks(mut tracks: Vec<Track>, config: &DetectionConfig) -> Vec<Track> {
    loop {
        let mut merged = false;
        let mut result: Vec<Track> = Vec::with_capacity(tracks.len());

        'outer: for track in tracks.drain(..) {
            for kept in result.iter_mut() {
                if is_duplicate(&kept.representative, &track.representative, config) {
                    kept.detection_count += track.detection_count;
                    if track.representative.confidence > kept.representative.confidence {
                        kept.representative = track.representative;
                    }
                    merged = true;
                    continue 'outer;
                }
            }
            result.push(track);
        }

        tracks = result;
        if !merged {
            return tracks;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::testing::detection;
    use crate::models::detection::BoundingBox;

    #[test]
    fn overlapping_same_category_merges_keeping_higher_confidence() {
        let config = DetectionConfig::default();
        let mut tracks = Vec::new();
        let bbox = BoundingBox::new(0.1, 0.1, 0.3, 0.3);

        assign_candidate(&mut tracks, detection(bbox, 0.7, "apparel", "red"), &config);
        let stronger = detection(BoundingBox::new(0.12, 0.1, 0.3, 0.3), 0.9, "apparel", "red");
        let stronger_id = stronger.id.clone();
        assign_candidate(&mut tracks, stronger, &config);

        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].detection_count, 2);
        assert_eq!(tracks[0].representative.id, stronger_id);
        assert_eq!(tracks[0].representative.confidence, 0.9);
    }

    #[test]
    fn overlapping_different_category_stays_separate() {
        let config = DetectionConfig::default();
        let mut tracks = Vec::new();
        let bbox = BoundingBox::new(0.1, 0.1, 0.3, 0.3);

        assign_candidate(&mut tracks, detection(bbox, 0.7, "apparel", "red"), &config);
        assign_candidate(&mut tracks, detection(bbox, 0.8, "footwear", "black"), &config);

        assert_eq!(tracks.len(), 2);
    }

    #[test]
    fn disjoint_same_category_stays_separate() {
        let config = DetectionConfig::default();
        let mut tracks = Vec::new();

        assign_candidate(
            &mut tracks,
            detection(BoundingBox::new(0.0, 0.0, 0.2, 0.2), 0.7, "apparel", "red"),
            &config,
        );
        assign_candidate(
            &mut tracks,
            detection(BoundingBox::new(0.7, 0.7, 0.2, 0.2), 0.8, "apparel", "red"),
            &config,
        );

        assert_eq!(tracks.len(), 2);
    }

    #[test]
    fn dedupe_reaches_a_fixpoint() {
        let config = DetectionConfig::default();
        let bbox = BoundingBox::new(0.2, 0.2, 0.3, 0.3);
        let tracks = vec![
            Track::new(detection(bbox, 0.6, "apparel", "red")),
            Track::new(detection(BoundingBox::new(0.22, 0.2, 0.3, 0.3), 0.9, "apparel", "red")),
            Track::new(detection(BoundingBox::new(0.21, 0.21, 0.3, 0.3), 0.7, "apparel", "red")),
        ];

        let deduped = dedupe_tracks(tracks, &config);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].detection_count, 3);
        assert_eq!(deduped[0].representative.confidence, 0.9);
    }

    #[test]
    fn agreement_skips_missing_attributes() {
        let a = detection(BoundingBox::new(0.0, 0.0, 0.1, 0.1), 0.7, "apparel", "red");
        let mut b = detection(BoundingBox::new(0.0, 0.0, 0.1, 0.1), 0.7, "apparel", "blue");
        b.attributes.remove("color");

        assert_eq!(attribute_agreement(&a, &b, &["category", "color"]), 1.0);
        assert_eq!(attribute_agreement(&a, &b, &["pattern"]), 0.0);
    }
}
