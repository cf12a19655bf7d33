use std::collections::HashMap;

use rand::Rng;
use uuid::Uuid;

use crate::models::detection::{
    AttributeValue, BoundingBox, DetectedProduct, OcrField, OcrPayload, PriceDetection,
};
use crate::models::session::CapturedFrame;

use super::config::DetectionConfig;

pub const CATEGORIES: &[&str] = &[
    "apparel",
    "footwear",
    "accessories",
    "electronics",
    "home-decor",
    "beauty",
];

pub const COLORS: &[&str] = &[
    "red", "blue", "green", "black", "white", "beige", "maroon", "teal",
];

pub const PATTERNS: &[&str] = &["solid", "striped", "floral", "checked", "printed"];

pub const MATERIALS: &[&str] = &["cotton", "leather", "polyester", "silk", "metal", "wood"];

pub fn types_for(category: &str) -> &'static [&'static str] {
    match category {
        "apparel" => &["kurta", "saree", "t-shirt", "dress", "jacket"],
        "footwear" => &["sneakers", "sandals", "heels", "loafers"],
        "accessories" => &["handbag", "watch", "earrings", "scarf"],
        "electronics" => &["earbuds", "charger", "speaker", "lamp"],
        "home-decor" => &["vase", "cushion", "wall-art", "planter"],
        "beauty" => &["lipstick", "serum", "palette", "fragrance"],
        _ => &["item"],
    }
}

/// Produces the candidate detections for one sampled frame. The interface
/// contract (frames in, capped scored candidates out) is the stable part;
/// tests script it, production wires the randomized stand-in below.
pub trait CandidateSource {
    fn candidates(&mut self, frame: &CapturedFrame, config: &DetectionConfig)
        -> Vec<DetectedProduct>;
}

/// Randomized stand-in for a real detector. Deterministic when seeded.
pub struct RandomCandidates<R: Rng> {
    rng: R,
}

impl<R: Rng> RandomCandidates<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    fn random_box(&mut self) -> BoundingBox {
        let width = self.rng.gen_range(0.1..0.45);
        let height = self.rng.gen_range(0.1..0.45);
        BoundingBox {
            x: self.rng.gen_range(0.0..1.0 - width),
            y: self.rng.gen_range(0.0..1.0 - height),
            width,
            height,
        }
    }

    fn pick(&mut self, pool: &[&str]) -> String {
        pool[self.rng.gen_range(0..pool.len())].to_string()
    }
}

impl<R: Rng> CandidateSource for RandomCandidates<R> {
    fn candidates(
        &mut self,
        frame: &CapturedFrame,
        config: &DetectionConfig,
    ) -> Vec<DetectedProduct> {
        let count = self.rng.gen_range(0..=config.max_products_per_frame);
        let mut out = Vec::with_capacity(count);

        for _ in 0..count {
            let category = self.pick(CATEGORIES);
            let product_type = self.pick(types_for(&category));
            let color = self.pick(COLORS);

            let mut attributes = HashMap::new();
            attributes.insert(
                "category".to_string(),
                AttributeValue::new(category.clone(), self.rng.gen_range(0.7..0.99)),
            );
            attributes.insert(
                "type".to_string(),
                AttributeValue::new(product_type.clone(), self.rng.gen_range(0.6..0.95)),
            );
            attributes.insert(
                "color".to_string(),
                AttributeValue::new(color.clone(), self.rng.gen_range(0.6..0.98)),
            );
            attributes.insert(
                "pattern".to_string(),
                AttributeValue::new(self.pick(PATTERNS), self.rng.gen_range(0.5..0.9)),
            );
            attributes.insert(
                "material".to_string(),
                AttributeValue::new(self.pick(MATERIALS), self.rng.gen_range(0.5..0.9)),
            );

            let bounding_box = self.random_box().clamped();

            let price = if self.rng.gen_bool(0.3) {
                let value = self.rng.gen_range(99.0..4_999.0_f64).round();
                Some(PriceDetection {
                    value,
                    currency: "INR".to_string(),
                    confidence: self.rng.gen_range(0.6..0.95),
                    source_text: format!("₹{value:.0}"),
                    position: Some(bounding_box),
                })
            } else {
                None
            };

            let ocr = if self.rng.gen_bool(0.2) {
                let brand = self.pick(&["UrbanLoom", "Vastra", "Dhaaga", "Kanak"]);
                let mut fields = HashMap::new();
                fields.insert(
                    "brand".to_string(),
                    OcrField {
                        value: brand.clone(),
                        confidence: self.rng.gen_range(0.5..0.9),
                    },
                );
                Some(OcrPayload {
                    raw_text: format!("{brand} {product_type}"),
                    fields,
                })
            } else {
                None
            };

            out.push(DetectedProduct {
                id: Uuid::new_v4().to_string(),
                timestamp: frame.timestamp,
                bounding_box,
                confidence: self.rng.gen_range(config.min_confidence..1.0),
                crop: frame.data.clone(),
                frame_id: frame.id.clone(),
                attributes,
                price,
                ocr,
                group_id: None,
                similar_product_ids: Vec::new(),
            });
        }

        out
    }
}
