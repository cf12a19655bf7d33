use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Axis-aligned box in normalized [0, 1] frame coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> f64 {
        (self.width.max(0.0)) * (self.height.max(0.0))
    }

    /// Intersection-over-union with another box; 0.0 when disjoint.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let ix = (self.x + self.width).min(other.x + other.width) - self.x.max(other.x);
        let iy = (self.y + self.height).min(other.y + other.height) - self.y.max(other.y);
        if ix <= 0.0 || iy <= 0.0 {
            return 0.0;
        }
        let intersection = ix * iy;
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }

    /// Clamp the box into the unit square.
    pub fn clamped(&self) -> BoundingBox {
        let x = self.x.clamp(0.0, 1.0);
        let y = self.y.clamp(0.0, 1.0);
        BoundingBox {
            x,
            y,
            width: self.width.clamp(0.0, 1.0 - x),
            height: self.height.clamp(0.0, 1.0 - y),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttributeValue {
    pub value: String,
    pub confidence: f64,
}

impl AttributeValue {
    pub fn new(value: impl Into<String>, confidence: f64) -> Self {
        Self {
            value: value.into(),
            confidence,
        }
    }
}

/// A price read out of the frame itself (e.g. an on-screen price tag).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceDetection {
    pub value: f64,
    pub currency: String,
    pub confidence: f64,
    pub source_text: String,
    pub position: Option<BoundingBox>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OcrField {
    pub value: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OcrPayload {
    pub raw_text: String,
    pub fields: HashMap<String, OcrField>,
}

/// A claimed product instance localized within one frame. Immutable after the
/// detection stage except for the `group_id` / `similar_product_ids`
/// back-references added during post-processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedProduct {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub bounding_box: BoundingBox,
    pub confidence: f64,
    /// Cropped region of the source frame, encoded.
    pub crop: Vec<u8>,
    pub frame_id: String,
    /// category / color / pattern / type / material plus arbitrary extensions.
    pub attributes: HashMap<String, AttributeValue>,
    pub price: Option<PriceDetection>,
    pub ocr: Option<OcrPayload>,
    pub group_id: Option<String>,
    pub similar_product_ids: Vec<String>,
}

impl DetectedProduct {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|a| a.value.as_str())
    }

    pub fn category(&self) -> Option<&str> {
        self.attribute("category")
    }
}
