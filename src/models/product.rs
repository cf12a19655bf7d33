use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::detection::AttributeValue;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Provenance {
    Generated,
    Extracted,
    Manual,
}

/// A text value together with how it came to be and how much we trust it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextField {
    pub text: String,
    pub confidence: f64,
    pub provenance: Provenance,
}

impl TextField {
    pub fn generated(text: impl Into<String>, confidence: f64) -> Self {
        Self {
            text: text.into(),
            confidence,
            provenance: Provenance::Generated,
        }
    }

    /// Manual edits replace the text and mark provenance without rewriting
    /// the confidence recorded for the original value.
    pub fn edit(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.provenance = Provenance::Manual;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceField {
    pub value: f64,
    pub currency: String,
    pub confidence: f64,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryField {
    pub main: String,
    pub sub: Option<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub variant_type: String,
    pub options: Vec<String>,
    pub default_option: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Translation {
    pub name: String,
    pub description: String,
}

/// Shipping dimensions in centimeters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Dimensions {
    pub length_cm: f64,
    pub width_cm: f64,
    pub height_cm: f64,
}

/// The catalog-ready record derived from one detection (or merged from
/// several detections of the same physical item).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInformation {
    pub id: String,
    pub product_id: String,
    pub name: TextField,
    pub description: TextField,
    pub price: PriceField,
    pub category: CategoryField,
    pub attributes: HashMap<String, AttributeValue>,
    pub variants: Vec<Variant>,
    /// Encoded crops / stills associated with the product.
    pub images: Vec<Vec<u8>>,
    pub tags: Vec<String>,
    pub translations: HashMap<String, Translation>,
    pub specifications: HashMap<String, String>,
    pub similar_product_ids: Vec<String>,
    pub inventory_estimate: Option<u32>,
    pub sku: Option<String>,
    pub barcode: Option<String>,
    pub weight_grams: Option<f64>,
    pub dimensions: Option<Dimensions>,
    pub created_at: DateTime<Utc>,
    pub frame_ids: Vec<String>,
}

impl ProductInformation {
    pub fn set_name_manual(&mut self, text: impl Into<String>) {
        self.name.edit(text);
    }

    pub fn set_description_manual(&mut self, text: impl Into<String>) {
        self.description.edit(text);
    }
}
