pub mod pricing;
pub mod templates;

use std::collections::HashMap;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use pricing::{synthesize_price, PricingStrategy};

use crate::models::detection::DetectedProduct;
use crate::models::product::{
    CategoryField, Dimensions, PriceField, ProductInformation, TextField, Translation,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub strategy: PricingStrategy,
    /// Languages beyond English to produce translations for.
    pub languages: Vec<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            strategy: PricingStrategy::Extracted,
            languages: vec!["hi".to_string()],
        }
    }
}

/// Turns detections into catalog-ready records. The RNG is injectable so
/// tests can pin the synthesized fields.
pub struct GenerationEngine<R: Rng = StdRng> {
    config: GenerationConfig,
    rng: R,
}

impl GenerationEngine<StdRng> {
    pub fn new(config: GenerationConfig) -> Self {
        Self {
            config,
            rng: StdRng::from_entropy(),
        }
    }
}

impl<R: Rng> GenerationEngine<R> {
    pub fn with_rng(config: GenerationConfig, rng: R) -> Self {
        Self { config, rng }
    }

    pub fn generate(&mut self, product: &DetectedProduct) -> ProductInformation {
        let category = product.category().unwrap_or("apparel").to_string();
        let template = templates::template_for(&category);

        let name_pattern = template.names[self.rng.gen_range(0..template.names.len())];
        let desc_pattern =
            template.descriptions[self.rng.gen_range(0..template.descriptions.len())];
        let name = templates::substitute(name_pattern, product);
        let description = templates::substitute(desc_pattern, product);

        let text_confidence = derived_confidence(product);
        let price = self.price_for(product, &category);

        let mut translations = HashMap::new();
        for lang in &self.config.languages {
            if let Some(localized) = templates::localized_description(lang, product) {
                translations.insert(
                    lang.clone(),
                    Translation {
                        name: name.clone(),
                        description: localized,
                    },
                );
            }
        }

        let (weight, dimensions) = shipping_profile(&category, &mut self.rng);

        let mut tags: Vec<String> = ["category", "type", "color", "pattern", "material"]
            .iter()
            .filter_map(|key| product.attribute(key))
            .map(|v| v.to_string())
            .collect();
        tags.dedup();
        tags.push("new-arrival".to_string());

        ProductInformation {
            id: Uuid::new_v4().to_string(),
            product_id: product.id.clone(),
            name: TextField::generated(name, text_confidence),
            description: TextField::generated(description, text_confidence * 0.9),
            price,
            category: CategoryField {
                main: category.clone(),
                sub: product.attribute("type").map(|t| t.to_string()),
                confidence: product
                    .attributes
                    .get("category")
                    .map(|a| a.confidence)
                    .unwrap_or(0.5),
            },
            attributes: product.attributes.clone(),
            variants: templates::variants_for(&category, product.attribute("color")),
            images: vec![product.crop.clone()],
            tags,
            translations,
            specifications: templates::specifications_for(product),
            similar_product_ids: product.similar_product_ids.clone(),
            inventory_estimate: Some(self.rng.gen_range(5..50)),
            sku: Some(make_sku(&category, &mut self.rng)),
            barcode: Some(make_barcode(&mut self.rng)),
            weight_grams: Some(weight),
            dimensions: Some(dimensions),
            created_at: Utc::now(),
            frame_ids: vec![product.frame_id.clone()],
        }
    }

    fn price_for(&mut self, product: &DetectedProduct, category: &str) -> PriceField {
        if self.config.strategy == PricingStrategy::Extracted {
            if let Some(detected) = &product.price {
                return PriceField {
                    value: detected.value,
                    currency: detected.currency.clone(),
                    confidence: detected.confidence,
                    provenance: crate::models::product::Provenance::Extracted,
                };
            }
        }
        PriceField {
            value: synthesize_price(category, self.config.strategy, &mut self.rng),
            currency: "INR".to_string(),
            confidence: 0.5,
            provenance: crate::models::product::Provenance::Generated,
        }
    }
}

/// Average attribute confidence weighted against the detection confidence.
fn derived_confidence(product: &DetectedProduct) -> f64 {
    if product.attributes.is_empty() {
        return product.confidence * 0.8;
    }
    let attrs: f64 = product.attributes.values().map(|a| a.confidence).sum::<f64>()
        / product.attributes.len() as f64;
    (product.confidence + attrs) / 2.0
}

/// EAN-13-shaped code with India's 890 GS1 prefix.
fn make_barcode<R: Rng>(rng: &mut R) -> String {
    let rest: u64 = rng.gen_range(0..10_000_000_000);
    format!("890{rest:010}")
}

/// Category-typical shipping weight (grams) and carton dimensions.
fn shipping_profile<R: Rng>(category: &str, rng: &mut R) -> (f64, Dimensions) {
    let ((low, high), (length_cm, width_cm, height_cm)) = match category {
        "apparel" => ((150.0, 700.0), (30.0, 25.0, 4.0)),
        "footwear" => ((400.0, 1_200.0), (33.0, 22.0, 12.0)),
        "accessories" => ((50.0, 400.0), (20.0, 15.0, 8.0)),
        "electronics" => ((100.0, 1_500.0), (25.0, 18.0, 10.0)),
        "home-decor" => ((300.0, 3_000.0), (40.0, 30.0, 25.0)),
        _ => ((30.0, 300.0), (15.0, 10.0, 8.0)),
    };
    (
        rng.gen_range::<f64, _>(low..high).round(),
        Dimensions {
            length_cm,
            width_cm,
            height_cm,
        },
    )
}

fn make_sku<R: Rng>(category: &str, rng: &mut R) -> String {
    let prefix: String = category
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .take(3)
        .collect::<String>()
        .to_uppercase();
    let suffix: u32 = rng.gen_range(10_000_000..100_000_000);
    format!("{prefix}-{suffix}")
}

/// Collapse several records of the same physical item: the highest-confidence
/// source wins each scalar field, list fields are unioned.
pub fn merge_product_information(mut records: Vec<ProductInformation>) -> Option<ProductInformation> {
    let first = records.pop()?;
    let mut merged = first;
    for record in records {
        if record.name.confidence > merged.name.confidence {
            merged.name = record.name;
            merged.translations = record.translations;
        }
        if record.description.confidence > merged.description.confidence {
            merged.description = record.description;
        }
        if record.price.confidence > merged.price.confidence {
            merged.price = record.price;
        }
        if record.category.confidence > merged.category.confidence {
            merged.category = record.category;
        }
        for (key, value) in record.attributes {
            match merged.attributes.get(&key) {
                Some(existing) if existing.confidence >= value.confidence => {}
                _ => {
                    merged.attributes.insert(key, value);
                }
            }
        }
        for image in record.images {
            if !merged.images.contains(&image) {
                merged.images.push(image);
            }
        }
        for tag in record.tags {
            if !merged.tags.contains(&tag) {
                merged.tags.push(tag);
            }
        }
        for id in record.similar_product_ids {
            if !merged.similar_product_ids.contains(&id) {
                merged.similar_product_ids.push(id);
            }
        }
        for id in record.frame_ids {
            if !merged.frame_ids.contains(&id) {
                merged.frame_ids.push(id);
            }
        }
        if merged.inventory_estimate.is_none() {
            merged.inventory_estimate = record.inventory_estimate;
        }
        if merged.sku.is_none() {
            merged.sku = record.sku;
        }
        if merged.barcode.is_none() {
            merged.barcode = record.barcode;
        }
        if merged.weight_grams.is_none() {
            merged.weight_grams = record.weight_grams;
        }
        if merged.dimensions.is_none() {
            merged.dimensions = record.dimensions;
        }
    }
    Some(merged)
}
