use std::collections::HashMap;

use crate::models::detection::DetectedProduct;
use crate::models::product::Variant;

pub struct CategoryTemplate {
    pub names: &'static [&'static str],
    pub descriptions: &'static [&'static str],
    /// INR price range for synthesized pricing.
    pub price_range: (f64, f64),
}

const APPAREL: CategoryTemplate = CategoryTemplate {
    names: &[
        "{color} {material} {type}",
        "Classic {color} {type}",
        "{pattern} {type}",
    ],
    descriptions: &[
        "A {color} {type} in soft {material} with a {pattern} finish. Easy to style, easier to love.",
        "Everyday {type} in {color}. {pattern} detailing and breathable {material} keep it light.",
    ],
    price_range: (299.0, 2_499.0),
};

const FOOTWEAR: CategoryTemplate = CategoryTemplate {
    names: &["{color} {type}", "{material} {type}"],
    descriptions: &[
        "Step out in these {color} {type}. Durable {material} build with all-day comfort.",
    ],
    price_range: (499.0, 3_999.0),
};

const ACCESSORIES: CategoryTemplate = CategoryTemplate {
    names: &["{color} {type}", "Statement {type}"],
    descriptions: &[
        "A {color} {type} that pulls the whole look together. Crafted in {material}.",
    ],
    price_range: (199.0, 2_999.0),
};

const ELECTRONICS: CategoryTemplate = CategoryTemplate {
    names: &["Compact {type}", "{color} {type}"],
    descriptions: &[
        "Reliable {type} in {color}. Plug in and go; ships with a 6-month warranty.",
    ],
    price_range: (599.0, 7_999.0),
};

const HOME_DECOR: CategoryTemplate = CategoryTemplate {
    names: &["Handcrafted {type}", "{color} {material} {type}"],
    descriptions: &[
        "A {material} {type} in {color} that warms up any corner. {pattern} accents throughout.",
    ],
    price_range: (349.0, 4_499.0),
};

const BEAUTY: CategoryTemplate = CategoryTemplate {
    names: &["{type} in {color}", "Signature {type}"],
    descriptions: &[
        "Long-wear {type} in {color}. Dermatologically tested, cruelty free.",
    ],
    price_range: (149.0, 1_999.0),
};

pub fn template_for(category: &str) -> &'static CategoryTemplate {
    match category {
        "footwear" => &FOOTWEAR,
        "accessories" => &ACCESSORIES,
        "electronics" => &ELECTRONICS,
        "home-decor" => &HOME_DECOR,
        "beauty" => &BEAUTY,
        _ => &APPAREL,
    }
}

/// Substitute `{attr}` placeholders from the detection's attribute map;
/// unknown placeholders resolve to neutral fallbacks.
pub fn substitute(pattern: &str, product: &DetectedProduct) -> String {
    let mut out = pattern.to_string();
    for (key, fallback) in [
        ("category", "item"),
        ("type", "piece"),
        ("color", "assorted"),
        ("pattern", "solid"),
        ("material", "mixed-material"),
    ] {
        let value = product.attribute(key).unwrap_or(fallback).to_string();
        out = out.replace(&format!("{{{key}}}"), &value);
    }
    title_case(&out)
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn variants_for(category: &str, color: Option<&str>) -> Vec<Variant> {
    let mut variants = Vec::new();
    match category {
        "apparel" => {
            variants.push(Variant {
                variant_type: "size".into(),
                options: vec!["S".into(), "M".into(), "L".into(), "XL".into()],
                default_option: "M".into(),
            });
        }
        "footwear" => {
            variants.push(Variant {
                variant_type: "size".into(),
                options: vec!["6".into(), "7".into(), "8".into(), "9".into(), "10".into()],
                default_option: "8".into(),
            });
        }
        _ => {}
    }
    if let Some(color) = color {
        variants.push(Variant {
            variant_type: "color".into(),
            options: vec![color.to_string()],
            default_option: color.to_string(),
        });
    }
    variants
}

/// Per-language description templates for the translation map. English is
/// the canonical record; everything else is generated alongside it.
pub fn localized_description(lang: &str, product: &DetectedProduct) -> Option<String> {
    match lang {
        "hi" => Some(substitute(
            "{color} {type}, badhiya {material}, turant dispatch.",
            product,
        )),
        _ => None,
    }
}

pub fn specifications_for(product: &DetectedProduct) -> HashMap<String, String> {
    let mut specs = HashMap::new();
    for key in ["material", "pattern", "color"] {
        if let Some(value) = product.attribute(key) {
            specs.insert(key.to_string(), value.to_string());
        }
    }
    if let Some(material) = product.attribute("material") {
        let care = match material {
            "leather" => "wipe with a dry cloth",
            "silk" => "dry clean only",
            _ => "machine wash cold",
        };
        specs.insert("care".to_string(), care.to_string());
    }
    specs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::testing::detection;
    use crate::models::detection::BoundingBox;

    #[test]
    fn substitute_fills_known_and_falls_back_for_missing() {
        let product = detection(BoundingBox::new(0.1, 0.1, 0.2, 0.2), 0.8, "apparel", "red");
        let name = substitute("{color} {material} {type}", &product);
        assert_eq!(name, "Red Mixed-material Piece");
    }

    #[test]
    fn apparel_gets_size_variants() {
        let variants = variants_for("apparel", Some("red"));
        assert!(variants.iter().any(|v| v.variant_type == "size"));
        assert!(variants.iter().any(|v| v.variant_type == "color"));
        let variants = variants_for("beauty", None);
        assert!(variants.is_empty());
    }
}
