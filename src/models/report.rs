use serde::{Deserialize, Serialize};

use crate::core::similarity::{Confidence, ScoredEntry};
use crate::models::catalog::CatalogEntry;

/// Catalog item metadata without its embedding.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ItemSummary {
    /// URL or identifier of the catalog photo.
    pub image_ref: String,
    /// Display name.
    pub name: String,
    /// Price.
    pub price: f64,
    /// Purchase link.
    pub link: String,
}

impl From<&CatalogEntry> for ItemSummary {
    fn from(entry: &CatalogEntry) -> Self {
        Self {
            image_ref: entry.image_ref.clone(),
            name: entry.name.clone(),
            price: entry.price,
            link: entry.link.clone(),
        }
    }
}

/// An item together with its similarity to the query photo.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ScoredItem {
    /// Item metadata.
    #[serde(flatten)]
    pub item: ItemSummary,
    /// Cosine similarity to the query.
    pub similarity: f32,
}

impl From<&ScoredEntry<'_>> for ScoredItem {
    fn from(scored: &ScoredEntry<'_>) -> Self {
        Self {
            item: ItemSummary::from(scored.entry),
            similarity: scored.score,
        }
    }
}

/// Everything returned for one analyzed photo.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StyleReport {
    /// The closest catalog item.
    pub matched: ScoredItem,
    /// Whether the match clears the configured threshold.
    pub confidence: Confidence,
    /// Other items listed for the matched catalog photo, including the match.
    pub outfit_items: Vec<ItemSummary>,
    /// Next-best candidates, best first.
    pub alternatives: Vec<ScoredItem>,
    /// Generated style description.
    pub description: String,
    /// When the report was produced (RFC 3339).
    pub generated_at: String,
}

impl StyleReport {
    /// Serializes the report to a pretty-printed JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scored_item_flattens_metadata() {
        let entry = CatalogEntry {
            image_ref: "look-1".to_string(),
            name: "Trench coat".to_string(),
            price: 149.0,
            link: "https://shop.example/trench".to_string(),
            embedding: vec![1.0, 0.0],
        };
        let scored = ScoredEntry { index: 0, entry: &entry, score: 0.91 };

        let value = serde_json::to_value(ScoredItem::from(&scored)).unwrap();
        assert_eq!(value["name"], "Trench coat");
        assert_eq!(value["link"], "https://shop.example/trench");
        assert!(value.get("embedding").is_none());
        assert!((value["similarity"].as_f64().unwrap() - 0.91).abs() < 1e-6);
    }
}
