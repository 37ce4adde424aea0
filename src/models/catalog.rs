use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

use crate::error::{AppError, Result};

/// One purchasable item with its precomputed image embedding.
///
/// Field names accept both snake_case and the column headers used by the
/// fashion dataset exports (`Image URL`, `Item Name`, `Price`, `Link`,
/// `Embedding`).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CatalogEntry {
    /// URL or identifier of the catalog photo this item appears in.
    #[serde(alias = "Image URL", alias = "image_url")]
    pub image_ref: String,
    /// Display name of the item.
    #[serde(alias = "Item Name", alias = "item_name")]
    pub name: String,
    /// Price in the catalog's currency.
    #[serde(alias = "Price", deserialize_with = "number_or_string")]
    pub price: f64,
    /// Purchase link.
    #[serde(alias = "Link")]
    pub link: String,
    /// Feature vector produced by the vision backbone for `image_ref`.
    #[serde(alias = "Embedding", deserialize_with = "vector_or_string")]
    pub embedding: Vec<f32>,
}

/// Supported on-disk layouts for the catalog table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogFormat {
    /// A single JSON array of records.
    JsonArray,
    /// One JSON record per line.
    JsonLines,
}

impl CatalogFormat {
    /// Pick the layout from the file extension; anything unknown is read as a JSON array.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("jsonl") | Some("ndjson") => Self::JsonLines,
            _ => Self::JsonArray,
        }
    }
}

/// Read-only table of catalog entries sharing one embedding dimensionality.
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    dimension: usize,
}

impl Catalog {
    /// Load and validate a catalog file.
    ///
    /// Any failure here is meant to be fatal: the server must not accept
    /// queries without a usable catalog.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Loading catalog: {}", path.display());

        let raw = std::fs::read_to_string(path)
            .map_err(|e| AppError::Catalog(format!("cannot read {}: {}", path.display(), e)))?;

        let entries = match CatalogFormat::from_path(path) {
            CatalogFormat::JsonArray => serde_json::from_str::<Vec<CatalogEntry>>(&raw)
                .map_err(|e| AppError::Catalog(format!("{}: {}", path.display(), e)))?,
            CatalogFormat::JsonLines => parse_lines(&raw)
                .map_err(|e| AppError::Catalog(format!("{}: {}", path.display(), e)))?,
        };

        let catalog = Self::from_entries(entries)?;
        log::info!(
            "Loaded {} catalog entries ({} dimensions) from {}",
            catalog.len(),
            catalog.dimension(),
            path.display()
        );
        Ok(catalog)
    }

    /// Validate in-memory entries and wrap them as a catalog.
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Result<Self> {
        let first = entries
            .first()
            .ok_or_else(|| AppError::Catalog("catalog contains no entries".to_string()))?;
        let dimension = first.embedding.len();
        if dimension == 0 {
            return Err(AppError::Catalog(format!(
                "entry 0 ({}) has an empty embedding",
                first.name
            )));
        }

        for (index, entry) in entries.iter().enumerate() {
            if entry.embedding.len() != dimension {
                return Err(AppError::Catalog(format!(
                    "entry {} ({}) has {} components, expected {}",
                    index,
                    entry.name,
                    entry.embedding.len(),
                    dimension
                )));
            }
            if entry.embedding.iter().any(|v| !v.is_finite()) {
                return Err(AppError::Catalog(format!(
                    "entry {} ({}) has a non-finite embedding component",
                    index, entry.name
                )));
            }
        }

        Ok(Self { entries, dimension })
    }

    /// All entries, in file order.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Entry at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&CatalogEntry> {
        self.entries.get(index)
    }

    /// Length shared by every embedding in the table.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false for a validated catalog.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every item listed for the same catalog photo, in file order.
    pub fn outfit_items(&self, image_ref: &str) -> Vec<&CatalogEntry> {
        self.entries
            .iter()
            .filter(|e| e.image_ref == image_ref)
            .collect()
    }
}

fn parse_lines(raw: &str) -> std::result::Result<Vec<CatalogEntry>, String> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str::<CatalogEntry>(line).map_err(|e| format!("line {}: {}", i + 1, e))
        })
        .collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

fn number_or_string<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Text(s) => {
            let cleaned = s.trim().trim_start_matches('$').replace(',', "");
            cleaned
                .parse::<f64>()
                .map_err(|_| serde::de::Error::custom(format!("invalid price {:?}", s)))
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum VectorOrString {
    Vector(Vec<f32>),
    Text(String),
}

// Dataframe exports store vectors as "[0.1, 0.2]" or numpy's "[0.1 0.2]".
fn vector_or_string<'de, D>(deserializer: D) -> std::result::Result<Vec<f32>, D::Error>
where
    D: Deserializer<'de>,
{
    match VectorOrString::deserialize(deserializer)? {
        VectorOrString::Vector(v) => Ok(v),
        VectorOrString::Text(s) => s
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .map(|t| {
                t.parse::<f32>()
                    .map_err(|_| serde::de::Error::custom(format!("invalid vector component {:?}", t)))
            })
            .collect(),
    }
}
