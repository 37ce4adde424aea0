use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::catalog::CatalogEntry;

/// How strongly a match should be presented to the user.
///
/// This is advisory: a tentative match is still returned, the wording of
/// the generated description just hedges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Score at or above the configured threshold.
    Strong,
    /// Score below the threshold; the closest available item.
    Tentative,
}

impl Confidence {
    /// Classify a similarity score against a threshold.
    pub fn classify(score: f32, threshold: f32) -> Self {
        if score >= threshold {
            Self::Strong
        } else {
            Self::Tentative
        }
    }

    /// Whether this is a strong match.
    pub fn is_strong(self) -> bool {
        matches!(self, Self::Strong)
    }
}

/// A catalog entry paired with its similarity to a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredEntry<'a> {
    /// Position of the entry in the catalog.
    pub index: usize,
    /// The matched entry.
    pub entry: &'a CatalogEntry,
    /// Cosine similarity in [-1, 1].
    pub score: f32,
}

/// Cosine similarity between two vectors of equal length.
///
/// Returns 0.0 when either vector has zero magnitude. The result is clamped
/// to [-1, 1] to absorb rounding.
///
/// Sums are accumulated in f64, so any finite f32 input has a finite,
/// non-zero norm unless it is all zeros.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(AppError::DimensionMismatch {
            index: 0,
            expected: a.len(),
            found: b.len(),
        });
    }
    cosine_unchecked(a, b)
}

fn cosine_unchecked(a: &[f32], b: &[f32]) -> Result<f32> {
    let a = ArrayView1::from(a).mapv(f64::from);
    let b = ArrayView1::from(b).mapv(f64::from);

    let dot_product = a.dot(&b);
    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    let score = dot_product / (norm_a * norm_b);
    if !score.is_finite() {
        return Err(AppError::InvalidInput(format!(
            "similarity is not finite (dot={}, norms={}, {})",
            dot_product, norm_a, norm_b
        )));
    }
    Ok(score.clamp(-1.0, 1.0) as f32)
}

fn check_query(query: &[f32], catalog: &[CatalogEntry]) -> Result<()> {
    if catalog.is_empty() {
        return Err(AppError::EmptyCatalog);
    }
    if query.is_empty() {
        return Err(AppError::InvalidInput("query embedding is empty".to_string()));
    }
    if query.iter().any(|v| !v.is_finite()) {
        return Err(AppError::InvalidInput(
            "query embedding contains non-finite values".to_string(),
        ));
    }
    // Every row is checked up front so a bad row fails the query even when a
    // valid row would have scored higher.
    if let Some((index, entry)) = catalog
        .iter()
        .enumerate()
        .find(|(_, e)| e.embedding.len() != query.len())
    {
        return Err(AppError::DimensionMismatch {
            index,
            expected: query.len(),
            found: entry.embedding.len(),
        });
    }
    Ok(())
}

/// Find the single catalog entry most similar to `query`.
///
/// On exact ties the entry that appears first wins.
pub fn best_match<'a>(query: &[f32], catalog: &'a [CatalogEntry]) -> Result<ScoredEntry<'a>> {
    check_query(query, catalog)?;

    let mut best = ScoredEntry {
        index: 0,
        entry: &catalog[0],
        score: cosine_unchecked(query, &catalog[0].embedding)?,
    };
    for (index, entry) in catalog.iter().enumerate().skip(1) {
        let score = cosine_unchecked(query, &entry.embedding)?;
        if score > best.score {
            best = ScoredEntry { index, entry, score };
        }
    }
    Ok(best)
}

/// The `k` entries most similar to `query`, best first.
///
/// Ties keep catalog order, so `rank(q, c, 1)[0]` agrees with `best_match`.
pub fn rank<'a>(query: &[f32], catalog: &'a [CatalogEntry], k: usize) -> Result<Vec<ScoredEntry<'a>>> {
    check_query(query, catalog)?;

    let mut scored = catalog
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            Ok(ScoredEntry {
                index,
                entry,
                score: cosine_unchecked(query, &entry.embedding)?,
            })
        })
        .collect::<Result<Vec<ScoredEntry<'a>>>>()?;

    // Stable sort; every score is finite.
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(k);
    Ok(scored)
}
