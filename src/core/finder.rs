use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use crate::core::embeddings::ImageEncoder;
use crate::core::generation::GeminiClient;
use crate::core::media::PreparedImage;
use crate::core::prompt::{build_prompt, finalize_response, items_description, PromptInput};
use crate::core::similarity::{best_match, rank, Confidence};
use crate::error::Result;
use crate::models::catalog::Catalog;
use crate::models::report::{ItemSummary, ScoredItem, StyleReport};
use crate::state::MatchConfig;

/// The encode -> match -> describe pipeline over a loaded catalog.
#[derive(Debug, Clone)]
pub struct StyleFinder {
    catalog: Arc<Catalog>,
    encoder: Arc<dyn ImageEncoder>,
    generator: GeminiClient,
    matching: MatchConfig,
}

impl StyleFinder {
    /// Assemble a finder from already-initialized parts.
    pub fn new(
        catalog: Arc<Catalog>,
        encoder: Arc<dyn ImageEncoder>,
        generator: GeminiClient,
        matching: MatchConfig,
    ) -> Self {
        if let Some(dim) = encoder.dimension() {
            if dim != catalog.dimension() {
                log::warn!(
                    "Encoder produces {}-dimensional vectors but the catalog holds {}; every query will fail",
                    dim,
                    catalog.dimension()
                );
            }
        }
        Self {
            catalog,
            encoder,
            generator,
            matching,
        }
    }

    /// The loaded catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Match policy in effect.
    pub fn matching(&self) -> &MatchConfig {
        &self.matching
    }

    /// Run the full pipeline for one decoded photo.
    pub async fn analyze(&self, image: PreparedImage) -> Result<StyleReport> {
        let request_id = Uuid::new_v4();
        let started = Instant::now();
        let PreparedImage { image, inline } = image;

        let encoder = Arc::clone(&self.encoder);
        let query = tokio::task::spawn_blocking(move || encoder.encode(&image)).await??;
        log::debug!(
            "[{}] encoded query ({} dims) in {:?}",
            request_id,
            query.len(),
            started.elapsed()
        );

        let entries = self.catalog.entries();
        let best = best_match(&query, entries)?;
        let confidence = Confidence::classify(best.score, self.matching.similarity_threshold);
        log::info!(
            "[{}] best match #{} {:?} score {:.4} ({:?})",
            request_id,
            best.index,
            best.entry.name,
            best.score,
            confidence
        );

        // Items from the same catalog photo are listed separately, not as alternatives.
        let alternatives: Vec<ScoredItem> = rank(&query, entries, entries.len())?
            .iter()
            .filter(|s| s.entry.image_ref != best.entry.image_ref)
            .take(self.matching.alternatives_count)
            .map(ScoredItem::from)
            .collect();

        let outfit_items: Vec<ItemSummary> = self
            .catalog
            .outfit_items(&best.entry.image_ref)
            .into_iter()
            .map(ItemSummary::from)
            .collect();

        let matched = ScoredItem::from(&best);
        let prompt = build_prompt(&PromptInput {
            matched: &matched,
            confidence,
            items: &outfit_items,
            alternatives: &alternatives,
        });

        let raw = self.generator.generate(&prompt, &inline).await?;
        let description = finalize_response(raw, confidence, &items_description(&outfit_items));

        log::info!("[{}] analysis finished in {:?}", request_id, started.elapsed());

        Ok(StyleReport {
            matched,
            confidence,
            outfit_items,
            alternatives,
            description,
            generated_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}
