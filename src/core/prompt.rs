//! Prompt text for the style description and cleanup of what comes back

use std::fmt::Write as _;

use crate::core::similarity::Confidence;
use crate::models::report::{ItemSummary, ScoredItem};

/// Section header used when the match clears the threshold.
pub const ITEM_DETAILS_HEADER: &str = "ITEM DETAILS:";
/// Section header used for tentative matches.
pub const SIMILAR_ITEMS_HEADER: &str = "SIMILAR ITEMS:";
/// Generated text shorter than this is replaced by a fallback report.
pub const MIN_RESPONSE_CHARS: usize = 100;

/// The header matching a confidence level.
pub fn section_header(confidence: Confidence) -> &'static str {
    match confidence {
        Confidence::Strong => ITEM_DETAILS_HEADER,
        Confidence::Tentative => SIMILAR_ITEMS_HEADER,
    }
}

/// One `- name ($price): link` line per item.
pub fn items_description(items: &[ItemSummary]) -> String {
    items
        .iter()
        .map(|item| format!("- {} (${:.2}): {}", item.name, item.price, item.link))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Everything the prompt is built from.
#[derive(Debug, Clone, Copy)]
pub struct PromptInput<'a> {
    /// Best match.
    pub matched: &'a ScoredItem,
    /// Strong or tentative.
    pub confidence: Confidence,
    /// Items listed for the matched catalog photo.
    pub items: &'a [ItemSummary],
    /// Next-best candidates.
    pub alternatives: &'a [ScoredItem],
}

/// Build the retail catalog analysis prompt sent alongside the query image.
pub fn build_prompt(input: &PromptInput<'_>) -> String {
    let header = section_header(input.confidence);
    let mut prompt = String::from(
        "You're conducting a professional retail catalog analysis. \
         This image shows standard clothing items available in department stores. \
         Focus exclusively on professional fashion analysis for a clothing retailer.\n\n",
    );

    let _ = writeln!(
        prompt,
        "Closest catalog match: {} (similarity {:.3}).",
        input.matched.item.name, input.matched.similarity
    );
    let _ = writeln!(
        prompt,
        "{} (always include this section in your response):\n{}\n",
        header.trim_end_matches(':'),
        items_description(input.items)
    );

    if !input.alternatives.is_empty() {
        prompt.push_str("Other candidates from the catalog:\n");
        for alt in input.alternatives {
            let _ = writeln!(
                prompt,
                "- {} (${:.2}, similarity {:.3}): {}",
                alt.item.name, alt.item.price, alt.similarity, alt.item.link
            );
        }
        prompt.push('\n');
    }

    prompt.push_str("Please:\n");
    match input.confidence {
        Confidence::Strong => {
            prompt.push_str(
                "1. Identify and describe the clothing items objectively (colors, patterns, materials)\n\
                 2. Categorize the overall style (business, casual, etc.)\n",
            );
        }
        Confidence::Tentative => {
            prompt.push_str(
                "1. Note these are similar but not exact items\n\
                 2. Identify clothing elements objectively (colors, patterns, materials)\n",
            );
        }
    }
    let _ = writeln!(prompt, "3. Include the {} section at the end\n", header);
    prompt.push_str("This is for a professional retail catalog. Use formal, clinical language.");
    prompt
}

/// Make sure the returned text is usable and always lists the items.
///
/// Too-short output is replaced by a basic report; output missing both
/// section headers gets the item list appended.
pub fn finalize_response(text: String, confidence: Confidence, items_description: &str) -> String {
    let header = section_header(confidence);

    if text.trim().chars().count() < MIN_RESPONSE_CHARS {
        log::info!("Generated response too short ({} chars), using fallback", text.len());
        return format!(
            "# Fashion Analysis\n\nThis outfit features a collection of carefully coordinated pieces.\n\n{}\n{}",
            header, items_description
        );
    }

    if !text.contains(ITEM_DETAILS_HEADER) && !text.contains(SIMILAR_ITEMS_HEADER) {
        log::info!("Item section missing from generated response, appending");
        return format!("{}\n\n{}\n{}", text.trim_end(), header, items_description);
    }

    text
}
