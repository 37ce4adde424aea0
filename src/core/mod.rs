//! Core functionality: encoding, matching and describing a query photo

/// Image encoder interface and the ResNet-50 backbone.
pub mod embeddings;
/// The end-to-end analysis pipeline.
pub mod finder;
/// Client for the hosted multimodal generation service.
pub mod generation;
/// Decoding and fetching of query images.
pub mod media;
pub mod prompt;
/// Cosine similarity ranking over the catalog.
pub mod similarity;
