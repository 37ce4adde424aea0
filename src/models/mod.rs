//! Data types loaded at startup and returned to callers

/// The static table of catalog items and their precomputed embeddings.
pub mod catalog;
/// Match results and the final style report.
pub mod report;
