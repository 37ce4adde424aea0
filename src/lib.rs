#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

//! # StyleFinder
//!
//! Match a fashion photo against a catalog of precomputed image embeddings
//! and describe the look with a hosted multimodal model.
//!
//! ## Pipeline
//!
//! - **Catalog**: a static JSON / JSON Lines table of items and their
//!   embeddings, loaded and validated once at startup
//! - **Encoding**: one ResNet-50 forward pass per query photo (`embeddings` feature)
//! - **Matching**: cosine similarity arg-max plus ranked alternatives
//! - **Description**: a single Gemini `generateContent` call with the photo inline
//! - **Web UI**: an upload form and JSON API (`api` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stylefinder::{best_match, Catalog, Result};
//!
//! fn main() -> Result<()> {
//!     let catalog = Catalog::load("data/catalog.json")?;
//!     let query = vec![0.0_f32; catalog.dimension()];
//!     let hit = best_match(&query, catalog.entries())?;
//!     println!("{} ({:.3})", hit.entry.name, hit.score);
//!     Ok(())
//! }
//! ```

// Internal modules
pub mod api;
pub mod core;
/// Defines the application's error types and result aliases.
pub mod error;
pub mod models;
mod state;
mod utils;

/// Build metadata generated by `build.rs`.
pub mod built_info {
    #![allow(missing_docs, dead_code)]
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

// Public API exports
pub use crate::{
    core::{
        embeddings::{preprocess, ImageEncoder},
        finder::StyleFinder,
        generation::GeminiClient,
        media::{InlineImage, PreparedImage, QueryImage},
        similarity::{best_match, cosine_similarity, rank, Confidence, ScoredEntry},
    },
    error::{AppError, Result, ResultExt},
    models::{
        catalog::{Catalog, CatalogEntry},
        report::{ItemSummary, ScoredItem, StyleReport},
    },
    state::{AppState, Config, GenerationConfig, MatchConfig, VisionConfig},
};

#[cfg(feature = "web")]
pub use crate::api::{create_router, health_check};

#[cfg(feature = "embeddings")]
pub use crate::core::embeddings::ResnetEncoder;

/// Initialize logging
///
/// Should be called once, early in process startup. `RUST_LOG` overrides
/// the default `info` filter.
///
/// # Errors
///
/// Returns an error if a global logger is already installed.
///
/// # Example
///
/// ```no_run
/// use stylefinder::init;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     init()?;
///     // Application code here
///     Ok(())
/// }
/// ```
pub fn init() -> Result<()> {
    let env = env_logger::Env::default()
        .default_filter_or("info")
        .default_write_style_or("auto");

    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .format_module_path(false)
        .format_target(false)
        .try_init()
        .map_err(|e| AppError::Config(format!("logger already initialized: {}", e)))?;

    log::info!("Initializing StyleFinder {}", built_info::PKG_VERSION);
    #[cfg(not(feature = "embeddings"))]
    log::warn!("Built without the `embeddings` feature; no image encoder is available");

    Ok(())
}
