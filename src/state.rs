use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::core::embeddings::ImageEncoder;
use crate::core::finder::StyleFinder;
use crate::core::generation::GeminiClient;
use crate::error::{AppError, Result};
use crate::models::catalog::Catalog;

/// Configuration for the application
#[derive(Clone, Debug)]
pub struct Config {
    /// Path of the catalog table loaded at startup
    pub catalog_path: PathBuf,
    /// Address the HTTP server binds to
    pub bind_addr: SocketAddr,
    /// Maximum request body size in bytes
    pub max_upload_size: u64,
    /// Allowed file extensions for uploads
    pub allowed_extensions: Vec<String>,
    /// Image encoder configuration
    pub vision: VisionConfig,
    /// Generation service configuration
    pub generation: GenerationConfig,
    /// Match presentation policy
    pub matching: MatchConfig,
}

/// Image preprocessing and backbone configuration
#[derive(Clone, Debug, PartialEq)]
pub struct VisionConfig {
    /// Width the image is resized to before encoding
    pub target_width: u32,
    /// Height the image is resized to before encoding
    pub target_height: u32,
    /// Per-channel mean subtracted after scaling to [0, 1]
    pub mean: [f32; 3],
    /// Per-channel standard deviation divided out after mean subtraction
    pub std: [f32; 3],
    /// ResNet-50 weights file (tch `.ot` format)
    pub weights_path: Option<PathBuf>,
}

/// Generation service configuration
#[derive(Clone)]
pub struct GenerationConfig {
    /// API key sent with every request
    pub api_key: Option<String>,
    /// Model name, e.g. `gemini-2.0-flash-exp`
    pub model: String,
    /// Base URL of the REST API
    pub base_url: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Nucleus sampling parameter
    pub top_p: f32,
    /// Maximum number of generated tokens
    pub max_output_tokens: u32,
}

/// How matches are presented
#[derive(Clone, Debug, PartialEq)]
pub struct MatchConfig {
    /// Scores at or above this value are presented as strong matches
    pub similarity_threshold: f32,
    /// Number of alternative candidates passed to the generation call
    pub alternatives_count: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("data/catalog.json"),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            max_upload_size: 10 * 1024 * 1024, // 10MB
            allowed_extensions: vec!["jpg", "jpeg", "png", "webp", "gif"]
                .into_iter()
                .map(String::from)
                .collect(),
            vision: VisionConfig::default(),
            generation: GenerationConfig::default(),
            matching: MatchConfig::default(),
        }
    }
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            target_width: 224,
            target_height: 224,
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
            weights_path: None,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: String::from("gemini-2.0-flash-exp"),
            base_url: String::from("https://generativelanguage.googleapis.com"),
            temperature: 0.2,
            top_p: 0.6,
            max_output_tokens: 2000,
        }
    }
}

impl std::fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish()
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.8,
            alternatives_count: 5,
        }
    }
}

impl Config {
    /// Build the configuration from the process environment.
    ///
    /// A `.env` file in the working directory is loaded first; variables
    /// already set in the environment win.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup, starting from defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("STYLEFINDER_CATALOG") {
            config.catalog_path = PathBuf::from(v);
        }
        if let Some(v) = get("STYLEFINDER_ADDR") {
            config.bind_addr = parse_var("STYLEFINDER_ADDR", &v)?;
        }
        if let Some(v) = get("STYLEFINDER_MAX_UPLOAD_BYTES") {
            config.max_upload_size = parse_var("STYLEFINDER_MAX_UPLOAD_BYTES", &v)?;
        }
        if let Some(v) = get("STYLEFINDER_IMAGE_SIZE") {
            let (w, h) = parse_image_size(&v)?;
            config.vision.target_width = w;
            config.vision.target_height = h;
        }
        if let Some(v) = get("STYLEFINDER_WEIGHTS") {
            config.vision.weights_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("GOOGLE_API_KEY") {
            config.generation.api_key = Some(v.trim().to_string());
        }
        if let Some(v) = get("GEMINI_MODEL") {
            config.generation.model = v.trim().to_string();
        }
        if let Some(v) = get("GEMINI_BASE_URL") {
            config.generation.base_url = v.trim().to_string();
        }
        if let Some(v) = get("STYLEFINDER_TEMPERATURE") {
            config.generation.temperature = parse_var("STYLEFINDER_TEMPERATURE", &v)?;
        }
        if let Some(v) = get("STYLEFINDER_TOP_P") {
            config.generation.top_p = parse_var("STYLEFINDER_TOP_P", &v)?;
        }
        if let Some(v) = get("STYLEFINDER_MAX_TOKENS") {
            config.generation.max_output_tokens = parse_var("STYLEFINDER_MAX_TOKENS", &v)?;
        }
        if let Some(v) = get("STYLEFINDER_SIMILARITY_THRESHOLD") {
            config.matching.similarity_threshold = parse_var("STYLEFINDER_SIMILARITY_THRESHOLD", &v)?;
        }
        if let Some(v) = get("STYLEFINDER_ALTERNATIVES") {
            config.matching.alternatives_count = parse_var("STYLEFINDER_ALTERNATIVES", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.vision.target_width == 0 || self.vision.target_height == 0 {
            return Err(AppError::Config("image size must be non-zero".to_string()));
        }
        if self.vision.std.iter().any(|s| *s <= 0.0) {
            return Err(AppError::Config("normalization std must be positive".to_string()));
        }
        let gen = &self.generation;
        if !(0.0..=2.0).contains(&gen.temperature) {
            return Err(AppError::Config(format!(
                "temperature must be within [0, 2], got {}",
                gen.temperature
            )));
        }
        if !(gen.top_p > 0.0 && gen.top_p <= 1.0) {
            return Err(AppError::Config(format!(
                "top_p must be within (0, 1], got {}",
                gen.top_p
            )));
        }
        if gen.max_output_tokens == 0 {
            return Err(AppError::Config("max output tokens must be positive".to_string()));
        }
        if gen.model.is_empty() {
            return Err(AppError::Config("model name must not be empty".to_string()));
        }
        if !(-1.0..=1.0).contains(&self.matching.similarity_threshold) {
            return Err(AppError::Config(format!(
                "similarity threshold must be within [-1, 1], got {}",
                self.matching.similarity_threshold
            )));
        }
        if self.max_upload_size == 0 {
            return Err(AppError::Config("upload size limit must be positive".to_string()));
        }
        Ok(())
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| AppError::Config(format!("{}={:?}: {}", key, value, e)))
}

/// Parse `224` or `320x240`.
fn parse_image_size(value: &str) -> Result<(u32, u32)> {
    let value = value.trim().to_ascii_lowercase();
    match value.split_once('x') {
        Some((w, h)) => Ok((
            parse_var("STYLEFINDER_IMAGE_SIZE", w)?,
            parse_var("STYLEFINDER_IMAGE_SIZE", h)?,
        )),
        None => {
            let side = parse_var("STYLEFINDER_IMAGE_SIZE", &value)?;
            Ok((side, side))
        }
    }
}

/// Application state that can be shared across handlers
#[derive(Clone)]
#[derive(Debug)]
pub struct AppState {
    /// Application configuration
    pub config: Config,
    /// The loaded catalog, encoder and generation client
    pub finder: StyleFinder,
    /// Client used to fetch query images given by URL
    pub http: reqwest::Client,
}

impl AppState {
    /// Wire the loaded catalog and encoder together with a generation client.
    pub fn new(config: Config, catalog: Catalog, encoder: Arc<dyn ImageEncoder>) -> Result<Arc<Self>> {
        let generator = GeminiClient::new(&config.generation)?;
        Ok(Self::with_generator(config, catalog, encoder, generator))
    }

    /// Like [`AppState::new`] with an already constructed generation client.
    pub fn with_generator(
        config: Config,
        catalog: Catalog,
        encoder: Arc<dyn ImageEncoder>,
        generator: GeminiClient,
    ) -> Arc<Self> {
        let finder = StyleFinder::new(Arc::new(catalog), encoder, generator, config.matching.clone());

        Arc::new(Self {
            config,
            finder,
            http: reqwest::Client::new(),
        })
    }
}
