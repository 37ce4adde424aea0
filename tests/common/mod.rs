#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use image::{DynamicImage, ImageOutputFormat, RgbImage};
use stylefinder::{
    AppError, AppState, Catalog, CatalogEntry, Config, GeminiClient, GenerationConfig,
    ImageEncoder, Result,
};

pub const GENERATE_PATH: &str = "/v1beta/models/gemini-test:generateContent";

/// Returns the same vector for every image and counts calls.
#[derive(Debug)]
pub struct StubEncoder {
    pub vector: Vec<f32>,
    pub calls: AtomicUsize,
}

impl StubEncoder {
    pub fn new(vector: Vec<f32>) -> Arc<Self> {
        Arc::new(Self {
            vector,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ImageEncoder for StubEncoder {
    fn encode(&self, _image: &DynamicImage) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.vector.is_empty() {
            return Err(AppError::Internal("stub encoder has no vector".to_string()));
        }
        Ok(self.vector.clone())
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.vector.len())
    }
}

pub fn entry(name: &str, image_ref: &str, price: f64, embedding: Vec<f32>) -> CatalogEntry {
    CatalogEntry {
        image_ref: image_ref.to_string(),
        name: name.to_string(),
        price,
        link: format!("https://shop.example/{}", name.to_lowercase().replace(' ', "-")),
        embedding,
    }
}

/// Three looks; the second photo lists two items.
pub fn sample_catalog() -> Catalog {
    Catalog::from_entries(vec![
        entry("Navy Blazer", "look-1", 129.0, vec![1.0, 0.0]),
        entry("Linen Shirt", "look-2", 45.0, vec![0.0, 1.0]),
        entry("Pleated Skirt", "look-3", 60.0, vec![0.7, 0.7]),
        entry("Leather Belt", "look-3", 25.0, vec![0.7, 0.7]),
    ])
    .unwrap()
}

pub fn generation_config(base_url: &str) -> GenerationConfig {
    GenerationConfig {
        api_key: Some("test-key".to_string()),
        model: "gemini-test".to_string(),
        base_url: base_url.to_string(),
        ..GenerationConfig::default()
    }
}

pub fn app_state(base_url: &str, encoder: Arc<StubEncoder>) -> Arc<AppState> {
    let mut config = Config::default();
    config.generation = generation_config(base_url);
    config.matching.alternatives_count = 2;
    let generator = GeminiClient::new(&config.generation).unwrap();
    AppState::with_generator(config, sample_catalog(), encoder, generator)
}

pub fn png_bytes() -> Vec<u8> {
    let mut imgbuf = RgbImage::new(8, 8);
    for (x, y, pixel) in imgbuf.enumerate_pixels_mut() {
        *pixel = image::Rgb([(x * 30) as u8, (y * 30) as u8, 90]);
    }
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(imgbuf)
        .write_to(&mut buf, ImageOutputFormat::Png)
        .unwrap();
    buf.into_inner()
}

pub fn long_description() -> String {
    format!(
        "{}\n\nITEM DETAILS:\n- Pleated Skirt ($60.00): https://shop.example/pleated-skirt",
        "A soft pleated midi skirt in warm neutrals, paired with a slim leather belt at the waist. "
            .repeat(2)
    )
}
