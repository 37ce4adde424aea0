use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat, ImageOutputFormat};
use serde::Serialize;

use crate::error::{AppError, Result, ResultExt};

/// A photo submitted for analysis, before decoding.
#[derive(Debug, Clone)]
pub enum QueryImage {
    /// Raw bytes from a file upload.
    Upload {
        /// File content.
        bytes: Vec<u8>,
        /// Name reported by the client, if any.
        file_name: Option<String>,
    },
    /// A pasted image URL, fetched on demand.
    Url(String),
}

/// Image bytes ready to be sent inline to the generation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineImage {
    /// MIME type of `data`.
    pub mime_type: String,
    /// Base64 (standard alphabet, padded) image bytes.
    pub data: String,
}

impl InlineImage {
    fn encode(mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            data: STANDARD.encode(bytes),
        }
    }
}

/// A decoded query image plus its inline payload.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    /// Decoded pixels, handed to the encoder.
    pub image: DynamicImage,
    /// Payload for the generation request.
    pub inline: InlineImage,
}

impl QueryImage {
    /// Short label for logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Upload { bytes, file_name } => format!(
                "upload {} ({} bytes)",
                file_name.as_deref().unwrap_or("<unnamed>"),
                bytes.len()
            ),
            Self::Url(url) => format!("url {}", url),
        }
    }

    /// Resolve to raw bytes, downloading URLs with `http`. Neither source may
    /// exceed `max_bytes`.
    pub async fn into_bytes(self, http: &reqwest::Client, max_bytes: u64) -> Result<Vec<u8>> {
        match self {
            Self::Upload { bytes, .. } => {
                if bytes.len() as u64 > max_bytes {
                    return Err(too_large("upload", max_bytes));
                }
                Ok(bytes)
            }
            Self::Url(url) => fetch(http, &url, max_bytes).await,
        }
    }

    /// Resolve and decode. Fails before any encoder or generation call when
    /// the data is not a readable image.
    pub async fn prepare(self, http: &reqwest::Client, max_bytes: u64) -> Result<PreparedImage> {
        log::debug!("Preparing query image: {}", self.describe());
        let bytes = self.into_bytes(http, max_bytes).await?;
        PreparedImage::decode(bytes)
    }
}

fn too_large(what: &str, max_bytes: u64) -> AppError {
    AppError::InvalidInput(format!("{} exceeds the {} byte image limit", what, max_bytes))
}

/// Download an image over HTTP(S), reading at most `max_bytes` of body.
pub async fn fetch(http: &reqwest::Client, url: &str, max_bytes: u64) -> Result<Vec<u8>> {
    let parsed = reqwest::Url::parse(url.trim())
        .map_err(|e| AppError::InvalidInput(format!("invalid image URL {:?}: {}", url, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::InvalidInput(format!(
            "unsupported URL scheme {:?}",
            parsed.scheme()
        )));
    }

    let mut response = http
        .get(parsed)
        .send()
        .await
        .map_err(|e| AppError::InvalidInput(format!("could not fetch {}: {}", url, e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AppError::InvalidInput(format!(
            "fetching {} returned {}",
            url, status
        )));
    }

    if response.content_length().is_some_and(|len| len > max_bytes) {
        return Err(too_large(url, max_bytes));
    }

    // Content-Length may be absent or wrong; count what actually arrives.
    let mut bytes = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| AppError::InvalidInput(format!("could not read {}: {}", url, e)))?
    {
        if (bytes.len() + chunk.len()) as u64 > max_bytes {
            return Err(too_large(url, max_bytes));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

impl PreparedImage {
    /// Decode raw bytes and build the inline payload.
    ///
    /// PNG, JPEG and WebP are forwarded as-is; other formats are re-encoded
    /// as PNG.
    pub fn decode(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(AppError::InvalidInput("image is empty".to_string()));
        }

        let format = image::guess_format(&bytes)
            .map_err(|e| AppError::InvalidInput(format!("unrecognized image data: {}", e)))?;
        let image = image::load_from_memory_with_format(&bytes, format)
            .map_err(|e| AppError::InvalidInput(format!("could not decode image: {}", e)))?;

        let inline = match format {
            ImageFormat::Png => InlineImage::encode("image/png", &bytes),
            ImageFormat::Jpeg => InlineImage::encode("image/jpeg", &bytes),
            ImageFormat::WebP => InlineImage::encode("image/webp", &bytes),
            other => {
                log::debug!("Re-encoding {:?} query image as PNG", other);
                let mut buf = Cursor::new(Vec::new());
                image
                    .write_to(&mut buf, ImageOutputFormat::Png)
                    .context("re-encoding image as PNG")?;
                InlineImage::encode("image/png", buf.get_ref())
            }
        };

        Ok(Self { image, inline })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use image::{GenericImageView, RgbImage};

    const LIMIT: u64 = 1024 * 1024;

    fn encoded(format: ImageOutputFormat) -> Vec<u8> {
        let mut imgbuf = RgbImage::new(4, 4);
        for (x, y, pixel) in imgbuf.enumerate_pixels_mut() {
            *pixel = image::Rgb([(x * 60) as u8, (y * 60) as u8, 128]);
        }
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(imgbuf).write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_png_passes_through() {
        let bytes = encoded(ImageOutputFormat::Png);
        let prepared = PreparedImage::decode(bytes.clone()).unwrap();
        assert_eq!(prepared.inline.mime_type, "image/png");
        assert_eq!(STANDARD.decode(&prepared.inline.data).unwrap(), bytes);
        assert_eq!((prepared.image.width(), prepared.image.height()), (4, 4));
    }

    #[test]
    fn test_gif_is_reencoded_as_png() {
        let prepared = PreparedImage::decode(encoded(ImageOutputFormat::Gif)).unwrap();
        assert_eq!(prepared.inline.mime_type, "image/png");
        let png = STANDARD.decode(&prepared.inline.data).unwrap();
        assert_eq!(image::guess_format(&png).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn test_rejects_garbage() {
        let err = PreparedImage::decode(b"definitely not an image".to_vec()).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let err = PreparedImage::decode(Vec::new()).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_rejects_truncated_png() {
        let mut bytes = encoded(ImageOutputFormat::Png);
        bytes.truncate(20);
        let err = PreparedImage::decode(bytes).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_prepare_fetches_url() {
        let server = MockServer::start_async().await;
        let body = encoded(ImageOutputFormat::Png);
        let _m = server
            .mock_async(|when, then| {
                when.method(GET).path("/look.png");
                then.status(200).header("content-type", "image/png").body(body.clone());
            })
            .await;

        let prepared = QueryImage::Url(server.url("/look.png"))
            .prepare(&reqwest::Client::new(), LIMIT)
            .await
            .unwrap();
        assert_eq!(prepared.inline.mime_type, "image/png");
    }

    #[tokio::test]
    async fn test_fetch_reports_http_errors() {
        let server = MockServer::start_async().await;
        let _m = server
            .mock_async(|when, then| {
                when.method(GET).path("/missing.jpg");
                then.status(404);
            })
            .await;

        let err = fetch(&reqwest::Client::new(), &server.url("/missing.jpg"), LIMIT)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_http_scheme() {
        let err = fetch(&reqwest::Client::new(), "file:///etc/passwd", LIMIT).await.unwrap_err();
        assert!(err.to_string().contains("scheme"));
    }

    #[tokio::test]
    async fn test_fetch_enforces_size_limit() {
        let server = MockServer::start_async().await;
        let body = vec![0u8; 64 * 1024];
        let m = server
            .mock_async(|when, then| {
                when.method(GET).path("/huge.png");
                then.status(200).body(body.clone());
            })
            .await;

        let err = fetch(&reqwest::Client::new(), &server.url("/huge.png"), 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(err.to_string().contains("1024 byte image limit"));

        // Exactly at the limit is fine
        let bytes = fetch(&reqwest::Client::new(), &server.url("/huge.png"), 64 * 1024)
            .await
            .unwrap();
        assert_eq!(bytes.len(), 64 * 1024);
        m.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn test_oversized_upload_rejected() {
        let query = QueryImage::Upload {
            bytes: vec![0u8; 2048],
            file_name: None,
        };
        let err = query.into_bytes(&reqwest::Client::new(), 1024).await.unwrap_err();
        assert!(err.to_string().contains("upload exceeds"));
    }
}
