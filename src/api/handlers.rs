use axum::extract::{Multipart, State};
use std::sync::Arc;

use crate::{
    core::media::QueryImage,
    error::{AppError, Result},
    models::report::StyleReport,
    utils::validate_file_extension,
    AppState,
};

use super::responses::{ApiResponse, CatalogInfo};

/// Accepts a multipart form with an `image` file or an `image_url` field.
/// An uploaded file wins when both are present.
pub(crate) async fn analyze(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<ApiResponse<StyleReport>> {
    let mut upload = None;
    let mut url = None;

    // Process the multipart form data
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "image" => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|n| !n.is_empty());
                let content = field.bytes().await?;
                // Browsers send an empty part when no file was picked.
                if content.is_empty() {
                    continue;
                }
                if let Some(file_name) = &file_name {
                    if !validate_file_extension(file_name, &state.config.allowed_extensions) {
                        return Err(AppError::UploadError(format!(
                            "Unsupported file type: {}",
                            file_name
                        )));
                    }
                }
                upload = Some(QueryImage::Upload {
                    bytes: content.to_vec(),
                    file_name,
                });
            }
            "image_url" => {
                let text = field.text().await?;
                let text = text.trim();
                if !text.is_empty() {
                    url = Some(QueryImage::Url(text.to_string()));
                }
            }
            _ => {}
        }
    }

    let query = upload
        .or(url)
        .ok_or_else(|| AppError::UploadError("No image or image_url provided".to_string()))?;

    let prepared = query.prepare(&state.http, state.config.max_upload_size).await?;
    let report = state.finder.analyze(prepared).await?;

    Ok(ApiResponse::success(report))
}

pub(crate) async fn catalog_info(State(state): State<Arc<AppState>>) -> ApiResponse<CatalogInfo> {
    let catalog = state.finder.catalog();
    let matching = state.finder.matching();

    ApiResponse::success(CatalogInfo {
        entries: catalog.len(),
        dimension: catalog.dimension(),
        similarity_threshold: matching.similarity_threshold,
        alternatives_count: matching.alternatives_count,
    })
}
