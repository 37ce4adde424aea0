use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Envelope for successful API responses; errors render through `AppError`.
#[derive(Debug, Serialize)]
pub(crate) struct ApiResponse<T: Serialize> {
    success: bool,
    data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub(crate) fn success(data: T) -> Self {
        Self { success: true, data }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Summary of the loaded catalog.
#[derive(Debug, Serialize)]
pub(crate) struct CatalogInfo {
    pub(crate) entries: usize,
    pub(crate) dimension: usize,
    pub(crate) similarity_threshold: f32,
    pub(crate) alternatives_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_success_envelope() {
        let response = ApiResponse::success(serde_json::json!({ "entries": 3 })).into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value, serde_json::json!({ "success": true, "data": { "entries": 3 } }));
    }
}
