use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::core::media::InlineImage;
use crate::error::{AppError, Result};
use crate::state::GenerationConfig;
use crate::utils::truncate_chars;

/// Responses at least this long may have hit the output limit.
pub const LIKELY_TRUNCATED_CHARS: usize = 7900;

/// Client for the Gemini `generateContent` REST endpoint.
///
/// Each call is a single request; failures are returned to the caller
/// without retrying.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    params: GenerationParams,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("endpoint", &self.endpoint)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationParams {
    temperature: f32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationParams,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 2],
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: Blob<'a>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Blob<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

impl GeminiClient {
    /// Create a client from configuration. An API key is required.
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AppError::Config("GOOGLE_API_KEY is not set".to_string()))?
            .to_string();

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::Config(format!("cannot build HTTP client: {}", e)))?;

        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            config.base_url.trim_end_matches('/'),
            config.model
        );
        log::info!("Using generation model {}", config.model);

        Ok(Self {
            http,
            endpoint,
            api_key,
            params: GenerationParams {
                temperature: config.temperature,
                top_p: config.top_p,
                max_output_tokens: config.max_output_tokens,
            },
        })
    }

    /// Full URL requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one prompt plus image and return the generated text.
    pub async fn generate(&self, prompt: &str, image: &InlineImage) -> Result<String> {
        let request = GenerateContentRequest {
            contents: [Content {
                role: "user",
                parts: [
                    Part::Text { text: prompt },
                    Part::Inline {
                        inline_data: Blob {
                            mime_type: &image.mime_type,
                            data: &image.data,
                        },
                    },
                ],
            }],
            generation_config: self.params,
        };

        log::info!(
            "Sending generation request with prompt length: {}",
            prompt.chars().count()
        );

        let response = self
            .http
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("generation request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body, retry_after));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("invalid generation response: {}", e)))?;

        let text = extract_text(parsed)?;
        log::info!("Received response with length: {}", text.chars().count());
        if text.chars().count() >= LIKELY_TRUNCATED_CHARS {
            log::warn!("Response may be truncated (length: {})", text.chars().count());
        }
        Ok(text)
    }
}

fn classify_failure(status: StatusCode, body: &str, retry_after: Option<u64>) -> AppError {
    let (message, api_status) = match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.message, envelope.error.status),
        Err(_) if body.trim().is_empty() => (status.to_string(), None),
        Err(_) => (truncate_chars(body.trim(), 200), None),
    };

    let credential_problem = matches!(
        api_status.as_deref(),
        Some("UNAUTHENTICATED") | Some("PERMISSION_DENIED")
    ) || (status == StatusCode::BAD_REQUEST && message.contains("API key"));

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Auth(message),
        _ if credential_problem => AppError::Auth(message),
        StatusCode::TOO_MANY_REQUESTS => AppError::RateLimit { message, retry_after },
        _ => AppError::Upstream(format!("generation service returned {}: {}", status, message)),
    }
}

fn extract_text(response: GenerateContentResponse) -> Result<String> {
    let candidate = match response.candidates.into_iter().next() {
        Some(candidate) => candidate,
        None => {
            let reason = response
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates".to_string());
            return Err(AppError::Upstream(format!(
                "generation service returned no text ({})",
                reason
            )));
        }
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(AppError::Upstream(format!(
            "generation service returned no text (finish reason {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }
    if candidate.finish_reason.as_deref() == Some("MAX_TOKENS") {
        log::warn!("Generation stopped at the output token limit");
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    const PATH: &str = "/v1beta/models/gemini-test:generateContent";

    fn client(base_url: &str) -> GeminiClient {
        GeminiClient::new(&GenerationConfig {
            api_key: Some("test-key".to_string()),
            model: "gemini-test".to_string(),
            base_url: base_url.to_string(),
            temperature: 0.2,
            top_p: 0.6,
            max_output_tokens: 2000,
        })
        .unwrap()
    }

    fn image() -> InlineImage {
        InlineImage {
            mime_type: "image/png".to_string(),
            data: "iVBORw0KGgo=".to_string(),
        }
    }

    #[test]
    fn test_requires_api_key() {
        let err = GeminiClient::new(&GenerationConfig::default()).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));

        let blank = GenerationConfig {
            api_key: Some("   ".to_string()),
            ..GenerationConfig::default()
        };
        assert!(GeminiClient::new(&blank).is_err());
    }

    #[test]
    fn test_endpoint_and_debug() {
        let c = client("https://example.test/");
        assert_eq!(
            c.endpoint(),
            "https://example.test/v1beta/models/gemini-test:generateContent"
        );
        assert!(!format!("{:?}", c).contains("test-key"));
    }

    #[tokio::test]
    async fn test_sends_prompt_image_and_parameters() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(PATH)
                    .header("x-goog-api-key", "test-key")
                    .json_body_partial(
                        json!({
                            "contents": [{
                                "role": "user",
                                "parts": [
                                    { "text": "describe" },
                                    { "inlineData": { "mimeType": "image/png", "data": "iVBORw0KGgo=" } }
                                ]
                            }],
                            "generationConfig": { "maxOutputTokens": 2000 }
                        })
                        .to_string(),
                    );
                then.status(200).json_body(json!({
                    "candidates": [{
                        "content": { "parts": [{ "text": "A tailored " }, { "text": "look." }] },
                        "finishReason": "STOP"
                    }]
                }));
            })
            .await;

        let text = client(&server.base_url()).generate("describe", &image()).await.unwrap();
        assert_eq!(text, "A tailored look.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_invalid_key_is_auth_error() {
        let server = MockServer::start_async().await;
        let _m = server
            .mock_async(|when, then| {
                when.method(POST).path(PATH);
                then.status(400).json_body(json!({
                    "error": {
                        "code": 400,
                        "message": "API key not valid. Please pass a valid API key.",
                        "status": "INVALID_ARGUMENT"
                    }
                }));
            })
            .await;

        let err = client(&server.base_url()).generate("p", &image()).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(_)), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn test_quota_is_rate_limit() {
        let server = MockServer::start_async().await;
        let _m = server
            .mock_async(|when, then| {
                when.method(POST).path(PATH);
                then.status(429).header("retry-after", "17").json_body(json!({
                    "error": { "code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED" }
                }));
            })
            .await;

        let err = client(&server.base_url()).generate("p", &image()).await.unwrap_err();
        match err {
            AppError::RateLimit { message, retry_after } => {
                assert_eq!(message, "Resource has been exhausted");
                assert_eq!(retry_after, Some(17));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_server_error_is_upstream() {
        let server = MockServer::start_async().await;
        let _m = server
            .mock_async(|when, then| {
                when.method(POST).path(PATH);
                then.status(503).body("backend unavailable");
            })
            .await;

        let err = client(&server.base_url()).generate("p", &image()).await.unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, AppError::Upstream(_)));
        assert!(msg.contains("503"), "unexpected error: {msg}");
        assert!(msg.contains("backend unavailable"), "unexpected error: {msg}");
    }

    #[tokio::test]
    async fn test_blocked_prompt_reports_reason() {
        let server = MockServer::start_async().await;
        let _m = server
            .mock_async(|when, then| {
                when.method(POST).path(PATH);
                then.status(200)
                    .json_body(json!({ "promptFeedback": { "blockReason": "SAFETY" } }));
            })
            .await;

        let err = client(&server.base_url()).generate("p", &image()).await.unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_upstream() {
        // Nothing listens on port 9 locally.
        let err = client("http://127.0.0.1:9").generate("p", &image()).await.unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));
    }
}
