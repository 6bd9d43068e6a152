//! Gemini / Veo backend over the Generative Language REST API.
//!
//! Images come back inline from `generateContent`; the video is a long-running
//! `predictLongRunning` operation whose finished response carries a file URI
//! that is fetched with the API key appended as `key=`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::{ForgeConfig, DEFAULT_API_BASE, DEFAULT_IMAGE_MODEL, DEFAULT_VIDEO_MODEL};
use crate::error::{ForgeResult, GenerationError};
use crate::provider::{DownloadedAsset, InlineImage, MediaBackend, VideoOperation, VideoOptions};

const API_KEY_HEADER: &str = "x-goog-api-key";

// generateContent response (only the parts we read)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoParameters<'a> {
    sample_count: u32,
    resolution: &'a str,
    aspect_ratio: &'a str,
}

// Long-running operation
#[derive(Debug, Deserialize)]
struct OperationResponse {
    name: String,
    #[serde(default)]
    done: bool,
    response: Option<OperationResult>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationResult {
    generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateVideoResponse {
    #[serde(default)]
    generated_samples: Vec<GeneratedSample>,
}

#[derive(Debug, Deserialize)]
struct GeneratedSample {
    video: Option<VideoFile>,
}

#[derive(Debug, Deserialize)]
struct VideoFile {
    uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

fn images_from_response(parsed: GenerateContentResponse) -> Vec<InlineImage> {
    // Only the first candidate is considered.
    parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.inline_data)
                .map(|d| InlineImage::new(d.mime_type, d.data))
                .collect()
        })
        .unwrap_or_default()
}

fn operation_from_response(parsed: OperationResponse) -> VideoOperation {
    let locator = parsed
        .response
        .and_then(|r| r.generate_video_response)
        .and_then(|r| r.generated_samples.into_iter().next())
        .and_then(|s| s.video)
        .and_then(|v| v.uri);
    VideoOperation {
        name: parsed.name,
        done: parsed.done,
        locator,
        error: parsed.error.map(|e| e.message).filter(|m| !m.is_empty()),
    }
}

/// Pull the provider's message out of an error body, falling back to raw text.
fn provider_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorEnvelope>(body)
        .map(|e| e.error.message)
        .ok()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.trim().to_string())
}

fn download_url(locator: &str, api_key: &str) -> String {
    let sep = if locator.contains('?') { '&' } else { '?' };
    format!("{}{}key={}", locator, sep, api_key)
}

pub struct GeminiBackend {
    api_base: String,
    image_model: String,
    video_model: String,
    client: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(timeout: Duration) -> ForgeResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_base: DEFAULT_API_BASE.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            video_model: DEFAULT_VIDEO_MODEL.to_string(),
            client,
        })
    }

    pub fn from_config(config: &ForgeConfig) -> ForgeResult<Self> {
        Ok(Self::new(config.request_timeout())?
            .with_api_base(&config.api_base)
            .with_models(&config.image_model, &config.video_model))
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_models(mut self, image_model: &str, video_model: &str) -> Self {
        self.image_model = image_model.to_string();
        self.video_model = video_model.to_string();
        self
    }

    /// Send and turn non-2xx into `Provider` errors carrying the provider's prose.
    async fn send(&self, request: reqwest::RequestBuilder) -> ForgeResult<reqwest::Response> {
        let res = request.send().await?;
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let body = res.text().await.unwrap_or_default();
        Err(GenerationError::Provider {
            status: status.as_u16(),
            message: provider_message(&body),
        })
    }
}

#[async_trait]
impl MediaBackend for GeminiBackend {
    async fn generate_images(
        &self,
        api_key: &str,
        prompt: &str,
        count: u32,
    ) -> ForgeResult<Vec<InlineImage>> {
        let url = format!("{}/models/{}:generateContent", self.api_base, self.image_model);
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "responseModalities": ["IMAGE"] },
        });
        tracing::debug!(model = %self.image_model, count, "requesting images");

        let res = self
            .send(self.client.post(&url).header(API_KEY_HEADER, api_key).json(&body))
            .await?;
        let parsed: GenerateContentResponse = serde_json::from_str(&res.text().await?)?;
        Ok(images_from_response(parsed))
    }

    async fn start_video(
        &self,
        api_key: &str,
        prompt: &str,
        options: &VideoOptions,
    ) -> ForgeResult<VideoOperation> {
        let url = format!("{}/models/{}:predictLongRunning", self.api_base, self.video_model);
        let parameters = VideoParameters {
            sample_count: options.number_of_videos,
            resolution: &options.resolution,
            aspect_ratio: &options.aspect_ratio,
        };
        let body = json!({
            "instances": [{ "prompt": prompt }],
            "parameters": parameters,
        });
        tracing::debug!(model = %self.video_model, "starting video operation");

        let res = self
            .send(self.client.post(&url).header(API_KEY_HEADER, api_key).json(&body))
            .await?;
        let parsed: OperationResponse = serde_json::from_str(&res.text().await?)?;
        Ok(operation_from_response(parsed))
    }

    async fn poll_video(
        &self,
        api_key: &str,
        operation: &VideoOperation,
    ) -> ForgeResult<VideoOperation> {
        let url = format!("{}/{}", self.api_base, operation.name);
        let res = self
            .send(self.client.get(&url).header(API_KEY_HEADER, api_key))
            .await?;
        let parsed: OperationResponse = serde_json::from_str(&res.text().await?)?;
        Ok(operation_from_response(parsed))
    }

    async fn download(&self, api_key: &str, locator: &str) -> ForgeResult<DownloadedAsset> {
        // Transport failures count as download failures too.
        let res = self
            .client
            .get(download_url(locator, api_key))
            .send()
            .await
            .map_err(|e| GenerationError::Download(e.to_string()))?;
        let status = res.status();
        if !status.is_success() {
            let reason = status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.as_u16().to_string());
            return Err(GenerationError::Download(reason));
        }
        let mime_type = res
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("video/mp4")
            .to_string();
        let bytes = res
            .bytes()
            .await
            .map_err(|e| GenerationError::Download(e.to_string()))?;
        Ok(DownloadedAsset { bytes, mime_type })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_images_from_first_candidate() {
        let raw = r#"{
            "candidates": [
                {"content": {"parts": [
                    {"text": "here you go"},
                    {"inlineData": {"mimeType": "image/png", "data": "AAA="}},
                    {"inlineData": {"mimeType": "image/jpeg", "data": "BBB="}}
                ]}},
                {"content": {"parts": [{"inlineData": {"mimeType": "image/png", "data": "CCC="}}]}}
            ]
        }"#;
        let images = images_from_response(serde_json::from_str(raw).unwrap());
        assert_eq!(images.len(), 2);
        assert_eq!(images[1].data_uri(), "data:image/jpeg;base64,BBB=");
    }

    #[test]
    fn no_candidates_means_no_images() {
        let images = images_from_response(serde_json::from_str("{}").unwrap());
        assert!(images.is_empty());
    }

    #[test]
    fn finished_operation_exposes_locator() {
        let raw = r#"{
            "name": "models/veo/operations/abc",
            "done": true,
            "response": {"generateVideoResponse": {"generatedSamples": [
                {"video": {"uri": "https://files.example/v1/abc:download?alt=media"}}
            ]}}
        }"#;
        let op = operation_from_response(serde_json::from_str(raw).unwrap());
        assert!(op.done);
        assert_eq!(
            op.locator.as_deref(),
            Some("https://files.example/v1/abc:download?alt=media")
        );
    }

    #[test]
    fn pending_operation_has_no_locator() {
        let op = operation_from_response(
            serde_json::from_str(r#"{"name": "models/veo/operations/abc"}"#).unwrap(),
        );
        assert!(!op.done);
        assert!(op.locator.is_none());
        assert!(op.error.is_none());
    }

    #[test]
    fn provider_message_prefers_json_error() {
        let body = r#"{"error": {"code": 404, "message": "Requested entity was not found.", "status": "NOT_FOUND"}}"#;
        assert_eq!(provider_message(body), "Requested entity was not found.");
        assert_eq!(provider_message("  upstream timeout "), "upstream timeout");
    }

    #[test]
    fn builds_from_config() {
        let mut config = ForgeConfig::default();
        config.api_base = "http://127.0.0.1:9/v1beta/".to_string();
        config.video_model = "veo-test".to_string();
        let backend = GeminiBackend::from_config(&config).unwrap();
        assert_eq!(backend.api_base, "http://127.0.0.1:9/v1beta");
        assert_eq!(backend.video_model, "veo-test");
        assert_eq!(backend.image_model, DEFAULT_IMAGE_MODEL);
    }

    #[tokio::test]
    async fn unreachable_asset_is_a_download_failure() {
        use crate::error::{ClassifiedFailure, ErrorCategory};

        let backend = GeminiBackend::new(Duration::from_secs(5)).unwrap();
        // Port 9 (discard) is closed on test hosts; the connect is refused.
        let err = backend
            .download("k1", "http://127.0.0.1:9/v1/files/abc:download?alt=media")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Download(_)));
        assert_eq!(
            ClassifiedFailure::from(&err).category,
            ErrorCategory::VideoDownloadFailed
        );
    }

    #[test]
    fn key_is_appended_to_locator() {
        assert_eq!(
            download_url("https://f.example/x?alt=media", "k1"),
            "https://f.example/x?alt=media&key=k1"
        );
        assert_eq!(download_url("https://f.example/x", "k1"), "https://f.example/x?key=k1");
    }
}
