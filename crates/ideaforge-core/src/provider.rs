//! Provider seam: the four remote operations a generative-media backend offers.
//!
//! The generation client drives these; `GeminiBackend` is the production
//! implementation and tests supply scripted doubles.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::ForgeResult;

/// One image payload returned inline by the provider (base64 body).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

impl InlineImage {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Embeddable `data:` reference for an `<img src>`.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Video request parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoOptions {
    pub number_of_videos: u32,
    pub resolution: String,
    pub aspect_ratio: String,
}

impl Default for VideoOptions {
    fn default() -> Self {
        Self {
            number_of_videos: 1,
            resolution: "720p".to_string(),
            aspect_ratio: "16:9".to_string(),
        }
    }
}

/// Handle of a long-running video operation as last reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoOperation {
    pub name: String,
    pub done: bool,
    /// Asset locator of the first generated video, once `done`.
    pub locator: Option<String>,
    /// Provider-side failure reported on the finished operation.
    pub error: Option<String>,
}

impl VideoOperation {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn finished(name: impl Into<String>, locator: Option<String>) -> Self {
        Self {
            name: name.into(),
            done: true,
            locator,
            error: None,
        }
    }
}

/// Bytes fetched from an asset locator. Cloning `bytes` shares the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedAsset {
    pub bytes: Bytes,
    pub mime_type: String,
}

/// Remote generative-media operations. Every call takes the API key so the
/// most recently selected key is always the one used.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Generate images from a text prompt. May return zero images.
    async fn generate_images(
        &self,
        api_key: &str,
        prompt: &str,
        count: u32,
    ) -> ForgeResult<Vec<InlineImage>>;

    /// Start a long-running video generation.
    async fn start_video(
        &self,
        api_key: &str,
        prompt: &str,
        options: &VideoOptions,
    ) -> ForgeResult<VideoOperation>;

    /// Refresh the status of a running operation.
    async fn poll_video(&self, api_key: &str, operation: &VideoOperation)
        -> ForgeResult<VideoOperation>;

    /// Fetch a generated asset.
    async fn download(&self, api_key: &str, locator: &str) -> ForgeResult<DownloadedAsset>;
}
