//! Generation client: one image request, one long-polled video request.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ForgeConfig;
use crate::credentials::CredentialHost;
use crate::error::{ForgeResult, GenerationError};
use crate::form::IdeaFormData;
use crate::prompts;
use crate::provider::{DownloadedAsset, MediaBackend, VideoOptions};

/// Phases reported while the video is being synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    Initializing,
    Generating,
    Finalizing,
}

impl ProgressPhase {
    pub fn label(self) -> &'static str {
        match self {
            ProgressPhase::Initializing => "Initializing video generation...",
            ProgressPhase::Generating => "Generating video... This can take a couple of minutes.",
            ProgressPhase::Finalizing => "Finalizing and fetching video...",
        }
    }
}

/// How the video operation is polled. `max_attempts == 0` polls forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_attempts: 60,
        }
    }
}

pub struct GenerationClient {
    backend: Arc<dyn MediaBackend>,
    credentials: Arc<dyn CredentialHost>,
    image_count: u32,
    video_options: VideoOptions,
    poll: PollPolicy,
}

impl GenerationClient {
    pub fn new(backend: Arc<dyn MediaBackend>, credentials: Arc<dyn CredentialHost>) -> Self {
        Self {
            backend,
            credentials,
            image_count: 4,
            video_options: VideoOptions::default(),
            poll: PollPolicy::default(),
        }
    }

    pub fn from_config(
        config: &ForgeConfig,
        backend: Arc<dyn MediaBackend>,
        credentials: Arc<dyn CredentialHost>,
    ) -> Self {
        Self::new(backend, credentials)
            .with_image_count(config.image_count)
            .with_video_options(config.video_options())
            .with_poll_policy(PollPolicy {
                interval: config.poll_interval(),
                max_attempts: config.max_poll_attempts,
            })
    }

    pub fn with_image_count(mut self, count: u32) -> Self {
        self.image_count = count.max(1);
        self
    }

    pub fn with_video_options(mut self, options: VideoOptions) -> Self {
        self.video_options = options;
        self
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    async fn api_key(&self) -> ForgeResult<String> {
        self.credentials
            .api_key()
            .await
            .ok_or(GenerationError::MissingApiKey)
    }

    /// Image references (data URIs) for the idea. Zero images is a failure.
    pub async fn request_images(&self, form: &IdeaFormData) -> ForgeResult<Vec<String>> {
        let key = self.api_key().await?;
        let prompt = prompts::image_prompt(form, self.image_count);

        let images = self
            .backend
            .generate_images(&key, &prompt, self.image_count)
            .await
            .map_err(|e| {
                warn!(error = %e, "image generation failed");
                e
            })?;

        if images.is_empty() {
            warn!("image generation returned no images");
            return Err(GenerationError::NoImages);
        }

        info!(images = images.len(), "images generated");
        Ok(images.iter().map(|image| image.data_uri()).collect())
    }

    /// The generated video's bytes. Storing them is left to the caller so a
    /// cycle that fails elsewhere keeps nothing.
    ///
    /// `on_progress` fires with `Initializing` before the operation is started,
    /// `Generating` before the first poll, and `Finalizing` once it is done.
    pub async fn request_video<F>(
        &self,
        form: &IdeaFormData,
        on_progress: F,
    ) -> ForgeResult<DownloadedAsset>
    where
        F: Fn(ProgressPhase) + Send + Sync,
    {
        let key = self.api_key().await?;
        let prompt = prompts::video_prompt(form);

        on_progress(ProgressPhase::Initializing);
        let mut operation = self
            .backend
            .start_video(&key, &prompt, &self.video_options)
            .await?;
        info!(operation = %operation.name, "video operation started");

        on_progress(ProgressPhase::Generating);
        let mut attempts: u32 = 0;
        while !operation.done {
            if self.poll.max_attempts > 0 && attempts >= self.poll.max_attempts {
                warn!(operation = %operation.name, attempts, "video operation timed out");
                return Err(GenerationError::VideoTimeout { attempts });
            }
            tokio::time::sleep(self.poll.interval).await;
            operation = self.backend.poll_video(&key, &operation).await?;
            attempts += 1;
            debug!(operation = %operation.name, attempt = attempts, done = operation.done, "video status");
        }

        on_progress(ProgressPhase::Finalizing);
        if let Some(message) = operation.error.take() {
            return Err(GenerationError::Operation(message));
        }
        let locator = operation
            .locator
            .take()
            .filter(|l| !l.trim().is_empty())
            .ok_or(GenerationError::NoDownloadLink)?;

        let asset = self.backend.download(&key, &locator).await?;
        info!(bytes = asset.bytes.len(), polls = attempts, "video downloaded");
        Ok(asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredentials;
    use crate::provider::{InlineImage, VideoOperation};
    use bytes::Bytes;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Reports done after `done_after` polls.
    struct CountingBackend {
        done_after: u32,
        polls: AtomicU32,
        locator: Option<String>,
        events: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl MediaBackend for CountingBackend {
        async fn generate_images(&self, _: &str, _: &str, _: u32) -> ForgeResult<Vec<InlineImage>> {
            Ok(vec![])
        }

        async fn start_video(&self, _: &str, _: &str, _: &VideoOptions) -> ForgeResult<VideoOperation> {
            self.events.lock().unwrap().push("start".to_string());
            Ok(VideoOperation::pending("operations/test"))
        }

        async fn poll_video(&self, _: &str, op: &VideoOperation) -> ForgeResult<VideoOperation> {
            self.events.lock().unwrap().push("poll".to_string());
            let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.done_after {
                Ok(VideoOperation::finished(op.name.clone(), self.locator.clone()))
            } else {
                Ok(VideoOperation::pending(op.name.clone()))
            }
        }

        async fn download(&self, _: &str, _: &str) -> ForgeResult<DownloadedAsset> {
            Ok(DownloadedAsset {
                bytes: Bytes::from_static(b"mp4"),
                mime_type: "video/mp4".to_string(),
            })
        }
    }

    fn client(backend: Arc<CountingBackend>, max_attempts: u32) -> GenerationClient {
        GenerationClient::new(
            backend,
            Arc::new(StaticCredentials::with_key("k")),
        )
        .with_poll_policy(PollPolicy {
            interval: Duration::ZERO,
            max_attempts,
        })
    }

    fn backend(done_after: u32, locator: Option<&str>) -> (Arc<CountingBackend>, Arc<Mutex<Vec<String>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let backend = Arc::new(CountingBackend {
            done_after,
            polls: AtomicU32::new(0),
            locator: locator.map(str::to_string),
            events: Arc::clone(&events),
        });
        (backend, events)
    }

    #[tokio::test]
    async fn polls_exactly_until_done() {
        for k in [1, 3, 7] {
            let (backend, _) = backend(k, Some("https://example.test/v?alt=media"));
            let client = client(Arc::clone(&backend), 0);
            let asset = client
                .request_video(&IdeaFormData::default(), |_| {})
                .await
                .unwrap();
            assert_eq!(asset.mime_type, "video/mp4");
            assert_eq!(backend.polls.load(Ordering::SeqCst), k);
        }
    }

    #[tokio::test]
    async fn progress_reported_before_first_poll() {
        let (backend, events) = backend(2, Some("https://example.test/v"));
        let client = client(backend, 0);

        let sink = Arc::clone(&events);
        client
            .request_video(&IdeaFormData::default(), move |phase| {
                sink.lock().unwrap().push(format!("{:?}", phase));
            })
            .await
            .unwrap();

        let events = events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec!["Initializing", "start", "Generating", "poll", "poll", "Finalizing"]
        );
    }

    #[tokio::test]
    async fn missing_locator_is_asset_missing() {
        let (backend, _) = backend(1, None);
        let err = client(backend, 0)
            .request_video(&IdeaFormData::default(), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::NoDownloadLink));
    }

    #[tokio::test]
    async fn poll_cap_yields_timeout() {
        let (backend, _) = backend(u32::MAX, Some("https://example.test/v"));
        let err = client(Arc::clone(&backend), 5)
            .request_video(&IdeaFormData::default(), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::VideoTimeout { attempts: 5 }));
        assert_eq!(backend.polls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn empty_image_set_fails() {
        let (backend, _) = backend(1, None);
        let err = client(backend, 0)
            .request_images(&IdeaFormData::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::NoImages));
    }

    #[tokio::test]
    async fn no_key_no_request() {
        let (backend, events) = backend(1, None);
        let client = GenerationClient::new(
            backend,
            Arc::new(StaticCredentials::default()),
        );
        let err = client
            .request_video(&IdeaFormData::default(), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::MissingApiKey));
        assert!(events.lock().unwrap().is_empty());
    }
}
