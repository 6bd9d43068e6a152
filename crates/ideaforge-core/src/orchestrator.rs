//! Orchestrator: runs the image and the video request side by side.
//!
//! Both requests are joined with first-failure-wins semantics: as soon as one
//! fails the cycle fails with that error and the other future is dropped.
//! Success needs both.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::client::{GenerationClient, ProgressPhase};
use crate::error::{ClassifiedFailure, ForgeResult};
use crate::form::IdeaFormData;
use crate::media::MediaVault;

/// Everything a successful cycle produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleOutput {
    pub images: Vec<String>,
    pub video: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Await both futures; the first error wins, otherwise both values.
pub async fn join_first_failure<A, B, T, U, E>(a: A, b: B) -> Result<(T, U), E>
where
    A: Future<Output = Result<T, E>>,
    B: Future<Output = Result<U, E>>,
{
    tokio::try_join!(a, b)
}

pub struct Orchestrator {
    client: GenerationClient,
    vault: MediaVault,
}

impl Orchestrator {
    /// Videos of successful cycles are stored in `vault`.
    pub fn new(client: GenerationClient, vault: MediaVault) -> Self {
        Self { client, vault }
    }

    /// One generation cycle: exactly one image request and one video request.
    /// The video reaches the vault only when both sides succeed.
    pub async fn run_cycle<F>(&self, form: &IdeaFormData, on_progress: F) -> ForgeResult<CycleOutput>
    where
        F: Fn(ProgressPhase) + Send + Sync,
    {
        let started_at = Utc::now();
        info!(industry = %form.industry, audience = %form.audience, "generation cycle started");

        let images = self.client.request_images(form);
        let video = self.client.request_video(form, on_progress);

        match join_first_failure(images, video).await {
            Ok((images, asset)) => {
                let video = self.vault.insert(asset).await;
                let finished_at = Utc::now();
                info!(
                    images = images.len(),
                    elapsed_ms = (finished_at - started_at).num_milliseconds(),
                    "generation cycle finished"
                );
                Ok(CycleOutput {
                    images,
                    video,
                    started_at,
                    finished_at,
                })
            }
            Err(e) => {
                let failure = ClassifiedFailure::from(&e);
                warn!(error = %e, category = ?failure.category, "generation cycle failed");
                Err(e)
            }
        }
    }
}
