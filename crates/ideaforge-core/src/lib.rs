//! IdeaForge core library.
//! Startup-idea form, Gemini/Veo media generation, orchestration and the view
//! state machine the gateway renders.

use std::sync::Arc;

pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod form;
pub mod gemini;
pub mod media;
pub mod orchestrator;
pub mod prompts;
pub mod provider;
pub mod session;

pub use client::{GenerationClient, PollPolicy, ProgressPhase};
pub use config::ForgeConfig;
pub use credentials::{CredentialHost, StaticCredentials, UserConfig, UserConfigCredentials};
pub use error::{ClassifiedFailure, ErrorCategory, ForgeResult, GenerationError};
pub use form::{IdeaFormData, COMPLEXITY_OPTIONS, MONETIZATION_OPTIONS};
pub use gemini::GeminiBackend;
pub use media::{MediaVault, MEDIA_ROUTE_PREFIX};
pub use orchestrator::{join_first_failure, CycleOutput, Orchestrator};
pub use provider::{DownloadedAsset, InlineImage, MediaBackend, VideoOperation, VideoOptions};
pub use session::{
    CycleTicket, GenerationResult, Session, SessionError, SessionSnapshot, ViewState,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Wire the production stack: Gemini backend, file-backed credentials,
/// in-memory media vault.
pub fn build_session(config: &ForgeConfig) -> ForgeResult<Session> {
    let credentials: Arc<dyn CredentialHost> =
        Arc::new(UserConfigCredentials::open(config.user_config_path())?);
    let backend = Arc::new(GeminiBackend::from_config(config)?);
    let vault = MediaVault::new();
    let client = GenerationClient::from_config(config, backend, Arc::clone(&credentials));
    Ok(Session::new(
        Arc::new(Orchestrator::new(client, vault.clone())),
        credentials,
        vault,
    ))
}
