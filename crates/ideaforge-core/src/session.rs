//! View state machine for one browser session.
//!
//! ```text
//! NeedsCredentials --select--> Form --submit--> Loading --ok--> Results
//!        ^                       ^                 |               |
//!        |                       |                 +--err--> Error |
//!        |                       +------- back ----+---------------+
//!        +------------- credential failure (from any state)
//! ```
//!
//! Every submission gets a cycle number. Results arriving for a cycle that is
//! no longer the one being displayed are dropped; the network calls behind
//! them are never cancelled.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tracing::{info, warn};

use crate::client::ProgressPhase;
use crate::credentials::CredentialHost;
use crate::error::{ClassifiedFailure, GenerationError};
use crate::form::IdeaFormData;
use crate::media::MediaVault;
use crate::orchestrator::{CycleOutput, Orchestrator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewState {
    NeedsCredentials,
    Form,
    Loading,
    Error,
    Results,
}

/// Images, video and in-progress status of the current cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerationResult {
    pub images: Vec<String>,
    pub video: Option<String>,
    pub status: Option<String>,
}

/// Read-only copy of the session for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub state: ViewState,
    pub cycle: u64,
    pub form: Option<IdeaFormData>,
    pub result: GenerationResult,
    pub error: Option<ClassifiedFailure>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("An API key must be selected first.")]
    CredentialsRequired,

    #[error("A generation is already in progress.")]
    AlreadyLoading,

    #[error("Cannot {action} while in {from:?}.")]
    InvalidTransition { from: ViewState, action: &'static str },

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Proof that `begin` accepted a submission; consumed by `run`.
#[derive(Debug)]
pub struct CycleTicket {
    cycle: u64,
    form: IdeaFormData,
}

impl CycleTicket {
    pub fn cycle(&self) -> u64 {
        self.cycle
    }
}

struct SessionInner {
    state: ViewState,
    cycle: u64,
    form: Option<IdeaFormData>,
    result: GenerationResult,
    error: Option<ClassifiedFailure>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl SessionInner {
    fn is_current(&self, cycle: u64) -> bool {
        self.cycle == cycle && self.state == ViewState::Loading
    }

    /// Drop everything belonging to the displayed cycle; returns the video
    /// reference so the blob can be released.
    fn clear_cycle(&mut self) -> Option<String> {
        self.form = None;
        self.error = None;
        self.started_at = None;
        self.finished_at = None;
        std::mem::take(&mut self.result).video
    }
}

#[derive(Clone)]
pub struct Session {
    inner: Arc<RwLock<SessionInner>>,
    orchestrator: Arc<Orchestrator>,
    credentials: Arc<dyn CredentialHost>,
    vault: MediaVault,
}

impl Session {
    /// Starts in `NeedsCredentials`; call `check_credentials` to leave it.
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        credentials: Arc<dyn CredentialHost>,
        vault: MediaVault,
    ) -> Self {
        Self {
            inner: Arc::new(RwLock::new(SessionInner {
                state: ViewState::NeedsCredentials,
                cycle: 0,
                form: None,
                result: GenerationResult::default(),
                error: None,
                started_at: None,
                finished_at: None,
            })),
            orchestrator,
            credentials,
            vault,
        }
    }

    pub fn vault(&self) -> &MediaVault {
        &self.vault
    }

    pub async fn state(&self) -> ViewState {
        self.inner.read().await.state
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.read().await;
        SessionSnapshot {
            state: inner.state,
            cycle: inner.cycle,
            form: inner.form.clone(),
            result: inner.result.clone(),
            error: inner.error.clone(),
            started_at: inner.started_at,
            finished_at: inner.finished_at,
        }
    }

    /// Leave `NeedsCredentials` if the host already has a usable key.
    pub async fn check_credentials(&self) -> ViewState {
        let ready = self.credentials.has_selected_key().await;
        let mut inner = self.inner.write().await;
        if ready && inner.state == ViewState::NeedsCredentials {
            inner.state = ViewState::Form;
            info!("API key present; showing form");
        }
        inner.state
    }

    /// Run the selection flow with `key`; on success the form is shown.
    pub async fn select_credentials(&self, key: &str) -> Result<ViewState, SessionError> {
        self.credentials.select_key(key).await?;
        let mut inner = self.inner.write().await;
        if inner.state == ViewState::NeedsCredentials {
            inner.state = ViewState::Form;
        }
        inner.error = None;
        Ok(inner.state)
    }

    /// Accept a submission and switch to `Loading`. The cycle itself runs in `run`.
    pub async fn begin(&self, form: IdeaFormData) -> Result<CycleTicket, SessionError> {
        let (ticket, stale) = {
            let mut inner = self.inner.write().await;
            match inner.state {
                ViewState::NeedsCredentials => return Err(SessionError::CredentialsRequired),
                ViewState::Loading => return Err(SessionError::AlreadyLoading),
                ViewState::Form | ViewState::Error | ViewState::Results => {}
            }
            let stale = inner.clear_cycle();
            inner.cycle += 1;
            inner.state = ViewState::Loading;
            inner.form = Some(form.clone());
            inner.started_at = Some(Utc::now());
            info!(cycle = inner.cycle, "submission accepted");
            let ticket = CycleTicket {
                cycle: inner.cycle,
                form,
            };
            (ticket, stale)
        };
        if let Some(reference) = stale {
            self.vault.revoke(&reference).await;
        }
        Ok(ticket)
    }

    /// Drive the cycle to completion and commit the outcome if still current.
    pub async fn run(&self, ticket: CycleTicket) -> ViewState {
        let CycleTicket { cycle, form } = ticket;
        let (tx, mut rx) = mpsc::unbounded_channel::<ProgressPhase>();

        let outcome = {
            let work = self.orchestrator.run_cycle(&form, move |phase| {
                let _ = tx.send(phase);
            });
            tokio::pin!(work);
            loop {
                tokio::select! {
                    biased;
                    Some(phase) = rx.recv() => self.apply_status(cycle, phase).await,
                    out = &mut work => break out,
                }
            }
        };

        match outcome {
            Ok(output) => self.commit_success(cycle, output).await,
            Err(e) => self.commit_failure(cycle, &e).await,
        }
    }

    /// `begin` followed by `run`.
    pub async fn generate(&self, form: IdeaFormData) -> Result<ViewState, SessionError> {
        let ticket = self.begin(form).await?;
        Ok(self.run(ticket).await)
    }

    /// Back to the form; clears images, video, status and error.
    pub async fn back_to_form(&self) -> Result<ViewState, SessionError> {
        let stale = {
            let mut inner = self.inner.write().await;
            match inner.state {
                ViewState::NeedsCredentials => {
                    return Err(SessionError::InvalidTransition {
                        from: inner.state,
                        action: "return to the form",
                    })
                }
                ViewState::Form => return Ok(ViewState::Form),
                ViewState::Loading | ViewState::Error | ViewState::Results => {}
            }
            if inner.state == ViewState::Loading {
                info!(cycle = inner.cycle, "left loading view; results will be discarded");
            }
            inner.state = ViewState::Form;
            inner.clear_cycle()
        };
        if let Some(reference) = stale {
            self.vault.revoke(&reference).await;
        }
        Ok(ViewState::Form)
    }

    async fn apply_status(&self, cycle: u64, phase: ProgressPhase) {
        let mut inner = self.inner.write().await;
        if inner.is_current(cycle) {
            inner.result.status = Some(phase.label().to_string());
        }
    }

    async fn commit_success(&self, cycle: u64, output: CycleOutput) -> ViewState {
        let mut inner = self.inner.write().await;
        if !inner.is_current(cycle) {
            let state = inner.state;
            drop(inner);
            info!(cycle, "discarding results of an abandoned cycle");
            self.vault.revoke(&output.video).await;
            return state;
        }
        inner.result = GenerationResult {
            images: output.images,
            video: Some(output.video),
            status: None,
        };
        inner.started_at = Some(output.started_at);
        inner.finished_at = Some(output.finished_at);
        inner.state = ViewState::Results;
        inner.state
    }

    async fn commit_failure(&self, cycle: u64, err: &GenerationError) -> ViewState {
        let failure = ClassifiedFailure::from(err);

        if failure.category.requires_credentials() {
            // Applies even to abandoned cycles: the key itself is bad.
            self.credentials.reset_selection().await;
            let stale = {
                let mut inner = self.inner.write().await;
                let stale = inner.clear_cycle();
                inner.state = ViewState::NeedsCredentials;
                inner.error = Some(failure);
                stale
            };
            if let Some(reference) = stale {
                self.vault.revoke(&reference).await;
            }
            warn!(cycle, "API key rejected; selection required");
            return ViewState::NeedsCredentials;
        }

        let mut inner = self.inner.write().await;
        if !inner.is_current(cycle) {
            info!(cycle, "discarding failure of an abandoned cycle");
            return inner.state;
        }
        inner.result = GenerationResult::default();
        inner.error = Some(failure);
        inner.finished_at = Some(Utc::now());
        inner.state = ViewState::Error;
        inner.state
    }
}
