//! Credential capability: is a usable provider key selected, and the flow that
//! selects one.
//!
//! The orchestrator only sees the `CredentialHost` trait. The gateway wires in
//! `UserConfigCredentials`, which keeps the key in `user_config.toml` and falls
//! back to `GEMINI_API_KEY` / `API_KEY` from the environment.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{ForgeResult, GenerationError};

#[async_trait]
pub trait CredentialHost: Send + Sync {
    /// True when a key is selected and may be used for generation.
    async fn has_selected_key(&self) -> bool;

    /// The selection flow: adopt `key` as the active credential.
    async fn select_key(&self, key: &str) -> ForgeResult<()>;

    /// Drop the current selection so the user is asked again.
    async fn reset_selection(&self);

    /// Key to attach to provider requests.
    async fn api_key(&self) -> Option<String>;
}

/// On-disk user settings (`user_config.toml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub selected_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl UserConfig {
    pub fn load_from_path(path: &Path) -> ForgeResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save_to_path(&self, path: &Path) -> ForgeResult<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Priority: user_config.toml > GEMINI_API_KEY > API_KEY
    pub fn effective_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .or_else(|| std::env::var("API_KEY").ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

struct Selection {
    config: UserConfig,
    /// Cleared by `reset_selection`, even when an env key exists, so a rejected
    /// key is not silently reused.
    selected: bool,
}

/// `user_config.toml`-backed credential host.
pub struct UserConfigCredentials {
    path: PathBuf,
    inner: RwLock<Selection>,
}

impl UserConfigCredentials {
    pub fn open(path: impl Into<PathBuf>) -> ForgeResult<Self> {
        let path = path.into();
        let config = UserConfig::load_from_path(&path)?;
        let selected = config.effective_api_key().is_some();
        tracing::info!(path = %path.display(), selected, "credential store opened");
        Ok(Self {
            path,
            inner: RwLock::new(Selection { config, selected }),
        })
    }
}

#[async_trait]
impl CredentialHost for UserConfigCredentials {
    async fn has_selected_key(&self) -> bool {
        let guard = self.inner.read().await;
        guard.selected && guard.config.effective_api_key().is_some()
    }

    async fn select_key(&self, key: &str) -> ForgeResult<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(GenerationError::MissingApiKey);
        }
        let mut guard = self.inner.write().await;
        guard.config.api_key = Some(key.to_string());
        guard.config.selected_at = Some(chrono::Utc::now());
        guard.config.save_to_path(&self.path)?;
        guard.selected = true;
        tracing::info!(path = %self.path.display(), "API key selected");
        Ok(())
    }

    async fn reset_selection(&self) {
        let mut guard = self.inner.write().await;
        guard.config.api_key = None;
        guard.config.selected_at = None;
        guard.selected = false;
        if let Err(e) = guard.config.save_to_path(&self.path) {
            tracing::warn!(error = %e, "could not clear stored API key");
        }
    }

    async fn api_key(&self) -> Option<String> {
        let guard = self.inner.read().await;
        if guard.selected {
            guard.config.effective_api_key()
        } else {
            None
        }
    }
}

/// In-memory host for tests and embedding.
#[derive(Default)]
pub struct StaticCredentials {
    key: RwLock<Option<String>>,
}

impl StaticCredentials {
    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            key: RwLock::new(Some(key.into())),
        }
    }
}

#[async_trait]
impl CredentialHost for StaticCredentials {
    async fn has_selected_key(&self) -> bool {
        self.key.read().await.is_some()
    }

    async fn select_key(&self, key: &str) -> ForgeResult<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(GenerationError::MissingApiKey);
        }
        *self.key.write().await = Some(key.to_string());
        Ok(())
    }

    async fn reset_selection(&self) {
        *self.key.write().await = None;
    }

    async fn api_key(&self) -> Option<String> {
        self.key.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn selected_key_is_persisted_and_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_config.toml");

        let creds = UserConfigCredentials::open(&path).unwrap();
        creds.select_key("  test-key-123 ").await.unwrap();
        assert!(creds.has_selected_key().await);
        assert_eq!(creds.api_key().await.as_deref(), Some("test-key-123"));

        let stored = UserConfig::load_from_path(&path).unwrap();
        assert_eq!(stored.api_key.as_deref(), Some("test-key-123"));
        assert!(stored.selected_at.is_some());
    }

    #[tokio::test]
    async fn reset_blocks_until_reselected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_config.toml");

        let creds = UserConfigCredentials::open(&path).unwrap();
        creds.select_key("first").await.unwrap();
        creds.reset_selection().await;
        assert!(!creds.has_selected_key().await);
        assert!(creds.api_key().await.is_none());

        creds.select_key("second").await.unwrap();
        assert_eq!(creds.api_key().await.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn blank_key_is_rejected() {
        let creds = StaticCredentials::default();
        assert!(creds.select_key("   ").await.is_err());
        assert!(!creds.has_selected_key().await);
    }
}
