//! Gateway and generation settings.
//!
//! Precedence: env `IDEAFORGE_CONFIG` path > `config/ideaforge.toml` > defaults,
//! then `IDEAFORGE__*` environment overrides on top.
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | host | 127.0.0.1 | Gateway bind address. |
//! | port | 8000 | Gateway port. |
//! | api_base | https://generativelanguage.googleapis.com/v1beta | Provider REST root. |
//! | image_model | gemini-2.5-flash-image | Model for hero images. |
//! | video_model | veo-3.1-fast-generate-preview | Model for the concept video. |
//! | image_count | 4 | Image variants requested in the prompt. |
//! | video_resolution | 720p | |
//! | video_aspect_ratio | 16:9 | |
//! | poll_interval_secs | 10 | Wait between video status checks. |
//! | max_poll_attempts | 60 | Status checks before giving up with a timeout. |
//! | request_timeout_secs | 120 | Per-request HTTP timeout. |
//! | user_config_path | user_config.toml | Where the selected API key is kept. |

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::provider::VideoOptions;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_VIDEO_MODEL: &str = "veo-3.1-fast-generate-preview";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgeConfig {
    pub host: String,
    pub port: u16,
    pub api_base: String,
    pub image_model: String,
    pub video_model: String,
    pub image_count: u32,
    pub video_resolution: String,
    pub video_aspect_ratio: String,
    pub poll_interval_secs: u64,
    pub max_poll_attempts: u32,
    pub request_timeout_secs: u64,
    pub user_config_path: String,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            api_base: DEFAULT_API_BASE.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            video_model: DEFAULT_VIDEO_MODEL.to_string(),
            image_count: 4,
            video_resolution: "720p".to_string(),
            video_aspect_ratio: "16:9".to_string(),
            poll_interval_secs: 10,
            max_poll_attempts: 60,
            request_timeout_secs: 120,
            user_config_path: "user_config.toml".to_string(),
        }
    }
}

impl ForgeConfig {
    /// Load from the default file location and environment.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("IDEAFORGE_CONFIG").unwrap_or_else(|_| "config/ideaforge.toml".to_string());
        Self::load_from(Path::new(&config_path))
    }

    /// Load with an explicit file; a missing file just means defaults.
    pub fn load_from(path: &Path) -> Result<Self, config::ConfigError> {
        let defaults = ForgeConfig::default();
        let builder = config::Config::builder()
            .set_default("host", defaults.host)?
            .set_default("port", i64::from(defaults.port))?
            .set_default("api_base", defaults.api_base)?
            .set_default("image_model", defaults.image_model)?
            .set_default("video_model", defaults.video_model)?
            .set_default("image_count", i64::from(defaults.image_count))?
            .set_default("video_resolution", defaults.video_resolution)?
            .set_default("video_aspect_ratio", defaults.video_aspect_ratio)?
            .set_default("poll_interval_secs", defaults.poll_interval_secs as i64)?
            .set_default("max_poll_attempts", i64::from(defaults.max_poll_attempts))?
            .set_default("request_timeout_secs", defaults.request_timeout_secs as i64)?
            .set_default("user_config_path", defaults.user_config_path)?;

        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(config::Environment::with_prefix("IDEAFORGE").separator("__"))
            .build()?;

        built.try_deserialize()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn video_options(&self) -> VideoOptions {
        VideoOptions {
            number_of_videos: 1,
            resolution: self.video_resolution.clone(),
            aspect_ratio: self.video_aspect_ratio.clone(),
        }
    }

    pub fn user_config_path(&self) -> PathBuf {
        PathBuf::from(&self.user_config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ForgeConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.image_count, 4);
        assert_eq!(cfg.poll_interval(), Duration::from_secs(10));
        assert_eq!(cfg.video_model, DEFAULT_VIDEO_MODEL);
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ideaforge.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "port = 9100\nmax_poll_attempts = 5\nvideo_aspect_ratio = \"9:16\"").unwrap();

        let cfg = ForgeConfig::load_from(&path).unwrap();
        assert_eq!(cfg.port, 9100);
        assert_eq!(cfg.max_poll_attempts, 5);
        assert_eq!(cfg.video_options().aspect_ratio, "9:16");
        assert_eq!(cfg.host, "127.0.0.1");
    }
}
