//! Error types for IdeaForge generation, and the mapping from raw failure
//! descriptions to the messages shown in the browser.

use serde::Serialize;
use thiserror::Error;

/// Result type alias for generation operations
pub type ForgeResult<T> = Result<T, GenerationError>;

/// Errors that can occur while generating media for an idea
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("The model did not return any images.")]
    NoImages,

    #[error("Video generation completed, but no download link was found.")]
    NoDownloadLink,

    #[error("Failed to download video. Status: {0}")]
    Download(String),

    #[error("Video generation did not finish within {attempts} status checks.")]
    VideoTimeout { attempts: u32 },

    #[error("Video operation failed: {0}")]
    Operation(String),

    #[error("API_KEY is not available for the request.")]
    MissingApiKey,

    #[error("Provider error {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("Provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider response parse failed: {0}")]
    Json(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Unknown(String),
}

impl From<serde_json::Error> for GenerationError {
    fn from(err: serde_json::Error) -> Self {
        GenerationError::Json(err.to_string())
    }
}

impl From<config::ConfigError> for GenerationError {
    fn from(err: config::ConfigError) -> Self {
        GenerationError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for GenerationError {
    fn from(err: toml::de::Error) -> Self {
        GenerationError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for GenerationError {
    fn from(err: toml::ser::Error) -> Self {
        GenerationError::Config(err.to_string())
    }
}

const FALLBACK_MESSAGE: &str = "An unexpected error occurred.";

/// Failure categories recognised from the provider's prose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    CredentialInvalid,
    NoImagesReturned,
    VideoAssetMissing,
    VideoDownloadFailed,
    VideoTimeout,
    Unclassified,
}

/// Checked top to bottom; first hit wins.
const CLASSIFICATION_TABLE: &[(&str, ErrorCategory)] = &[
    ("Requested entity was not found", ErrorCategory::CredentialInvalid),
    ("did not return any images", ErrorCategory::NoImagesReturned),
    ("no download link was found", ErrorCategory::VideoAssetMissing),
    ("Failed to download video", ErrorCategory::VideoDownloadFailed),
    ("did not finish within", ErrorCategory::VideoTimeout),
];

impl ErrorCategory {
    /// Classify a raw failure description by substring.
    pub fn classify(description: &str) -> Self {
        CLASSIFICATION_TABLE
            .iter()
            .find(|(needle, _)| description.contains(needle))
            .map(|(_, category)| *category)
            .unwrap_or(ErrorCategory::Unclassified)
    }

    /// Fixed text for this category; `None` for unclassified failures.
    pub fn fixed_message(self) -> Option<&'static str> {
        match self {
            ErrorCategory::CredentialInvalid => Some(
                "There was a problem with your API key. It may be invalid, expired, or lack the necessary permissions. Please select a different key and try again.",
            ),
            ErrorCategory::NoImagesReturned => Some(
                "The AI couldn't generate images based on your inputs. Try rephrasing your industry or target audience for better results.",
            ),
            ErrorCategory::VideoAssetMissing => Some(
                "Video generation was successful, but the final video file could not be retrieved. This might be a temporary issue. Please try again.",
            ),
            ErrorCategory::VideoDownloadFailed => Some(
                "There was a problem downloading the generated video. Please check your internet connection and try again.",
            ),
            ErrorCategory::VideoTimeout => Some(
                "Video generation is taking longer than expected and was stopped. Please try again.",
            ),
            ErrorCategory::Unclassified => None,
        }
    }

    /// True when the failure means the selected key must be replaced.
    pub fn requires_credentials(self) -> bool {
        self == ErrorCategory::CredentialInvalid
    }
}

/// A failure after classification: what the user sees, plus the category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedFailure {
    pub category: ErrorCategory,
    pub message: String,
}

impl ClassifiedFailure {
    pub fn from_description(description: &str) -> Self {
        let category = ErrorCategory::classify(description);
        let message = match category.fixed_message() {
            Some(fixed) => fixed.to_string(),
            None if description.trim().is_empty() => FALLBACK_MESSAGE.to_string(),
            None => description.to_string(),
        };
        Self { category, message }
    }
}

impl From<&GenerationError> for ClassifiedFailure {
    fn from(err: &GenerationError) -> Self {
        ClassifiedFailure::from_description(&err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_entity_is_a_credentials_problem() {
        let err = GenerationError::Provider {
            status: 404,
            message: "Requested entity was not found.".to_string(),
        };
        let failure = ClassifiedFailure::from(&err);
        assert_eq!(failure.category, ErrorCategory::CredentialInvalid);
        assert!(failure.category.requires_credentials());
        assert!(failure.message.contains("problem with your API key"));
    }

    #[test]
    fn own_errors_map_to_their_categories() {
        let cases = [
            (GenerationError::NoImages, ErrorCategory::NoImagesReturned),
            (GenerationError::NoDownloadLink, ErrorCategory::VideoAssetMissing),
            (
                GenerationError::Download("Forbidden".to_string()),
                ErrorCategory::VideoDownloadFailed,
            ),
            (
                GenerationError::VideoTimeout { attempts: 3 },
                ErrorCategory::VideoTimeout,
            ),
            (GenerationError::MissingApiKey, ErrorCategory::Unclassified),
        ];
        for (err, expected) in cases {
            assert_eq!(ClassifiedFailure::from(&err).category, expected, "{err}");
        }
    }

    #[test]
    fn unclassified_keeps_raw_text() {
        let failure = ClassifiedFailure::from_description("quota exceeded for project");
        assert_eq!(failure.category, ErrorCategory::Unclassified);
        assert_eq!(failure.message, "quota exceeded for project");
    }

    #[test]
    fn empty_description_falls_back() {
        let failure = ClassifiedFailure::from_description("  ");
        assert_eq!(failure.message, FALLBACK_MESSAGE);
    }

    #[test]
    fn credential_phrase_wins_over_later_rows() {
        let failure = ClassifiedFailure::from_description(
            "Failed to download video: Requested entity was not found",
        );
        assert_eq!(failure.category, ErrorCategory::CredentialInvalid);
    }
}
