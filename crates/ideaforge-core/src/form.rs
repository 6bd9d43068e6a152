//! The startup-idea form submitted from the browser.

use serde::{Deserialize, Serialize};

/// Monetization models offered by the form's select box.
pub const MONETIZATION_OPTIONS: &[&str] = &["Subscription", "Freemium", "Pay-per-use", "Marketplace"];

/// Business complexity levels offered by the form's select box.
pub const COMPLEXITY_OPTIONS: &[&str] = &["Low", "Medium", "High"];

fn default_industry() -> String {
    "Healthcare".to_string()
}

fn default_audience() -> String {
    "Small Businesses".to_string()
}

fn default_stack() -> String {
    "React + Node.js".to_string()
}

fn default_monetization() -> String {
    MONETIZATION_OPTIONS[0].to_string()
}

fn default_complexity() -> String {
    COMPLEXITY_OPTIONS[1].to_string()
}

/// Five free-text fields describing the idea. Immutable once submitted.
///
/// Missing fields deserialize to the same defaults the form is pre-filled with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdeaFormData {
    #[serde(default = "default_industry")]
    pub industry: String,
    #[serde(default = "default_audience")]
    pub audience: String,
    #[serde(default = "default_stack")]
    pub stack: String,
    #[serde(default = "default_monetization")]
    pub monetization: String,
    #[serde(default = "default_complexity")]
    pub complexity: String,
}

impl Default for IdeaFormData {
    fn default() -> Self {
        Self {
            industry: default_industry(),
            audience: default_audience(),
            stack: default_stack(),
            monetization: default_monetization(),
            complexity: default_complexity(),
        }
    }
}

impl IdeaFormData {
    pub fn new(
        industry: impl Into<String>,
        audience: impl Into<String>,
        stack: impl Into<String>,
        monetization: impl Into<String>,
        complexity: impl Into<String>,
    ) -> Self {
        Self {
            industry: industry.into(),
            audience: audience.into(),
            stack: stack.into(),
            monetization: monetization.into(),
            complexity: complexity.into(),
        }
    }
}
