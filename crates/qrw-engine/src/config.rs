//! Engine configuration

use serde::{Deserialize, Serialize};

/// Tunables for the review workflow engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Name given to a template created implicitly
    pub default_template_name: String,
    /// Minimum keyword-overlap confidence before a category suggestion is
    /// offered for auto-fill
    pub suggestion_threshold: f64,
    /// Minimum number of matched keywords before auto-fill is offered
    pub suggestion_min_matches: usize,
}

impl EngineConfig {
    /// Create the default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With an auto-fill confidence threshold
    #[inline]
    #[must_use]
    pub fn with_suggestion_threshold(mut self, threshold: f64) -> Self {
        self.suggestion_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// With a minimum matched-keyword count for auto-fill
    #[inline]
    #[must_use]
    pub fn with_suggestion_min_matches(mut self, min_matches: usize) -> Self {
        self.suggestion_min_matches = min_matches;
        self
    }

    /// With a default template name
    #[inline]
    #[must_use]
    pub fn with_default_template_name(mut self, name: impl Into<String>) -> Self {
        self.default_template_name = name.into();
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_template_name: "Default Quality Review Template".to_string(),
            suggestion_threshold: 0.6,
            suggestion_min_matches: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_clamps_threshold() {
        let config = EngineConfig::new().with_suggestion_threshold(1.5);
        assert_eq!(config.suggestion_threshold, 1.0);
    }

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.suggestion_min_matches, 2);
        assert!(config.default_template_name.contains("Quality Review"));
    }
}
