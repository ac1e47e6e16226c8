//! Defect category suggestion
//!
//! Scores a free-text defect remark against the template's category keyword
//! hints. The scoring is a replaceable heuristic: matched-keyword count
//! normalized by the category's keyword count, whole-token matches only.

use crate::config::EngineConfig;
use once_cell::sync::Lazy;
use qrw_model::{CategoryId, DefectCategory};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Common filler words ignored during tokenization
static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "and", "are", "as", "at", "be", "but", "for", "in", "is", "it", "not", "of",
        "on", "or", "that", "the", "this", "to", "was", "were", "with",
    ]
    .into_iter()
    .collect()
});

/// Outcome of scoring a remark against the category list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySuggestion {
    /// Top-scoring category, when any keyword matched
    pub suggested_category_id: Option<CategoryId>,
    /// Name of the suggested category
    pub category_name: Option<String>,
    /// Normalized keyword-overlap score in `[0, 1]`
    pub confidence: f64,
    /// Whether the score clears the configured auto-fill bar
    pub auto_fill: bool,
    /// Keywords of the suggested category found in the remark
    pub match_count: usize,
    /// Tokens extracted from the remark
    pub token_count: usize,
}

impl CategorySuggestion {
    /// A no-match result
    #[must_use]
    pub(crate) fn none(token_count: usize) -> Self {
        Self {
            suggested_category_id: None,
            category_name: None,
            confidence: 0.0,
            auto_fill: false,
            match_count: 0,
            token_count,
        }
    }
}

/// Lowercased word tokens of a remark, stopwords and single letters dropped
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 2 && !STOPWORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Score a remark against the category list and pick the best candidate
pub(crate) fn suggest(
    remark: &str,
    categories: &[DefectCategory],
    config: &EngineConfig,
) -> CategorySuggestion {
    let normalized = remark.to_lowercase();
    let tokens = tokenize(remark);
    let token_set: HashSet<&str> = tokens.iter().map(String::as_str).collect();

    if tokens.is_empty() || categories.is_empty() {
        return CategorySuggestion::none(tokens.len());
    }

    let mut best: Option<(&DefectCategory, usize, f64)> = None;
    for category in categories {
        if category.keywords.is_empty() {
            continue;
        }
        let matched = category
            .keywords
            .iter()
            .filter(|kw| keyword_matches(kw, &token_set, &normalized))
            .count();
        if matched == 0 {
            continue;
        }
        let confidence = matched as f64 / category.keywords.len() as f64;
        let better = match best {
            Some((_, _, best_confidence)) => confidence > best_confidence,
            None => true,
        };
        if better {
            best = Some((category, matched, confidence));
        }
    }

    match best {
        Some((category, matched, confidence)) => CategorySuggestion {
            suggested_category_id: Some(category.id),
            category_name: Some(category.name.clone()),
            confidence,
            auto_fill: confidence >= config.suggestion_threshold
                && matched >= config.suggestion_min_matches,
            match_count: matched,
            token_count: tokens.len(),
        },
        None => CategorySuggestion::none(tokens.len()),
    }
}

/// A keyword matches as a whole token; multi-word keywords match as a phrase
fn keyword_matches(keyword: &str, tokens: &HashSet<&str>, normalized_remark: &str) -> bool {
    let keyword = keyword.trim().to_lowercase();
    if keyword.is_empty() {
        return false;
    }
    if keyword.contains(char::is_whitespace) {
        normalized_remark.contains(&keyword)
    } else {
        tokens.contains(keyword.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories() -> Vec<DefectCategory> {
        vec![
            DefectCategory::new("Wiring").with_keywords(vec![
                "cable".into(),
                "loose".into(),
                "terminal".into(),
            ]),
            DefectCategory::new("Documentation")
                .with_keywords(vec!["manual".into(), "drawing".into()]),
        ]
    }

    #[test]
    fn tokenize_drops_stopwords_and_short_words() {
        let tokens = tokenize("The cable is loose at terminal X1");
        assert_eq!(tokens, vec!["cable", "loose", "terminal", "x1"]);
    }

    #[test]
    fn empty_remark_suggests_nothing() {
        let suggestion = suggest("   ", &categories(), &EngineConfig::default());
        assert_eq!(suggestion.suggested_category_id, None);
        assert!(!suggestion.auto_fill);
        assert_eq!(suggestion.confidence, 0.0);
    }

    #[test]
    fn picks_highest_overlap_category() {
        let cats = categories();
        let suggestion = suggest(
            "Loose cable found on terminal strip",
            &cats,
            &EngineConfig::default(),
        );
        assert_eq!(suggestion.suggested_category_id, Some(cats[0].id));
        assert_eq!(suggestion.category_name.as_deref(), Some("Wiring"));
        assert_eq!(suggestion.match_count, 3);
        assert!((suggestion.confidence - 1.0).abs() < f64::EPSILON);
        assert!(suggestion.auto_fill);
    }

    #[test]
    fn single_match_does_not_auto_fill() {
        let cats = categories();
        let suggestion = suggest("drawing outdated", &cats, &EngineConfig::default());
        assert_eq!(suggestion.suggested_category_id, Some(cats[1].id));
        assert_eq!(suggestion.match_count, 1);
        // Confidence 0.5 under threshold, one match under the minimum
        assert!(!suggestion.auto_fill);
    }

    #[test]
    fn keywords_match_whole_tokens_only() {
        let cats = vec![DefectCategory::new("Wiring").with_keywords(vec!["able".into()])];
        let suggestion = suggest("cable damaged", &cats, &EngineConfig::default());
        assert_eq!(suggestion.suggested_category_id, None);
    }

    #[test]
    fn multi_word_keywords_match_as_phrase() {
        let cats = vec![DefectCategory::new("Process")
            .with_keywords(vec!["sign off".into(), "missing approval".into()])];
        let suggestion = suggest(
            "Missing approval and no sign off recorded",
            &cats,
            &EngineConfig::default(),
        );
        assert_eq!(suggestion.match_count, 2);
        assert!(suggestion.auto_fill);
    }
}
