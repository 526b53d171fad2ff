//! Ingredient purpose check
//!
//! Advertising a featured ingredient requires stating why it is blended in.
//! Every occurrence of the ingredient must have a purpose phrase within a
//! window of characters on either side, unless a permitted expression
//! already covers the occurrence.

use serde::{Deserialize, Serialize};
use shared_types::IngredientViolation;

use crate::normalize::{normalize_for_matching, CharIndex, NormalizedText};
use crate::placeholder::PlaceholderTable;

/// Characters inspected on each side of an ingredient occurrence
pub const DEFAULT_CONTEXT_WINDOW: usize = 80;

const SUGGESTION: &str = "配合目的を明確に記載する。";
const COMPLIANT_EXAMPLE: &str = "肌にうるおいを与え、乾燥を防ぐ。（ヒアルロン酸配合）";
const REGULATION: &str = "適正広告ガイドライン F5";

/// Templates describing one co-occurrence requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextRule {
    pub ingredient: String,
    pub purpose: String,
    #[serde(default)]
    pub exclusion: Option<String>,
    #[serde(default = "default_window")]
    pub window: usize,
}

fn default_window() -> usize {
    DEFAULT_CONTEXT_WINDOW
}

impl ContextRule {
    pub fn new(ingredient: impl Into<String>, purpose: impl Into<String>) -> Self {
        Self {
            ingredient: ingredient.into(),
            purpose: purpose.into(),
            exclusion: None,
            window: DEFAULT_CONTEXT_WINDOW,
        }
    }

    pub fn with_exclusion(mut self, exclusion: impl Into<String>) -> Self {
        self.exclusion = Some(exclusion.into());
        self
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }
}

/// A template expanded into (original form, matching form) pairs
///
/// Variants whose matching form is blank or repeats an earlier one are
/// dropped.
fn variants(template: &str, placeholders: &PlaceholderTable) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = Vec::new();
    for original in placeholders.expand(template) {
        let normalized = normalize_for_matching(&original).into_parts().0;
        if normalized.is_empty() || out.iter().any(|(_, n)| *n == normalized) {
            continue;
        }
        out.push((original, normalized));
    }
    out
}

/// Character spans of every literal occurrence of `needle`
fn occurrences(haystack: &str, index: &CharIndex, needle: &str) -> Vec<(usize, usize)> {
    haystack
        .match_indices(needle)
        .map(|(start, m)| (index.char_at(start), index.char_at(start + m.len())))
        .collect()
}

/// Report ingredient occurrences without a nearby purpose statement
pub fn check_context(
    text: &str,
    rule: &ContextRule,
    placeholders: &PlaceholderTable,
) -> Vec<IngredientViolation> {
    let normalized = normalize_for_matching(text);
    if normalized.is_empty() {
        return Vec::new();
    }

    let ingredients = variants(&rule.ingredient, placeholders);
    let purposes = variants(&rule.purpose, placeholders);
    let index = CharIndex::new(normalized.as_str());

    let covering: Vec<(usize, usize)> = rule
        .exclusion
        .as_deref()
        .map(|template| {
            variants(template, placeholders)
                .iter()
                .flat_map(|(_, excl)| occurrences(normalized.as_str(), &index, excl))
                .collect()
        })
        .unwrap_or_default();

    let chars: Vec<char> = normalized.as_str().chars().collect();
    let mut violations = Vec::new();

    for (ingredient, needle) in &ingredients {
        for (start, end) in occurrences(normalized.as_str(), &index, needle) {
            if covering.iter().any(|&(s, e)| s <= start && e >= end) {
                continue;
            }

            let window_start = start.saturating_sub(rule.window);
            let window_end = end.saturating_add(rule.window).min(chars.len());
            let window: String = chars[window_start..window_end].iter().collect();

            if purposes.iter().any(|(_, purpose)| window.contains(purpose.as_str())) {
                continue;
            }

            violations.push(violation(ingredient, window, &normalized, start, end));
        }
    }

    violations.sort_by_key(|v| v.start_offset);
    violations
}

fn violation(
    ingredient: &str,
    context: String,
    normalized: &NormalizedText,
    start: usize,
    end: usize,
) -> IngredientViolation {
    let position = normalized.original_span(start, end);
    IngredientViolation {
        ingredient: ingredient.to_string(),
        context,
        start_offset: position.start_offset,
        end_offset: position.end_offset,
        message: format!(
            "'{}' を特記成分として表記している場合は配合目的を記載してください。",
            ingredient
        ),
        suggestions: vec![SUGGESTION.to_string()],
        compliant_examples: vec![COMPLIANT_EXAMPLE.to_string()],
        related_regulations: vec![REGULATION.to_string()],
    }
}
