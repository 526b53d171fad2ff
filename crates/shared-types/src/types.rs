//! Result types exchanged between the matching core and its consumers.
//!
//! All offsets are character offsets (Unicode scalar values) into the
//! original, un-normalized advertisement text.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPosition {
    pub start_offset: usize, // Inclusive character offset
    pub end_offset: usize,   // Exclusive character offset
}

impl TextPosition {
    pub fn new(start_offset: usize, end_offset: usize) -> Self {
        Self {
            start_offset,
            end_offset,
        }
    }

    pub fn len(&self) -> usize {
        self.end_offset.saturating_sub(self.start_offset)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the two half-open spans share at least one index
    pub fn overlaps(&self, other: &TextPosition) -> bool {
        self.start_offset < other.end_offset && other.start_offset < self.end_offset
    }

    /// True when `other` lies entirely inside this span
    pub fn contains(&self, other: &TextPosition) -> bool {
        self.start_offset <= other.start_offset && self.end_offset >= other.end_offset
    }
}

/// Anything that can be located in the original text
pub trait Spanned {
    fn position(&self) -> TextPosition;
}

/// A regulated phrase found in the advertisement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationItem {
    pub category: String, // e.g., "化粧品等 > E01_共通_「肌の疲れ」等の表現"
    pub matched_text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub explanation: String,
    pub suggestions: Vec<String>,
    pub compliant_examples: Vec<String>,
    pub related_regulations: Vec<String>,
    pub common_prohibitions: Vec<String>,
    pub notes: Vec<String>,
}

impl Spanned for ViolationItem {
    fn position(&self) -> TextPosition {
        TextPosition::new(self.start_offset, self.end_offset)
    }
}

/// A featured ingredient mentioned without a nearby statement of purpose
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientViolation {
    pub ingredient: String,
    pub context: String, // Normalized text window around the occurrence
    pub start_offset: usize,
    pub end_offset: usize,
    pub message: String,
    pub suggestions: Vec<String>,
    pub compliant_examples: Vec<String>,
    pub related_regulations: Vec<String>,
}

impl Spanned for IngredientViolation {
    fn position(&self) -> TextPosition {
        TextPosition::new(self.start_offset, self.end_offset)
    }
}

/// Union of both finding kinds, as presented to users
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    Phrase(ViolationItem),
    Ingredient(IngredientViolation),
}

impl Finding {
    /// Text shown as the heading of the finding
    pub fn label(&self) -> &str {
        match self {
            Finding::Phrase(v) => &v.matched_text,
            Finding::Ingredient(v) => &v.ingredient,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Finding::Phrase(v) => &v.explanation,
            Finding::Ingredient(v) => &v.message,
        }
    }

    pub fn suggestions(&self) -> &[String] {
        match self {
            Finding::Phrase(v) => &v.suggestions,
            Finding::Ingredient(v) => &v.suggestions,
        }
    }

    pub fn compliant_examples(&self) -> &[String] {
        match self {
            Finding::Phrase(v) => &v.compliant_examples,
            Finding::Ingredient(v) => &v.compliant_examples,
        }
    }

    pub fn related_regulations(&self) -> &[String] {
        match self {
            Finding::Phrase(v) => &v.related_regulations,
            Finding::Ingredient(v) => &v.related_regulations,
        }
    }
}

impl Spanned for Finding {
    fn position(&self) -> TextPosition {
        match self {
            Finding::Phrase(v) => v.position(),
            Finding::Ingredient(v) => v.position(),
        }
    }
}

impl From<ViolationItem> for Finding {
    fn from(item: ViolationItem) -> Self {
        Finding::Phrase(item)
    }
}

impl From<IngredientViolation> for Finding {
    fn from(item: IngredientViolation) -> Self {
        Finding::Ingredient(item)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReport {
    pub rule_set_version: String,
    pub findings: Vec<Finding>,
    pub checked_at: u64,
}
