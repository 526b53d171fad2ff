//! Masking of permitted expressions
//!
//! Exclusion expressions are blanked out of the normalized text before any
//! rule phrase is matched. Each matched character becomes one filler
//! character, so character positions in the masked text equal positions in
//! the normalized text.

use std::collections::HashSet;
use std::sync::Arc;

use crate::pattern::{CompiledPattern, PatternCompiler};
use crate::placeholder::PlaceholderTable;
use crate::rules::RuleRecord;

/// Character written over masked spans
pub const DEFAULT_MASK_FILLER: char = '□';

#[derive(Debug, Clone)]
pub struct ExclusionMasker {
    patterns: Vec<Arc<CompiledPattern>>,
    filler: char,
}

impl ExclusionMasker {
    /// A masker that masks nothing
    pub fn empty(filler: char) -> Self {
        Self {
            patterns: Vec::new(),
            filler,
        }
    }

    /// Collect the exclusion expressions of every rule
    ///
    /// Templates are expanded, and each distinct expression is compiled once
    /// no matter how many rules list it.
    pub fn from_rules<'r>(
        rules: impl IntoIterator<Item = &'r RuleRecord>,
        placeholders: &PlaceholderTable,
        compiler: &PatternCompiler,
        filler: char,
    ) -> Self {
        let mut seen = HashSet::new();
        let mut patterns = Vec::new();

        for rule in rules {
            for template in &rule.exclusions {
                for expression in placeholders.expand(template) {
                    if expression.trim().is_empty() || !seen.insert(expression.clone()) {
                        continue;
                    }
                    patterns.push(compiler.compile(&expression));
                }
            }
        }

        Self { patterns, filler }
    }

    pub fn filler(&self) -> char {
        self.filler
    }

    /// Number of distinct exclusion expressions
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Overwrite every exclusion match in `normalized` with filler
    ///
    /// The result has exactly as many characters as the input.
    pub fn mask(&self, normalized: &str) -> String {
        let mut masked = normalized.to_string();

        for pattern in &self.patterns {
            let spans = pattern.find_spans(&masked);
            if spans.is_empty() {
                continue;
            }

            let mut out = String::with_capacity(masked.len());
            let mut last = 0;
            for (start, end) in spans {
                out.push_str(&masked[last..start]);
                let width = masked[start..end].chars().count();
                out.extend(std::iter::repeat(self.filler).take(width));
                last = end;
            }
            out.push_str(&masked[last..]);
            masked = out;
        }

        masked
    }
}
