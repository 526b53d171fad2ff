//! Rule repository: the rule database flattened into matchable records
//!
//! One [`RuleRecord`] exists per (expanded phrase, category) pair. A built
//! [`RuleSet`] is immutable; reloading builds a new set and publishes it
//! through [`RuleStore`] in one swap.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use shared_types::{TextPosition, ViolationItem};
use tracing::{debug, info, instrument};

use crate::mask::{ExclusionMasker, DEFAULT_MASK_FILLER};
use crate::pattern::{CompiledPattern, PatternCompiler};
use crate::placeholder::PlaceholderTable;
use crate::ruledb::{ProductClass, RuleDatabase, GLOBAL_CATEGORY_NAME};

/// Which rules apply to the advertisement being checked
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFilter {
    #[serde(default)]
    pub product_class: ProductClass,
    #[serde(default)]
    pub usage: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
}

/// One matchable phrase with everything needed to explain a hit
#[derive(Debug)]
pub struct RuleRecord {
    pub phrase: String,
    pub pattern: Arc<CompiledPattern>,
    pub category: String,
    pub explanation: String,
    pub suggestions: Vec<String>,
    pub compliant_examples: Vec<String>,
    pub related_regulations: Vec<String>,
    pub common_prohibitions: Vec<String>,
    pub notes: Vec<String>,
    pub exclusions: Vec<String>,
    pub usage_scope: Vec<String>,
}

impl RuleRecord {
    /// Character length of the phrase; longer phrases are scanned first
    pub fn phrase_len(&self) -> usize {
        self.phrase.chars().count()
    }

    pub(crate) fn violation(&self, matched_text: String, position: TextPosition) -> ViolationItem {
        ViolationItem {
            category: self.category.clone(),
            matched_text,
            start_offset: position.start_offset,
            end_offset: position.end_offset,
            explanation: self.explanation.clone(),
            suggestions: self.suggestions.clone(),
            compliant_examples: self.compliant_examples.clone(),
            related_regulations: self.related_regulations.clone(),
            common_prohibitions: self.common_prohibitions.clone(),
            notes: self.notes.clone(),
        }
    }
}

/// Immutable snapshot of the rules selected from one database version
#[derive(Debug)]
pub struct RuleSet {
    version: String,
    filter: RuleFilter,
    records: Vec<Arc<RuleRecord>>,
    index: HashMap<(String, String), usize>,
    scan_order: Vec<usize>,
    masker: ExclusionMasker,
}

impl RuleSet {
    /// A rule set that matches nothing
    pub fn empty() -> Self {
        Self {
            version: String::new(),
            filter: RuleFilter::default(),
            records: Vec::new(),
            index: HashMap::new(),
            scan_order: Vec::new(),
            masker: ExclusionMasker::empty(DEFAULT_MASK_FILLER),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn filter(&self) -> &RuleFilter {
        &self.filter
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, phrase: &str, category: &str) -> Option<&RuleRecord> {
        self.index
            .get(&(phrase.to_string(), category.to_string()))
            .map(|&i| self.records[i].as_ref())
    }

    /// Records in insertion order
    pub fn records(&self) -> impl Iterator<Item = &RuleRecord> {
        self.records.iter().map(AsRef::as_ref)
    }

    /// Records ordered longest phrase first; equal lengths keep insertion order
    pub fn scan_order(&self) -> impl Iterator<Item = &RuleRecord> {
        self.scan_order.iter().map(|&i| self.records[i].as_ref())
    }

    pub fn masker(&self) -> &ExclusionMasker {
        &self.masker
    }
}

/// Builds [`RuleSet`]s from a rule database
#[derive(Debug, Clone, Copy)]
pub struct RuleRepository<'a> {
    placeholders: &'a PlaceholderTable,
    compiler: &'a PatternCompiler,
    global_category: Option<&'a str>,
    mask_filler: char,
}

impl<'a> RuleRepository<'a> {
    pub fn new(placeholders: &'a PlaceholderTable, compiler: &'a PatternCompiler) -> Self {
        Self {
            placeholders,
            compiler,
            global_category: Some(GLOBAL_CATEGORY_NAME),
            mask_filler: DEFAULT_MASK_FILLER,
        }
    }

    /// Restrict to one global category (`None` reads every category)
    pub fn global_category(mut self, name: Option<&'a str>) -> Self {
        self.global_category = name;
        self
    }

    pub fn mask_filler(mut self, filler: char) -> Self {
        self.mask_filler = filler;
        self
    }

    #[instrument(skip_all, fields(version = %database.version))]
    pub fn build(&self, database: &RuleDatabase, filter: &RuleFilter) -> RuleSet {
        let tier = filter.product_class.tier();
        let usage = filter.usage.as_deref();
        let product = filter.product.as_deref();

        let mut records: Vec<Arc<RuleRecord>> = Vec::new();
        let mut index = HashMap::new();
        let mut skipped_entries = 0usize;

        for (category, sub) in
            database.subcategories_for(self.global_category, filter.product_class)
        {
            let label = format!("{} > {}", category.name, sub.name);

            for entry in &sub.rules {
                if !entry.matches_usage(usage) || !entry.matches_product(product) {
                    skipped_entries += 1;
                    continue;
                }

                let explanation = entry.reason.resolve(tier).trim().to_string();
                let suggestions = entry.suggestion.resolve(tier).into_items();
                let compliant_examples = entry.compliant_examples.resolve(tier);

                for template in &entry.target_phrases {
                    for phrase in self.placeholders.expand(template) {
                        if phrase.trim().is_empty() {
                            continue;
                        }
                        let key = (phrase, label.clone());
                        if index.contains_key(&key) {
                            continue;
                        }

                        let record = RuleRecord {
                            phrase: key.0.clone(),
                            pattern: self.compiler.compile(&key.0),
                            category: label.clone(),
                            explanation: explanation.clone(),
                            suggestions: suggestions.clone(),
                            compliant_examples: compliant_examples.clone(),
                            related_regulations: sub.related_regulations.clone(),
                            common_prohibitions: sub.common_prohibitions.clone(),
                            notes: sub.notes.clone(),
                            exclusions: entry.exclusions.clone(),
                            usage_scope: entry.usage_scope.clone(),
                        };
                        index.insert(key, records.len());
                        records.push(Arc::new(record));
                    }
                }
            }
        }

        let mut scan_order: Vec<usize> = (0..records.len()).collect();
        scan_order.sort_by_key(|&i| Reverse(records[i].phrase_len()));

        let masker = ExclusionMasker::from_rules(
            records.iter().map(AsRef::as_ref),
            self.placeholders,
            self.compiler,
            self.mask_filler,
        );

        debug!(
            records = records.len(),
            exclusions = masker.len(),
            skipped_entries,
            "Built rule set"
        );

        RuleSet {
            version: database.version.clone(),
            filter: filter.clone(),
            records,
            index,
            scan_order,
            masker,
        }
    }
}

/// Holder of the current rule set
///
/// Readers clone the `Arc` and keep using that snapshot; a reload swaps the
/// pointer, so a detection never sees a half-built set.
#[derive(Debug)]
pub struct RuleStore {
    current: RwLock<Arc<RuleSet>>,
}

impl RuleStore {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            current: RwLock::new(Arc::new(rules)),
        }
    }

    pub fn snapshot(&self) -> Arc<RuleSet> {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&current)
    }

    /// Publish a new rule set, returning the one it replaced
    pub fn replace(&self, rules: RuleSet) -> Arc<RuleSet> {
        let next = Arc::new(rules);
        info!(version = %next.version(), records = next.len(), "Swapping rule set");
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, next)
    }
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new(RuleSet::empty())
    }
}
