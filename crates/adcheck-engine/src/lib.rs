pub mod config;
pub mod context;
pub mod detect;
pub mod error;
pub mod mask;
pub mod normalize;
pub mod pattern;
pub mod placeholder;
pub mod report;
pub mod ruledb;
pub mod rules;

use std::sync::Arc;

use shared_types::{CheckReport, Finding, IngredientViolation, ViolationItem};

pub use config::EngineConfig;
pub use context::{check_context, ContextRule};
pub use detect::detect_violations;
pub use error::EngineError;
pub use normalize::{normalize_display, normalize_for_matching, NormalizedText};
pub use pattern::{PatternCache, PatternCompiler};
pub use placeholder::PlaceholderTable;
pub use report::{highlight, merge_overlapping, merge_same_expression, MergedFinding};
pub use ruledb::{ProductClass, RuleDatabase};
pub use rules::{RuleFilter, RuleRepository, RuleSet, RuleStore};

/// Advertisement checker entry point
///
/// Owns the placeholder table, the pattern compiler and the current rule set.
/// Checks may run from many threads while [`AdCheckEngine::reload`] swaps in
/// a new rule set.
#[derive(Debug)]
pub struct AdCheckEngine {
    config: EngineConfig,
    placeholders: Arc<PlaceholderTable>,
    compiler: PatternCompiler,
    store: RuleStore,
}

impl AdCheckEngine {
    pub fn new(
        config: EngineConfig,
        placeholders: PlaceholderTable,
        database: &RuleDatabase,
        filter: &RuleFilter,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let mut engine = Self {
            compiler: PatternCompiler::new(config.pattern_cache_capacity),
            placeholders: Arc::new(placeholders),
            config,
            store: RuleStore::default(),
        };
        let rules = engine.repository().build(database, filter);
        engine.store = RuleStore::new(rules);
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn placeholders(&self) -> &PlaceholderTable {
        &self.placeholders
    }

    /// A repository configured like this engine
    pub fn repository(&self) -> RuleRepository<'_> {
        RuleRepository::new(&self.placeholders, &self.compiler)
            .global_category(self.config.global_category.as_deref())
            .mask_filler(self.config.mask_filler)
    }

    /// Current rule set snapshot
    pub fn rules(&self) -> Arc<RuleSet> {
        self.store.snapshot()
    }

    /// Rebuild the rule set and publish it, returning the previous one
    pub fn reload(&self, database: &RuleDatabase, filter: &RuleFilter) -> Arc<RuleSet> {
        let rules = self.repository().build(database, filter);
        self.store.replace(rules)
    }

    pub fn check_text(&self, text: &str) -> Vec<ViolationItem> {
        detect_violations(text, &self.rules())
    }

    /// Run the configured ingredient check; empty when none is configured
    pub fn check_ingredients(&self, text: &str) -> Vec<IngredientViolation> {
        match &self.config.ingredient_check {
            Some(rule) => check_context(text, rule, &self.placeholders),
            None => Vec::new(),
        }
    }

    /// Phrase and ingredient findings for `text`, ordered by start offset
    pub fn check(&self, text: &str) -> CheckReport {
        let rules = self.rules();
        let findings: Vec<Finding> = detect_violations(text, &rules)
            .into_iter()
            .map(Finding::from)
            .chain(self.check_ingredients(text).into_iter().map(Finding::from))
            .collect();
        report::build_report(rules.version(), findings)
    }
}
