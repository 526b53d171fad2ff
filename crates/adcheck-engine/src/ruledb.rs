//! Rule database model
//!
//! The database is exported from the rule catalogue as JSON:
//! global categories → subcategories → rule entries. Keys are the catalogue's
//! Japanese column names; English aliases are accepted as well.
//!
//! Explanatory fields may be written once or per regulatory tier
//! (`{"一般": ..., "薬用": ...}`); they are resolved to a single value when the
//! rule set is built.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Global category read by default
pub const GLOBAL_CATEGORY_NAME: &str = "化粧品等";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDatabase {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub last_updated: Option<DateTime<FixedOffset>>,
    pub global_categories: Vec<GlobalCategory>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalCategory {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub subcategories: Vec<Subcategory>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subcategory {
    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub name: String,
    #[serde(rename = "NGワードと禁止理由", alias = "rules", default)]
    pub rules: Vec<RuleEntry>,
    #[serde(rename = "関連法令等", alias = "relatedRegulations", default)]
    pub related_regulations: Vec<String>,
    #[serde(rename = "共通禁止事項", alias = "commonProhibitions", default)]
    pub common_prohibitions: Vec<String>,
    #[serde(rename = "注意点", alias = "notes", default)]
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleEntry {
    #[serde(rename = "グループ", alias = "group", default)]
    pub group: String,
    #[serde(rename = "用途区分", alias = "usageScope", default)]
    pub usage_scope: Vec<String>,
    #[serde(rename = "製品名", alias = "productNames", default)]
    pub product_names: Vec<String>,
    #[serde(rename = "対象ワード", alias = "targetPhrases", default)]
    pub target_phrases: Vec<String>,
    #[serde(rename = "除外表現", alias = "exclusionExpressions", default)]
    pub exclusions: Vec<String>,
    #[serde(rename = "理由", alias = "reason", default)]
    pub reason: Tiered<String>,
    #[serde(rename = "改善提案", alias = "improvementSuggestion", default)]
    pub suggestion: Tiered<TextList>,
    #[serde(rename = "適正表現例", alias = "compliantExamples", default)]
    pub compliant_examples: Tiered<Vec<String>>,
}

impl RuleEntry {
    /// Usage filter: entries declaring usages must list the selected one
    pub fn matches_usage(&self, usage: Option<&str>) -> bool {
        match usage {
            Some(usage) if !self.usage_scope.is_empty() => {
                self.usage_scope.iter().any(|u| u == usage)
            }
            _ => true,
        }
    }

    /// Product filter: once a product is selected, entries must list it
    pub fn matches_product(&self, product: Option<&str>) -> bool {
        match product {
            Some(product) => self.product_names.iter().any(|p| p == product),
            None => true,
        }
    }
}

/// Regulatory tier of explanatory text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegulatoryTier {
    #[default]
    General,
    Medicated,
}

impl RegulatoryTier {
    /// Keys accepted for this tier inside a tiered value
    fn keys(&self) -> &'static [&'static str] {
        match self {
            RegulatoryTier::General => &["一般", "general"],
            RegulatoryTier::Medicated => &["薬用", "medicated"],
        }
    }
}

/// Product class selected by the user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProductClass {
    /// 一般化粧品
    #[default]
    GeneralCosmetics,
    /// 医薬部外品（薬用化粧品）
    QuasiDrug,
}

impl ProductClass {
    pub fn tier(&self) -> RegulatoryTier {
        match self {
            ProductClass::GeneralCosmetics => RegulatoryTier::General,
            ProductClass::QuasiDrug => RegulatoryTier::Medicated,
        }
    }

    /// Common subcategories always apply; the others follow the class
    pub fn includes(&self, kind: SubcategoryKind) -> bool {
        matches!(
            (self, kind),
            (_, SubcategoryKind::Common)
                | (ProductClass::GeneralCosmetics, SubcategoryKind::General)
                | (ProductClass::QuasiDrug, SubcategoryKind::Medicated)
        )
    }
}

/// Partition a subcategory belongs to, derived from its name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubcategoryKind {
    Common,
    General,
    Medicated,
}

impl SubcategoryKind {
    pub fn classify(name: &str) -> Self {
        if name.contains("共通") {
            SubcategoryKind::Common
        } else if name.contains("一般") {
            SubcategoryKind::General
        } else if name.contains("薬用") {
            SubcategoryKind::Medicated
        } else {
            SubcategoryKind::Common
        }
    }
}

/// A value written once, or once per regulatory tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Tiered<T> {
    ByTier(BTreeMap<String, T>),
    Flat(T),
}

impl<T: Default> Default for Tiered<T> {
    fn default() -> Self {
        Tiered::Flat(T::default())
    }
}

/// Values that can be resolved out of a [`Tiered`] field
pub trait TierValue: Clone + Default {
    fn is_blank(&self) -> bool;
}

impl TierValue for String {
    fn is_blank(&self) -> bool {
        self.trim().is_empty()
    }
}

impl TierValue for Vec<String> {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl TierValue for TextList {
    fn is_blank(&self) -> bool {
        match self {
            TextList::Text(text) => text.trim().is_empty(),
            TextList::List(items) => items.is_empty(),
        }
    }
}

impl<T: TierValue> Tiered<T> {
    /// Pick the value for `tier`. An empty medicated value falls back to the
    /// general one.
    pub fn resolve(&self, tier: RegulatoryTier) -> T {
        match self {
            Tiered::Flat(value) => value.clone(),
            Tiered::ByTier(values) => {
                let lookup = |tier: RegulatoryTier| {
                    tier.keys()
                        .iter()
                        .find_map(|key| values.get(*key))
                        .cloned()
                        .unwrap_or_default()
                };
                let value = lookup(tier);
                if tier == RegulatoryTier::Medicated && value.is_blank() {
                    lookup(RegulatoryTier::General)
                } else {
                    value
                }
            }
        }
    }
}

/// Suggestion text: one string or a list of strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextList {
    Text(String),
    List(Vec<String>),
}

impl Default for TextList {
    fn default() -> Self {
        TextList::Text(String::new())
    }
}

impl TextList {
    /// Trimmed, non-blank items
    pub fn into_items(self) -> Vec<String> {
        let items = match self {
            TextList::Text(text) => vec![text],
            TextList::List(items) => items,
        };
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl RuleDatabase {
    /// Parse and validate a rule database
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let database: RuleDatabase =
            serde_json::from_str(json).map_err(|e| EngineError::parse("rule database", e))?;
        database.validate()?;
        Ok(database)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| EngineError::read(path, e))?;
        Self::from_json_str(&json)
    }

    /// Structural checks that serde cannot express
    pub fn validate(&self) -> Result<(), EngineError> {
        let mut subcategory_ids = HashSet::new();

        for category in &self.global_categories {
            if category.name.trim().is_empty() {
                return Err(EngineError::InvalidRuleDatabase(format!(
                    "global category '{}' has an empty name",
                    category.id
                )));
            }
            for sub in &category.subcategories {
                if sub.id.trim().is_empty() {
                    return Err(EngineError::InvalidRuleDatabase(format!(
                        "subcategory '{}' in '{}' has an empty id",
                        sub.name, category.name
                    )));
                }
                if sub.name.trim().is_empty() {
                    return Err(EngineError::InvalidRuleDatabase(format!(
                        "subcategory '{}' has an empty name",
                        sub.id
                    )));
                }
                if !subcategory_ids.insert(sub.id.as_str()) {
                    return Err(EngineError::InvalidRuleDatabase(format!(
                        "duplicate subcategory id '{}'",
                        sub.id
                    )));
                }
            }
        }

        Ok(())
    }

    /// Subcategories selected for a product class, with their global category
    ///
    /// `global_category` restricts the walk to one global category by name;
    /// `None` walks all of them.
    pub fn subcategories_for<'a>(
        &'a self,
        global_category: Option<&'a str>,
        class: ProductClass,
    ) -> impl Iterator<Item = (&'a GlobalCategory, &'a Subcategory)> + 'a {
        self.global_categories
            .iter()
            .filter(move |c| global_category.map_or(true, |name| c.name == name))
            .flat_map(|c| c.subcategories.iter().map(move |s| (c, s)))
            .filter(move |(_, s)| class.includes(SubcategoryKind::classify(&s.name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"{
        "version": "1.0.0",
        "last_updated": "2025-05-01T12:34:56.123456+09:00",
        "global_categories": [{
            "id": "CAT001",
            "name": "化粧品等",
            "subcategories": [{
                "id": "SUB_E01",
                "parent_id": "CAT001",
                "name": "E01_共通_「肌の疲れ」等の表現",
                "NGワードと禁止理由": [{
                    "グループ": "肌の疲労回復的表現",
                    "用途区分": ["スキンケア"],
                    "製品名": ["化粧水"],
                    "対象ワード": ["肌{TUKARE}"],
                    "除外表現": [],
                    "理由": {"一般": " 疲労回復的な表現は不可 ", "薬用": ""},
                    "改善提案": {"一般": "表現を見直す", "薬用": ""},
                    "適正表現例": {"一般": ["例文"], "薬用": []}
                }],
                "関連法令等": ["適正広告ガイドライン E1"]
            }]
        }]
    }"#;

    #[test]
    fn test_parses_catalogue_export() {
        let db = RuleDatabase::from_json_str(SAMPLE).unwrap();
        assert_eq!(db.version, "1.0.0");
        assert!(db.last_updated.is_some());

        let sub = &db.global_categories[0].subcategories[0];
        assert_eq!(sub.related_regulations, vec!["適正広告ガイドライン E1"]);
        assert_eq!(sub.rules[0].target_phrases, vec!["肌{TUKARE}"]);
        assert_eq!(sub.rules[0].product_names, vec!["化粧水"]);
    }

    #[test]
    fn test_accepts_english_aliases_and_flat_values() {
        let json = r#"{
            "global_categories": [{
                "name": "化粧品等",
                "subcategories": [{
                    "id": "S1",
                    "name": "共通",
                    "rules": [{
                        "targetPhrases": ["シミが消える"],
                        "reason": "効能効果の範囲を逸脱",
                        "improvementSuggestion": ["言い換える", "削除する"],
                        "compliantExamples": ["メーキャップ効果によりシミを隠す"]
                    }]
                }]
            }]
        }"#;
        let db = RuleDatabase::from_json_str(json).unwrap();
        let entry = &db.global_categories[0].subcategories[0].rules[0];
        assert_eq!(
            entry.reason.resolve(RegulatoryTier::Medicated),
            "効能効果の範囲を逸脱"
        );
        assert_eq!(
            entry
                .suggestion
                .resolve(RegulatoryTier::General)
                .into_items(),
            vec!["言い換える", "削除する"]
        );
        assert_eq!(
            entry.compliant_examples.resolve(RegulatoryTier::General),
            vec!["メーキャップ効果によりシミを隠す"]
        );
    }

    #[test]
    fn test_medicated_tier_falls_back_to_general() {
        let db = RuleDatabase::from_json_str(SAMPLE).unwrap();
        let entry = &db.global_categories[0].subcategories[0].rules[0];
        assert_eq!(
            entry.reason.resolve(RegulatoryTier::Medicated).trim(),
            "疲労回復的な表現は不可"
        );
        assert_eq!(
            entry.compliant_examples.resolve(RegulatoryTier::Medicated),
            vec!["例文"]
        );
    }

    #[test]
    fn test_text_list_items_are_trimmed() {
        assert_eq!(
            TextList::Text("  ".to_string()).into_items(),
            Vec::<String>::new()
        );
        assert_eq!(
            TextList::List(vec![" a ".to_string(), "".to_string()]).into_items(),
            vec!["a"]
        );
    }

    #[test]
    fn test_missing_required_fields_fail_to_load() {
        assert!(RuleDatabase::from_json_str(r#"{"version": "1"}"#).is_err());
        assert!(RuleDatabase::from_json_str(
            r#"{"global_categories": [{"name": "化粧品等", "subcategories": [{"name": "x"}]}]}"#
        )
        .is_err());
        assert!(RuleDatabase::from_json_str("not json").is_err());
    }

    #[test]
    fn test_validation_rejects_duplicate_subcategory_ids() {
        let json = r#"{"global_categories": [{"name": "化粧品等", "subcategories": [
            {"id": "S1", "name": "共通A"}, {"id": "S1", "name": "共通B"}
        ]}]}"#;
        let err = RuleDatabase::from_json_str(json).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRuleDatabase(_)));
    }

    #[test]
    fn test_subcategory_partitioning() {
        assert_eq!(SubcategoryKind::classify("E01_共通_表現"), SubcategoryKind::Common);
        assert_eq!(SubcategoryKind::classify("G01_一般_表現"), SubcategoryKind::General);
        assert_eq!(SubcategoryKind::classify("M01_薬用_表現"), SubcategoryKind::Medicated);
        assert_eq!(SubcategoryKind::classify("その他"), SubcategoryKind::Common);

        assert!(ProductClass::QuasiDrug.includes(SubcategoryKind::Common));
        assert!(ProductClass::QuasiDrug.includes(SubcategoryKind::Medicated));
        assert!(!ProductClass::QuasiDrug.includes(SubcategoryKind::General));
        assert!(!ProductClass::GeneralCosmetics.includes(SubcategoryKind::Medicated));
    }

    #[test]
    fn test_entry_filters() {
        let entry = RuleEntry {
            usage_scope: vec!["スキンケア".to_string()],
            product_names: vec!["化粧水".to_string()],
            ..Default::default()
        };
        assert!(entry.matches_usage(None));
        assert!(entry.matches_usage(Some("スキンケア")));
        assert!(!entry.matches_usage(Some("ヘアケア")));
        assert!(entry.matches_product(None));
        assert!(entry.matches_product(Some("化粧水")));
        assert!(!entry.matches_product(Some("乳液")));

        let unscoped = RuleEntry::default();
        assert!(unscoped.matches_usage(Some("ヘアケア")));
        assert!(!unscoped.matches_product(Some("化粧水")));
    }
}
