use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::context::ContextRule;
use crate::error::EngineError;
use crate::mask::DEFAULT_MASK_FILLER;
use crate::normalize::fold_for_matching;
use crate::pattern::DEFAULT_CACHE_CAPACITY;
use crate::report::DEFAULT_MERGE_TOLERANCE;
use crate::ruledb::GLOBAL_CATEGORY_NAME;

/// Engine settings, loaded from JSON. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Global category to read rules from; `null` reads all of them
    pub global_category: Option<String>,
    pub pattern_cache_capacity: usize,
    pub mask_filler: char,
    pub merge_tolerance: usize,
    /// Ingredient purpose requirement run alongside phrase detection
    pub ingredient_check: Option<ContextRule>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            global_category: Some(GLOBAL_CATEGORY_NAME.to_string()),
            pattern_cache_capacity: DEFAULT_CACHE_CAPACITY,
            mask_filler: DEFAULT_MASK_FILLER,
            merge_tolerance: DEFAULT_MERGE_TOLERANCE,
            ingredient_check: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| EngineError::parse("engine config", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| EngineError::read(path, e))?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        // Masked spans must stay invisible to rule phrases
        let matchable = match fold_for_matching(self.mask_filler) {
            None => {
                return Err(EngineError::InvalidConfig(
                    "mask_filler must not be whitespace".to_string(),
                ));
            }
            Some(c) => c.is_ascii_alphanumeric() || matches!(c, 'ぁ'..='ゖ'),
        };
        if matchable {
            return Err(EngineError::InvalidConfig(format!(
                "mask_filler {:?} can be matched by rule phrases",
                self.mask_filler
            )));
        }
        if let Some(rule) = &self.ingredient_check {
            if rule.ingredient.trim().is_empty() || rule.purpose.trim().is_empty() {
                return Err(EngineError::InvalidConfig(
                    "ingredient_check needs both an ingredient and a purpose template"
                        .to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_object_gives_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.global_category.as_deref(), Some("化粧品等"));
        assert_eq!(config.pattern_cache_capacity, 128);
        assert_eq!(config.mask_filler, '□');
    }

    #[test]
    fn test_partial_config_with_ingredient_check() {
        let config = EngineConfig::from_json_str(
            r#"{
                "global_category": null,
                "mask_filler": "■",
                "ingredient_check": {"ingredient": "{SEIBUN}", "purpose": "{MOKUTEKI}", "window": 70}
            }"#,
        )
        .unwrap();
        assert_eq!(config.global_category, None);
        assert_eq!(config.mask_filler, '■');
        let rule = config.ingredient_check.unwrap();
        assert_eq!(rule.window, 70);
        assert_eq!(rule.exclusion, None);
    }

    #[test]
    fn test_rejects_matchable_fillers() {
        for filler in ['A', 'ｚ', '7', '５', 'あ', 'ア', 'ン'] {
            let config = EngineConfig {
                mask_filler: filler,
                ..Default::default()
            };
            assert!(
                matches!(config.validate(), Err(EngineError::InvalidConfig(_))),
                "filler {filler:?} accepted"
            );
        }
        for filler in ['□', '■', '*', '〓'] {
            let config = EngineConfig {
                mask_filler: filler,
                ..Default::default()
            };
            assert!(config.validate().is_ok(), "filler {filler:?} rejected");
        }
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"mask_filler": " "}"#),
            Err(EngineError::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str(
                r#"{"ingredient_check": {"ingredient": "", "purpose": "x"}}"#
            ),
            Err(EngineError::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"pattern_cache_capacity": "lots"}"#),
            Err(EngineError::ParseError { .. })
        ));
    }
}
