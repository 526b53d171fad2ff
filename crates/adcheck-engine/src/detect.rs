//! Phrase violation detection
//!
//! Exclusions are masked first, then rules are scanned longest phrase first.
//! A candidate overlapping an already accepted span is dropped; there is no
//! backtracking to find a better overall cover.

use shared_types::{TextPosition, ViolationItem};
use tracing::trace;

use crate::normalize::{normalize_for_matching, CharIndex};
use crate::rules::RuleSet;

/// Find every rule phrase in `text`, ordered by start offset
///
/// Offsets and matched text refer to `text` itself, not to its normalized
/// form.
pub fn detect_violations(text: &str, rules: &RuleSet) -> Vec<ViolationItem> {
    let normalized = normalize_for_matching(text);
    if normalized.is_empty() || rules.is_empty() {
        return Vec::new();
    }

    let masked = rules.masker().mask(normalized.as_str());
    debug_assert_eq!(masked.chars().count(), normalized.len());

    let index = CharIndex::new(&masked);
    let original: Vec<char> = text.chars().collect();
    let mut accepted: Vec<TextPosition> = Vec::new();
    let mut violations = Vec::new();

    for rule in rules.scan_order() {
        for (start, end) in rule.pattern.find_spans(&masked) {
            let span = TextPosition::new(index.char_at(start), index.char_at(end));
            if accepted.iter().any(|a| a.overlaps(&span)) {
                trace!(phrase = %rule.phrase, ?span, "Dropping overlapped match");
                continue;
            }
            accepted.push(span);

            let position = normalized.original_span(span.start_offset, span.end_offset);
            let matched: String = original[position.start_offset..position.end_offset]
                .iter()
                .collect();
            violations.push(rule.violation(matched, position));
        }
    }

    violations.sort_by_key(|v| v.start_offset);
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PatternCompiler;
    use crate::placeholder::PlaceholderTable;
    use crate::ruledb::RuleDatabase;
    use crate::rules::{RuleFilter, RuleRepository};
    use pretty_assertions::assert_eq;

    fn rules_for(entries: &str) -> RuleSet {
        let json = format!(
            r#"{{"version": "t", "global_categories": [{{"name": "化粧品等",
                "subcategories": [{{"id": "S1", "name": "E01_共通", "rules": [{}]}}]}}]}}"#,
            entries
        );
        let db = RuleDatabase::from_json_str(&json).unwrap();
        let placeholders =
            PlaceholderTable::new([("TUKARE", vec!["の疲れ", "に出た疲れ"])]).unwrap();
        RuleRepository::new(&placeholders, &PatternCompiler::new(16))
            .build(&db, &RuleFilter::default())
    }

    #[test]
    fn test_reports_original_text_and_offsets() {
        let rules = rules_for(r#"{"targetPhrases": ["肌疲れ"], "reason": "疲労回復は不可"}"#);
        let found = detect_violations("化粧水で肌疲れケア", &rules);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].matched_text, "肌疲れ");
        assert_eq!((found[0].start_offset, found[0].end_offset), (4, 7));
        assert_eq!(found[0].category, "化粧品等 > E01_共通");
        assert_eq!(found[0].explanation, "疲労回復は不可");
    }

    #[test]
    fn test_matched_text_keeps_original_width_case_and_spacing() {
        let rules = rules_for(r#"{"targetPhrases": ["しわ\\d+%"]}"#);
        let found = detect_violations("今なら シ ワ１０％ 減少", &rules);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].matched_text, "シ ワ１０％");
        assert_eq!((found[0].start_offset, found[0].end_offset), (4, 10));
    }

    #[test]
    fn test_longer_phrase_wins_at_same_location() {
        let rules = rules_for(
            r#"{"targetPhrases": ["疲れ"], "reason": "short"},
               {"targetPhrases": ["肌{TUKARE}"], "reason": "long"}"#,
        );
        let found = detect_violations("肌の疲れと疲れ", &rules);

        let summary: Vec<(&str, usize, &str)> = found
            .iter()
            .map(|v| (v.matched_text.as_str(), v.start_offset, v.explanation.as_str()))
            .collect();
        assert_eq!(summary, vec![("肌の疲れ", 0, "long"), ("疲れ", 5, "short")]);
    }

    #[test]
    fn test_partial_overlap_rejected_without_backtracking() {
        // "bcd" is taken first; "ab" overlaps it and is dropped even though
        // "a" alone is uncovered
        let rules = rules_for(r#"{"targetPhrases": ["bcd"]}, {"targetPhrases": ["ab"]}"#);
        let found = detect_violations("abcd", &rules);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].matched_text, "bcd");
    }

    #[test]
    fn test_exclusion_masks_match() {
        let rules = rules_for(
            r#"{"targetPhrases": ["肌の疲れ"], "exclusionExpressions": ["肌の疲れを防ぐ"]}"#,
        );
        assert!(detect_violations("肌の疲れを防ぐ化粧水", &rules).is_empty());
        assert_eq!(detect_violations("肌の疲れに", &rules).len(), 1);
    }

    #[test]
    fn test_upper_case_escape_in_exclusion() {
        let rules = rules_for(
            r#"{"targetPhrases": ["美白"], "exclusionExpressions": ["美白\\S*ケア"]}"#,
        );
        assert!(detect_violations("美白用ケア", &rules).is_empty());
        assert_eq!(detect_violations("美白に", &rules).len(), 1);
    }

    #[test]
    fn test_broken_phrase_does_not_disturb_other_rules() {
        let rules = rules_for(r#"{"targetPhrases": ["美白[", "肌疲れ", "しわ"]}"#);
        let found = detect_violations("美白[と肌疲れ、美白とシワ", &rules);

        let summary: Vec<(&str, usize, usize)> = found
            .iter()
            .map(|v| (v.matched_text.as_str(), v.start_offset, v.end_offset))
            .collect();
        assert_eq!(
            summary,
            vec![("美白[", 0, 3), ("肌疲れ", 4, 7), ("シワ", 11, 13)]
        );
        assert!(detect_violations("美白効果", &rules).is_empty());
    }

    #[test]
    fn test_same_phrase_in_two_categories_reported_once() {
        let json = r#"{"global_categories": [{"name": "化粧品等", "subcategories": [
            {"id": "S1", "name": "E01_共通", "rules": [{"targetPhrases": ["美白"]}]},
            {"id": "S2", "name": "E02_共通", "rules": [{"targetPhrases": ["美白"]}]}
        ]}]}"#;
        let db = RuleDatabase::from_json_str(json).unwrap();
        let placeholders = PlaceholderTable::default();
        let rules = RuleRepository::new(&placeholders, &PatternCompiler::default())
            .build(&db, &RuleFilter::default());

        let found = detect_violations("美白", &rules);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].category, "化粧品等 > E01_共通");
    }

    #[test]
    fn test_empty_inputs() {
        let rules = rules_for(r#"{"targetPhrases": ["肌疲れ"]}"#);
        assert!(detect_violations("", &rules).is_empty());
        assert!(detect_violations("   ", &rules).is_empty());
        assert!(detect_violations("肌疲れ", &RuleSet::empty()).is_empty());
    }
}
