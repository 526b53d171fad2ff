//! Presentation helpers: highlighting, finding merges and the check report

use std::collections::HashMap;

use serde::Serialize;
use shared_types::{CheckReport, Finding, Spanned, TextPosition};

use crate::normalize::normalize_display;

/// Position difference under which two findings count as the same span
pub const DEFAULT_MERGE_TOLERANCE: usize = 2;

/// Wrap every finding's span in `open`/`close`
///
/// Spans are applied in ascending start order; a span overlapping one that
/// was already wrapped is skipped, as is any span outside the text.
pub fn highlight<T: Spanned>(text: &str, findings: &[T], open: &str, close: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut spans: Vec<TextPosition> = findings.iter().map(Spanned::position).collect();
    spans.sort_by_key(|p| (p.start_offset, p.end_offset));

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for span in spans {
        if span.is_empty() || span.start_offset < last || span.end_offset > chars.len() {
            continue;
        }
        out.extend(&chars[last..span.start_offset]);
        out.push_str(open);
        out.extend(&chars[span.start_offset..span.end_offset]);
        out.push_str(close);
        last = span.end_offset;
    }
    out.extend(&chars[last..]);
    out
}

/// Drop findings that repeat an earlier one's location
///
/// A finding is a repeat when it lies inside an earlier kept finding, or
/// when both its start and end are within `tolerance` characters of one.
pub fn merge_overlapping(findings: Vec<Finding>, tolerance: usize) -> Vec<Finding> {
    let mut kept: Vec<Finding> = Vec::with_capacity(findings.len());
    for finding in findings {
        let p = finding.position();
        let repeat = kept.iter().any(|k| {
            let q = k.position();
            q.contains(&p)
                || (p.start_offset.abs_diff(q.start_offset) < tolerance
                    && p.end_offset.abs_diff(q.end_offset) < tolerance)
        });
        if !repeat {
            kept.push(finding);
        }
    }
    kept
}

/// A finding standing for every occurrence of the same expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedFinding {
    #[serde(flatten)]
    pub finding: Finding,
    pub count: usize,
}

/// Collapse findings whose labels normalize to the same display text
///
/// The first occurrence is kept; output follows first-occurrence order.
pub fn merge_same_expression(findings: Vec<Finding>) -> Vec<MergedFinding> {
    let mut merged: Vec<MergedFinding> = Vec::new();
    let mut by_label: HashMap<String, usize> = HashMap::new();

    for finding in findings {
        let key = normalize_display(finding.label());
        match by_label.get(&key) {
            Some(&i) => merged[i].count += 1,
            None => {
                by_label.insert(key, merged.len());
                merged.push(MergedFinding { finding, count: 1 });
            }
        }
    }
    merged
}

/// Stamp a finding list with the rule-set version and the current time
pub fn build_report(rule_set_version: &str, mut findings: Vec<Finding>) -> CheckReport {
    findings.sort_by_key(|f| f.position().start_offset);
    CheckReport {
        rule_set_version: rule_set_version.to_string(),
        findings,
        checked_at: chrono::Utc::now().timestamp() as u64,
    }
}
