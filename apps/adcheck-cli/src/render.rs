//! Report rendering for the terminal and for HTML

use adcheck_engine::{highlight, merge_overlapping, merge_same_expression, MergedFinding};
use serde::Serialize;
use shared_types::{CheckReport, Finding};

use crate::Format;

const TEXT_OPEN: &str = "【";
const TEXT_CLOSE: &str = "】";
const HTML_OPEN: &str = "<span style='background-color:#FFCCCC; color:red; font-weight:bold;'>";
const HTML_CLOSE: &str = "</span>";

// Private-use markers placed by `highlight` before HTML escaping
const MARK_OPEN: &str = "\u{E000}";
const MARK_CLOSE: &str = "\u{E001}";

#[derive(Serialize)]
struct MergedReport<'a> {
    rule_set_version: &'a str,
    findings: &'a [MergedFinding],
    checked_at: u64,
}

/// Render one report. `merge_tolerance` enables finding merges.
pub fn render(
    text: &str,
    report: CheckReport,
    format: Format,
    merge_tolerance: Option<usize>,
) -> serde_json::Result<String> {
    let merged: Vec<MergedFinding> = match merge_tolerance {
        Some(tolerance) => {
            merge_same_expression(merge_overlapping(report.findings.clone(), tolerance))
        }
        None => report
            .findings
            .iter()
            .cloned()
            .map(|finding| MergedFinding { finding, count: 1 })
            .collect(),
    };

    match format {
        Format::Json if merge_tolerance.is_some() => serde_json::to_string_pretty(&MergedReport {
            rule_set_version: &report.rule_set_version,
            findings: &merged,
            checked_at: report.checked_at,
        }),
        Format::Json => serde_json::to_string_pretty(&report),
        Format::Text => Ok(render_text(text, &report.findings, &merged)),
        Format::Html => Ok(render_html(text, &report.findings, &merged)),
    }
}

fn render_text(text: &str, findings: &[Finding], merged: &[MergedFinding]) -> String {
    let mut out = highlight(text, findings, TEXT_OPEN, TEXT_CLOSE);
    if merged.is_empty() {
        out.push_str("\n\n気になる表現は見つかりませんでした。");
        return out;
    }

    out.push_str(&format!("\n\n気になる表現が {} 件見つかりました。\n", merged.len()));
    for m in merged {
        let f = &m.finding;
        out.push_str(&format!("\n■ {}", f.label()));
        if m.count > 1 {
            out.push_str(&format!(" ×{}", m.count));
        }
        out.push('\n');
        if let Finding::Phrase(v) = f {
            out.push_str(&format!("  区分: {}\n", v.category));
        }
        push_line(&mut out, "指摘事項", &[f.message().to_string()]);
        push_line(&mut out, "改善提案", f.suggestions());
        push_line(&mut out, "適正表現例", f.compliant_examples());
        push_line(&mut out, "関連法令等", f.related_regulations());
    }
    out
}

fn push_line(out: &mut String, heading: &str, items: &[String]) {
    let items: Vec<&str> = items
        .iter()
        .map(String::as_str)
        .filter(|s| !s.is_empty())
        .collect();
    if !items.is_empty() {
        out.push_str(&format!("  {}: {}\n", heading, items.join("、")));
    }
}

fn render_html(text: &str, findings: &[Finding], merged: &[MergedFinding]) -> String {
    let marked = highlight(text, findings, MARK_OPEN, MARK_CLOSE);
    let body = escape_html(&marked)
        .replace(MARK_OPEN, HTML_OPEN)
        .replace(MARK_CLOSE, HTML_CLOSE)
        .replace('\n', "<br>\n");

    let mut out = format!("<div class=\"adcheck-text\">{}</div>\n", body);
    out.push_str("<ul class=\"adcheck-findings\">\n");
    for m in merged {
        let f = &m.finding;
        out.push_str(&format!(
            "  <li><strong style='color:red'>{}</strong>",
            escape_html(f.label())
        ));
        if m.count > 1 {
            out.push_str(&format!(" ×{}", m.count));
        }
        out.push_str(&format!(" {}", escape_html(f.message())));
        if !f.suggestions().is_empty() {
            out.push_str(&format!(
                "<br>💡 改善提案: {}",
                escape_html(&f.suggestions().join("、"))
            ));
        }
        out.push_str("</li>\n");
    }
    out.push_str("</ul>");
    out
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use shared_types::ViolationItem;

    fn report(findings: Vec<(&str, usize, usize)>) -> CheckReport {
        CheckReport {
            rule_set_version: "1.0".to_string(),
            findings: findings
                .into_iter()
                .map(|(text, start, end)| {
                    Finding::Phrase(ViolationItem {
                        category: "化粧品等 > 共通".to_string(),
                        matched_text: text.to_string(),
                        start_offset: start,
                        end_offset: end,
                        explanation: "疲労回復的な表現は不可".to_string(),
                        suggestions: vec!["言い換える".to_string()],
                        compliant_examples: vec![],
                        related_regulations: vec![],
                        common_prohibitions: vec![],
                        notes: vec![],
                    })
                })
                .collect(),
            checked_at: 0,
        }
    }

    #[test]
    fn test_text_output_highlights_and_lists() {
        let out = render(
            "肌疲れに<強い>",
            report(vec![("肌疲れ", 0, 3)]),
            Format::Text,
            None,
        )
        .unwrap();
        assert!(out.starts_with("【肌疲れ】に<強い>"));
        assert!(out.contains("■ 肌疲れ\n"));
        assert!(out.contains("  改善提案: 言い換える\n"));
    }

    #[test]
    fn test_html_output_escapes_text() {
        let out = render(
            "<b>肌疲れ</b>",
            report(vec![("肌疲れ", 3, 6)]),
            Format::Html,
            None,
        )
        .unwrap();
        assert!(out.starts_with(&format!(
            "<div class=\"adcheck-text\">&lt;b&gt;{}肌疲れ{}&lt;/b&gt;</div>",
            HTML_OPEN, HTML_CLOSE
        )));
    }

    #[test]
    fn test_merged_json_counts_repeats() {
        let out = render(
            "肌疲れ、肌疲れ",
            report(vec![("肌疲れ", 0, 3), ("肌疲れ", 4, 7)]),
            Format::Json,
            Some(2),
        )
        .unwrap();
        let json: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(json["findings"].as_array().unwrap().len(), 1);
        assert_eq!(json["findings"][0]["count"], 2);
        assert_eq!(json["rule_set_version"], "1.0");
    }

    #[test]
    fn test_empty_report_text() {
        let out = render("問題なし", report(vec![]), Format::Text, None).unwrap();
        assert_eq!(out, "問題なし\n\n気になる表現は見つかりませんでした。");
    }
}
