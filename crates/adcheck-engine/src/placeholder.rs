//! `{NAME}` template expansion
//!
//! Templates are tokenized once; substituted values are inserted verbatim and
//! never rescanned, so a value that itself contains `{OTHER}` stays literal.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::error::EngineError;

/// Ordered placeholder name → substitution values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceholderTable {
    entries: Vec<(String, Vec<String>)>,
    index: HashMap<String, usize>,
}

impl PlaceholderTable {
    /// Build a table, rejecting duplicate names and empty value lists
    pub fn new<N, V, I>(entries: I) -> Result<Self, EngineError>
    where
        N: Into<String>,
        V: IntoIterator,
        V::Item: Into<String>,
        I: IntoIterator<Item = (N, V)>,
    {
        let mut table = Self::default();
        for (name, values) in entries {
            table.insert(name.into(), values.into_iter().map(Into::into).collect())?;
        }
        Ok(table)
    }

    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        serde_json::from_str(json).map_err(|e| EngineError::parse("placeholder table", e))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| EngineError::read(path, e))?;
        Self::from_json_str(&json)
    }

    fn insert(&mut self, name: String, values: Vec<String>) -> Result<(), EngineError> {
        if name.is_empty() {
            return Err(EngineError::InvalidPlaceholders(
                "placeholder name must not be empty".to_string(),
            ));
        }
        if values.is_empty() {
            return Err(EngineError::InvalidPlaceholders(format!(
                "placeholder {{{}}} has no substitution values",
                name
            )));
        }
        if self.index.contains_key(&name) {
            return Err(EngineError::InvalidPlaceholders(format!(
                "placeholder {{{}}} defined twice",
                name
            )));
        }
        self.index.insert(name.clone(), self.entries.len());
        self.entries.push((name, values));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.index.get(name).map(|&i| self.entries[i].1.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Expand every known `{NAME}` token in `template`
    ///
    /// Returns the full cross product. Placeholders vary in table order: the
    /// first one in the table varies slowest, the last one fastest. A template
    /// without known tokens yields itself. Duplicates are preserved.
    pub fn expand(&self, template: &str) -> Vec<String> {
        let segments = self.tokenize(template);

        // Distinct placeholders used by the template, in table order
        let mut used: Vec<usize> = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Token(i) => Some(*i),
                Segment::Literal(_) => None,
            })
            .collect();
        used.sort_unstable();
        used.dedup();

        if used.is_empty() {
            return vec![template.to_string()];
        }

        let total: usize = used.iter().map(|&i| self.entries[i].1.len()).product();
        let mut results = Vec::with_capacity(total);
        let mut choice = vec![0usize; used.len()];

        loop {
            let mut out = String::with_capacity(template.len());
            for segment in &segments {
                match segment {
                    Segment::Literal(text) => out.push_str(text),
                    Segment::Token(i) => {
                        let slot = used.binary_search(i).unwrap_or_default();
                        out.push_str(&self.entries[*i].1[choice[slot]]);
                    }
                }
            }
            results.push(out);

            // Odometer step, last placeholder fastest
            let mut slot = used.len();
            loop {
                if slot == 0 {
                    return results;
                }
                slot -= 1;
                choice[slot] += 1;
                if choice[slot] < self.entries[used[slot]].1.len() {
                    break;
                }
                choice[slot] = 0;
            }
        }
    }

    fn tokenize<'t>(&self, template: &'t str) -> Vec<Segment<'t>> {
        let mut segments = Vec::new();
        let mut literal_start = 0;
        let mut cursor = 0;

        while let Some(open) = template[cursor..].find('{').map(|p| cursor + p) {
            let Some(close) = template[open + 1..].find('}').map(|p| open + 1 + p) else {
                break;
            };
            let name = &template[open + 1..close];
            match self.index.get(name) {
                Some(&i) if !name.contains('{') => {
                    if literal_start < open {
                        segments.push(Segment::Literal(&template[literal_start..open]));
                    }
                    segments.push(Segment::Token(i));
                    cursor = close + 1;
                    literal_start = cursor;
                }
                // Unknown or nested: keep the brace literal and rescan after it
                _ => cursor = open + 1,
            }
        }

        if literal_start < template.len() {
            segments.push(Segment::Literal(&template[literal_start..]));
        }
        segments
    }
}

enum Segment<'t> {
    Literal(&'t str),
    Token(usize),
}

impl<'de> Deserialize<'de> for PlaceholderTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = PlaceholderTable;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping placeholder names to lists of strings")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut table = PlaceholderTable::default();
                while let Some((name, values)) = map.next_entry::<String, Vec<String>>()? {
                    table
                        .insert(name, values)
                        .map_err(serde::de::Error::custom)?;
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table() -> PlaceholderTable {
        PlaceholderTable::new([
            ("TUKARE", vec!["の疲れ", "に出た疲れ"]),
            ("SEIBUN", vec!["ヒアルロン酸", "コラーゲン"]),
            ("MOKUTEKI", vec!["保湿", "うるおい"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_expand_single_placeholder() {
        assert_eq!(
            table().expand("肌{TUKARE}"),
            vec!["肌の疲れ".to_string(), "肌に出た疲れ".to_string()]
        );
    }

    #[test]
    fn test_expand_without_tokens_returns_template() {
        assert_eq!(table().expand("そのままの文"), vec!["そのままの文".to_string()]);
        assert_eq!(table().expand(""), vec!["".to_string()]);
    }

    #[test]
    fn test_expand_cross_product_first_placeholder_slowest() {
        // SEIBUN precedes MOKUTEKI in the table regardless of template order
        assert_eq!(
            table().expand("{MOKUTEKI}のための{SEIBUN}"),
            vec![
                "保湿のためのヒアルロン酸".to_string(),
                "うるおいのためのヒアルロン酸".to_string(),
                "保湿のためのコラーゲン".to_string(),
                "うるおいのためのコラーゲン".to_string(),
            ]
        );
    }

    #[test]
    fn test_repeated_token_takes_same_value() {
        assert_eq!(
            table().expand("{TUKARE}と{TUKARE}"),
            vec![
                "の疲れとの疲れ".to_string(),
                "に出た疲れとに出た疲れ".to_string()
            ]
        );
    }

    #[test]
    fn test_unknown_and_nested_tokens_stay_literal() {
        assert_eq!(table().expand("{UNKNOWN}肌"), vec!["{UNKNOWN}肌".to_string()]);
        assert_eq!(
            table().expand("{{TUKARE}}"),
            vec!["{の疲れ}".to_string(), "{に出た疲れ}".to_string()]
        );
        assert_eq!(table().expand("肌{TUKARE"), vec!["肌{TUKARE".to_string()]);
    }

    #[test]
    fn test_substituted_values_are_not_rescanned() {
        let table = PlaceholderTable::new([("A", vec!["{B}"]), ("B", vec!["x"])]).unwrap();
        assert_eq!(table.expand("{A}{B}"), vec!["{B}x".to_string()]);
    }

    #[test]
    fn test_rejects_empty_values_and_duplicates() {
        assert!(PlaceholderTable::new([("A", Vec::<String>::new())]).is_err());
        assert!(PlaceholderTable::new([("A", vec!["x"]), ("A", vec!["y"])]).is_err());
    }

    #[test]
    fn test_deserialize_preserves_document_order() {
        let table =
            PlaceholderTable::from_json_str(r#"{"Z": ["1", "2"], "A": ["a", "b"]}"#).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.expand("{A}{Z}"),
            vec![
                "a1".to_string(),
                "b1".to_string(),
                "a2".to_string(),
                "b2".to_string()
            ]
        );
        assert!(PlaceholderTable::from_json_str(r#"{"A": []}"#).is_err());
    }
}
