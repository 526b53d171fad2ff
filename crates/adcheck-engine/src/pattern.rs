//! Rule phrase → matcher compilation
//!
//! A rule phrase is normalized for matching and then generalized:
//! - `\d+` becomes a run of half- or full-width digits
//! - each hiragana character also accepts its katakana counterpart
//! - whitespace runs accept zero or more whitespace
//! - a brace that does not form a counted repetition matches itself
//!
//! Folding leaves the character after a backslash alone, so escapes such as
//! `\S` keep their case.
//!
//! Phrases that do not compile as a regular expression fall back to matching
//! their normalized text literally. Compilation never fails.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};

use lazy_static::lazy_static;
use regex::{NoExpand, Regex, RegexBuilder};
use tracing::warn;

use crate::normalize::{fold_pattern, hiragana_to_katakana};

/// Default number of compiled phrases kept by a [`PatternCache`]
pub const DEFAULT_CACHE_CAPACITY: usize = 128;

lazy_static! {
    /// Digit-run marker as written in rule phrases
    static ref DIGIT_RUN_MARKER: Regex = Regex::new(r"\\d\+").unwrap();

    /// A single hiragana character
    static ref HIRAGANA: Regex = Regex::new(r"[ぁ-ん]").unwrap();

    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();

    /// A counted repetition such as `{3}`, `{2,}` or `{1,4}`
    static ref REPETITION: Regex = Regex::new(r"^\{\d+(,\d*)?\}").unwrap();
}

const DIGIT_RUN_CLASS: &str = "[0-9０-９]+";
const OPTIONAL_WHITESPACE: &str = r"\s*";

/// Case-insensitive matcher for one rule phrase
#[derive(Debug)]
pub struct CompiledPattern {
    source: String,
    normalized: String,
    matcher: Matcher,
    fallback: bool,
}

#[derive(Debug)]
enum Matcher {
    Regex(Regex),
    Literal(String),
}

impl CompiledPattern {
    /// The raw phrase this pattern was compiled from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The phrase in matching form
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// True when the phrase did not compile and is matched literally
    pub fn is_literal_fallback(&self) -> bool {
        self.fallback
    }

    /// Non-empty, non-overlapping matches in `haystack`, left to right, as
    /// byte ranges
    pub fn find_spans(&self, haystack: &str) -> Vec<(usize, usize)> {
        match &self.matcher {
            Matcher::Regex(re) => re
                .find_iter(haystack)
                .filter(|m| !m.is_empty())
                .map(|m| (m.start(), m.end()))
                .collect(),
            Matcher::Literal(needle) if needle.is_empty() => Vec::new(),
            Matcher::Literal(needle) => haystack
                .match_indices(needle.as_str())
                .map(|(start, m)| (start, start + m.len()))
                .collect(),
        }
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        !self.find_spans(haystack).is_empty()
    }
}

/// Regular-expression source for a phrase already in matching form
pub fn pattern_source(normalized: &str) -> String {
    let source = DIGIT_RUN_MARKER.replace_all(normalized, NoExpand(DIGIT_RUN_CLASS));
    let source = HIRAGANA.replace_all(&source, |caps: &regex::Captures| {
        let ch = caps[0].chars().next().unwrap_or_default();
        format!("[{}{}]", ch, hiragana_to_katakana(ch))
    });
    let source = WHITESPACE_RUN.replace_all(&source, NoExpand(OPTIONAL_WHITESPACE));
    escape_stray_braces(&source)
}

/// Escape `{` and `}` outside counted repetitions; `regex` rejects them bare
fn escape_stray_braces(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut escaped = false;
    let mut rest = source;
    while let Some(ch) = rest.chars().next() {
        if !escaped && ch == '{' {
            if let Some(m) = REPETITION.find(rest) {
                out.push_str(m.as_str());
                rest = &rest[m.end()..];
                continue;
            }
        }
        if !escaped && (ch == '{' || ch == '}') {
            out.push('\\');
        }
        escaped = !escaped && ch == '\\';
        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    out
}

/// Compile a phrase without consulting any cache
pub fn compile_pattern(phrase: &str) -> CompiledPattern {
    let normalized = fold_pattern(phrase);
    let source = pattern_source(&normalized);

    let (matcher, fallback) = match build_regex(&source) {
        Ok(re) => (Matcher::Regex(re), false),
        Err(err) => {
            warn!(
                phrase = %phrase,
                pattern = %source,
                error = %err,
                "Pattern compilation failed, falling back to literal match"
            );
            (literal_matcher(&normalized), true)
        }
    };

    CompiledPattern {
        source: phrase.to_string(),
        normalized,
        matcher,
        fallback,
    }
}

fn build_regex(source: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(source).case_insensitive(true).build()
}

fn literal_matcher(normalized: &str) -> Matcher {
    match build_regex(&regex::escape(normalized)) {
        Ok(re) => Matcher::Regex(re),
        // Only reachable past the regex size limit
        Err(_) => Matcher::Literal(normalized.to_string()),
    }
}

/// Bounded memo of compiled phrases keyed by the raw phrase
///
/// Reads take a shared lock. When full, the oldest inserted phrase is
/// evicted. Two threads compiling the same phrase concurrently both insert;
/// the later insert wins and both results behave identically.
#[derive(Debug)]
pub struct PatternCache {
    capacity: usize,
    inner: RwLock<CacheInner>,
}

#[derive(Debug, Default)]
struct CacheInner {
    patterns: HashMap<String, Arc<CompiledPattern>>,
    order: VecDeque<String>,
}

impl PatternCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: RwLock::new(CacheInner::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, phrase: &str) -> Option<Arc<CompiledPattern>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.patterns.get(phrase).cloned()
    }

    pub fn insert(&self, phrase: &str, pattern: Arc<CompiledPattern>) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.patterns.insert(phrase.to_string(), pattern).is_none() {
            inner.order.push_back(phrase.to_string());
        }
        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.patterns.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.patterns.clear();
        inner.order.clear();
    }
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

/// Compiles rule phrases through a shared [`PatternCache`]
#[derive(Debug, Clone, Default)]
pub struct PatternCompiler {
    cache: Arc<PatternCache>,
}

impl PatternCompiler {
    pub fn new(capacity: usize) -> Self {
        Self::with_cache(Arc::new(PatternCache::new(capacity)))
    }

    pub fn with_cache(cache: Arc<PatternCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<PatternCache> {
        &self.cache
    }

    pub fn compile(&self, phrase: &str) -> Arc<CompiledPattern> {
        if let Some(pattern) = self.cache.get(phrase) {
            return pattern;
        }
        let pattern = Arc::new(compile_pattern(phrase));
        self.cache.insert(phrase, Arc::clone(&pattern));
        pattern
    }
}
