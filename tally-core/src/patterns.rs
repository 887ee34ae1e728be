//! Learned merchant→category patterns.
//!
//! Lookup is case-insensitive substring containment, first match wins, so
//! insertion order is load-bearing: earlier entries shadow later ones with
//! overlapping substrings. We keep the documented insertion-order semantic
//! rather than longest-match (see DESIGN.md).

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// One learned mapping from a normalized merchant substring to a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternEntry {
    pub merchant: String,
    pub category: String,
}

/// Ordered collection of learned patterns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternBook {
    entries: Vec<PatternEntry>,
}

impl PatternBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[PatternEntry] {
        &self.entries
    }

    /// First entry whose merchant substring occurs in the normalized payee.
    pub fn lookup(&self, payee: &str) -> Option<&str> {
        let normalized = normalize_merchant(payee);
        self.entries
            .iter()
            .find(|e| normalized.contains(e.merchant.as_str()))
            .map(|e| e.category.as_str())
    }

    /// Insert or overwrite a pattern. An existing entry keeps its position
    /// (so it keeps shadowing later entries); new entries append.
    pub fn upsert(&mut self, payee: &str, category: &str) {
        let merchant = normalize_merchant(payee);
        if merchant.is_empty() {
            return;
        }
        match self.entries.iter_mut().find(|e| e.merchant == merchant) {
            Some(e) => e.category = category.to_string(),
            None => self.entries.push(PatternEntry {
                merchant,
                category: category.to_string(),
            }),
        }
    }
}

/// Normalize merchant text for pattern keys and lookups: lowercase, strip
/// punctuation and store-number noise ("WAKABA SUSHI #204" → "wakaba sushi").
pub fn normalize_merchant(raw: &str) -> String {
    // Literal patterns; compiled once.
    static NOISE: OnceLock<Regex> = OnceLock::new();
    static PUNCT: OnceLock<Regex> = OnceLock::new();
    static SPACES: OnceLock<Regex> = OnceLock::new();
    let noise =
        NOISE.get_or_init(|| Regex::new(r"#\s*\d+|\*\s*\w+\d+\b|\b\d{4,}\b").expect("literal"));
    let punct = PUNCT.get_or_init(|| Regex::new(r"[^\w\s]").expect("literal"));
    let spaces = SPACES.get_or_init(|| Regex::new(r"\s+").expect("literal"));

    let s = raw.to_lowercase();
    let s = noise.replace_all(&s, " ");
    let s = punct.replace_all(&s, " ");
    let s = spaces.replace_all(&s, " ");
    s.trim().to_string()
}

/// Compact one-line-per-pattern rendering used as few-shot model context.
pub fn render_for_prompt(book: &PatternBook) -> String {
    if book.is_empty() {
        return "No learned patterns yet.".to_string();
    }
    let lines: Vec<String> = book
        .entries()
        .iter()
        .map(|e| format!("- {}: {}", e.merchant, e.category))
        .collect();
    lines.join("\n")
}
