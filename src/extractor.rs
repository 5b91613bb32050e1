//! Candidate token extraction.
//!
//! Templates are never parsed. Any run of characters that sits between
//! markup delimiters may be a class name, so the extractor collects every
//! such run and lets the eliminator decide which ones matter. Tokens that
//! contain a `{themeKey}` placeholder are expanded against the theme tree.

use crate::config::{DEFAULT_SEPARATOR, ThemeTree, ThemeValue};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Runs between markup delimiters. The final character may not be `:` so a
/// trailing pseudo-class separator is left out of the token.
pub const BROAD_MATCH_PATTERN: &str = r#"[^<>"'`\s]*[^<>"'`\s:]"#;

/// Runs that additionally stop at attribute and call delimiters, which
/// catches tokens such as `w-1/2` inside `.block(class="w-1/2")`.
pub const INNER_MATCH_PATTERN: &str = r#"[^<>"'`\s.(){}\[\]#=%]*[^<>"'`\s.(){}\[\]#=%:]"#;

const PLACEHOLDER_PATTERN: &str = r"\{([^{}]+)\}";

/// Turns a chunk of content into the set of tokens that might be selectors.
pub trait Extractor: Send + Sync {
    fn extract(&self, text: &str) -> BTreeSet<String>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThemeExtractor {
    theme: ThemeTree,
    separator: char,
}

impl ThemeExtractor {
    pub fn new(theme: ThemeTree, separator: char) -> Self {
        Self { theme, separator }
    }

    fn expand(&self, candidate: &str, tokens: &mut BTreeSet<String>) {
        let Some(captures) = placeholder_regex().captures(candidate) else {
            tokens.insert(candidate.to_string());
            return;
        };
        let placeholder = &captures[0];
        let theme_key = &captures[1];

        if let Some(value) = self.theme.get(theme_key) {
            for suffix in flatten_theme_keys(value, self.separator) {
                tokens.insert(candidate.replace(placeholder, &suffix));
            }
        }

        tokens.insert(remove_placeholder(candidate, placeholder, self.separator));
    }
}

impl Default for ThemeExtractor {
    fn default() -> Self {
        Self::new(ThemeTree::new(), DEFAULT_SEPARATOR)
    }
}

impl Extractor for ThemeExtractor {
    fn extract(&self, text: &str) -> BTreeSet<String> {
        let mut tokens = BTreeSet::new();
        for candidate in raw_matches(text) {
            self.expand(candidate, &mut tokens);
        }
        tokens
    }
}

/// Broad matches followed by inner matches, duplicates included.
pub fn raw_matches(text: &str) -> Vec<&str> {
    broad_regex()
        .find_iter(text)
        .chain(inner_regex().find_iter(text))
        .map(|found| found.as_str())
        .collect()
}

/// Flattens a theme value into separator-joined key paths. Leaves contribute
/// their own key; a leaf at the top level has no keys at all.
pub fn flatten_theme_keys(value: &ThemeValue, separator: char) -> Vec<String> {
    match value {
        ThemeValue::Leaf(_) => Vec::new(),
        ThemeValue::Nested(children) => children
            .iter()
            .flat_map(|(key, child)| match child {
                ThemeValue::Leaf(_) => vec![key.clone()],
                ThemeValue::Nested(_) => flatten_theme_keys(child, separator)
                    .into_iter()
                    .map(|child_key| format!("{}{}{}", key, separator, child_key))
                    .collect(),
            })
            .collect(),
    }
}

/// Drops the placeholder. A separator doubled at the splice collapses to one
/// and separators at either end are trimmed, so `a-{size}-b` falls back to
/// `a-b`, `p-{size}` to `p` and `a{x}b` to `ab`.
fn remove_placeholder(candidate: &str, placeholder: &str, separator: char) -> String {
    let mut fallback = String::with_capacity(candidate.len());
    for piece in candidate.split(placeholder) {
        match piece.strip_prefix(separator) {
            Some(rest) if fallback.ends_with(separator) => fallback.push_str(rest),
            _ => fallback.push_str(piece),
        }
    }
    fallback.trim_matches(separator).to_string()
}

fn broad_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(BROAD_MATCH_PATTERN).expect("broad pattern is valid"))
}

fn inner_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(INNER_MATCH_PATTERN).expect("inner pattern is valid"))
}

fn placeholder_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(PLACEHOLDER_PATTERN).expect("placeholder pattern is valid"))
}
