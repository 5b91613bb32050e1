//! Removes style rules whose selectors name classes or ids that never
//! appear in the scanned content.

use crate::config::{PassthroughOptions, SourceSpec};
use crate::error::{PurgeError, Result};
use crate::extractor::{Extractor, ThemeExtractor};
use crate::markers::{IGNORE_END, IGNORE_START};
use crate::scanner::{ScanGlobOptions, scan_sources};
use crate::stylesheet::{Block, Node, Stylesheet, split_top_level_commas};
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;

/// Protects only the rule that follows it.
pub const IGNORE_NEXT: &str = "purgecss ignore";

pub struct EliminationOptions {
    pub content: Vec<SourceSpec>,
    pub extractor: Box<dyn Extractor>,
    pub safelist: Vec<String>,
    pub safelist_patterns: Vec<String>,
    pub rejected: bool,
    pub scan: ScanGlobOptions,
}

impl EliminationOptions {
    pub fn new(content: Vec<SourceSpec>, extractor: Box<dyn Extractor>) -> Self {
        Self {
            content,
            extractor,
            safelist: Vec::new(),
            safelist_patterns: Vec::new(),
            rejected: false,
            scan: ScanGlobOptions::default(),
        }
    }

    /// Applies user options on top; anything they set wins.
    pub fn merge(mut self, options: PassthroughOptions) -> Self {
        if let Some(content) = options.content {
            self.content = content;
        }
        if let Some(safelist) = options.safelist {
            self.safelist = safelist;
        }
        if let Some(patterns) = options.safelist_patterns {
            self.safelist_patterns = patterns;
        }
        if let Some(rejected) = options.rejected {
            self.rejected = rejected;
        }
        self
    }
}

impl Default for EliminationOptions {
    fn default() -> Self {
        Self::new(Vec::new(), Box::new(ThemeExtractor::default()))
    }
}

impl fmt::Debug for EliminationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EliminationOptions")
            .field("content", &self.content)
            .field("safelist", &self.safelist)
            .field("safelist_patterns", &self.safelist_patterns)
            .field("rejected", &self.rejected)
            .field("scan", &self.scan)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EliminationReport {
    pub candidates: usize,
    pub files_scanned: usize,
    pub kept_selectors: usize,
    pub removed_selectors: usize,
    pub rejected: Vec<String>,
}

#[derive(Debug)]
pub struct Eliminator {
    options: EliminationOptions,
}

impl Eliminator {
    pub fn new(options: EliminationOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EliminationOptions {
        &self.options
    }

    /// Scans every content source, then removes unused rules from `sheet`.
    pub fn eliminate(&self, sheet: &mut Stylesheet) -> Result<EliminationReport> {
        let patterns = compile_patterns(&self.options.safelist_patterns)?;
        let scan = scan_sources(
            &self.options.content,
            self.options.extractor.as_ref(),
            &self.options.scan,
        )?;
        let mut report = self.eliminate_with(sheet, &scan.candidates, &patterns);
        report.files_scanned = scan.files_scanned;
        Ok(report)
    }

    fn eliminate_with(
        &self,
        sheet: &mut Stylesheet,
        candidates: &BTreeSet<String>,
        patterns: &[Regex],
    ) -> EliminationReport {
        let mut pass = Pass {
            candidates,
            safelist: &self.options.safelist,
            patterns,
            record_rejected: self.options.rejected,
            ignoring: false,
            ignore_next: false,
            report: EliminationReport {
                candidates: candidates.len(),
                ..EliminationReport::default()
            },
        };
        pass.process(&mut sheet.nodes);
        log::debug!(
            "kept {} selectors, removed {}",
            pass.report.kept_selectors,
            pass.report.removed_selectors
        );
        pass.report
    }
}

struct Pass<'a> {
    candidates: &'a BTreeSet<String>,
    safelist: &'a [String],
    patterns: &'a [Regex],
    record_rejected: bool,
    ignoring: bool,
    ignore_next: bool,
    report: EliminationReport,
}

impl Pass<'_> {
    fn process(&mut self, nodes: &mut Vec<Node>) {
        let mut kept = Vec::with_capacity(nodes.len());
        for mut node in nodes.drain(..) {
            if self.keep(&mut node) {
                kept.push(node);
            }
        }
        *nodes = kept;
    }

    fn keep(&mut self, node: &mut Node) -> bool {
        match node {
            Node::Comment { text } => match text.trim() {
                IGNORE_START => {
                    self.ignoring = true;
                    false
                }
                IGNORE_END => {
                    self.ignoring = false;
                    false
                }
                IGNORE_NEXT => {
                    self.ignore_next = true;
                    false
                }
                _ => true,
            },
            Node::Rule { selector, .. } => {
                let protected = std::mem::take(&mut self.ignore_next);
                if self.ignoring || protected {
                    return true;
                }
                match self.filter_selector(selector) {
                    Some(filtered) => {
                        *selector = filtered;
                        true
                    }
                    None => false,
                }
            }
            Node::AtRule {
                name,
                block: Some(Block::Nodes(children)),
                ..
            } if !name.ends_with("keyframes") => {
                self.process(children);
                !children.is_empty()
            }
            Node::AtRule { .. } => true,
        }
    }

    fn filter_selector(&mut self, selector: &str) -> Option<String> {
        let mut used = Vec::new();
        for part in split_top_level_commas(selector) {
            if self.is_used(part) {
                self.report.kept_selectors += 1;
                used.push(part);
            } else {
                self.report.removed_selectors += 1;
                if self.record_rejected {
                    self.report.rejected.push(part.to_string());
                }
            }
        }
        if used.is_empty() {
            None
        } else {
            Some(used.join(",\n"))
        }
    }

    fn is_used(&self, selector: &str) -> bool {
        selector_identifiers(selector)
            .iter()
            .all(|ident| self.is_known(ident))
    }

    fn is_known(&self, ident: &str) -> bool {
        self.candidates.contains(ident)
            || self.safelist.iter().any(|entry| entry == ident)
            || self.patterns.iter().any(|pattern| pattern.is_match(ident))
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|err| PurgeError::Pattern {
                pattern: pattern.clone(),
                message: err.to_string(),
            })
        })
        .collect()
}

/// Class and id names a selector requires, unescaped. Names inside
/// functional pseudo-classes and attribute selectors are not required.
pub fn selector_identifiers(selector: &str) -> Vec<String> {
    let chars = selector.chars().collect::<Vec<_>>();
    let mut identifiers = Vec::new();
    let mut depth = 0usize;
    let mut idx = 0usize;

    while idx < chars.len() {
        match chars[idx] {
            '\\' => idx += 1,
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            '.' | '#' if depth == 0 => {
                let (ident, next) = read_identifier(&chars, idx + 1);
                if !ident.is_empty() {
                    identifiers.push(ident);
                }
                idx = next;
                continue;
            }
            _ => {}
        }
        idx += 1;
    }

    identifiers
}

fn read_identifier(chars: &[char], mut idx: usize) -> (String, usize) {
    let mut ident = String::new();
    while idx < chars.len() {
        let ch = chars[idx];
        if ch == '\\' {
            idx = read_escape(chars, idx + 1, &mut ident);
            continue;
        }
        if !(ch.is_alphanumeric() || ch == '-' || ch == '_' || !ch.is_ascii()) {
            break;
        }
        ident.push(ch);
        idx += 1;
    }
    (ident, idx)
}

fn read_escape(chars: &[char], idx: usize, out: &mut String) -> usize {
    let hex = chars[idx..]
        .iter()
        .take(6)
        .take_while(|ch| ch.is_ascii_hexdigit())
        .collect::<String>();
    if hex.is_empty() {
        if let Some(ch) = chars.get(idx) {
            out.push(*ch);
            return idx + 1;
        }
        return idx;
    }

    let decoded = u32::from_str_radix(&hex, 16)
        .ok()
        .and_then(char::from_u32)
        .unwrap_or(char::REPLACEMENT_CHARACTER);
    out.push(decoded);
    let next = idx + hex.len();
    if chars.get(next).is_some_and(|ch| ch.is_whitespace()) {
        next + 1
    } else {
        next
    }
}

#[cfg(test)]
mod tests {
    use super::{EliminationOptions, Eliminator, selector_identifiers};
    use crate::config::{PassthroughOptions, SourceSpec};
    use crate::extractor::ThemeExtractor;
    use crate::stylesheet::{Node, Stylesheet};
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn raw(text: &str) -> SourceSpec {
        SourceSpec::Raw {
            raw: text.to_string(),
            extension: "html".to_string(),
        }
    }

    fn eliminator(content: &str) -> Eliminator {
        Eliminator::new(EliminationOptions {
            content: vec![raw(content)],
            ..EliminationOptions::default()
        })
    }

    #[test]
    fn unescapes_selector_identifiers() {
        assert_eq!(
            selector_identifiers(r".md\:flex > .w-1\/2:hover #main"),
            vec!["md:flex", "w-1/2", "main"]
        );
        assert_eq!(selector_identifiers(r".\32 xl\:p-4"), vec!["2xl:p-4"]);
        assert_eq!(
            selector_identifiers(r".bg-\[\#fff\]::before"),
            vec!["bg-[#fff]"]
        );
        assert!(selector_identifiers("a[href$=\".pdf\"]:not(.x)").is_empty());
    }

    #[test]
    fn removes_rules_with_unused_classes() {
        let mut sheet = Stylesheet::parse(indoc! {r"
            .p-4 { padding: 1rem; }
            .m-4 { margin: 1rem; }
            .md\:flex, .hidden { display: flex; }
            body { margin: 0; }
        "})
        .expect("css should parse");
        let report = eliminator(r#"<div class="p-4 md:flex">"#)
            .eliminate(&mut sheet)
            .expect("elimination should succeed");

        assert_eq!(
            sheet.nodes,
            vec![
                Node::rule(".p-4", "padding: 1rem;"),
                Node::rule(r".md\:flex", "display: flex;"),
                Node::rule("body", "margin: 0;"),
            ]
        );
        assert_eq!(report.kept_selectors, 3);
        assert_eq!(report.removed_selectors, 2);
        assert!(report.rejected.is_empty());
    }

    #[test]
    fn honours_ignore_annotations_and_drops_them() {
        let mut sheet = Stylesheet::parse(indoc! {"
            /* purgecss start ignore */
            .unused-a { color: red; }
            /* purgecss end ignore */
            .unused-b { color: red; }
            /* purgecss ignore */
            .unused-c { color: red; }
            .unused-d { color: red; }
        "})
        .expect("css should parse");
        eliminator("").eliminate(&mut sheet).expect("elimination");
        assert_eq!(
            sheet.nodes,
            vec![
                Node::rule(".unused-a", "color: red;"),
                Node::rule(".unused-c", "color: red;"),
            ]
        );
    }

    #[test]
    fn prunes_empty_media_blocks_but_keeps_keyframes() {
        let mut sheet = Stylesheet::parse(indoc! {"
            @media (min-width: 640px) { .sm-a { color: red; } }
            @media print { .used { color: red; } }
            @keyframes spin { from { transform: rotate(0deg); } to { transform: rotate(360deg); } }
            @font-face { font-family: Inter; }
        "})
        .expect("css should parse");
        eliminator("used").eliminate(&mut sheet).expect("elimination");
        let names = sheet
            .nodes
            .iter()
            .map(|node| match node {
                Node::AtRule { name, params, .. } => format!("{} {}", name, params),
                _ => String::new(),
            })
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["media print", "keyframes spin", "font-face "]);
    }

    #[test]
    fn merged_options_override_defaults() {
        let options = EliminationOptions::new(vec![raw("a")], Box::new(ThemeExtractor::default())).merge(
            PassthroughOptions {
                content: Some(vec![raw("b")]),
                safelist: Some(vec!["keep".to_string()]),
                safelist_patterns: Some(vec!["^bg-".to_string()]),
                rejected: Some(true),
            },
        );
        assert_eq!(options.content, vec![raw("b")]);
        assert_eq!(options.safelist, vec!["keep".to_string()]);
        assert!(options.rejected);

        let mut sheet = Stylesheet::parse(".keep, .bg-red { color: red; } .drop { color: red; }")
            .expect("css should parse");
        let report = Eliminator::new(options)
            .eliminate(&mut sheet)
            .expect("elimination");
        assert_eq!(sheet.nodes, vec![Node::rule(".keep,\n.bg-red", "color: red;")]);
        assert_eq!(report.rejected, vec![".drop".to_string()]);
    }

    #[test]
    fn rejects_invalid_safelist_patterns() {
        let eliminator = Eliminator::new(EliminationOptions {
            safelist_patterns: vec!["(".to_string()],
            ..EliminationOptions::default()
        });
        let mut sheet = Stylesheet::default();
        assert!(eliminator.eliminate(&mut sheet).is_err());
    }

    #[test]
    fn scans_glob_sources_from_the_base_path() {
        let base = tempfile::tempdir().expect("tempdir");
        fs::write(base.path().join("index.html"), r#"<p class="text-lg">"#).expect("write");
        let mut options = EliminationOptions::new(
            vec![SourceSpec::Glob("*.html".to_string())],
            Box::new(ThemeExtractor::default()),
        );
        options.scan.base_path = base.path().to_path_buf();

        let mut sheet =
            Stylesheet::parse(".text-lg { font-size: 1.125rem; } .text-sm { font-size: 0.875rem; }")
                .expect("css should parse");
        let report = Eliminator::new(options)
            .eliminate(&mut sheet)
            .expect("elimination");
        assert_eq!(report.files_scanned, 1);
        assert_eq!(sheet.nodes, vec![Node::rule(".text-lg", "font-size: 1.125rem;")]);
    }
}
