use crate::error::{PurgeError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const DEFAULT_SEPARATOR: char = '-';

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub purge: Option<PurgeSetting>,
    #[serde(default)]
    pub theme: ThemeTree,
    #[serde(default = "default_separator")]
    pub separator: char,
}

/// Design tokens keyed by name. Placeholders such as `p-{spacing}` are
/// resolved against the top-level keys of this tree.
pub type ThemeTree = BTreeMap<String, ThemeValue>;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ThemeValue {
    Nested(ThemeTree),
    Leaf(toml::Value),
}

/// The `purge` key accepts a boolean, a bare list of sources, or a table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PurgeSetting {
    Toggle(bool),
    Sources(Vec<SourceSpec>),
    Detailed(PurgeTable),
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct PurgeTable {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub mode: Option<PurgeMode>,
    #[serde(default)]
    pub content: Option<Vec<SourceSpec>>,
    #[serde(default)]
    pub options: PassthroughOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum PurgeMode {
    Conservative,
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SourceSpec {
    Glob(String),
    Raw {
        raw: String,
        #[serde(default = "default_raw_extension")]
        extension: String,
    },
}

/// Eliminator options forwarded verbatim from `[purge.options]`. Any field
/// set here overrides the value the orchestrator would otherwise choose.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct PassthroughOptions {
    #[serde(default)]
    pub content: Option<Vec<SourceSpec>>,
    #[serde(default)]
    pub safelist: Option<Vec<String>>,
    #[serde(default)]
    pub safelist_patterns: Option<Vec<String>>,
    #[serde(default)]
    pub rejected: Option<bool>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            purge: None,
            theme: ThemeTree::new(),
            separator: default_separator(),
        }
    }
}

impl PurgeSetting {
    /// An explicit `enabled` wins; otherwise any setting other than `false`
    /// is only active in production.
    pub fn is_enabled(&self, production: bool) -> bool {
        match self {
            PurgeSetting::Toggle(false) => false,
            PurgeSetting::Detailed(PurgeTable {
                enabled: Some(enabled),
                ..
            }) => *enabled,
            _ => production,
        }
    }

    pub fn is_empty_source_list(&self) -> bool {
        matches!(self, PurgeSetting::Sources(sources) if sources.is_empty())
    }

    pub fn mode(&self) -> PurgeMode {
        match self {
            PurgeSetting::Detailed(PurgeTable {
                mode: Some(mode), ..
            }) => mode.clone(),
            _ => PurgeMode::Conservative,
        }
    }

    pub fn content(&self) -> Vec<SourceSpec> {
        match self {
            PurgeSetting::Sources(sources) => sources.clone(),
            PurgeSetting::Detailed(table) => table.content.clone().unwrap_or_default(),
            PurgeSetting::Toggle(_) => Vec::new(),
        }
    }

    pub fn options(&self) -> PassthroughOptions {
        match self {
            PurgeSetting::Detailed(table) => table.options.clone(),
            _ => PassthroughOptions::default(),
        }
    }
}

impl From<String> for PurgeMode {
    fn from(value: String) -> Self {
        if value == "conservative" {
            PurgeMode::Conservative
        } else {
            PurgeMode::Other(value)
        }
    }
}

pub fn load(path: &Path) -> Result<Config> {
    let text = fs::read_to_string(path).map_err(|err| PurgeError::io(path, err))?;
    parse(&text).map_err(|message| PurgeError::Config {
        path: path.to_path_buf(),
        message,
    })
}

pub fn parse(text: &str) -> std::result::Result<Config, String> {
    toml::from_str(text).map_err(|err| err.to_string())
}

fn default_separator() -> char {
    DEFAULT_SEPARATOR
}

fn default_raw_extension() -> String {
    "html".to_string()
}

#[cfg(test)]
mod tests {
    use super::{
        Config, PassthroughOptions, PurgeMode, PurgeSetting, SourceSpec, ThemeValue, load, parse,
    };
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::fs;

    #[test]
    fn defaults_when_empty() {
        let config = parse("").expect("config should parse");
        assert_eq!(config, Config::default());
        assert_eq!(config.separator, '-');
        assert!(config.purge.is_none());
    }

    #[test]
    fn parses_boolean_purge() {
        let config = parse("purge = false").expect("config should parse");
        assert_eq!(config.purge, Some(PurgeSetting::Toggle(false)));
        assert!(!PurgeSetting::Toggle(false).is_enabled(true));
        assert!(PurgeSetting::Toggle(true).is_enabled(true));
        assert!(!PurgeSetting::Toggle(true).is_enabled(false));
    }

    #[test]
    fn parses_source_list_with_raw_entries() {
        let config = parse(indoc! {r#"
            purge = ["src/**/*.html", { raw = "<p class='mt-2'>" }]
        "#})
        .expect("config should parse");
        let purge = config.purge.expect("purge should be set");
        assert_eq!(
            purge.content(),
            vec![
                SourceSpec::Glob("src/**/*.html".to_string()),
                SourceSpec::Raw {
                    raw: "<p class='mt-2'>".to_string(),
                    extension: "html".to_string(),
                },
            ]
        );
        assert!(!purge.is_empty_source_list());
        assert_eq!(purge.mode(), PurgeMode::Conservative);
    }

    #[test]
    fn parses_empty_source_list() {
        let config = parse("purge = []").expect("config should parse");
        assert!(config.purge.expect("purge").is_empty_source_list());
    }

    #[test]
    fn parses_detailed_purge_table() {
        let config = parse(indoc! {r#"
            separator = "_"

            [purge]
            enabled = true
            mode = "all"
            content = ["templates/**/*.twig"]

            [purge.options]
            safelist = ["keep"]
            rejected = true
        "#})
        .expect("config should parse");
        assert_eq!(config.separator, '_');
        let purge = config.purge.expect("purge should be set");
        assert!(purge.is_enabled(false));
        assert_eq!(purge.mode(), PurgeMode::Other("all".to_string()));
        assert_eq!(
            purge.content(),
            vec![SourceSpec::Glob("templates/**/*.twig".to_string())]
        );
        assert_eq!(
            purge.options(),
            PassthroughOptions {
                safelist: Some(vec!["keep".to_string()]),
                rejected: Some(true),
                ..PassthroughOptions::default()
            }
        );
    }

    #[test]
    fn detailed_table_without_enabled_follows_production() {
        let config = parse("[purge]\ncontent = []").expect("config should parse");
        let purge = config.purge.expect("purge should be set");
        assert!(purge.is_enabled(true));
        assert!(!purge.is_enabled(false));
        assert!(!purge.is_empty_source_list());
    }

    #[test]
    fn parses_nested_theme_tree() {
        let config = parse(indoc! {r##"
            [theme]
            opacity = "0.5"

            [theme.colors]
            black = "#000"

            [theme.colors.gray]
            100 = "#f3f4f6"
            500 = "#6b7280"
        "##})
        .expect("config should parse");
        let Some(ThemeValue::Nested(colors)) = config.theme.get("colors") else {
            panic!("colors should be nested");
        };
        assert!(matches!(colors.get("gray"), Some(ThemeValue::Nested(_))));
        assert!(matches!(colors.get("black"), Some(ThemeValue::Leaf(_))));
        assert!(matches!(
            config.theme.get("opacity"),
            Some(ThemeValue::Leaf(_))
        ));
    }

    #[test]
    fn loads_config_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ironpurge.toml");
        fs::write(&path, "purge = [\"src/**/*.html\"]").expect("write config");
        let config = load(&path).expect("config should load");
        assert!(config.purge.is_some());
    }

    #[test]
    fn reports_parse_errors_with_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.toml");
        fs::write(&path, "purge = [").expect("write config");
        let err = load(&path).expect_err("config should fail");
        assert!(err.to_string().contains("broken.toml"));
    }
}
