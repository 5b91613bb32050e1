use crate::config::SourceSpec;
use crate::error::{PurgeError, Result};
use crate::extractor::Extractor;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanResult {
    pub candidates: BTreeSet<String>,
    pub files_scanned: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanGlobOptions {
    pub base_path: PathBuf,
    pub respect_gitignore: bool,
    pub include_node_modules: bool,
    pub include_binary_files: bool,
    pub include_css_files: bool,
    pub include_lock_files: bool,
}

impl Default for ScanGlobOptions {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("."),
            respect_gitignore: true,
            include_node_modules: false,
            include_binary_files: false,
            include_css_files: false,
            include_lock_files: false,
        }
    }
}

/// Runs every content source through `extractor` and unions the results.
pub fn scan_sources(
    sources: &[SourceSpec],
    extractor: &dyn Extractor,
    options: &ScanGlobOptions,
) -> Result<ScanResult> {
    let mut result = ScanResult::default();
    let mut patterns = Vec::new();

    for source in sources {
        match source {
            SourceSpec::Glob(pattern) => patterns.push(pattern.clone()),
            SourceSpec::Raw { raw, extension } => {
                log::debug!("scanning raw {} content ({} bytes)", extension, raw.len());
                result.candidates.extend(extractor.extract(raw));
            }
        }
    }

    if !patterns.is_empty() {
        let files = scan_paths(&resolve_globs(&patterns, &[], options)?, extractor);
        result.candidates.extend(files.candidates);
        result.files_scanned += files.files_scanned;
    }

    log::info!(
        "scanned {} files, found {} candidates",
        result.files_scanned,
        result.candidates.len()
    );
    Ok(result)
}

/// Lists the files under `options.base_path` matching any of `patterns`.
/// A pattern naming a directory matches everything below it.
pub fn resolve_globs(
    patterns: &[String],
    ignore_patterns: &[String],
    options: &ScanGlobOptions,
) -> Result<Vec<PathBuf>> {
    if patterns.is_empty() {
        return Err(PurgeError::Scan(
            "content scanning requires at least one pattern".to_string(),
        ));
    }

    let normalized = patterns
        .iter()
        .map(|pattern| normalize_source_pattern(&options.base_path, pattern))
        .collect::<Vec<_>>();
    let globset = build_globset(&normalized)?;
    let ignore_set = build_globset(ignore_patterns)?;
    let mut paths = Vec::new();
    let mut seen = HashSet::new();

    let mut builder = WalkBuilder::new(&options.base_path);
    builder
        .hidden(false)
        .git_ignore(options.respect_gitignore)
        .git_global(options.respect_gitignore)
        .git_exclude(options.respect_gitignore);
    let walker = builder.build();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log::debug!("skipping unreadable entry: {}", err);
                continue;
            }
        };
        if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }
        let path = entry.path();
        let relative_path = path.strip_prefix(&options.base_path).unwrap_or(path);
        if !globset.is_match(relative_path) && !globset.is_match(path) {
            continue;
        }
        if ignore_set.is_match(relative_path) || ignore_set.is_match(path) {
            continue;
        }
        if should_skip_file(path, options) {
            continue;
        }
        if seen.insert(path.to_path_buf()) {
            paths.push(path.to_path_buf());
        }
    }

    Ok(paths)
}

/// Extracts candidates from each file. Unreadable or non-UTF-8 files are
/// skipped.
pub fn scan_paths(paths: &[PathBuf], extractor: &dyn Extractor) -> ScanResult {
    let mut result = ScanResult::default();
    for path in paths {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                log::debug!("skipping {}: {}", path.display(), err);
                continue;
            }
        };
        result.files_scanned += 1;
        result.candidates.extend(extractor.extract(&text));
    }
    result
}

fn normalize_source_pattern(base_path: &Path, pattern: &str) -> String {
    if contains_glob_meta(pattern) {
        return pattern.to_string();
    }
    let trimmed = pattern.trim_end_matches(['/', '\\']);
    if pattern.len() != trimmed.len() || base_path.join(pattern).is_dir() {
        return format!("{}/**/*", trimmed);
    }
    pattern.to_string()
}

fn contains_glob_meta(input: &str) -> bool {
    input.chars().any(|ch| matches!(ch, '*' | '?' | '[' | '{'))
}

fn should_skip_file(path: &Path, options: &ScanGlobOptions) -> bool {
    if !options.include_node_modules
        && path
            .components()
            .any(|component| component.as_os_str() == "node_modules")
    {
        return true;
    }

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("");
    if !options.include_lock_files && is_common_lock_file(file_name) {
        return true;
    }

    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase());
    if let Some(ext) = ext.as_deref() {
        if !options.include_css_files && is_css_extension(ext) {
            return true;
        }
        if !options.include_binary_files && is_binary_extension(ext) {
            return true;
        }
    }

    false
}

fn is_css_extension(ext: &str) -> bool {
    matches!(ext, "css" | "scss" | "sass" | "less" | "styl" | "pcss")
}

fn is_binary_extension(ext: &str) -> bool {
    matches!(
        ext,
        "png"
            | "jpg"
            | "jpeg"
            | "gif"
            | "webp"
            | "ico"
            | "avif"
            | "mp4"
            | "webm"
            | "mp3"
            | "zip"
            | "gz"
            | "pdf"
            | "woff"
            | "woff2"
            | "ttf"
            | "otf"
            | "eot"
    )
}

fn is_common_lock_file(file_name: &str) -> bool {
    matches!(
        file_name,
        "package-lock.json"
            | "pnpm-lock.yaml"
            | "yarn.lock"
            | "bun.lockb"
            | "bun.lock"
            | "npm-shrinkwrap.json"
            | "Cargo.lock"
            | "composer.lock"
            | "Gemfile.lock"
    )
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|err| {
            PurgeError::Scan(format!("invalid glob pattern '{}': {}", pattern, err))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|err| PurgeError::Scan(format!("failed to build glob set: {}", err)))
}
