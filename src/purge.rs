use crate::config::{Config, PurgeMode, PurgeSetting};
use crate::eliminator::{EliminationOptions, EliminationReport, Eliminator};
use crate::error::Result;
use crate::extractor::ThemeExtractor;
use crate::markers::{annotate_conservative, strip_markers};
use crate::stylesheet::Stylesheet;

pub const NO_SOURCES_WARNING: [&str; 3] = [
    "Unused styles are not being purged because no template paths have been provided.",
    "If you remove unused styles elsewhere or deliberately keep them, set `purge = false` in your config file to silence this warning.",
    "https://tailwindcss.com/docs/controlling-file-size/#removing-unused-css",
];

/// Receives advisory messages that should reach the user.
pub trait Reporter {
    fn warn(&self, lines: &[&str]);
}

/// Forwards warnings to the `log` facade as a single record.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn warn(&self, lines: &[&str]) {
        log::warn!("{}", lines.join("\n"));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeState {
    Disabled,
    NoSources,
    Enabled,
}

#[derive(Debug)]
pub enum Stage {
    Reannotate,
    StripMarkers,
    Eliminate(Eliminator),
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Reannotate => "reannotate",
            Stage::StripMarkers => "strip-markers",
            Stage::Eliminate(_) => "eliminate",
        }
    }

    fn run(&self, sheet: &mut Stylesheet) -> Result<Option<EliminationReport>> {
        match self {
            Stage::Reannotate => annotate_conservative(sheet),
            Stage::StripMarkers => strip_markers(sheet),
            Stage::Eliminate(eliminator) => return eliminator.eliminate(sheet).map(Some),
        }
        Ok(None)
    }
}

/// Stages applied in order to one stylesheet.
#[derive(Debug)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    pub fn strip_only() -> Self {
        Self::new(vec![Stage::StripMarkers])
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(Stage::name).collect()
    }

    pub fn is_purging(&self) -> bool {
        self.stages
            .iter()
            .any(|stage| matches!(stage, Stage::Eliminate(_)))
    }

    /// Runs every stage over `sheet`, returning the elimination report when
    /// the pipeline purges.
    pub fn run(&self, sheet: &mut Stylesheet) -> Result<Option<EliminationReport>> {
        let mut report = None;
        for stage in &self.stages {
            log::debug!("running stage {}", stage.name());
            if let Some(stage_report) = stage.run(sheet)? {
                report = Some(stage_report);
            }
        }
        Ok(report)
    }
}

/// Classifies the purge setting. `production` is the default for `enabled`
/// when the setting does not decide it explicitly.
pub fn purge_state(config: &Config, production: bool) -> PurgeState {
    let Some(purge) = config.purge.as_ref() else {
        return PurgeState::Disabled;
    };
    if !purge.is_enabled(production) {
        return PurgeState::Disabled;
    }
    if purge.is_empty_source_list() {
        return PurgeState::NoSources;
    }
    PurgeState::Enabled
}

/// Builds the pipeline for `config`. Emits the no-sources warning through
/// `reporter` only when the config changed since the last run.
pub fn decide(
    config: &Config,
    config_changed: bool,
    production: bool,
    reporter: &dyn Reporter,
) -> Pipeline {
    let purge = match (purge_state(config, production), config.purge.as_ref()) {
        (PurgeState::Enabled, Some(purge)) => purge,
        (PurgeState::NoSources, _) => {
            if config_changed {
                reporter.warn(&NO_SOURCES_WARNING);
            }
            return Pipeline::strip_only();
        }
        _ => return Pipeline::strip_only(),
    };

    let mut stages = Vec::new();
    if purge.mode() == PurgeMode::Conservative {
        stages.push(Stage::Reannotate);
    }
    stages.push(Stage::StripMarkers);
    stages.push(Stage::Eliminate(Eliminator::new(elimination_options(
        config, purge,
    ))));
    Pipeline::new(stages)
}

fn elimination_options(config: &Config, purge: &PurgeSetting) -> EliminationOptions {
    let extractor = ThemeExtractor::new(config.theme.clone(), config.separator);
    EliminationOptions::new(purge.content(), Box::new(extractor)).merge(purge.options())
}
