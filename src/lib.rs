pub mod config;
pub mod eliminator;
pub mod error;
pub mod extractor;
pub mod markers;
pub mod purge;
pub mod scanner;
pub mod stylesheet;

pub use error::{PurgeError, Result};

use std::env;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Purge {
        input: String,
        out: Option<String>,
        config: Option<String>,
        config_changed: bool,
        production: Option<bool>,
    },
    Scan {
        inputs: Vec<String>,
        ignore: Vec<String>,
        config: Option<String>,
    },
    Help,
}

pub fn run(command: Command) -> Result<()> {
    match command {
        Command::Purge {
            input,
            out,
            config,
            config_changed,
            production,
        } => {
            let production = production.unwrap_or_else(production_from_env);
            run_purge(&input, out.as_deref(), config.as_deref(), config_changed, production)
        }
        Command::Scan {
            inputs,
            ignore,
            config,
        } => run_scan(inputs, ignore, config.as_deref()),
        Command::Help => {
            print_help();
            Ok(())
        }
    }
}

pub fn run_from_env() -> Result<()> {
    let command = parse_args(env::args().skip(1))?;
    run(command)
}

pub fn parse_args<I>(args: I) -> Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut iter = args.into_iter();
    let Some(cmd) = iter.next() else {
        return Ok(Command::Help);
    };

    match cmd.as_str() {
        "purge" => parse_purge_args(iter.collect()),
        "scan" => parse_scan_args(iter.collect()),
        "-h" | "--help" | "help" => Ok(Command::Help),
        _ => Err(PurgeError::Usage(format!("unknown command: {}", cmd))),
    }
}

fn parse_purge_args(args: Vec<String>) -> Result<Command> {
    let mut inputs = Vec::new();
    let mut out = None;
    let mut config = None;
    let mut config_changed = false;
    let mut production = None;
    let mut idx = 0;

    while idx < args.len() {
        match args[idx].as_str() {
            "--out" | "--output" | "-o" => {
                idx += 1;
                out = Some(require_value(&args, idx, "purge", "--output")?);
            }
            "--config" | "-c" => {
                idx += 1;
                config = Some(require_value(&args, idx, "purge", "--config")?);
            }
            "--config-changed" => {
                config_changed = true;
            }
            "--production" => {
                production = Some(true);
            }
            "--development" => {
                production = Some(false);
            }
            value => {
                inputs.push(value.to_string());
            }
        }
        idx += 1;
    }

    let mut inputs = inputs.into_iter();
    let (Some(input), None) = (inputs.next(), inputs.next()) else {
        return Err(PurgeError::Usage(
            "purge requires exactly one input stylesheet".to_string(),
        ));
    };

    Ok(Command::Purge {
        input,
        out,
        config,
        config_changed,
        production,
    })
}

fn parse_scan_args(args: Vec<String>) -> Result<Command> {
    let mut inputs = Vec::new();
    let mut ignore = Vec::new();
    let mut config = None;
    let mut idx = 0;

    while idx < args.len() {
        match args[idx].as_str() {
            "--ignore" | "-i" | "-I" => {
                idx += 1;
                ignore.push(require_value(&args, idx, "scan", "--ignore")?);
            }
            "--config" | "-c" => {
                idx += 1;
                config = Some(require_value(&args, idx, "scan", "--config")?);
            }
            value => {
                inputs.push(value.to_string());
            }
        }
        idx += 1;
    }

    if inputs.is_empty() {
        return Err(PurgeError::Usage(
            "scan requires at least one path or glob pattern".to_string(),
        ));
    }

    Ok(Command::Scan {
        inputs,
        ignore,
        config,
    })
}

fn require_value(args: &[String], idx: usize, command: &str, flag: &str) -> Result<String> {
    args.get(idx).cloned().ok_or_else(|| {
        PurgeError::Usage(format!("{} requires a value for {}", command, flag))
    })
}

fn production_from_env() -> bool {
    env::var("NODE_ENV").is_ok_and(|value| value == "production")
}

fn load_config(path: Option<&str>) -> Result<config::Config> {
    match path {
        Some(path) => config::load(Path::new(path)),
        None => Ok(config::Config::default()),
    }
}

fn run_purge(
    input: &str,
    out: Option<&str>,
    config_path: Option<&str>,
    config_changed: bool,
    production: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let css = fs::read_to_string(input).map_err(|err| PurgeError::io(input, err))?;
    let mut sheet = stylesheet::Stylesheet::parse(&css)?;

    let pipeline = purge::decide(&config, config_changed, production, &purge::LogReporter);
    let report = pipeline.run(&mut sheet)?;
    let output = sheet.to_css();

    match out {
        Some(out_path) => {
            fs::write(out_path, output).map_err(|err| PurgeError::io(out_path, err))?;
        }
        None => print!("{}", output),
    }

    match report {
        Some(report) => {
            for selector in &report.rejected {
                eprintln!("rejected: {}", selector);
            }
            eprintln!(
                "scanned {} files, found {} candidates, kept {} selectors, removed {}",
                report.files_scanned,
                report.candidates,
                report.kept_selectors,
                report.removed_selectors
            );
        }
        None => eprintln!("purge inactive, stripped framework markers only"),
    }

    Ok(())
}

fn run_scan(inputs: Vec<String>, ignore: Vec<String>, config_path: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;
    let extractor = extractor::ThemeExtractor::new(config.theme, config.separator);
    let paths =
        scanner::resolve_globs(&inputs, &ignore, &scanner::ScanGlobOptions::default())?;
    let result = scanner::scan_paths(&paths, &extractor);

    for candidate in &result.candidates {
        println!("{}", candidate);
    }

    eprintln!(
        "scanned {} files, found {} candidates",
        result.files_scanned,
        result.candidates.len()
    );

    Ok(())
}

fn print_help() {
    println!("ironpurge");
    println!();
    println!("USAGE:");
    println!(
        "  ironpurge purge [--config <path>] [--output <path>] [--config-changed] [--production|--development] <input.css>"
    );
    println!("  ironpurge scan [--config <path>] [--ignore <glob>] <glob...>");
    println!();
    println!("EXAMPLES:");
    println!("  ironpurge purge -c ironpurge.toml -o dist/app.css build/app.css");
    println!("  NODE_ENV=production ironpurge purge -c ironpurge.toml build/app.css");
    println!("  ironpurge scan -c ironpurge.toml \"src/**/*.{{html,vue}}\"");
}
