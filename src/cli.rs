//! CLI definition and dispatch.
//!
//! Local developer tooling over the core pipeline: JSON files in, JSON files
//! (or stdout) out. No network, no database.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::domain::canonical::CanonicalStrategy;
use crate::domain::error::StratagemError;
use crate::domain::event::{EventLog, EVENT_LOG_VERSION};
use crate::domain::fragments::ParsedStrategy;
use crate::domain::instrument::InstrumentRegistry;
use crate::domain::normalizer;
use crate::domain::replay;
use crate::domain::validator;

#[derive(Parser, Debug)]
#[command(name = "stratagem", about = "Canonical trading-strategy core tools")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Normalize an AI-parsed fragment bundle into a canonical strategy
    Normalize {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Re-validate a persisted canonical snapshot
    Validate {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Replay an event log into a canonical snapshot
    Replay {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Lift a legacy canonical snapshot into a versioned event log
    Migrate {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Normalize { input, output } => run_normalize(&input, output.as_deref()),
        Command::Validate { input } => run_validate(&input),
        Command::Replay { input, output } => run_replay(&input, output.as_deref()),
        Command::Migrate { input, output } => run_migrate(&input, output.as_deref()),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            report_details(&err);
            (&err).into()
        }
    }
}

fn report_details(err: &StratagemError) {
    match err {
        StratagemError::Normalize { errors } => {
            for e in errors {
                eprintln!("  - {e}");
            }
        }
        StratagemError::Validation { errors } => {
            for e in errors {
                eprintln!("  - {e}");
            }
        }
        StratagemError::Replay(failure) => {
            for e in &failure.errors {
                eprintln!("  - {e}");
            }
        }
        _ => {}
    }
}

/// Parse a JSON file into `T`, naming the file in the error.
pub fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StratagemError> {
    let raw = fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|e| StratagemError::InputParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn write_json<T: serde::Serialize>(
    value: &T,
    output: Option<&Path>,
) -> Result<(), StratagemError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| StratagemError::InputParse {
        file: "<output>".to_string(),
        reason: e.to_string(),
    })?;
    match output {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }
    Ok(())
}

/// Normalize a fragment bundle and print or write the canonical snapshot.
pub fn normalize_file(
    input: &Path,
    registry: &InstrumentRegistry,
) -> Result<CanonicalStrategy, StratagemError> {
    let parsed: ParsedStrategy = load_json(input)?;
    normalizer::normalize(&parsed, registry)
        .map_err(|errors| StratagemError::Normalize { errors })
}

fn run_normalize(input: &Path, output: Option<&Path>) -> Result<(), StratagemError> {
    eprintln!("Normalizing {}", input.display());
    let registry = InstrumentRegistry::default();
    let canonical = normalize_file(input, &registry)?;
    eprintln!(
        "Classified as {} on {}",
        canonical.pattern(),
        canonical.instrument.symbol
    );
    write_json(&canonical, output)
}

fn run_validate(input: &Path) -> Result<(), StratagemError> {
    eprintln!("Validating {}", input.display());
    let canonical: CanonicalStrategy = load_json(input)?;
    validator::validate(&canonical).map_err(|errors| StratagemError::Validation { errors })?;
    eprintln!("OK: {} strategy is valid", canonical.pattern());
    Ok(())
}

/// Replay an event-log file into its canonical snapshot.
pub fn replay_file(input: &Path) -> Result<CanonicalStrategy, StratagemError> {
    let log: EventLog = load_json(input)?;
    if log.version != EVENT_LOG_VERSION {
        return Err(StratagemError::InputParse {
            file: input.display().to_string(),
            reason: format!(
                "unsupported event log format version {}, expected {}",
                log.version, EVENT_LOG_VERSION
            ),
        });
    }
    let replayed = replay::replay(&log)?;
    eprintln!("Replayed {} event(s)", replayed.event_count);
    Ok(replayed.canonical)
}

fn run_replay(input: &Path, output: Option<&Path>) -> Result<(), StratagemError> {
    eprintln!("Replaying {}", input.display());
    let canonical = replay_file(input)?;
    write_json(&canonical, output)
}

fn run_migrate(input: &Path, output: Option<&Path>) -> Result<(), StratagemError> {
    eprintln!("Migrating {}", input.display());
    let canonical: CanonicalStrategy = load_json(input)?;
    validator::validate(&canonical).map_err(|errors| StratagemError::Validation { errors })?;
    let log = EventLog::from_events(replay::from_canonical(&canonical));
    eprintln!("Lifted snapshot into {} event(s)", log.len());
    write_json(&log, output)
}
