// LootScribe - main.rs
//
// Command-line entry point. Handles:
// 1. CLI argument parsing
// 2. config.toml loading
// 3. Logging initialisation (debug mode support)
// 4. Dispatch to the council / track / loot / kills pipelines
//
// Results go to stdout (or --output); diagnostics go to stderr.

use clap::{Args, Parser, Subcommand, ValueEnum};
use lootscribe::app::pipeline;
use lootscribe::core::correlator::PolicyKind;
use lootscribe::core::export;
use lootscribe::core::timestamp::{parse_bound, RaidWindow};
use lootscribe::platform::config::{load_config, AppConfig, PlatformPaths};
use lootscribe::util::{self, error::LootScribeError};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// LootScribe - raid log ingestion for loot-council tracking.
///
/// Turns game-client chat logs into typed loot-council events and tracks
/// repeated drops of the same item as distinct instances.
#[derive(Parser, Debug)]
#[command(name = "lootscribe", version, about)]
struct Cli {
    /// Path to config.toml (defaults to the platform config directory).
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug", global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse loot-council events.
    Council {
        #[command(flatten)]
        raid: RaidArgs,

        /// Output format.
        #[arg(short = 'f', long = "format", value_enum, default_value_t = Format::Json)]
        format: Format,

        /// Write to this file instead of stdout.
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },

    /// Parse events and fold them into persisted per-item council state.
    Track {
        #[command(flatten)]
        raid: RaidArgs,

        /// State file (defaults to config [state] file, then the data directory).
        #[arg(short = 's', long = "state")]
        state: Option<PathBuf>,

        /// Correlation index policy (defaults to config [correlation] policy).
        #[arg(short = 'p', long = "policy")]
        policy: Option<PolicyKind>,
    },

    /// Match guild master-loot patterns from config.
    Loot {
        #[command(flatten)]
        raid: RaidArgs,
    },

    /// Extract NPC kills with zone attribution.
    Kills {
        #[command(flatten)]
        raid: RaidArgs,
    },
}

#[derive(Args, Debug)]
struct RaidArgs {
    /// Client log file.
    log: PathBuf,

    /// Raid start (RFC 3339, "YYYY-MM-DD HH:MM:SS" UTC, or a date).
    #[arg(long = "start", value_parser = parse_bound_arg)]
    start: chrono::DateTime<chrono::Utc>,

    /// Raid end, inclusive. Open-ended when omitted.
    #[arg(long = "end", value_parser = parse_bound_arg)]
    end: Option<chrono::DateTime<chrono::Utc>>,
}

impl RaidArgs {
    fn window(&self) -> RaidWindow {
        RaidWindow::new(self.start, self.end)
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    Json,
    Csv,
}

fn parse_bound_arg(raw: &str) -> Result<chrono::DateTime<chrono::Utc>, String> {
    parse_bound(raw).ok_or_else(|| {
        format!("'{raw}' is not a timestamp (try 2025-11-10T20:00:00Z or \"2025-11-10 20:00:00\")")
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Config is read before logging so its level can seed the filter;
    // its warnings are replayed once the subscriber is installed.
    let platform_paths = PlatformPaths::resolve();
    let (config_path, explicit) = match &cli.config {
        Some(p) => (p.clone(), true),
        None => (platform_paths.config_file(), false),
    };
    let loaded = load_config(&config_path, explicit);

    let config_level = loaded
        .as_ref()
        .ok()
        .and_then(|(c, _)| c.log_level.clone());
    util::logging::init(cli.debug, config_level.as_deref());

    tracing::info!(
        version = util::constants::APP_VERSION,
        debug = cli.debug,
        "LootScribe starting"
    );

    let config = match loaded {
        Ok((config, warnings)) => {
            for w in &warnings {
                tracing::warn!(warning = %w, "Config warning");
            }
            config
        }
        Err(e) => {
            tracing::error!(error = %e, "Configuration could not be loaded");
            eprintln!("error: {}", LootScribeError::from(e));
            return ExitCode::FAILURE;
        }
    };

    match run(cli.command, &config, &platform_paths) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            let mut msg = format!("error: {e}");
            let mut source = std::error::Error::source(&e);
            while let Some(cause) = source {
                msg.push_str(&format!("\n  caused by: {cause}"));
                source = cause.source();
            }
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, config: &AppConfig, paths: &PlatformPaths) -> util::error::Result<()> {
    match command {
        Command::Council {
            raid,
            format,
            output,
        } => {
            let outcome = pipeline::council_events(&raid.log, &raid.window())?;
            let target = output.as_deref().unwrap_or(Path::new("<stdout>"));
            with_output(output.as_deref(), |w| match format {
                Format::Json => export::export_events_json(&outcome.events, w, target),
                Format::Csv => export::export_events_csv(&outcome.events, w, target),
            })
        }
        Command::Track {
            raid,
            state,
            policy,
        } => {
            let state_path = state
                .or_else(|| config.state_file.clone())
                .unwrap_or_else(|| paths.state_file());
            let policy = policy.unwrap_or(config.policy);
            let outcome = pipeline::track(&raid.log, &raid.window(), &state_path, policy)?;
            tracing::info!(
                events = outcome.events.len(),
                new = outcome.newly_applied,
                items = outcome.items.len(),
                "Tracking complete"
            );
            print_json(&outcome.items)
        }
        Command::Loot { raid } => {
            let pickups =
                pipeline::loot(&raid.log, &raid.window(), &config.master_loot_patterns)?;
            print_json(&pickups)
        }
        Command::Kills { raid } => {
            let kills = pipeline::kills(&raid.log, &raid.window())?;
            print_json(&kills)
        }
    }
}

fn print_json<T: Serialize>(records: &[T]) -> util::error::Result<()> {
    with_output(None, |w| export::export_json(records, w, Path::new("<stdout>")))
}

/// Run `write` against the output file, or locked stdout when none is given.
fn with_output<F>(output: Option<&Path>, write: F) -> util::error::Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<usize, util::error::ExportError>,
{
    let count = match output {
        Some(path) => {
            let file = std::fs::File::create(path).map_err(|e| LootScribeError::Io {
                path: path.to_path_buf(),
                operation: "create output",
                source: e,
            })?;
            let mut writer = std::io::BufWriter::new(file);
            let count = write(&mut writer)?;
            writer.flush().map_err(|e| LootScribeError::Io {
                path: path.to_path_buf(),
                operation: "flush output",
                source: e,
            })?;
            count
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            write(&mut lock)?
        }
    };
    tracing::debug!(records = count, "Output written");
    Ok(())
}
