//! Swell Monitoring Service - single forecast cycle
//!
//! Reads NDBC realtime2 bulletins from disk, runs one forecast cycle and
//! prints the resulting `CycleReport` as JSON on stdout:
//! 1. Groups bulletin files by station id (the file stem, e.g. `46025`)
//! 2. Parses `.txt` (standard met) and `.spec` (spectral summary) files
//! 3. Extracts peaks and scores quality per station in parallel
//! 4. Fuses all stations into canonical swell events
//!
//! Fetching the bulletins is left to whatever schedules this binary.
//!
//! Usage:
//!   swellmon_service [--config PATH] [--now RFC3339] FILE...
//!
//! Environment:
//!   SWELLMON_CONFIG - configuration file (default: swellmon.toml if present)
//!   RUST_LOG        - log filter (default: info); logs go to stderr

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use swellmon_service::config::{load_config, SwellmonConfig, DEFAULT_CONFIG_PATH};
use swellmon_service::cycle::{run_cycle, StationHistory};
use swellmon_service::error::{Result, SwellError};
use swellmon_service::ingest::ndbc::{merge_observations, parse_bulletin};
use swellmon_service::model::StationObservation;

struct Args {
    config_path: Option<PathBuf>,
    now: Option<DateTime<Utc>>,
    files: Vec<PathBuf>,
}

fn usage(program: &str) -> String {
    format!("Usage: {} [--config PATH] [--now RFC3339] FILE...", program)
}

fn parse_args(args: &[String]) -> std::result::Result<Args, String> {
    let program = args.first().map(String::as_str).unwrap_or("swellmon_service");
    let mut parsed = Args { config_path: None, now: None, files: Vec::new() };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                let path = args.get(i + 1).ok_or("Error: --config requires a path")?;
                parsed.config_path = Some(PathBuf::from(path));
                i += 2;
            }
            "--now" => {
                let value = args.get(i + 1).ok_or("Error: --now requires an RFC3339 timestamp")?;
                let now = DateTime::parse_from_rfc3339(value)
                    .map_err(|e| format!("Error: invalid --now '{}': {}", value, e))?;
                parsed.now = Some(now.with_timezone(&Utc));
                i += 2;
            }
            "-h" | "--help" => return Err(usage(program)),
            flag if flag.starts_with("--") => {
                return Err(format!("Unknown argument: {}\n{}", flag, usage(program)));
            }
            file => {
                parsed.files.push(PathBuf::from(file));
                i += 1;
            }
        }
    }

    if parsed.files.is_empty() {
        return Err(usage(program));
    }
    Ok(parsed)
}

/// Explicit flag, then `SWELLMON_CONFIG`, then `swellmon.toml` if present,
/// then built-in defaults.
fn resolve_config(explicit: Option<PathBuf>) -> Result<SwellmonConfig> {
    let path = explicit.or_else(|| env::var("SWELLMON_CONFIG").ok().map(PathBuf::from));
    match path {
        Some(path) => load_config(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => load_config(DEFAULT_CONFIG_PATH),
        None => {
            info!("No configuration file found, using defaults");
            Ok(SwellmonConfig::default())
        }
    }
}

/// Reads and parses every file, grouping the rows by station. A file that
/// cannot be read or parsed is skipped; its station keeps whatever other
/// files it has.
fn load_histories(files: &[PathBuf]) -> Vec<StationHistory> {
    let mut met: BTreeMap<String, Vec<StationObservation>> = BTreeMap::new();
    let mut spectral: BTreeMap<String, Vec<StationObservation>> = BTreeMap::new();

    for path in files {
        let Some(station_id) = path.file_stem().and_then(|s| s.to_str()).map(str::to_uppercase) else {
            warn!("Skipping {}: no station id in file name", path.display());
            continue;
        };
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("txt");

        let parsed = fs::read_to_string(path)
            .map_err(SwellError::from)
            .and_then(|text| parse_bulletin(&station_id, extension, &text));
        match parsed {
            Ok(bulletin) => {
                info!("{}: {} rows from {}", station_id, bulletin.observations.len(), path.display());
                let target = if extension.eq_ignore_ascii_case("spec") { &mut spectral } else { &mut met };
                target.entry(station_id).or_default().extend(bulletin.observations);
            }
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }

    let mut station_ids: Vec<String> = met.keys().chain(spectral.keys()).cloned().collect();
    station_ids.sort();
    station_ids.dedup();

    station_ids
        .into_iter()
        .map(|id| {
            let rows = merge_observations(
                met.remove(&id).unwrap_or_default(),
                spectral.remove(&id).unwrap_or_default(),
            );
            StationHistory::new(id, rows)
        })
        .collect()
}

fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let raw_args: Vec<String> = env::args().collect();
    let args = match parse_args(&raw_args) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            std::process::exit(1);
        }
    };

    let config = match resolve_config(args.config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let histories = load_histories(&args.files);
    let now = args.now.unwrap_or_else(Utc::now);
    let report = run_cycle(&histories, now, &config);

    match serde_json::to_string_pretty(&report).map_err(SwellError::from) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            error!("Failed to write cycle report: {}", e);
            std::process::exit(1);
        }
    }
}
