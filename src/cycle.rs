/// One forecast cycle: per-station analysis in parallel, then one fusion pass.
///
/// Each station is analysed on a worker thread with no shared mutable
/// state: peak extraction (grid mode when a grid was supplied, bulletin
/// mode on the most recent row otherwise) and the three quality analyses.
/// Workers report back over a channel. A station whose worker dies
/// without reporting is recorded as a `PartialSourceFailure` and simply
/// left out of fusion.
///
/// Nothing carries over between cycles; every call starts from the
/// histories it is given.

use std::collections::BTreeMap;
use std::sync::mpsc;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use threadpool::ThreadPool;
use tracing::{debug, info, warn};

use crate::analysis::fusion::{FusionReport, StationInput, SwellFusionEngine};
use crate::analysis::grid::SpectralGrid;
use crate::analysis::peaks::{ExtractionStats, SpectralPeakExtractor};
use crate::analysis::quality::{QualityReport, StationQualityAnalyzer};
use crate::config::SwellmonConfig;
use crate::error::SwellError;
use crate::model::{SpectralAnalysisResult, StationObservation, SwellEvent};

/// Everything collected for one station before a cycle.
#[derive(Debug, Clone)]
pub struct StationHistory {
    pub station_id: String,
    /// Recent observations in any order.
    pub observations: Vec<StationObservation>,
    /// Full frequency–direction spectrum, when the source provides one.
    pub grid: Option<SpectralGrid>,
}

impl StationHistory {
    pub fn new(station_id: impl Into<String>, observations: Vec<StationObservation>) -> Self {
        Self { station_id: station_id.into(), observations, grid: None }
    }

    pub fn with_grid(mut self, grid: SpectralGrid) -> Self {
        self.grid = Some(grid);
        self
    }
}

/// Per-station outcome of a cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationReport {
    pub station_id: String,
    pub extraction: SpectralAnalysisResult,
    pub extraction_stats: ExtractionStats,
    /// Set when the station had no usable rows at all.
    pub missing_data: bool,
    pub quality: QualityReport,
}

impl StationReport {
    fn fusion_input(&self) -> StationInput {
        StationInput {
            analysis: self.extraction.clone(),
            quality: self.quality.quality,
            latest_anomaly_z: self.quality.anomalies.ready().and_then(|a| a.latest_anomaly()),
        }
    }
}

/// A station that never reported back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationFailure {
    pub station_id: String,
    pub reason: String,
}

impl From<SwellError> for StationFailure {
    fn from(err: SwellError) -> Self {
        match err {
            SwellError::PartialSourceFailure { station, reason } => Self { station_id: station, reason },
            other => Self { station_id: String::new(), reason: other.to_string() },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub cycle_time: DateTime<Utc>,
    /// Sorted by station id.
    pub stations: Vec<StationReport>,
    pub failures: Vec<StationFailure>,
    pub fusion: FusionReport,
}

impl CycleReport {
    pub fn events(&self) -> &[SwellEvent] {
        &self.fusion.events
    }

    pub fn aggregate_confidence(&self) -> f64 {
        self.fusion.aggregate_confidence
    }

    pub fn station(&self, station_id: &str) -> Option<&StationReport> {
        self.stations.iter().find(|s| s.station_id == station_id)
    }
}

/// Analyses one station. Never fails: a station with no rows gets an
/// empty extraction and a neutral quality score.
pub fn analyze_station(
    history: &StationHistory,
    now: DateTime<Utc>,
    extractor: &SpectralPeakExtractor,
    analyzer: &StationQualityAnalyzer,
) -> StationReport {
    let station_id = history.station_id.as_str();
    let latest_time = history.observations.iter().map(|o| o.timestamp).max();

    let (extraction, extraction_stats, missing_data) = match &history.grid {
        Some(grid) => {
            let e = extractor.extract_from_grid(station_id, latest_time.unwrap_or(now), grid);
            (e.result, e.stats, false)
        }
        None => match extractor.extract_latest(&history.observations) {
            Ok(e) => (e.result, e.stats, false),
            Err(err) => {
                debug!("{}: {}", station_id, err);
                (SpectralAnalysisResult::empty(station_id, now), ExtractionStats::default(), true)
            }
        },
    };

    let quality = analyzer.assess(station_id, &history.observations, now);

    debug!(
        "{}: {} peaks, quality {:.2}",
        station_id,
        extraction.peaks.len(),
        quality.quality.overall
    );

    StationReport {
        station_id: station_id.to_string(),
        extraction,
        extraction_stats,
        missing_data,
        quality,
    }
}

/// Folds histories that share a station id into one, so each station is
/// analysed exactly once. Observations are concatenated and re-sorted by
/// time; the first grid supplied wins.
fn merge_duplicate_histories(histories: &[StationHistory]) -> Vec<StationHistory> {
    let mut merged: BTreeMap<String, StationHistory> = BTreeMap::new();
    for history in histories {
        match merged.get_mut(&history.station_id) {
            Some(existing) => {
                warn!("{}: duplicate station history, merging observations", history.station_id);
                existing.observations.extend(history.observations.iter().cloned());
                if existing.grid.is_none() {
                    existing.grid = history.grid.clone();
                }
            }
            None => {
                merged.insert(history.station_id.clone(), history.clone());
            }
        }
    }

    merged
        .into_values()
        .map(|mut history| {
            history.observations.sort_by_key(|o| o.timestamp);
            history
        })
        .collect()
}

/// Runs `job` for every station on a pool of `workers` threads and
/// collects what comes back. Stations whose job panicked are returned as
/// failures.
fn run_station_jobs<F>(
    histories: &[StationHistory],
    workers: usize,
    job: F,
) -> (BTreeMap<String, StationReport>, Vec<StationFailure>)
where
    F: Fn(&StationHistory) -> StationReport + Send + Sync + 'static,
{
    let pool = ThreadPool::new(workers.max(1));
    let job = Arc::new(job);
    let (tx, rx) = mpsc::channel();

    for history in histories {
        let tx = tx.clone();
        let job = Arc::clone(&job);
        let history = history.clone();
        pool.execute(move || {
            let report = job(&history);
            // receiver outlives every job; a send error only means the cycle was dropped
            let _ = tx.send(report);
        });
    }
    drop(tx);

    let mut reports = BTreeMap::new();
    for report in rx.iter() {
        reports.insert(report.station_id.clone(), report);
    }

    let mut failures: Vec<StationFailure> = histories
        .iter()
        .filter(|h| !reports.contains_key(&h.station_id))
        .map(|h| {
            let err = SwellError::PartialSourceFailure {
                station: h.station_id.clone(),
                reason: "station analysis did not complete".to_string(),
            };
            warn!("{}", err);
            StationFailure::from(err)
        })
        .collect();
    failures.sort_by(|a, b| a.station_id.cmp(&b.station_id));
    failures.dedup();

    (reports, failures)
}

/// Runs one forecast cycle over the given station histories.
pub fn run_cycle(histories: &[StationHistory], now: DateTime<Utc>, config: &SwellmonConfig) -> CycleReport {
    info!("Starting cycle at {} for {} stations", now.to_rfc3339(), histories.len());

    let extractor = SpectralPeakExtractor::from_config(config);
    let analyzer = StationQualityAnalyzer::from_config(config);
    let histories = merge_duplicate_histories(histories);
    let (reports, failures) = run_station_jobs(&histories, config.cycle.worker_threads, move |history| {
        analyze_station(history, now, &extractor, &analyzer)
    });

    let inputs: Vec<StationInput> = reports.values().map(StationReport::fusion_input).collect();
    let fusion = SwellFusionEngine::from_config(config).fuse(&inputs, now);

    info!(
        "Cycle complete: {} events, {} stations analysed, {} failed",
        fusion.events.len(),
        reports.len(),
        failures.len()
    );

    CycleReport {
        cycle_time: now,
        stations: reports.into_values().collect(),
        failures,
        fusion,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
