/// Core data types for the swell monitoring service.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains no I/O and almost no logic, only types and a few accessors.
///
/// Missing measurements are `None` everywhere below. A `None` period or
/// direction means "unmeasured", never "zero", and every computation in
/// `analysis` skips such fields rather than defaulting them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::units::to_regional_scale_ft;

// ---------------------------------------------------------------------------
// Observation types
// ---------------------------------------------------------------------------

/// One partition of the sea state (swell or wind wave) as reported by a
/// buoy's spectral summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WavePartition {
    pub height_m: Option<f64>,
    pub period_s: Option<f64>,
    pub direction_deg: Option<f64>,
}

impl WavePartition {
    pub fn new(height_m: Option<f64>, period_s: Option<f64>, direction_deg: Option<f64>) -> Self {
        Self { height_m, period_s, direction_deg }
    }

    /// True when no field of the partition was reported.
    pub fn is_empty(&self) -> bool {
        self.height_m.is_none() && self.period_s.is_none() && self.direction_deg.is_none()
    }
}

/// A single bulletin row from one station at one time.
///
/// Produced by `ingest::ndbc` (or deserialized directly from JSON). The
/// swell and wind-wave partitions are empty when the station publishes no
/// spectral summary for that hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationObservation {
    pub station_id: String,
    pub timestamp: DateTime<Utc>,
    /// Significant wave height (WVHT).
    #[serde(default)]
    pub wave_height_m: Option<f64>,
    /// Dominant wave period (DPD).
    #[serde(default)]
    pub dominant_period_s: Option<f64>,
    /// Average wave period (APD).
    #[serde(default)]
    pub average_period_s: Option<f64>,
    /// Direction the dominant waves come from, degrees true (MWD).
    #[serde(default)]
    pub mean_direction_deg: Option<f64>,
    #[serde(default)]
    pub wind_speed_mps: Option<f64>,
    #[serde(default)]
    pub wind_direction_deg: Option<f64>,
    #[serde(default)]
    pub wind_gust_mps: Option<f64>,
    #[serde(default)]
    pub swell: WavePartition,
    #[serde(default)]
    pub wind_wave: WavePartition,
}

impl StationObservation {
    /// An observation with every measurement absent.
    pub fn new(station_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            station_id: station_id.into(),
            timestamp,
            wave_height_m: None,
            dominant_period_s: None,
            average_period_s: None,
            mean_direction_deg: None,
            wind_speed_mps: None,
            wind_direction_deg: None,
            wind_gust_mps: None,
            swell: WavePartition::default(),
            wind_wave: WavePartition::default(),
        }
    }

    /// True if any wave field at all (bulk or partitioned) was reported.
    pub fn has_wave_data(&self) -> bool {
        self.wave_height_m.is_some()
            || self.dominant_period_s.is_some()
            || self.mean_direction_deg.is_some()
            || !self.swell.is_empty()
            || !self.wind_wave.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Spectral types
// ---------------------------------------------------------------------------

/// Which wave population a spectral peak belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    Swell,
    WindWave,
}

/// A validated local maximum of one station's wave spectrum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralPeak {
    pub frequency_hz: f64,
    pub period_s: f64,
    /// Degrees true in [0, 360); `None` when the bulletin omitted it.
    pub direction_deg: Option<f64>,
    /// Energy density, m²/Hz.
    pub energy_density: f64,
    pub height_m: f64,
    pub directional_spread_deg: f64,
    pub confidence: f64,
    pub component_type: ComponentType,
}

impl SpectralPeak {
    pub fn height_ft(&self) -> f64 {
        to_regional_scale_ft(self.height_m)
    }
}

/// Output of the peak extractor for one station.
///
/// `peaks` is ordered by descending energy and never holds two peaks that
/// are inseparable on both period and direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralAnalysisResult {
    pub station_id: String,
    pub timestamp: DateTime<Utc>,
    pub peaks: Vec<SpectralPeak>,
    pub dominant_peak: Option<SpectralPeak>,
    pub total_energy: f64,
}

impl SpectralAnalysisResult {
    /// Builds a result from peaks already sorted by descending energy.
    pub fn new(station_id: impl Into<String>, timestamp: DateTime<Utc>, peaks: Vec<SpectralPeak>) -> Self {
        let total_energy = peaks.iter().map(|p| p.energy_density).sum();
        let dominant_peak = peaks.first().cloned();
        Self {
            station_id: station_id.into(),
            timestamp,
            peaks,
            dominant_peak,
            total_energy,
        }
    }

    /// A result with no peaks: the routine outcome for an incomplete bulletin.
    pub fn empty(station_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(station_id, timestamp, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Quality types
// ---------------------------------------------------------------------------

/// Outcome of a statistic that needs a minimum number of samples.
///
/// Too few samples is a normal state for sparse feeds and is reported as a
/// value, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum Analysis<T> {
    InsufficientData { samples: usize, required: usize },
    Ready(T),
}

impl<T> Analysis<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Analysis::Ready(value) => Some(value),
            Analysis::InsufficientData { .. } => None,
        }
    }

    pub fn is_insufficient(&self) -> bool {
        matches!(self, Analysis::InsufficientData { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

/// Least-squares height trend over the recent window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    pub direction: TrendDirection,
    pub slope_ft_per_hr: f64,
    /// In [0, 1].
    pub confidence: f64,
    /// Coefficient of determination of the fit.
    pub r_squared: f64,
    pub sample_size: usize,
}

/// Z-score of one observation, keyed by its index in the history slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationZScore {
    pub index: usize,
    pub z_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyResult {
    /// Indices into the analysed history whose |z| reached the threshold.
    pub flagged_indices: Vec<usize>,
    /// One entry per windowed observation that carried a height, oldest first.
    pub z_scores: Vec<ObservationZScore>,
    pub window_mean_m: f64,
    pub window_std_m: f64,
    pub threshold_sigma: f64,
}

impl AnomalyResult {
    /// The z-score of the most recent scored observation, if it was flagged.
    pub fn latest_anomaly(&self) -> Option<f64> {
        let latest = self.z_scores.last()?;
        self.flagged_indices
            .contains(&latest.index)
            .then_some(latest.z_score)
    }
}

/// Composite data-quality score for one station; every field lies in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    pub freshness: f64,
    pub completeness: f64,
    pub consistency: f64,
    pub overall: f64,
}

impl QualityScore {
    /// Substituted when quality cannot be computed for a station.
    pub fn neutral() -> Self {
        Self {
            freshness: 0.5,
            completeness: 0.5,
            consistency: 0.5,
            overall: 0.5,
        }
    }
}

// ---------------------------------------------------------------------------
// Fusion types
// ---------------------------------------------------------------------------

/// One station's view of one wave train, ready for cross-station fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwellComponent {
    pub station_id: String,
    pub observed_at: DateTime<Utc>,
    pub height_m: f64,
    /// Regional-scale height, always derived from `height_m` via `units`.
    pub height_ft: f64,
    pub period_s: Option<f64>,
    pub direction_deg: Option<f64>,
    /// Extractor confidence before station weighting.
    pub confidence: f64,
    /// `confidence` scaled by the station's quality.
    pub weighted_confidence: f64,
    pub significance: f64,
    pub component_type: ComponentType,
}

impl SwellComponent {
    pub fn new(
        station_id: impl Into<String>,
        observed_at: DateTime<Utc>,
        height_m: f64,
        period_s: Option<f64>,
        direction_deg: Option<f64>,
        confidence: f64,
        component_type: ComponentType,
    ) -> Self {
        Self {
            station_id: station_id.into(),
            observed_at,
            height_m,
            height_ft: to_regional_scale_ft(height_m),
            period_s,
            direction_deg,
            confidence,
            weighted_confidence: confidence,
            significance: 0.0,
            component_type,
        }
    }

    pub fn from_peak(station_id: &str, observed_at: DateTime<Utc>, peak: &SpectralPeak) -> Self {
        Self::new(
            station_id,
            observed_at,
            peak.height_m,
            Some(peak.period_s),
            peak.direction_deg,
            peak.confidence,
            peak.component_type,
        )
    }
}

/// Per-station provenance attached to a fused event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributingStation {
    pub station_id: String,
    pub station_name: Option<String>,
    pub quality: f64,
    pub weighted_confidence: f64,
    pub observed_at: DateTime<Utc>,
}

/// A canonical, de-duplicated wave train for one forecast cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwellEvent {
    pub id: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub primary_direction_deg: Option<f64>,
    pub period_s: Option<f64>,
    pub height_m: f64,
    pub canonical_height_ft: f64,
    pub significance: f64,
    /// Combined confidence of all components, in [0, 1].
    pub confidence: f64,
    pub component_type: ComponentType,
    pub primary: SwellComponent,
    /// Corroborating components, by descending weighted significance.
    pub secondary: Vec<SwellComponent>,
    /// Sorted by station id.
    pub stations: Vec<ContributingStation>,
}

impl SwellEvent {
    /// Primary followed by secondaries.
    ///
    /// The primary is chosen by weighted confidence alone, so it can carry
    /// a lower weighted significance than the first secondary. Only the
    /// secondaries are ordered by descending weighted significance.
    pub fn components(&self) -> impl Iterator<Item = &SwellComponent> {
        std::iter::once(&self.primary).chain(self.secondary.iter())
    }
}
