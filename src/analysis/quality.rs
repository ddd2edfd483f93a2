/// Per-station data quality analysis.
///
/// Three independent, pure functions over one station's recent history:
///
/// - `detect_trend`: least-squares height trend over the trailing window
/// - `detect_anomalies`: z-score outliers over the same window
/// - `calculate_quality`: freshness, completeness, consistency and their
///   weighted composite
///
/// The history may arrive in any order (NDBC files list newest first);
/// every function orders samples by timestamp itself. Observations without
/// a wave height are skipped, never read as zero.
///
/// `StationQualityAnalyzer::assess` runs all three and isolates them: an
/// insufficient trend does not stop quality scoring, and a quality error
/// is replaced by `QualityScore::neutral()`.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::warn;

use crate::config::{QualityConfig, SwellmonConfig};
use crate::error::{Result, SwellError};
use crate::model::{
    AnomalyResult, Analysis, ObservationZScore, QualityScore, StationObservation, TrendDirection, TrendResult,
};
use crate::units::to_regional_scale_ft;

/// A height sample tied back to its position in the caller's slice.
#[derive(Debug, Clone, Copy)]
struct Sample {
    index: usize,
    timestamp: DateTime<Utc>,
    height_m: f64,
}

/// Height samples sorted by time, restricted to the trailing window that
/// ends at the newest sample.
fn windowed_samples(history: &[StationObservation], window_hours: f64) -> Vec<Sample> {
    let mut samples: Vec<Sample> = history
        .iter()
        .enumerate()
        .filter_map(|(index, obs)| {
            obs.wave_height_m
                .filter(|h| h.is_finite())
                .map(|height_m| Sample { index, timestamp: obs.timestamp, height_m })
        })
        .collect();
    samples.sort_by_key(|s| (s.timestamp, s.index));

    if let Some(newest) = samples.last().map(|s| s.timestamp) {
        let start = newest - Duration::seconds((window_hours * 3600.0) as i64);
        samples.retain(|s| s.timestamp >= start);
    }
    samples
}

fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_seconds() as f64 / 3600.0
}

// ---------------------------------------------------------------------------
// Trend
// ---------------------------------------------------------------------------

/// Ordinary least squares of regional-scale height (ft) against time (hr).
///
/// Confidence is R² discounted linearly until `full_confidence_samples`
/// samples are available. Fewer than `min_samples` samples, or samples all
/// sharing one timestamp, report insufficient data.
pub fn detect_trend(history: &[StationObservation], config: &QualityConfig) -> Analysis<TrendResult> {
    let samples = windowed_samples(history, config.trend_window_hours);
    let n = samples.len();
    if n < config.min_samples {
        return Analysis::InsufficientData { samples: n, required: config.min_samples };
    }

    let origin = samples[0].timestamp;
    let xs: Vec<f64> = samples.iter().map(|s| hours_between(origin, s.timestamp)).collect();
    let ys: Vec<f64> = samples.iter().map(|s| to_regional_scale_ft(s.height_m)).collect();

    let x_mean = xs.iter().sum::<f64>() / n as f64;
    let y_mean = ys.iter().sum::<f64>() / n as f64;
    let sxx: f64 = xs.iter().map(|x| (x - x_mean).powi(2)).sum();
    let sxy: f64 = xs.iter().zip(&ys).map(|(x, y)| (x - x_mean) * (y - y_mean)).sum();

    if sxx <= f64::EPSILON {
        return Analysis::InsufficientData { samples: 1, required: config.min_samples };
    }

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;
    let ss_tot: f64 = ys.iter().map(|y| (y - y_mean).powi(2)).sum();
    let ss_res: f64 = xs
        .iter()
        .zip(&ys)
        .map(|(x, y)| (y - (intercept + slope * x)).powi(2))
        .sum();
    let r_squared = if ss_tot <= f64::EPSILON { 1.0 } else { (1.0 - ss_res / ss_tot).clamp(0.0, 1.0) };

    let sample_factor = (n as f64 / config.full_confidence_samples.max(1) as f64).min(1.0);
    let confidence = (r_squared * sample_factor).clamp(0.0, 1.0);

    let threshold = config.trend_slope_threshold_ft_per_hr;
    let direction = if slope > threshold {
        TrendDirection::Increasing
    } else if slope < -threshold {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    };

    Analysis::Ready(TrendResult {
        direction,
        slope_ft_per_hr: slope,
        confidence,
        r_squared,
        sample_size: n,
    })
}

// ---------------------------------------------------------------------------
// Anomalies
// ---------------------------------------------------------------------------

/// Flags observations whose height lies `anomaly_threshold_sigma` or more
/// standard deviations (population) from the window mean.
pub fn detect_anomalies(history: &[StationObservation], config: &QualityConfig) -> Analysis<AnomalyResult> {
    let samples = windowed_samples(history, config.trend_window_hours);
    let n = samples.len();
    if n < config.min_samples {
        return Analysis::InsufficientData { samples: n, required: config.min_samples };
    }

    let mean = samples.iter().map(|s| s.height_m).sum::<f64>() / n as f64;
    let variance = samples.iter().map(|s| (s.height_m - mean).powi(2)).sum::<f64>() / n as f64;
    let std = variance.sqrt();
    let threshold = config.anomaly_threshold_sigma;

    let z_scores: Vec<ObservationZScore> = samples
        .iter()
        .map(|s| ObservationZScore {
            index: s.index,
            z_score: if std > f64::EPSILON { (s.height_m - mean) / std } else { 0.0 },
        })
        .collect();
    let flagged_indices = z_scores
        .iter()
        .filter(|z| z.z_score.abs() >= threshold)
        .map(|z| z.index)
        .collect();

    Analysis::Ready(AnomalyResult {
        flagged_indices,
        z_scores,
        window_mean_m: mean,
        window_std_m: std,
        threshold_sigma: threshold,
    })
}

// ---------------------------------------------------------------------------
// Quality score
// ---------------------------------------------------------------------------

/// 1.0 up to `fresh_hours`, linear to 0.0 at `stale_hours`.
pub fn freshness_score(age_hours: f64, config: &QualityConfig) -> f64 {
    if age_hours <= config.fresh_hours {
        1.0
    } else if age_hours >= config.stale_hours {
        0.0
    } else {
        1.0 - (age_hours - config.fresh_hours) / (config.stale_hours - config.fresh_hours)
    }
}

/// Completeness credit for one observation: `essential_credit` when height,
/// dominant period and mean direction are all present, plus the remainder
/// in proportion to the optional wind fields present.
fn observation_completeness(obs: &StationObservation, config: &QualityConfig) -> f64 {
    let essential = [obs.wave_height_m, obs.dominant_period_s, obs.mean_direction_deg];
    let optional = [obs.wind_speed_mps, obs.wind_direction_deg, obs.wind_gust_mps];

    let essential_part = if essential.iter().all(Option::is_some) { config.essential_credit } else { 0.0 };
    let optional_fraction = optional.iter().filter(|v| v.is_some()).count() as f64 / optional.len() as f64;

    essential_part + (1.0 - config.essential_credit) * optional_fraction
}

/// Sensor jumps in a history: consecutive (by time) height pairs whose
/// change exceeds `max_step_change_m`.
struct JumpScan {
    jumps: usize,
    /// Caller-slice indices of the readings on either side of a jump.
    suspect: BTreeSet<usize>,
}

fn scan_jumps(history: &[StationObservation], config: &QualityConfig) -> JumpScan {
    let mut heights: Vec<(DateTime<Utc>, usize, f64)> = history
        .iter()
        .enumerate()
        .filter_map(|(i, o)| o.wave_height_m.filter(|h| h.is_finite()).map(|h| (o.timestamp, i, h)))
        .collect();
    heights.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

    let mut scan = JumpScan { jumps: 0, suspect: BTreeSet::new() };
    for w in heights.windows(2) {
        if (w[1].2 - w[0].2).abs() > config.max_step_change_m {
            scan.jumps += 1;
            scan.suspect.insert(w[0].1);
            scan.suspect.insert(w[1].1);
        }
    }
    scan
}

/// Each jump costs `jump_penalty`, floored at zero. A single jump with the
/// default penalty zeroes consistency however long the history is.
fn consistency_score(scan: &JumpScan, config: &QualityConfig) -> f64 {
    (1.0 - config.jump_penalty * scan.jumps as f64).max(0.0)
}

/// Computes the composite quality of a station's history as of `now`.
///
/// Freshness is measured from the newest observation that carries any
/// wave data; a station that has only ever sent empty rows is not fresh.
/// A sensor jump zeroes consistency (at the default penalty) and strips
/// the completeness credit of the two readings around it, so a jumpy
/// station scores below 0.7 even when it is fresh and fully populated.
///
/// # Errors
/// `SwellError::MissingData` for an empty history.
pub fn calculate_quality(
    history: &[StationObservation],
    now: DateTime<Utc>,
    config: &QualityConfig,
) -> Result<QualityScore> {
    if history.is_empty() {
        return Err(SwellError::MissingData { station: "<empty history>".to_string() });
    }

    let freshness = history
        .iter()
        .filter(|o| o.has_wave_data())
        .map(|o| o.timestamp)
        .max()
        .map_or(0.0, |latest| freshness_score(hours_between(latest, now), config));

    // Readings on either side of a jump earn no completeness credit.
    let scan = scan_jumps(history, config);
    let completeness = history
        .iter()
        .enumerate()
        .filter(|(i, _)| !scan.suspect.contains(i))
        .map(|(_, o)| observation_completeness(o, config))
        .sum::<f64>()
        / history.len() as f64;
    let consistency = consistency_score(&scan, config);

    let freshness = freshness.clamp(0.0, 1.0);
    let completeness = completeness.clamp(0.0, 1.0);
    let consistency = consistency.clamp(0.0, 1.0);
    let overall = (config.freshness_weight * freshness
        + config.completeness_weight * completeness
        + config.consistency_weight * consistency)
        .clamp(0.0, 1.0);

    Ok(QualityScore { freshness, completeness, consistency, overall })
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Everything the quality analyzer learned about one station.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub trend: Analysis<TrendResult>,
    pub anomalies: Analysis<AnomalyResult>,
    pub quality: QualityScore,
    /// True when `quality` is the neutral substitute.
    pub quality_substituted: bool,
}

#[derive(Debug, Clone)]
pub struct StationQualityAnalyzer {
    config: QualityConfig,
}

impl StationQualityAnalyzer {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    pub fn from_config(config: &SwellmonConfig) -> Self {
        Self::new(config.quality.clone())
    }

    pub fn detect_trend(&self, history: &[StationObservation]) -> Analysis<TrendResult> {
        detect_trend(history, &self.config)
    }

    pub fn detect_anomalies(&self, history: &[StationObservation]) -> Analysis<AnomalyResult> {
        detect_anomalies(history, &self.config)
    }

    pub fn calculate_quality(&self, history: &[StationObservation], now: DateTime<Utc>) -> Result<QualityScore> {
        calculate_quality(history, now, &self.config)
    }

    /// Runs all three analyses independently.
    pub fn assess(&self, station_id: &str, history: &[StationObservation], now: DateTime<Utc>) -> QualityReport {
        let trend = self.detect_trend(history);
        let anomalies = self.detect_anomalies(history);
        let (quality, quality_substituted) = match self.calculate_quality(history, now) {
            Ok(score) => (score, false),
            Err(e) => {
                warn!("{}: quality scoring failed ({}), using neutral score", station_id, e);
                (QualityScore::neutral(), true)
            }
        };
        QualityReport { trend, anomalies, quality, quality_substituted }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    /// Hourly observations ending at `base_time()`, oldest first.
    fn hourly(heights: &[Option<f64>]) -> Vec<StationObservation> {
        let n = heights.len() as i64;
        heights
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let mut obs = StationObservation::new("46025", base_time() - Duration::hours(n - 1 - i as i64));
                obs.wave_height_m = *h;
                obs.dominant_period_s = h.map(|_| 12.0);
                obs.mean_direction_deg = h.map(|_| 280.0);
                obs
            })
            .collect()
    }

    fn cfg() -> QualityConfig {
        QualityConfig::default()
    }

    // --- Trend ---------------------------------------------------------------

    #[test]
    fn test_rising_heights_trend_increasing() {
        // 0.1 m/hr ≈ 0.33 ft/hr
        let history = hourly(&[1.0, 1.1, 1.2, 1.3, 1.4, 1.5].map(Some));
        let trend = detect_trend(&history, &cfg());
        let trend = trend.ready().expect("six samples are enough");
        assert_eq!(trend.direction, TrendDirection::Increasing);
        assert!((trend.slope_ft_per_hr - 0.328084).abs() < 1e-6);
        assert!((trend.r_squared - 1.0).abs() < 1e-9);
        assert_eq!(trend.sample_size, 6);
        assert!((trend.confidence - 0.5).abs() < 1e-9, "6 of 12 samples halves confidence");
    }

    #[test]
    fn test_falling_heights_trend_decreasing() {
        let history = hourly(&[2.0, 1.8, 1.6, 1.4].map(Some));
        let trend = detect_trend(&history, &cfg());
        assert_eq!(trend.ready().expect("enough samples").direction, TrendDirection::Decreasing);
    }

    #[test]
    fn test_small_slope_is_stable() {
        // 0.03 m/hr ≈ 0.1 ft/hr, under the 0.2 ft/hr threshold
        let history = hourly(&[1.0, 1.03, 1.06, 1.09].map(Some));
        let trend = detect_trend(&history, &cfg());
        assert_eq!(trend.ready().expect("enough samples").direction, TrendDirection::Stable);
    }

    #[test]
    fn test_flat_series_is_stable_with_perfect_fit() {
        let history = hourly(&[1.5; 12].map(Some));
        let trend = detect_trend(&history, &cfg());
        let trend = trend.ready().expect("enough samples");
        assert_eq!(trend.direction, TrendDirection::Stable);
        assert_eq!(trend.confidence, 1.0);
    }

    #[test]
    fn test_trend_on_two_samples_is_insufficient() {
        let history = hourly(&[Some(1.0), Some(2.0)]);
        assert_eq!(
            detect_trend(&history, &cfg()),
            Analysis::InsufficientData { samples: 2, required: 3 }
        );
    }

    #[test]
    fn test_trend_skips_missing_heights() {
        let history = hourly(&[Some(1.0), None, None, Some(1.2)]);
        assert!(detect_trend(&history, &cfg()).is_insufficient());
    }

    #[test]
    fn test_trend_ignores_samples_outside_window() {
        let mut history = hourly(&[1.0, 1.0, 1.0, 1.0].map(Some));
        let mut old = StationObservation::new("46025", base_time() - Duration::hours(48));
        old.wave_height_m = Some(9.0);
        history.push(old);
        let trend = detect_trend(&history, &cfg());
        assert_eq!(trend.ready().expect("enough samples").sample_size, 4);
    }

    #[test]
    fn test_trend_is_independent_of_input_order() {
        let history = hourly(&[1.0, 1.4, 1.2, 1.9, 2.1].map(Some));
        let mut reversed = history.clone();
        reversed.reverse();
        let a = detect_trend(&history, &cfg());
        let b = detect_trend(&reversed, &cfg());
        let (a, b) = (a.ready().expect("ready"), b.ready().expect("ready"));
        assert!((a.slope_ft_per_hr - b.slope_ft_per_hr).abs() < 1e-12);
    }

    // --- Anomalies -----------------------------------------------------------

    #[test]
    fn test_spike_is_flagged() {
        let history = hourly(&[1.0, 1.1, 0.9, 1.0, 1.05, 0.95, 1.0, 4.0].map(Some));
        let anomalies = detect_anomalies(&history, &cfg());
        let anomalies = anomalies.ready().expect("enough samples");
        assert_eq!(anomalies.flagged_indices, vec![7]);
        assert_eq!(anomalies.z_scores.len(), 8);
        assert_eq!(anomalies.threshold_sigma, 2.0);
        assert!(anomalies.latest_anomaly().expect("latest is the spike") >= 2.0);
    }

    #[test]
    fn test_constant_series_has_no_anomalies() {
        let history = hourly(&[2.0; 5].map(Some));
        let anomalies = detect_anomalies(&history, &cfg());
        let anomalies = anomalies.ready().expect("enough samples");
        assert!(anomalies.flagged_indices.is_empty());
        assert_eq!(anomalies.window_std_m, 0.0);
        assert!(anomalies.latest_anomaly().is_none());
    }

    #[test]
    fn test_anomalies_on_fewer_than_three_samples_is_insufficient() {
        let history = hourly(&[Some(1.0), None, Some(5.0)]);
        assert!(detect_anomalies(&history, &cfg()).is_insufficient());
        assert!(detect_anomalies(&[], &cfg()).is_insufficient());
    }

    #[test]
    fn test_anomaly_indices_refer_to_caller_slice() {
        // newest first, the way NDBC files are ordered
        let mut history = hourly(&[1.0, 1.0, 1.1, 0.9, 1.0, 1.0, 5.0].map(Some));
        history.reverse();
        let anomalies = detect_anomalies(&history, &cfg());
        let anomalies = anomalies.ready().expect("enough samples");
        assert_eq!(anomalies.flagged_indices, vec![0]);
        assert!(anomalies.latest_anomaly().is_some());
    }

    // --- Quality -------------------------------------------------------------

    #[test]
    fn test_fresh_complete_steady_station_scores_high() {
        let mut history = hourly(&[1.0, 1.1, 1.2].map(Some));
        for obs in &mut history {
            obs.wind_speed_mps = Some(5.0);
            obs.wind_direction_deg = Some(270.0);
            obs.wind_gust_mps = Some(7.0);
        }
        let q = calculate_quality(&history, base_time(), &cfg()).expect("non-empty history");
        assert_eq!(q.freshness, 1.0);
        assert_eq!(q.completeness, 1.0);
        assert_eq!(q.consistency, 1.0);
        assert!((q.overall - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_freshness_decays_linearly_between_one_and_six_hours() {
        let c = cfg();
        assert_eq!(freshness_score(0.5, &c), 1.0);
        assert!((freshness_score(3.5, &c) - 0.5).abs() < 1e-12);
        assert_eq!(freshness_score(6.0, &c), 0.0);
        assert_eq!(freshness_score(30.0, &c), 0.0);
        assert_eq!(freshness_score(-2.0, &c), 1.0);
    }

    #[test]
    fn test_missing_optional_fields_get_partial_credit() {
        let history = hourly(&[1.0, 1.1].map(Some));
        let q = calculate_quality(&history, base_time(), &cfg()).expect("non-empty history");
        assert!((q.completeness - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_missing_essential_field_loses_essential_credit() {
        let mut history = hourly(&[Some(1.0)]);
        history[0].mean_direction_deg = None;
        history[0].wind_speed_mps = Some(4.0);
        let q = calculate_quality(&history, base_time(), &cfg()).expect("non-empty history");
        assert!((q.completeness - 0.2 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_sudden_jump_lowers_consistency_and_overall() {
        let history = hourly(&[1.0, 4.0].map(Some));
        let q = calculate_quality(&history, base_time(), &cfg()).expect("non-empty history");
        assert_eq!(q.consistency, 0.0);
        assert!(q.overall < 0.7, "overall {} should drop below 0.7", q.overall);
    }

    fn with_wind(mut history: Vec<StationObservation>) -> Vec<StationObservation> {
        for obs in &mut history {
            obs.wind_speed_mps = Some(5.0);
            obs.wind_direction_deg = Some(270.0);
            obs.wind_gust_mps = Some(7.0);
        }
        history
    }

    #[test]
    fn test_jump_in_fully_populated_history_drops_below_threshold() {
        let history = with_wind(hourly(&[1.0, 4.0].map(Some)));
        let q = calculate_quality(&history, base_time(), &cfg()).expect("non-empty history");
        assert_eq!(q.freshness, 1.0);
        assert_eq!(q.consistency, 0.0);
        assert_eq!(q.completeness, 0.0, "both readings straddle the jump");
        assert!(q.overall < 0.7, "overall {} should drop below 0.7", q.overall);
    }

    #[test]
    fn test_single_jump_in_long_history_drops_below_threshold() {
        let mut heights = [Some(1.0); 12];
        for h in heights.iter_mut().skip(6) {
            *h = Some(4.0);
        }
        let history = with_wind(hourly(&heights));
        let q = calculate_quality(&history, base_time(), &cfg()).expect("non-empty history");
        assert_eq!(q.consistency, 0.0);
        assert!((q.completeness - 10.0 / 12.0).abs() < 1e-12);
        assert!((q.overall - 0.65).abs() < 1e-12);
        assert!(q.overall < 0.7);
    }

    #[test]
    fn test_smaller_jump_penalty_is_proportional() {
        let config = QualityConfig { jump_penalty: 0.25, ..cfg() };
        let history = with_wind(hourly(&[1.0, 4.0, 1.0, 1.1].map(Some)));
        let q = calculate_quality(&history, base_time(), &config).expect("non-empty history");
        assert!((q.consistency - 0.5).abs() < 1e-12, "two jumps at 0.25 each");
        assert!((q.completeness - 1.0 / 4.0).abs() < 1e-12, "only the last reading is clean");
    }

    #[test]
    fn test_all_missing_station_is_not_fresh() {
        let history = hourly(&[None, None, None]);
        let q = calculate_quality(&history, base_time(), &cfg()).expect("non-empty history");
        assert_eq!(q.freshness, 0.0);
        assert_eq!(q.completeness, 0.0);
    }

    #[test]
    fn test_stale_station_freshness_reaches_zero() {
        let history = hourly(&[1.0, 1.0, 1.0].map(Some));
        let q = calculate_quality(&history, base_time() + Duration::hours(7), &cfg()).expect("non-empty history");
        assert_eq!(q.freshness, 0.0);
        assert!(q.overall <= 0.6 + 1e-12);
    }

    #[test]
    fn test_empty_history_is_missing_data() {
        assert!(matches!(
            calculate_quality(&[], base_time(), &cfg()),
            Err(SwellError::MissingData { .. })
        ));
    }

    #[test]
    fn test_assess_substitutes_neutral_quality_and_keeps_other_results() {
        let analyzer = StationQualityAnalyzer::new(cfg());
        let report = analyzer.assess("46025", &[], base_time());
        assert!(report.quality_substituted);
        assert_eq!(report.quality, QualityScore::neutral());
        assert!(report.trend.is_insufficient());
        assert!(report.anomalies.is_insufficient());
    }

    #[test]
    fn test_assess_on_sparse_history_still_scores_quality() {
        let analyzer = StationQualityAnalyzer::new(cfg());
        let history = hourly(&[Some(1.0), Some(1.1)]);
        let report = analyzer.assess("46025", &history, base_time());
        assert!(report.trend.is_insufficient());
        assert!(!report.quality_substituted);
        assert_eq!(report.quality.freshness, 1.0);
    }
}
