/// Property tests over generated inputs.
///
/// These tests verify:
/// 1. No two peaks kept for one station are inseparable
/// 2. The regional-scale conversion is linear and invertible
/// 3. Quality scores and trend confidence stay within [0, 1], and short
///    histories report insufficient data instead of failing
/// 4. Fusion output does not depend on station order or repetition
/// 5. No two fused events share an inseparable primary
///
/// Run with: cargo test --test fusion_properties

use swellmon_service::analysis::fusion::{StationInput, SwellFusionEngine};
use swellmon_service::analysis::grid::SpectralGrid;
use swellmon_service::analysis::peaks::SpectralPeakExtractor;
use swellmon_service::analysis::quality::{calculate_quality, detect_anomalies, detect_trend};
use swellmon_service::analysis::separation::SeparationRule;
use swellmon_service::config::SwellmonConfig;
use swellmon_service::model::{
    ComponentType, QualityScore, SpectralAnalysisResult, SpectralPeak, StationObservation, WavePartition,
};
use swellmon_service::units::{from_regional_scale_ft, to_regional_scale_ft};

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

fn cycle_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
}

fn partition() -> impl Strategy<Value = WavePartition> {
    (
        prop::option::of(0.0f64..6.0),
        prop::option::of(1.0f64..30.0),
        prop::option::of(0.0f64..360.0),
    )
        .prop_map(|(h, p, d)| WavePartition::new(h, p, d))
}

fn observation(offset_hours: i64) -> impl Strategy<Value = StationObservation> {
    (
        prop::option::of(0.1f64..8.0),
        prop::option::of(4.0f64..20.0),
        prop::option::of(0.0f64..360.0),
        prop::option::of(0.0f64..20.0),
        partition(),
        partition(),
    )
        .prop_map(move |(h, p, d, wind, swell, wind_wave)| {
            let mut obs = StationObservation::new("46025", cycle_time() - Duration::hours(offset_hours));
            obs.wave_height_m = h;
            obs.dominant_period_s = p;
            obs.mean_direction_deg = d;
            obs.wind_speed_mps = wind;
            obs.swell = swell;
            obs.wind_wave = wind_wave;
            obs
        })
}

fn history() -> impl Strategy<Value = Vec<StationObservation>> {
    prop::collection::vec(0i64..30, 0..16).prop_flat_map(|offsets| {
        offsets.into_iter().map(observation).collect::<Vec<_>>()
    })
}

fn station_input(index: usize) -> impl Strategy<Value = StationInput> {
    (
        prop::collection::vec((0.3f64..5.0, 8.0f64..22.0, prop::option::of(0.0f64..360.0), 0.3f64..1.0), 0..4),
        0.05f64..1.0,
        prop::option::of(-5.0f64..5.0),
    )
        .prop_map(move |(peaks, overall, z)| {
            let peaks = peaks
                .into_iter()
                .map(|(height_m, period_s, direction_deg, confidence)| SpectralPeak {
                    frequency_hz: 1.0 / period_s,
                    period_s,
                    direction_deg,
                    energy_density: height_m * height_m / (16.0 * 0.03),
                    height_m,
                    directional_spread_deg: 20.0,
                    confidence,
                    component_type: ComponentType::Swell,
                })
                .collect();
            let quality = QualityScore { freshness: overall, completeness: overall, consistency: overall, overall };
            let mut input = StationInput::new(
                SpectralAnalysisResult::new(format!("S{:02}", index), cycle_time(), peaks),
                quality,
            );
            input.latest_anomaly_z = z;
            input
        })
}

fn stations() -> impl Strategy<Value = Vec<StationInput>> {
    (1usize..6).prop_flat_map(|n| (0..n).map(station_input).collect::<Vec<_>>())
}

fn assert_pairwise_separable(rule: &SeparationRule, peaks: &[SpectralPeak]) -> Result<(), TestCaseError> {
    for (i, a) in peaks.iter().enumerate() {
        for b in &peaks[i + 1..] {
            prop_assert!(!rule.same_system(a, b), "inseparable peaks kept: {:?} and {:?}", a, b);
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn prop_bulletin_peaks_are_pairwise_separable(obs in observation(0)) {
        let config = SwellmonConfig::default();
        let extraction = SpectralPeakExtractor::from_config(&config).extract_from_bulletin(&obs);
        assert_pairwise_separable(&config.separation, &extraction.result.peaks)?;
        prop_assert!(extraction.result.peaks.len() <= config.extractor.max_components);
    }

    #[test]
    fn prop_grid_peaks_are_pairwise_separable(values in prop::collection::vec(0.0f64..10.0, 48)) {
        let config = SwellmonConfig::default();
        let freqs: Vec<f64> = (0..8).map(|i| 0.04 + 0.02 * i as f64).collect();
        let dirs: Vec<f64> = (0..6).map(|j| j as f64 * 60.0).collect();
        let grid = SpectralGrid::new(freqs, dirs, values).expect("grid is well formed");

        let extraction = SpectralPeakExtractor::from_config(&config)
            .extract_from_grid("46025", cycle_time(), &grid);
        assert_pairwise_separable(&config.separation, &extraction.result.peaks)?;
        for peak in &extraction.result.peaks {
            prop_assert!(peak.height_m > 0.0);
            prop_assert!((0.0..=1.0).contains(&peak.confidence));
        }
    }

    #[test]
    fn prop_regional_conversion_is_invertible(x in 0.0f64..1000.0) {
        prop_assert!((to_regional_scale_ft(from_regional_scale_ft(x)) - x).abs() < 1e-9);
        prop_assert!((from_regional_scale_ft(to_regional_scale_ft(x)) - x).abs() < 1e-9);
    }

    #[test]
    fn prop_regional_conversion_is_linear(a in 0.0f64..100.0, b in 0.0f64..100.0) {
        let lhs = to_regional_scale_ft(a + b);
        let rhs = to_regional_scale_ft(a) + to_regional_scale_ft(b);
        prop_assert!((lhs - rhs).abs() < 1e-9);
    }

    #[test]
    fn prop_quality_scores_stay_in_unit_interval(rows in history()) {
        let config = SwellmonConfig::default().quality;
        match calculate_quality(&rows, cycle_time(), &config) {
            Ok(q) => {
                for value in [q.freshness, q.completeness, q.consistency, q.overall] {
                    prop_assert!((0.0..=1.0).contains(&value), "score {} out of range", value);
                }
            }
            Err(_) => {
                prop_assert!(rows.is_empty());
            }
        }

        if let Some(trend) = detect_trend(&rows, &config).ready() {
            prop_assert!((0.0..=1.0).contains(&trend.confidence));
            prop_assert!((0.0..=1.0).contains(&trend.r_squared));
        }
    }

    #[test]
    fn prop_short_histories_are_insufficient(rows in prop::collection::vec(observation(0), 0..3)) {
        let config = SwellmonConfig::default().quality;
        prop_assert!(detect_trend(&rows, &config).is_insufficient());
        prop_assert!(detect_anomalies(&rows, &config).is_insufficient());
    }

    #[test]
    fn prop_fusion_ignores_station_order(inputs in stations(), rotate in 0usize..6) {
        let engine = SwellFusionEngine::from_config(&SwellmonConfig::default());
        let baseline = engine.fuse(&inputs, cycle_time());

        let mut reversed = inputs.clone();
        reversed.reverse();
        prop_assert_eq!(&engine.fuse(&reversed, cycle_time()), &baseline);

        let mut rotated = inputs.clone();
        let len = rotated.len();
        rotated.rotate_left(rotate % len);
        prop_assert_eq!(&engine.fuse(&rotated, cycle_time()), &baseline);

        prop_assert_eq!(&engine.fuse(&inputs, cycle_time()), &baseline);
    }

    #[test]
    fn prop_event_primaries_are_separable_and_bounded(inputs in stations()) {
        let config = SwellmonConfig::default();
        let report = SwellFusionEngine::from_config(&config).fuse(&inputs, cycle_time());

        for (i, a) in report.events.iter().enumerate() {
            prop_assert!((0.0..=1.0).contains(&a.confidence));
            for b in &report.events[i + 1..] {
                prop_assert!(!config.fusion.separation.same_system(&a.primary, &b.primary));
                prop_assert!(a.significance >= b.significance);
            }
        }
        prop_assert!((0.0..=1.0).contains(&report.aggregate_confidence));
    }
}
