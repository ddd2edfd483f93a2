/// Spectral peak extraction for a single station.
///
/// Two candidate generators feed one validation and merge pipeline:
///
/// 1. **Bulletin mode**: the buoy's own swell / wind-wave partition from
///    the latest spectral summary row. If neither partition was reported,
///    the bulk sea state (WVHT, DPD, MWD) is offered as a single, less
///    confident candidate and classified by its period.
/// 2. **Grid mode**: a full frequency–direction energy grid. The grid is
///    smoothed, 3×3 local maxima are located, and each maximum becomes a
///    candidate whose height is 4√(energy within its half-maximum box).
///
/// Every candidate then goes through the same steps:
///
/// - validation: height > 0, swell period inside the ground-swell band,
///   wind-wave period above its floor; missing required fields drop the
///   candidate (they are never zero-filled)
/// - energy: H² / (16 × bandwidth)
/// - sort by descending energy and merge any candidate that the
///   `SeparationRule` cannot tell apart from a stronger one already kept
/// - noise floor: drop peaks weaker than `noise_floor_ratio` of the
///   strongest peak of the same component type
/// - truncate to `max_components`
///
/// A station with nothing usable yields an empty result. Drops are counted
/// in `ExtractionStats` rather than raised.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::analysis::grid::SpectralGrid;
use crate::analysis::separation::{normalize_bearing, SeparationRule};
use crate::config::{ExtractorConfig, SwellmonConfig};
use crate::error::{Result, SwellError};
use crate::model::{ComponentType, SpectralAnalysisResult, SpectralPeak, StationObservation};
use crate::units::to_regional_scale_ft;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Counters for one extraction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionStats {
    pub candidates: usize,
    /// Dropped for a missing height or period.
    pub missing_fields: usize,
    /// Dropped for a value outside physical bounds.
    pub out_of_bounds: usize,
    /// Folded into a stronger peak by the separation rule.
    pub merged: usize,
    pub below_noise_floor: usize,
    pub truncated: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub result: SpectralAnalysisResult,
    pub stats: ExtractionStats,
}

/// A possible peak before validation. Fields stay optional until
/// validation decides whether the candidate survives.
#[derive(Debug, Clone)]
struct Candidate {
    component_type: Option<ComponentType>,
    height_m: Option<f64>,
    period_s: Option<f64>,
    direction_deg: Option<f64>,
    bandwidth_hz: f64,
    spread_deg: f64,
    confidence: f64,
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SpectralPeakExtractor {
    config: ExtractorConfig,
    separation: SeparationRule,
}

impl SpectralPeakExtractor {
    pub fn new(config: ExtractorConfig, separation: SeparationRule) -> Self {
        Self { config, separation }
    }

    pub fn from_config(config: &SwellmonConfig) -> Self {
        Self::new(config.extractor.clone(), config.separation)
    }

    /// Extracts peaks from the most recent row of a station's history.
    ///
    /// # Errors
    /// `SwellError::MissingData` if the history is empty, since there is
    /// not even a timestamp to attach an empty result to.
    pub fn extract_latest(&self, history: &[StationObservation]) -> Result<Extraction> {
        let latest = history
            .iter()
            .max_by_key(|o| o.timestamp)
            .ok_or_else(|| SwellError::MissingData { station: "<empty history>".to_string() })?;
        Ok(self.extract_from_bulletin(latest))
    }

    /// Bulletin mode: one row, at most one swell and one wind-wave peak
    /// (or one bulk peak when no partition was published).
    pub fn extract_from_bulletin(&self, obs: &StationObservation) -> Extraction {
        let mut candidates = vec![
            Candidate {
                component_type: Some(ComponentType::Swell),
                height_m: obs.swell.height_m,
                period_s: obs.swell.period_s,
                direction_deg: obs.swell.direction_deg,
                bandwidth_hz: self.config.bandwidth_hz,
                spread_deg: self.config.swell_spread_deg,
                confidence: self.config.swell_confidence,
            },
            Candidate {
                component_type: Some(ComponentType::WindWave),
                height_m: obs.wind_wave.height_m,
                period_s: obs.wind_wave.period_s,
                direction_deg: obs.wind_wave.direction_deg,
                bandwidth_hz: self.config.bandwidth_hz,
                spread_deg: self.config.wind_wave_spread_deg,
                confidence: self.config.wind_wave_confidence,
            },
        ];

        if obs.swell.is_empty() && obs.wind_wave.is_empty() && obs.wave_height_m.is_some() {
            debug!("{}: no partition reported, falling back to bulk sea state", obs.station_id);
            let component_type = obs.dominant_period_s.map(|t| self.classify(t));
            candidates.clear();
            candidates.push(Candidate {
                component_type,
                height_m: obs.wave_height_m,
                period_s: obs.dominant_period_s,
                direction_deg: obs.mean_direction_deg,
                bandwidth_hz: self.config.bandwidth_hz,
                spread_deg: self.spread_for(component_type),
                confidence: self.base_confidence(component_type) * self.config.bulk_fallback_factor,
            });
        }

        self.finalize(&obs.station_id, obs.timestamp, candidates)
    }

    /// Grid mode: candidates are the local maxima of the smoothed grid.
    pub fn extract_from_grid(&self, station_id: &str, timestamp: DateTime<Utc>, grid: &SpectralGrid) -> Extraction {
        let smooth = grid.smoothed(self.config.smoothing_sigma);
        let total = grid.total_energy();

        let candidates = smooth
            .local_maxima()
            .into_iter()
            .map(|(i, j)| {
                let extent = smooth.half_max_extent(i, j);
                let bandwidth_hz = grid.bandwidth_hz(&extent);
                let energy = grid.integrate(extent);
                let frequency = grid.frequency(i);
                let period_s = (frequency > 0.0).then(|| 1.0 / frequency);
                let share = if total > 0.0 { (energy / total).sqrt().min(1.0) } else { 0.0 };
                let component_type = period_s.map(|t| self.classify(t));

                Candidate {
                    component_type,
                    height_m: Some(4.0 * energy.sqrt()),
                    period_s,
                    direction_deg: Some(grid.direction(j)),
                    bandwidth_hz,
                    spread_deg: grid.spread_deg(&extent),
                    confidence: self.base_confidence(component_type) * share,
                }
            })
            .collect();

        self.finalize(station_id, timestamp, candidates)
    }

    fn base_confidence(&self, component_type: Option<ComponentType>) -> f64 {
        match component_type {
            Some(ComponentType::WindWave) => self.config.wind_wave_confidence,
            _ => self.config.swell_confidence,
        }
    }

    fn spread_for(&self, component_type: Option<ComponentType>) -> f64 {
        match component_type {
            Some(ComponentType::WindWave) => self.config.wind_wave_spread_deg,
            _ => self.config.swell_spread_deg,
        }
    }

    fn classify(&self, period_s: f64) -> ComponentType {
        if period_s >= self.config.min_swell_period_s {
            ComponentType::Swell
        } else {
            ComponentType::WindWave
        }
    }

    /// Applies the physical bounds. Missing fields and bound violations
    /// are counted separately.
    fn validate(&self, candidate: Candidate, stats: &mut ExtractionStats) -> Option<SpectralPeak> {
        let (Some(height_m), Some(period_s)) = (candidate.height_m, candidate.period_s) else {
            stats.missing_fields += 1;
            return None;
        };

        if !height_m.is_finite() || height_m <= 0.0 || !period_s.is_finite() || period_s <= 0.0 {
            stats.out_of_bounds += 1;
            return None;
        }

        let component_type = candidate.component_type.unwrap_or_else(|| self.classify(period_s));
        let period_ok = match component_type {
            ComponentType::Swell => {
                period_s >= self.config.min_swell_period_s && period_s <= self.config.max_swell_period_s
            }
            ComponentType::WindWave => period_s >= self.config.min_wind_wave_period_s,
        };
        if !period_ok {
            stats.out_of_bounds += 1;
            return None;
        }

        let direction_deg = match candidate.direction_deg {
            Some(d) if !(0.0..=360.0).contains(&d) => {
                stats.out_of_bounds += 1;
                return None;
            }
            Some(d) => Some(normalize_bearing(d)),
            None => None,
        };

        let mut confidence = candidate.confidence;
        if direction_deg.is_none() {
            confidence *= self.config.unknown_direction_factor;
        }

        let bandwidth = if candidate.bandwidth_hz > 0.0 {
            candidate.bandwidth_hz
        } else {
            self.config.bandwidth_hz
        };

        Some(SpectralPeak {
            frequency_hz: 1.0 / period_s,
            period_s,
            direction_deg,
            energy_density: energy_density(height_m, bandwidth),
            height_m,
            directional_spread_deg: candidate.spread_deg,
            confidence: confidence.clamp(0.0, 1.0),
            component_type,
        })
    }

    /// Shared tail of both modes: validate, sort, merge, noise floor, truncate.
    fn finalize(&self, station_id: &str, timestamp: DateTime<Utc>, candidates: Vec<Candidate>) -> Extraction {
        let mut stats = ExtractionStats { candidates: candidates.len(), ..Default::default() };

        let mut peaks: Vec<SpectralPeak> = candidates
            .into_iter()
            .filter_map(|c| self.validate(c, &mut stats))
            .collect();
        sort_by_energy(&mut peaks);

        let mut kept: Vec<SpectralPeak> = Vec::with_capacity(peaks.len());
        for peak in peaks {
            if kept.iter().any(|k| self.separation.same_system(k, &peak)) {
                stats.merged += 1;
            } else {
                kept.push(peak);
            }
        }

        let floor_ratio = self.config.noise_floor_ratio;
        let strongest = |kind: ComponentType, kept: &[SpectralPeak]| {
            kept.iter()
                .filter(|p| p.component_type == kind)
                .map(|p| p.energy_density)
                .fold(0.0_f64, f64::max)
        };
        let swell_max = strongest(ComponentType::Swell, &kept);
        let wind_max = strongest(ComponentType::WindWave, &kept);
        let before_floor = kept.len();
        kept.retain(|p| {
            let reference = match p.component_type {
                ComponentType::Swell => swell_max,
                ComponentType::WindWave => wind_max,
            };
            p.energy_density >= floor_ratio * reference
        });
        stats.below_noise_floor = before_floor - kept.len();

        if kept.len() > self.config.max_components {
            stats.truncated = kept.len() - self.config.max_components;
            kept.truncate(self.config.max_components);
        }

        for peak in &kept {
            debug!(
                "{}: {:?} peak {:.1} ft @ {:.1}s from {}",
                station_id,
                peak.component_type,
                to_regional_scale_ft(peak.height_m),
                peak.period_s,
                peak.direction_deg.map_or("unknown".to_string(), |d| format!("{:.0}°", d)),
            );
        }

        Extraction {
            result: SpectralAnalysisResult::new(station_id, timestamp, kept),
            stats,
        }
    }
}

/// Energy density of a partition, H² / (16 × bandwidth), in m²/Hz.
pub fn energy_density(height_m: f64, bandwidth_hz: f64) -> f64 {
    height_m * height_m / (16.0 * bandwidth_hz)
}

/// Descending energy; ties broken by longer period, then bearing, so the
/// order never depends on input order.
fn sort_by_energy(peaks: &mut [SpectralPeak]) {
    peaks.sort_by(|a, b| {
        b.energy_density
            .total_cmp(&a.energy_density)
            .then(b.period_s.total_cmp(&a.period_s))
            .then(
                a.direction_deg
                    .unwrap_or(f64::INFINITY)
                    .total_cmp(&b.direction_deg.unwrap_or(f64::INFINITY)),
            )
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
