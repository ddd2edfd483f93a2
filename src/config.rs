/// Configuration loader - parses swellmon.toml
///
/// Separates calibration constants from code, making it easy to tune
/// validation bands, the separation thresholds and the quality weights
/// without recompiling the service. Every section is `#[serde(default)]`,
/// so a file only needs to name the values it overrides.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::analysis::separation::SeparationRule;
use crate::analysis::significance::SignificanceConfig;
use crate::error::{Result, SwellError};

/// Default location of the configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "swellmon.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwellmonConfig {
    pub extractor: ExtractorConfig,
    /// Separation rule applied between peaks of one station.
    pub separation: SeparationRule,
    pub quality: QualityConfig,
    pub fusion: FusionConfig,
    pub cycle: CycleConfig,
}

/// Validation bands and limits for spectral peak extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Lower edge of the ground swell band.
    pub min_swell_period_s: f64,
    /// Upper edge of the ground swell band.
    pub max_swell_period_s: f64,
    pub min_wind_wave_period_s: f64,
    /// Spectral bandwidth assumed for a bulletin partition.
    pub bandwidth_hz: f64,
    /// Peaks below this fraction of the strongest peak of the same type are dropped.
    pub noise_floor_ratio: f64,
    pub max_components: usize,
    /// Gaussian smoothing width for grid mode, in grid cells.
    pub smoothing_sigma: f64,
    /// Directional spread assigned to bulletin swell partitions.
    pub swell_spread_deg: f64,
    /// Directional spread assigned to bulletin wind-wave partitions.
    pub wind_wave_spread_deg: f64,
    pub swell_confidence: f64,
    pub wind_wave_confidence: f64,
    /// Confidence multiplier for a partition reported without a direction.
    pub unknown_direction_factor: f64,
    /// Confidence multiplier for a peak built from bulk WVHT/DPD/MWD when
    /// the station published no partition.
    pub bulk_fallback_factor: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            min_swell_period_s: 8.0,
            max_swell_period_s: 25.0,
            min_wind_wave_period_s: 4.0,
            bandwidth_hz: 0.03,
            noise_floor_ratio: 0.10,
            max_components: 5,
            smoothing_sigma: 1.0,
            swell_spread_deg: 20.0,
            wind_wave_spread_deg: 45.0,
            swell_confidence: 0.9,
            wind_wave_confidence: 0.7,
            unknown_direction_factor: 0.8,
            bulk_fallback_factor: 0.75,
        }
    }
}

/// Thresholds for trend, anomaly and quality scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub trend_window_hours: f64,
    pub trend_slope_threshold_ft_per_hr: f64,
    /// Below this many samples trend and anomaly detection report insufficient data.
    pub min_samples: usize,
    /// Sample count at which trend confidence is no longer discounted.
    pub full_confidence_samples: usize,
    pub anomaly_threshold_sigma: f64,
    /// Observations younger than this are fully fresh.
    pub fresh_hours: f64,
    /// Observations this old or older have zero freshness.
    pub stale_hours: f64,
    /// Hour-to-hour height change treated as a sensor jump.
    pub max_step_change_m: f64,
    /// Consistency lost for each sensor jump, floored at zero.
    pub jump_penalty: f64,
    pub freshness_weight: f64,
    pub completeness_weight: f64,
    pub consistency_weight: f64,
    /// Share of an observation's completeness earned by carrying every
    /// essential field; the remainder comes from optional fields.
    pub essential_credit: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            trend_window_hours: 24.0,
            trend_slope_threshold_ft_per_hr: 0.2,
            min_samples: 3,
            full_confidence_samples: 12,
            anomaly_threshold_sigma: 2.0,
            fresh_hours: 1.0,
            stale_hours: 6.0,
            max_step_change_m: 2.0,
            jump_penalty: 1.0,
            freshness_weight: 0.4,
            completeness_weight: 0.3,
            consistency_weight: 0.3,
            essential_credit: 0.8,
        }
    }
}

/// Cross-station fusion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Separation rule applied between stations. A calibration choice;
    /// defaults to the same thresholds as the per-station rule.
    pub separation: SeparationRule,
    pub significance: SignificanceConfig,
    pub include_wind_waves: bool,
    /// Components whose weighted confidence falls below this are ignored.
    pub min_component_confidence: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            separation: SeparationRule::default(),
            significance: SignificanceConfig::default(),
            include_wind_waves: true,
            min_component_confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    pub worker_threads: usize,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self { worker_threads: 4 }
    }
}

impl SwellmonConfig {
    /// Parses configuration from TOML text and validates it.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: SwellmonConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects combinations that would make the analysis meaningless.
    pub fn validate(&self) -> Result<()> {
        let e = &self.extractor;
        if !(e.min_swell_period_s > 0.0 && e.min_swell_period_s < e.max_swell_period_s) {
            return Err(SwellError::Config(format!(
                "swell band [{}, {}] s is empty",
                e.min_swell_period_s, e.max_swell_period_s
            )));
        }
        if e.bandwidth_hz <= 0.0 {
            return Err(SwellError::Config("bandwidth_hz must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&e.noise_floor_ratio) {
            return Err(SwellError::Config("noise_floor_ratio must lie in [0, 1]".to_string()));
        }
        if e.max_components == 0 {
            return Err(SwellError::Config("max_components must be at least 1".to_string()));
        }

        let q = &self.quality;
        let weight_sum = q.freshness_weight + q.completeness_weight + q.consistency_weight;
        if (weight_sum - 1.0).abs() > 1e-6 {
            return Err(SwellError::Config(format!(
                "quality weights must sum to 1.0, got {}",
                weight_sum
            )));
        }
        if q.stale_hours <= q.fresh_hours {
            return Err(SwellError::Config("stale_hours must exceed fresh_hours".to_string()));
        }
        if q.jump_penalty < 0.0 {
            return Err(SwellError::Config("jump_penalty must not be negative".to_string()));
        }
        if !(0.0..=1.0).contains(&q.essential_credit) {
            return Err(SwellError::Config("essential_credit must lie in [0, 1]".to_string()));
        }

        self.separation.validate()?;
        self.fusion.separation.validate()?;
        Ok(())
    }
}

/// Loads and validates configuration from a TOML file.
pub fn load_config(path: impl AsRef<Path>) -> Result<SwellmonConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .map_err(|e| SwellError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    SwellmonConfig::from_toml_str(&contents)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
