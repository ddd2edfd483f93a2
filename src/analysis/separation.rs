/// The period/direction separation rule shared by the peak extractor and
/// the fusion engine.
///
/// Two wave trains are the same underlying system unless they differ by at
/// least `min_period_separation_s` of period or `min_direction_separation_deg`
/// of direction. Dispersion spreads arrivals from distinct storms across
/// several seconds of period; a single storm fetch rarely spans more than
/// about 30 degrees.
///
/// Unknown fields never separate two trains on their own: an axis is only
/// compared when both sides measured it. Two trains with no comparable
/// axis at all are kept apart, since nothing shows them to be the same.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SwellError};
use crate::model::{SpectralPeak, SwellComponent};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparationRule {
    pub min_period_separation_s: f64,
    pub min_direction_separation_deg: f64,
}

impl Default for SeparationRule {
    fn default() -> Self {
        Self {
            min_period_separation_s: 3.0,
            min_direction_separation_deg: 30.0,
        }
    }
}

/// The two coordinates the rule looks at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveSignature {
    pub period_s: Option<f64>,
    pub direction_deg: Option<f64>,
}

impl From<&SpectralPeak> for WaveSignature {
    fn from(peak: &SpectralPeak) -> Self {
        Self {
            period_s: Some(peak.period_s),
            direction_deg: peak.direction_deg,
        }
    }
}

impl From<&SwellComponent> for WaveSignature {
    fn from(component: &SwellComponent) -> Self {
        Self {
            period_s: component.period_s,
            direction_deg: component.direction_deg,
        }
    }
}

impl SeparationRule {
    pub fn validate(&self) -> Result<()> {
        if self.min_period_separation_s <= 0.0 || self.min_direction_separation_deg <= 0.0 {
            return Err(SwellError::Config(
                "separation thresholds must be positive".to_string(),
            ));
        }
        if self.min_direction_separation_deg > 180.0 {
            return Err(SwellError::Config(
                "min_direction_separation_deg cannot exceed 180".to_string(),
            ));
        }
        Ok(())
    }

    /// True when `a` and `b` must be treated as one wave train.
    pub fn same_system(&self, a: impl Into<WaveSignature>, b: impl Into<WaveSignature>) -> bool {
        let (a, b) = (a.into(), b.into());

        let period_gap = match (a.period_s, b.period_s) {
            (Some(x), Some(y)) => Some((x - y).abs()),
            _ => None,
        };
        let direction_gap = match (a.direction_deg, b.direction_deg) {
            (Some(x), Some(y)) => Some(angular_difference(x, y)),
            _ => None,
        };

        if period_gap.is_none() && direction_gap.is_none() {
            return false;
        }

        let period_separates = period_gap.is_some_and(|gap| gap >= self.min_period_separation_s);
        let direction_separates =
            direction_gap.is_some_and(|gap| gap >= self.min_direction_separation_deg);

        !(period_separates || direction_separates)
    }
}

/// Smallest angle between two compass bearings, in [0, 180].
pub fn angular_difference(a_deg: f64, b_deg: f64) -> f64 {
    let diff = (a_deg - b_deg).rem_euclid(360.0);
    if diff > 180.0 { 360.0 - diff } else { diff }
}

/// Normalizes a bearing into [0, 360).
pub fn normalize_bearing(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid can return 360.0 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
