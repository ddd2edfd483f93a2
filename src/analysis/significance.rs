/// Significance of a wave train from its height and period.
///
/// ```text
/// significance = (H / H_ref)^a × (T / T_ref)^b
/// ```
///
/// With the defaults (a = 2, b = 1, H_ref = 1 m, T_ref = 10 s) the score is
/// proportional to deep-water energy flux, which scales with H²·T: of two
/// trains of equal height the longer-period one carries more energy and
/// travels farther, so it ranks higher. A 1 m, 10 s train scores 1.0.
///
/// The exponents and references are calibration knobs exposed through
/// `[fusion.significance]`; they have not yet been fitted to fleet data.
///
/// When the period is unknown the period term is left out (equivalent to
/// T = T_ref) instead of being treated as zero.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignificanceConfig {
    pub height_exponent: f64,
    pub period_exponent: f64,
    pub reference_height_m: f64,
    pub reference_period_s: f64,
}

impl Default for SignificanceConfig {
    fn default() -> Self {
        Self {
            height_exponent: 2.0,
            period_exponent: 1.0,
            reference_height_m: 1.0,
            reference_period_s: 10.0,
        }
    }
}

/// Scores a wave train; non-positive or non-finite heights score zero.
pub fn significance_score(height_m: f64, period_s: Option<f64>, config: &SignificanceConfig) -> f64 {
    if !height_m.is_finite() || height_m <= 0.0 {
        return 0.0;
    }

    let height_term = (height_m / config.reference_height_m).powf(config.height_exponent);
    let period_term = match period_s {
        Some(t) if t.is_finite() && t > 0.0 => (t / config.reference_period_s).powf(config.period_exponent),
        _ => 1.0,
    };

    height_term * period_term
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
