/// Canonical height conversion between significant wave height in metres
/// and the regional reporting scale in feet.
///
/// Every path that needs a regional-scale height (peak extraction, trend
/// slopes, fusion output) calls these two functions. Do not inline the
/// multiplier anywhere else.

/// Regional-scale feet per metre of significant wave height.
pub const REGIONAL_FT_PER_M: f64 = 3.28084;

/// Converts a significant wave height in metres to regional-scale feet.
pub fn to_regional_scale_ft(height_m: f64) -> f64 {
    height_m * REGIONAL_FT_PER_M
}

/// Inverse of [`to_regional_scale_ft`].
pub fn from_regional_scale_ft(height_ft: f64) -> f64 {
    height_ft / REGIONAL_FT_PER_M
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
