/// Frequency–direction energy grid used by the extended peak extractor.
///
/// A plain row-major 2D array: rows are frequency bins, columns are
/// direction bins, cells hold energy density in m²/Hz/deg. Neighbour
/// iteration is bounds-checked on both axes; the direction axis is not
/// wrapped.

use crate::error::{Result, SwellError};

#[derive(Debug, Clone, PartialEq)]
pub struct SpectralGrid {
    frequencies_hz: Vec<f64>,
    directions_deg: Vec<f64>,
    values: Vec<f64>,
}

/// Index ranges (inclusive) of the half-maximum region around a peak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HalfMaxExtent {
    pub freq_lo: usize,
    pub freq_hi: usize,
    pub dir_lo: usize,
    pub dir_hi: usize,
}

impl SpectralGrid {
    /// Builds a grid from axis coordinates and row-major cell values.
    ///
    /// # Errors
    /// - `SwellError::Parse`: empty axes or a value count that does not
    ///   match the axis lengths.
    /// - `SwellError::Validation`: a negative or non-finite cell.
    pub fn new(frequencies_hz: Vec<f64>, directions_deg: Vec<f64>, values: Vec<f64>) -> Result<Self> {
        if frequencies_hz.is_empty() || directions_deg.is_empty() {
            return Err(SwellError::Parse("spectral grid has an empty axis".to_string()));
        }
        if values.len() != frequencies_hz.len() * directions_deg.len() {
            return Err(SwellError::Parse(format!(
                "spectral grid expects {}x{} values, got {}",
                frequencies_hz.len(),
                directions_deg.len(),
                values.len()
            )));
        }
        if let Some(&bad) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(SwellError::Validation {
                field: "energy_density",
                value: bad,
                reason: "grid cells must be finite and non-negative".to_string(),
            });
        }
        Ok(Self { frequencies_hz, directions_deg, values })
    }

    /// Convenience constructor from one `Vec` per frequency row.
    pub fn from_rows(frequencies_hz: Vec<f64>, directions_deg: Vec<f64>, rows: Vec<Vec<f64>>) -> Result<Self> {
        let width = directions_deg.len();
        if rows.iter().any(|r| r.len() != width) {
            return Err(SwellError::Parse("ragged spectral grid rows".to_string()));
        }
        Self::new(frequencies_hz, directions_deg, rows.into_iter().flatten().collect())
    }

    /// (frequency bins, direction bins)
    pub fn shape(&self) -> (usize, usize) {
        (self.frequencies_hz.len(), self.directions_deg.len())
    }

    pub fn frequency(&self, i: usize) -> f64 {
        self.frequencies_hz[i]
    }

    pub fn direction(&self, j: usize) -> f64 {
        self.directions_deg[j]
    }

    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        let (nf, nd) = self.shape();
        (i < nf && j < nd).then(|| self.values[i * nd + j])
    }

    fn at(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.directions_deg.len() + j]
    }

    /// In-bounds cells of the 3×3 neighbourhood around (i, j), excluding (i, j).
    pub fn neighbors(&self, i: usize, j: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        let (nf, nd) = self.shape();
        (-1i64..=1)
            .flat_map(|di| (-1i64..=1).map(move |dj| (di, dj)))
            .filter(|&(di, dj)| di != 0 || dj != 0)
            .filter_map(move |(di, dj)| {
                let ni = i as i64 + di;
                let nj = j as i64 + dj;
                (ni >= 0 && nj >= 0 && (ni as usize) < nf && (nj as usize) < nd)
                    .then_some((ni as usize, nj as usize))
            })
    }

    pub fn total_energy(&self) -> f64 {
        self.integrate(HalfMaxExtent {
            freq_lo: 0,
            freq_hi: self.frequencies_hz.len() - 1,
            dir_lo: 0,
            dir_hi: self.directions_deg.len() - 1,
        })
    }

    /// Separable Gaussian smoothing with width `sigma` in cells.
    ///
    /// Kernel weights falling outside the grid are dropped and the
    /// remaining weights renormalized, so edges are not darkened.
    pub fn smoothed(&self, sigma: f64) -> SpectralGrid {
        if sigma <= 0.0 {
            return self.clone();
        }
        let radius = (3.0 * sigma).ceil() as i64;
        let kernel: Vec<f64> = (-radius..=radius)
            .map(|k| (-(k * k) as f64 / (2.0 * sigma * sigma)).exp())
            .collect();
        let (nf, nd) = self.shape();

        let blur = |len: usize, sample: &dyn Fn(usize) -> f64, center: usize| -> f64 {
            let mut acc = 0.0;
            let mut weight = 0.0;
            for (offset, w) in (-radius..=radius).zip(kernel.iter()) {
                let idx = center as i64 + offset;
                if idx >= 0 && (idx as usize) < len {
                    acc += w * sample(idx as usize);
                    weight += w;
                }
            }
            if weight > 0.0 { acc / weight } else { 0.0 }
        };

        // Pass 1: along directions
        let mut pass = vec![0.0; nf * nd];
        for i in 0..nf {
            for j in 0..nd {
                pass[i * nd + j] = blur(nd, &|k| self.at(i, k), j);
            }
        }
        // Pass 2: along frequencies
        let mut out = vec![0.0; nf * nd];
        for i in 0..nf {
            for j in 0..nd {
                out[i * nd + j] = blur(nf, &|k| pass[k * nd + j], i);
            }
        }

        SpectralGrid {
            frequencies_hz: self.frequencies_hz.clone(),
            directions_deg: self.directions_deg.clone(),
            values: out,
        }
    }

    /// Cells that are at least as large as every neighbour.
    ///
    /// On a plateau only the first cell in raster order qualifies, because a
    /// cell must be strictly larger than the neighbours that precede it.
    pub fn local_maxima(&self) -> Vec<(usize, usize)> {
        let (nf, nd) = self.shape();
        let mut maxima = Vec::new();
        for i in 0..nf {
            for j in 0..nd {
                let v = self.at(i, j);
                if v <= 0.0 {
                    continue;
                }
                let is_max = self.neighbors(i, j).all(|(ni, nj)| {
                    let n = self.at(ni, nj);
                    if (ni, nj) < (i, j) { n < v } else { n <= v }
                });
                if is_max {
                    maxima.push((i, j));
                }
            }
        }
        maxima
    }

    /// Walks outward from (i, j) along each axis while cells stay at or
    /// above half the peak value.
    pub fn half_max_extent(&self, i: usize, j: usize) -> HalfMaxExtent {
        let (nf, nd) = self.shape();
        let half = self.at(i, j) / 2.0;

        let mut freq_lo = i;
        while freq_lo > 0 && self.at(freq_lo - 1, j) >= half {
            freq_lo -= 1;
        }
        let mut freq_hi = i;
        while freq_hi + 1 < nf && self.at(freq_hi + 1, j) >= half {
            freq_hi += 1;
        }
        let mut dir_lo = j;
        while dir_lo > 0 && self.at(i, dir_lo - 1) >= half {
            dir_lo -= 1;
        }
        let mut dir_hi = j;
        while dir_hi + 1 < nd && self.at(i, dir_hi + 1) >= half {
            dir_hi += 1;
        }

        HalfMaxExtent { freq_lo, freq_hi, dir_lo, dir_hi }
    }

    /// Width of frequency bin `i` in Hz (midpoint rule).
    pub fn frequency_bin_width(&self, i: usize) -> f64 {
        bin_width(&self.frequencies_hz, i, 0.0)
    }

    /// Width of direction bin `j` in degrees (midpoint rule). A single
    /// direction bin covers the whole circle.
    pub fn direction_bin_width(&self, j: usize) -> f64 {
        bin_width(&self.directions_deg, j, 360.0)
    }

    /// Full width at half maximum along the frequency axis, Hz.
    pub fn bandwidth_hz(&self, extent: &HalfMaxExtent) -> f64 {
        (extent.freq_lo..=extent.freq_hi).map(|i| self.frequency_bin_width(i)).sum()
    }

    /// Full width at half maximum along the direction axis, degrees.
    pub fn spread_deg(&self, extent: &HalfMaxExtent) -> f64 {
        (extent.dir_lo..=extent.dir_hi).map(|j| self.direction_bin_width(j)).sum()
    }

    /// Energy (m²) contained in the extent: Σ E(f, θ) Δf Δθ.
    pub fn integrate(&self, extent: HalfMaxExtent) -> f64 {
        let mut total = 0.0;
        for i in extent.freq_lo..=extent.freq_hi {
            let df = self.frequency_bin_width(i);
            for j in extent.dir_lo..=extent.dir_hi {
                total += self.at(i, j) * df * self.direction_bin_width(j);
            }
        }
        total
    }
}

fn bin_width(axis: &[f64], idx: usize, single: f64) -> f64 {
    let n = axis.len();
    if n < 2 {
        return single;
    }
    let lo = if idx == 0 { axis[0] } else { (axis[idx - 1] + axis[idx]) / 2.0 };
    let hi = if idx + 1 == n { axis[n - 1] } else { (axis[idx] + axis[idx + 1]) / 2.0 };
    let interior = (hi - lo).abs();
    // Edge bins extend half a spacing beyond the last coordinate.
    let edge = if idx == 0 {
        (axis[1] - axis[0]).abs() / 2.0
    } else if idx + 1 == n {
        (axis[n - 1] - axis[n - 2]).abs() / 2.0
    } else {
        0.0
    };
    interior + edge
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_axes(nf: usize, nd: usize) -> (Vec<f64>, Vec<f64>) {
        let freqs = (0..nf).map(|i| 0.04 + 0.01 * i as f64).collect();
        let dirs = (0..nd).map(|j| 10.0 * j as f64).collect();
        (freqs, dirs)
    }

    #[test]
    fn test_rejects_mismatched_value_count() {
        let (f, d) = uniform_axes(3, 3);
        assert!(SpectralGrid::new(f, d, vec![0.0; 8]).is_err());
    }

    #[test]
    fn test_rejects_negative_cells() {
        let (f, d) = uniform_axes(2, 2);
        let result = SpectralGrid::new(f, d, vec![0.0, 1.0, -1.0, 0.0]);
        assert!(matches!(result, Err(SwellError::Validation { .. })));
    }

    #[test]
    fn test_corner_has_three_neighbors_and_center_has_eight() {
        let (f, d) = uniform_axes(3, 3);
        let grid = SpectralGrid::new(f, d, vec![0.0; 9]).expect("grid should build");
        assert_eq!(grid.neighbors(0, 0).count(), 3);
        assert_eq!(grid.neighbors(1, 1).count(), 8);
        assert_eq!(grid.neighbors(2, 1).count(), 5);
    }

    #[test]
    fn test_single_spike_is_the_only_local_maximum() {
        let (f, d) = uniform_axes(5, 5);
        let mut values = vec![0.0; 25];
        values[2 * 5 + 3] = 4.0;
        let grid = SpectralGrid::new(f, d, values).expect("grid should build");
        assert_eq!(grid.local_maxima(), vec![(2, 3)]);
    }

    #[test]
    fn test_plateau_yields_one_maximum() {
        let (f, d) = uniform_axes(3, 4);
        let values = vec![
            0.0, 0.0, 0.0, 0.0,
            0.0, 2.0, 2.0, 0.0,
            0.0, 0.0, 0.0, 0.0,
        ];
        let grid = SpectralGrid::new(f, d, values).expect("grid should build");
        assert_eq!(grid.local_maxima(), vec![(1, 1)]);
    }

    #[test]
    fn test_smoothing_preserves_uniform_field() {
        let (f, d) = uniform_axes(4, 6);
        let grid = SpectralGrid::new(f, d, vec![3.0; 24]).expect("grid should build");
        let smooth = grid.smoothed(1.0);
        for i in 0..4 {
            for j in 0..6 {
                let v = smooth.get(i, j).expect("in bounds");
                assert!((v - 3.0).abs() < 1e-9, "cell ({}, {}) drifted to {}", i, j, v);
            }
        }
    }

    #[test]
    fn test_smoothing_spreads_a_spike_but_keeps_its_location() {
        let (f, d) = uniform_axes(7, 7);
        let mut values = vec![0.0; 49];
        values[3 * 7 + 3] = 10.0;
        let grid = SpectralGrid::new(f, d, values).expect("grid should build");
        let smooth = grid.smoothed(1.0);
        assert!(smooth.get(3, 3).expect("in bounds") < 10.0);
        assert!(smooth.get(3, 4).expect("in bounds") > 0.0);
        assert_eq!(smooth.local_maxima(), vec![(3, 3)]);
    }

    #[test]
    fn test_half_max_extent_and_widths() {
        let (f, d) = uniform_axes(5, 5);
        let values = vec![
            0.0, 0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 3.0, 0.0, 0.0,
            0.0, 1.0, 4.0, 2.5, 0.0,
            0.0, 0.0, 2.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 0.0, 0.0,
        ];
        let grid = SpectralGrid::new(f, d, values).expect("grid should build");
        let extent = grid.half_max_extent(2, 2);
        assert_eq!(extent, HalfMaxExtent { freq_lo: 1, freq_hi: 3, dir_lo: 2, dir_hi: 3 });
        assert!((grid.bandwidth_hz(&extent) - 0.03).abs() < 1e-12);
        assert!((grid.spread_deg(&extent) - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_integrate_uniform_grid() {
        let (f, d) = uniform_axes(3, 3);
        let grid = SpectralGrid::new(f, d, vec![1.0; 9]).expect("grid should build");
        // 3 bins × 0.01 Hz by 3 bins × 10°
        assert!((grid.total_energy() - 0.9).abs() < 1e-12);
    }
}
