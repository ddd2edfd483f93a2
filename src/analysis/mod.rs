/// Computation for the swell monitoring service.
///
/// Submodules:
/// - `separation`: the period/direction rule deciding whether two wave
///   trains are one system; shared by `peaks` and `fusion`.
/// - `grid`: 2D frequency–direction energy grid with bounds-checked
///   neighbour iteration.
/// - `peaks`: per-station spectral peak extraction.
/// - `quality`: per-station trend, anomaly and quality scoring.
/// - `significance`: the tunable height/period significance function.
/// - `fusion`: cross-station merge into canonical swell events.

pub mod fusion;
pub mod grid;
pub mod peaks;
pub mod quality;
pub mod separation;
pub mod significance;
