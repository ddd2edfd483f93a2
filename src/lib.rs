/// swellmon_service: Southern California Bight swell event monitoring.
///
/// Turns noisy, partially missing buoy bulletins into a short,
/// de-duplicated list of swell events (height, period, direction,
/// confidence) for downstream forecast consumers.
///
/// # Module structure
///
/// ```text
/// swellmon_service
/// ├── model       — shared data types (StationObservation, SpectralPeak, SwellEvent, …)
/// ├── error       — SwellError taxonomy
/// ├── units       — the one metres ↔ regional-scale feet conversion
/// ├── config      — tunables loaded from swellmon.toml
/// ├── stations    — NDBC buoy registry
/// ├── ingest
/// │   ├── ndbc    — realtime2 .txt / .spec bulletin parsing
/// │   └── fixtures (test only) — representative bulletin payloads
/// ├── analysis
/// │   ├── separation   — period/direction rule for "same wave train"
/// │   ├── grid         — 2D frequency–direction energy grid
/// │   ├── peaks        — per-station spectral peak extraction
/// │   ├── quality      — per-station trend, anomaly and quality scoring
/// │   ├── significance — height/period significance score
/// │   └── fusion       — cross-station merge into swell events
/// └── cycle       — one forecast cycle: parallel station analysis, then fusion
/// ```

pub mod analysis;
pub mod config;
pub mod cycle;
pub mod error;
pub mod ingest;
pub mod model;
pub mod stations;
pub mod units;
