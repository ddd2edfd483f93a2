/// Raw-feed parsing. Fetching is left to the caller; these modules turn
/// bulletin text into typed `StationObservation`s.
///
/// - `ndbc`: NDBC realtime2 standard met and spectral summary files
/// - `fixtures` (test only): representative bulletin payloads

pub mod fixtures;
pub mod ndbc;
