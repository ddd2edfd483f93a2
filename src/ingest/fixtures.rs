/// Test fixtures: representative NDBC realtime2 bulletins.
///
/// Structurally complete but truncated to a few rows. They mirror the files
/// served at:
///   https://www.ndbc.noaa.gov/data/realtime2/{station}.txt
///   https://www.ndbc.noaa.gov/data/realtime2/{station}.spec
///
/// Rows are newest first, as NDBC publishes them. `MM` marks a missing
/// value; 99.0 / 999 are legacy sentinels that also mean missing.

/// Santa Monica Basin standard met. Latest hour: 2.4 m at 14 s from 326°.
/// The 10:00 row has no MWD and a 99.0 gust sentinel.
#[cfg(test)]
pub(crate) fn fixture_46025_txt() -> &'static str {
    r#"#YY  MM DD hh mm WDIR WSPD GST  WVHT   DPD   APD MWD   PRES  ATMP  WTMP  DEWP  VIS PTDY  TIDE
#yr  mo dy hr mn degT m/s  m/s     m   sec   sec degT   hPa  degC  degC  degC  nmi  hPa    ft
2024 01 15 12 00 270  5.0  7.0   2.4  14.0   9.5 326 1015.2  15.1  16.0  10.2   MM -0.5    MM
2024 01 15 11 00 265  4.5  6.0   2.3  14.0   9.3 324 1015.6  15.0  16.0  10.1   MM -0.3    MM
2024 01 15 10 00 260  4.0 99.0   2.1  13.0   9.0  MM 1016.0  14.8  16.0  10.0   MM -0.1    MM
"#
}

/// Santa Monica Basin spectral summary for the same hours.
/// Latest hour: swell 2.4 m / 14 s from NW, wind wave 0.3 m / 5 s from W.
#[cfg(test)]
pub(crate) fn fixture_46025_spec() -> &'static str {
    r#"#YY  MM DD hh mm WVHT  SwH  SwP  WWH  WWP SwD WWD  STEEPNESS  APD MWD
#yr  mo dy hr mn    m    m  sec    m  sec  -  degT     -      sec degT
2024 01 15 12 00  2.4  2.4 14.0  0.3  5.0  NW   W    AVERAGE  9.5 326
2024 01 15 11 00  2.3  2.3 14.0  0.3  5.0  NW   W    AVERAGE  9.3 324
2024 01 15 10 00  2.1  2.0 13.0  0.4  5.0 WNW   W    AVERAGE  9.0 320
"#
}

/// San Clemente Basin with every wave and wind field missing.
#[cfg(test)]
pub(crate) fn fixture_46086_all_missing_txt() -> &'static str {
    r#"#YY  MM DD hh mm WDIR WSPD GST  WVHT   DPD   APD MWD   PRES  ATMP  WTMP  DEWP  VIS PTDY  TIDE
#yr  mo dy hr mn degT m/s  m/s     m   sec   sec degT   hPa  degC  degC  degC  nmi  hPa    ft
2024 01 15 12 00  MM   MM   MM    MM    MM    MM  MM 1014.9  15.3  16.2    MM   MM    MM    MM
2024 01 15 11 00 999 99.0 99.0 99.00 99.00 99.00 999 1015.1  15.2  16.2    MM   MM    MM    MM
"#
}
