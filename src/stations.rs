/// Buoy registry for the Southern California Bight swell monitoring service.
///
/// Defines the canonical list of NDBC stations whose bulletins feed a
/// forecast cycle, along with their location.
/// Fusion looks stations up here to label contributing-station metadata;
/// a station missing from the registry is still analysed and fused, it
/// just carries no name.

/// Metadata for a single NDBC buoy.
#[derive(Debug)]
pub struct Station {
    /// 5-character NDBC station id.
    pub station_id: &'static str,
    pub name: &'static str,
    /// WGS84 latitude.
    pub latitude: f64,
    /// WGS84 longitude.
    pub longitude: f64,
}

/// All monitored buoys, offshore references first, then nearshore.
///
/// Source: NDBC station pages (www.ndbc.noaa.gov/station_page.php).
pub static STATION_REGISTRY: &[Station] = &[
    Station {
        station_id: "46069",
        name: "South Santa Rosa Island, CA",
        latitude: 33.670,
        longitude: -120.200,
    },
    Station {
        station_id: "46025",
        name: "Santa Monica Basin, CA",
        latitude: 33.755,
        longitude: -119.045,
    },
    Station {
        station_id: "46219",
        name: "San Nicolas Island, CA",
        latitude: 33.221,
        longitude: -119.882,
    },
    Station {
        station_id: "46086",
        name: "San Clemente Basin, CA",
        latitude: 32.499,
        longitude: -118.052,
    },
    Station {
        station_id: "46221",
        name: "Santa Monica Bay, CA",
        latitude: 33.860,
        longitude: -118.633,
    },
    Station {
        station_id: "46222",
        name: "San Pedro, CA",
        latitude: 33.618,
        longitude: -118.317,
    },
    Station {
        station_id: "46232",
        name: "Point Loma South, CA",
        latitude: 32.517,
        longitude: -117.425,
    },
];

/// Returns all station ids in the registry.
pub fn all_station_ids() -> Vec<&'static str> {
    STATION_REGISTRY.iter().map(|s| s.station_id).collect()
}

/// Looks up a station by its NDBC id. Returns `None` if not found.
pub fn find_station(station_id: &str) -> Option<&'static Station> {
    STATION_REGISTRY.iter().find(|s| s.station_id == station_id)
}

/// Display name for a station id, if it is registered.
pub fn station_name(station_id: &str) -> Option<String> {
    find_station(station_id).map(|s| s.name.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
