//! Built-in directory of Arizona waypoints selectable by id.

use crate::error::{Result, SimulatorError};
use nav_domain::Coordinate;
use serde::Serialize;

/// A named point the operator can route from or to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Location {
    pub id: &'static str,
    pub name: &'static str,
    pub coordinate: Coordinate,
}

const fn loc(id: &'static str, name: &'static str, lat: f64, lon: f64) -> Location {
    Location {
        id,
        name,
        coordinate: Coordinate::new(lon, lat),
    }
}

static LOCATIONS: [Location; 16] = [
    // Phoenix metro
    loc("phx", "Phoenix Downtown", 33.4484, -112.0740),
    loc("phx-airport", "Phoenix Sky Harbor", 33.4373, -112.0078),
    loc("tempe", "Tempe (ASU)", 33.4255, -111.9400),
    loc("mesa", "Mesa", 33.4152, -111.8315),
    loc("scottsdale", "Scottsdale", 33.4942, -111.9261),
    loc("glendale", "Glendale", 33.5387, -112.1859),
    loc("chandler", "Chandler", 33.3062, -111.8413),
    // Southern
    loc("tucson", "Tucson", 32.2226, -110.9747),
    loc("yuma", "Yuma", 32.6927, -114.6277),
    loc("casa-grande", "Casa Grande", 32.8795, -111.7574),
    // Northern
    loc("flagstaff", "Flagstaff", 35.1983, -111.6513),
    loc("sedona", "Sedona", 34.8697, -111.7610),
    loc("grand-canyon", "Grand Canyon", 36.0544, -112.1401),
    loc("prescott", "Prescott", 34.5400, -112.4685),
    loc("page", "Page (Lake Powell)", 36.9147, -111.4558),
    // Eastern
    loc("show-low", "Show Low", 34.2542, -110.0298),
];

#[must_use]
pub fn all() -> &'static [Location] {
    &LOCATIONS
}

/// Look up a location by id, ignoring case.
///
/// # Errors
///
/// Returns [`SimulatorError::UnknownLocation`] when no location has that id.
pub fn find(id: &str) -> Result<&'static Location> {
    let wanted = id.trim();
    LOCATIONS
        .iter()
        .find(|l| l.id.eq_ignore_ascii_case(wanted))
        .ok_or_else(|| SimulatorError::UnknownLocation(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_unique_and_valid() {
        let ids: HashSet<_> = all().iter().map(|l| l.id).collect();
        assert_eq!(ids.len(), all().len());
        assert!(all().iter().all(|l| l.coordinate.is_valid()));
    }

    #[test]
    fn test_find_by_id() {
        let phx = find("PHX").unwrap();
        assert_eq!(phx.name, "Phoenix Downtown");
        assert!((phx.coordinate.latitude - 33.4484).abs() < f64::EPSILON);
        assert!((phx.coordinate.longitude + 112.0740).abs() < f64::EPSILON);

        let err = find("atlantis").unwrap_err();
        assert_eq!(err.to_string(), "Unknown location: atlantis");
    }

    #[test]
    fn test_phoenix_to_tucson_distance() {
        let km = find("phx")
            .unwrap()
            .coordinate
            .distance_to_km(&find("tucson").unwrap().coordinate);
        assert!((km - 170.66).abs() < 0.1, "{km}");
    }
}
