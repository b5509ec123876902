//! Great-circle helpers on WGS84 coordinates.

use serde::{Deserialize, Serialize};

/// Mean Earth radius used for every distance in the simulator.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS84 position in decimal degrees.
///
/// Serialized as a `[longitude, latitude]` pair, the order routing backends
/// emit polylines in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coordinate {
    pub longitude: f64,
    pub latitude: f64,
}

impl Coordinate {
    #[must_use]
    pub const fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// True when both components are finite and inside WGS84 bounds.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.longitude.is_finite()
            && self.latitude.is_finite()
            && (-180.0..=180.0).contains(&self.longitude)
            && (-90.0..=90.0).contains(&self.latitude)
    }

    /// Great-circle distance to another point in kilometers.
    #[must_use]
    pub fn distance_to_km(&self, other: &Self) -> f64 {
        distance(*self, *other)
    }
}

impl From<[f64; 2]> for Coordinate {
    fn from([longitude, latitude]: [f64; 2]) -> Self {
        Self::new(longitude, latitude)
    }
}

impl From<Coordinate> for [f64; 2] {
    fn from(c: Coordinate) -> Self {
        [c.longitude, c.latitude]
    }
}

/// Haversine distance between two coordinates in kilometers.
///
/// The haversine term is clamped to `[0, 1]` and the central angle taken
/// with `atan2`, so antipodal pairs never produce `NaN`.
#[must_use]
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let h = h.clamp(0.0, 1.0);

    EARTH_RADIUS_KM * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Initial great-circle bearing from `a` to `b`, degrees clockwise from north
/// in `[0, 360)`.
#[must_use]
pub fn bearing(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let y = delta_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lon.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Linear interpolation in longitude/latitude space.
#[must_use]
pub fn interpolate(a: Coordinate, b: Coordinate, t: f64) -> Coordinate {
    let t = t.clamp(0.0, 1.0);
    Coordinate {
        longitude: a.longitude + (b.longitude - a.longitude) * t,
        latitude: a.latitude + (b.latitude - a.latitude) * t,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::Fake;

    fn random_coordinate() -> Coordinate {
        Coordinate::new((-180.0..180.0).fake(), (-90.0..90.0).fake())
    }

    #[test]
    fn test_distance_symmetric_and_zero() {
        for _ in 0..500 {
            let a = random_coordinate();
            let b = random_coordinate();
            assert!((distance(a, b) - distance(b, a)).abs() < 1e-9);
            assert_eq!(distance(a, a), 0.0);
        }
    }

    #[test]
    fn test_phoenix_to_tucson() {
        let phoenix = Coordinate::new(-112.07, 33.45);
        let tucson = Coordinate::new(-110.97, 32.22);
        let km = distance(phoenix, tucson);

        assert!((km - 180.0).abs() / 180.0 <= 0.05, "got {km}");
        assert!((km - 171.08).abs() < 0.1);
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let km = distance(Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 1.0));
        assert!((km - 111.195).abs() < 0.01);
    }

    #[test]
    fn test_antipodal_is_half_circumference() {
        let km = distance(Coordinate::new(0.0, 0.0), Coordinate::new(180.0, 0.0));
        assert!(km.is_finite());
        assert!((km - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);

        let poles = distance(Coordinate::new(10.0, 90.0), Coordinate::new(-170.0, -90.0));
        assert!((poles - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        let origin = Coordinate::new(0.0, 0.0);
        assert!(bearing(origin, Coordinate::new(0.0, 1.0)).abs() < 1e-9);
        assert!((bearing(origin, Coordinate::new(1.0, 0.0)) - 90.0).abs() < 1e-9);
        assert!((bearing(origin, Coordinate::new(0.0, -1.0)) - 180.0).abs() < 1e-9);
        assert!((bearing(origin, Coordinate::new(-1.0, 0.0)) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_interpolate_clamps() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(2.0, 4.0);
        assert_eq!(interpolate(a, b, 0.5), Coordinate::new(1.0, 2.0));
        assert_eq!(interpolate(a, b, 1.5), b);
        assert_eq!(interpolate(a, b, -1.0), a);
    }

    #[test]
    fn test_coordinate_serializes_as_lon_lat_pair() {
        let json = serde_json::to_string(&Coordinate::new(-112.074, 33.4484)).unwrap();
        assert_eq!(json, "[-112.074,33.4484]");

        let back: Coordinate = serde_json::from_str("[-110.9747,32.2226]").unwrap();
        assert_eq!(back, Coordinate::new(-110.9747, 32.2226));
    }

    #[test]
    fn test_validity_bounds() {
        assert!(Coordinate::new(-112.0, 33.0).is_valid());
        assert!(!Coordinate::new(0.0, 91.0).is_valid());
        assert!(!Coordinate::new(181.0, 0.0).is_valid());
        assert!(!Coordinate::new(f64::NAN, 0.0).is_valid());
    }
}
