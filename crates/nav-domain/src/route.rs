//! Validated route geometry.

use crate::error::{DomainError, Result};
use crate::geo::{self, Coordinate};
use serde::{Deserialize, Serialize};

/// An ordered polyline of at least two points with precomputed distances.
///
/// `cumulative_km[i]` is the along-route distance from the first point to
/// `points[i]`, so the last entry is the total route length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Coordinate>", into = "Vec<Coordinate>")]
pub struct Route {
    points: Vec<Coordinate>,
    cumulative_km: Vec<f64>,
}

impl Route {
    /// Build a route from its points.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidRoute`] for fewer than two points or any
    /// point outside WGS84 bounds.
    pub fn new(points: Vec<Coordinate>) -> Result<Self> {
        if points.len() < 2 {
            return Err(DomainError::InvalidRoute(format!(
                "expected at least 2 points, got {}",
                points.len()
            )));
        }
        if let Some(i) = points.iter().position(|p| !p.is_valid()) {
            return Err(DomainError::InvalidRoute(format!(
                "point {i} is not a valid coordinate: {:?}",
                points[i]
            )));
        }

        let mut cumulative_km = Vec::with_capacity(points.len());
        let mut total = 0.0;
        cumulative_km.push(total);
        for pair in points.windows(2) {
            total += geo::distance(pair[0], pair[1]);
            cumulative_km.push(total);
        }

        Ok(Self {
            points,
            cumulative_km,
        })
    }

    /// Build a route from `[longitude, latitude]` pairs.
    ///
    /// # Errors
    ///
    /// Same as [`Route::new`].
    pub fn from_pairs(pairs: &[[f64; 2]]) -> Result<Self> {
        Self::new(pairs.iter().copied().map(Coordinate::from).collect())
    }

    /// Provisional straight-line geometry through `waypoints`, with
    /// `steps_per_leg` evenly spaced points inserted on each leg.
    ///
    /// Used until a road-following polyline is available.
    ///
    /// # Errors
    ///
    /// Same as [`Route::new`].
    pub fn interpolated(waypoints: &[Coordinate], steps_per_leg: usize) -> Result<Self> {
        let mut points = Vec::with_capacity(waypoints.len() * (steps_per_leg + 1));
        if let Some(first) = waypoints.first() {
            points.push(*first);
        }
        for leg in waypoints.windows(2) {
            let divisions = steps_per_leg + 1;
            for step in 1..=divisions {
                #[allow(clippy::cast_precision_loss)]
                let t = step as f64 / divisions as f64;
                points.push(geo::interpolate(leg[0], leg[1], t));
            }
        }
        Self::new(points)
    }

    #[must_use]
    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    #[must_use]
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn start(&self) -> Coordinate {
        self.points[0]
    }

    #[must_use]
    pub fn end(&self) -> Coordinate {
        self.points[self.points.len() - 1]
    }

    /// Total along-route length in kilometers.
    #[must_use]
    pub fn total_km(&self) -> f64 {
        self.cumulative_km[self.cumulative_km.len() - 1]
    }

    /// Segment index and fraction within it for an along-route distance.
    ///
    /// Segments are scanned in order until the cumulative length reaches
    /// `covered_km`. A zero-length segment yields fraction 0. Distances past
    /// the end resolve to the end of the last segment.
    #[must_use]
    pub fn locate(&self, covered_km: f64) -> (usize, f64) {
        for (i, bounds) in self.cumulative_km.windows(2).enumerate() {
            let (start, end) = (bounds[0], bounds[1]);
            if end >= covered_km {
                let length = end - start;
                let fraction = if length > 0.0 {
                    ((covered_km - start) / length).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                return (i, fraction);
            }
        }
        (self.points.len() - 2, 1.0)
    }

    /// Interpolated position after travelling `covered_km` along the route.
    #[must_use]
    pub fn position_at(&self, covered_km: f64) -> Coordinate {
        let (segment, fraction) = self.locate(covered_km);
        geo::interpolate(self.points[segment], self.points[segment + 1], fraction)
    }

    /// Bearing of the segment containing `covered_km`.
    #[must_use]
    pub fn heading_at(&self, covered_km: f64) -> f64 {
        let (segment, _) = self.locate(covered_km);
        geo::bearing(self.points[segment], self.points[segment + 1])
    }
}

impl TryFrom<Vec<Coordinate>> for Route {
    type Error = DomainError;

    fn try_from(points: Vec<Coordinate>) -> Result<Self> {
        Self::new(points)
    }
}

impl From<Route> for Vec<Coordinate> {
    fn from(route: Route) -> Self {
        route.points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meridian() -> Route {
        Route::from_pairs(&[[0.0, 0.0], [0.0, 1.0]]).unwrap()
    }

    #[test]
    fn test_rejects_short_routes() {
        assert!(matches!(
            Route::new(vec![]),
            Err(DomainError::InvalidRoute(_))
        ));
        assert!(matches!(
            Route::from_pairs(&[[1.0, 1.0]]),
            Err(DomainError::InvalidRoute(_))
        ));
    }

    #[test]
    fn test_rejects_invalid_points() {
        let err = Route::from_pairs(&[[0.0, 0.0], [0.0, 95.0]]).unwrap_err();
        assert!(err.to_string().contains("point 1"));
    }

    #[test]
    fn test_total_is_sum_of_segments() {
        let route = Route::from_pairs(&[[0.0, 0.0], [0.0, 1.0], [1.0, 1.0]]).unwrap();
        let expected = geo::distance(route.points()[0], route.points()[1])
            + geo::distance(route.points()[1], route.points()[2]);
        assert!((route.total_km() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_position_interpolates_within_segment() {
        let route = meridian();
        let half = route.total_km() / 2.0;
        let mid = route.position_at(half);
        assert!(mid.longitude.abs() < 1e-12);
        assert!((mid.latitude - 0.5).abs() < 1e-9);

        assert_eq!(route.position_at(0.0), route.start());
        assert_eq!(route.position_at(route.total_km() + 10.0), route.end());
    }

    #[test]
    fn test_zero_length_segment_has_zero_fraction() {
        let route = Route::from_pairs(&[[0.0, 0.0], [0.0, 0.0], [0.0, 1.0]]).unwrap();
        assert_eq!(route.locate(0.0), (0, 0.0));
        let pos = route.position_at(0.0);
        assert!(pos.latitude.is_finite());
        assert_eq!(pos, Coordinate::new(0.0, 0.0));
    }

    #[test]
    fn test_heading_follows_segment() {
        let route = Route::from_pairs(&[[0.0, 0.0], [0.0, 1.0], [1.0, 1.0]]).unwrap();
        assert!(route.heading_at(10.0).abs() < 1e-6);
        let east = route.heading_at(route.total_km() - 1.0);
        assert!((east - 90.0).abs() < 1.0);
    }

    #[test]
    fn test_interpolated_route_densifies_legs() {
        let waypoints = [
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.0, 1.0),
            Coordinate::new(1.0, 1.0),
        ];
        let route = Route::interpolated(&waypoints, 19).unwrap();
        assert_eq!(route.point_count(), 1 + 2 * 20);
        assert_eq!(route.start(), waypoints[0]);
        assert_eq!(route.end(), waypoints[2]);
        assert_eq!(route.points()[20], waypoints[1]);

        assert!(Route::interpolated(&waypoints[..1], 5).is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        let route: Route = serde_json::from_str("[[0.0,0.0],[0.0,1.0]]").unwrap();
        assert!((route.total_km() - 111.195).abs() < 0.01);

        let bad = serde_json::from_str::<Route>("[[0.0,0.0]]");
        assert!(bad.is_err());
    }
}
