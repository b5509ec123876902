//! Vehicle performance profiles.
//!
//! The registry is a constant table keyed by [`VehicleCategory`]. Every
//! lookup builds a fresh owned [`VehicleProfile`], so two simulations can
//! never share mutable vehicle state and editing a returned profile never
//! touches the table.

use crate::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// CATEGORIES
// =============================================================================

/// Vehicle categories known to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleCategory {
    #[default]
    Car,
    Truck,
    Motorcycle,
}

impl VehicleCategory {
    pub const ALL: [Self; 3] = [Self::Car, Self::Truck, Self::Motorcycle];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Car => "car",
            Self::Truck => "truck",
            Self::Motorcycle => "motorcycle",
        }
    }
}

impl fmt::Display for VehicleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleCategory {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| DomainError::UnknownVehicleType(s.to_string()))
    }
}

// =============================================================================
// PROFILES
// =============================================================================

/// Performance characteristics of one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleProfile {
    pub category: VehicleCategory,
    pub name: String,
    pub max_speed_kmh: f64,
    /// Typical cruising speed; drives all distance accounting
    pub avg_speed_kmh: f64,
    pub acceleration_kmh_per_s: f64,
    /// Chance of a rest stop per 10 km travelled, 0..=1
    pub break_probability: f64,
    pub break_duration_min: f64,
    pub icon: String,
    /// Marker color as a CSS hex string
    pub color: String,
}

struct ProfileTemplate {
    category: VehicleCategory,
    name: &'static str,
    max_speed_kmh: f64,
    avg_speed_kmh: f64,
    acceleration_kmh_per_s: f64,
    break_probability: f64,
    break_duration_min: f64,
    icon: &'static str,
    color: &'static str,
}

impl ProfileTemplate {
    fn instantiate(&self) -> VehicleProfile {
        VehicleProfile {
            category: self.category,
            name: self.name.to_string(),
            max_speed_kmh: self.max_speed_kmh,
            avg_speed_kmh: self.avg_speed_kmh,
            acceleration_kmh_per_s: self.acceleration_kmh_per_s,
            break_probability: self.break_probability,
            break_duration_min: self.break_duration_min,
            icon: self.icon.to_string(),
            color: self.color.to_string(),
        }
    }
}

static PROFILES: [ProfileTemplate; 3] = [
    ProfileTemplate {
        category: VehicleCategory::Car,
        name: "Sedan",
        max_speed_kmh: 120.0,
        avg_speed_kmh: 95.0,
        acceleration_kmh_per_s: 15.0,
        break_probability: 0.05,
        break_duration_min: 5.0,
        icon: "🚗",
        color: "#3b82f6",
    },
    ProfileTemplate {
        category: VehicleCategory::Truck,
        name: "Semi Truck",
        max_speed_kmh: 90.0,
        avg_speed_kmh: 70.0,
        acceleration_kmh_per_s: 8.0,
        break_probability: 0.15,
        break_duration_min: 15.0,
        icon: "🚛",
        color: "#f59e0b",
    },
    ProfileTemplate {
        category: VehicleCategory::Motorcycle,
        name: "Sport Bike",
        max_speed_kmh: 140.0,
        avg_speed_kmh: 110.0,
        acceleration_kmh_per_s: 25.0,
        break_probability: 0.03,
        break_duration_min: 3.0,
        icon: "🏍️",
        color: "#22c55e",
    },
];

fn template(category: VehicleCategory) -> &'static ProfileTemplate {
    match category {
        VehicleCategory::Car => &PROFILES[0],
        VehicleCategory::Truck => &PROFILES[1],
        VehicleCategory::Motorcycle => &PROFILES[2],
    }
}

/// Fresh profile for a known category.
#[must_use]
pub fn profile(category: VehicleCategory) -> VehicleProfile {
    template(category).instantiate()
}

/// Look up a profile by category name.
///
/// # Errors
///
/// Returns [`DomainError::UnknownVehicleType`] when the name is not in the
/// registry.
pub fn create(category: &str) -> Result<VehicleProfile> {
    category.parse::<VehicleCategory>().map(profile)
}

/// All registered categories in table order.
#[must_use]
pub fn categories() -> Vec<VehicleCategory> {
    PROFILES.iter().map(|t| t.category).collect()
}

/// Fresh copies of every profile, for selection lists.
#[must_use]
pub fn all_profiles() -> Vec<VehicleProfile> {
    PROFILES.iter().map(ProfileTemplate::instantiate).collect()
}

/// Estimated trip time in whole minutes.
///
/// Base time at cruising speed plus the expected rest-stop time, assuming
/// one potential stop per full 100 km weighted by the profile's break
/// probability.
#[must_use]
pub fn estimate_eta(distance_km: f64, profile: &VehicleProfile) -> f64 {
    let distance_km = distance_km.max(0.0);
    let base_min = distance_km / profile.avg_speed_kmh * 60.0;

    let stops = (distance_km / 100.0).floor();
    let expected_breaks = stops * profile.break_probability;
    let break_min = expected_breaks * profile.break_duration_min;

    (base_min + break_min).round()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_known_categories() {
        let car = create("car").unwrap();
        assert_eq!(car.category, VehicleCategory::Car);
        assert_eq!(car.name, "Sedan");
        assert!((car.avg_speed_kmh - 95.0).abs() < f64::EPSILON);

        let truck = create("Truck").unwrap();
        assert!((truck.break_duration_min - 15.0).abs() < f64::EPSILON);

        let bike = create(" motorcycle ").unwrap();
        assert_eq!(bike.color, "#22c55e");
    }

    #[test]
    fn test_unknown_category_fails() {
        let err = create("spaceship").unwrap_err();
        assert_eq!(err, DomainError::UnknownVehicleType("spaceship".into()));
    }

    #[test]
    fn test_profiles_are_independent_copies() {
        let mut first = profile(VehicleCategory::Truck);
        first.avg_speed_kmh = 1.0;
        first.name.push_str(" (modified)");

        let second = profile(VehicleCategory::Truck);
        assert!((second.avg_speed_kmh - 70.0).abs() < f64::EPSILON);
        assert_eq!(second.name, "Semi Truck");
    }

    #[test]
    fn test_categories_listing() {
        assert_eq!(
            categories(),
            vec![
                VehicleCategory::Car,
                VehicleCategory::Truck,
                VehicleCategory::Motorcycle
            ]
        );
        assert_eq!(all_profiles().len(), 3);
        for c in VehicleCategory::ALL {
            assert_eq!(profile(c).category, c);
            assert_eq!(c.as_str().parse::<VehicleCategory>().unwrap(), c);
        }
    }

    #[test]
    fn test_estimate_eta() {
        let car = profile(VehicleCategory::Car);
        // 95 km at 95 km/h, no full 100 km leg
        assert!((estimate_eta(95.0, &car) - 60.0).abs() < f64::EPSILON);

        let truck = profile(VehicleCategory::Truck);
        // 350 km: 300 min driving + 3 * 0.15 * 15 = 6.75 min of breaks
        assert!((estimate_eta(350.0, &truck) - 307.0).abs() < f64::EPSILON);

        assert!(estimate_eta(-5.0, &truck).abs() < f64::EPSILON);
    }

    #[test]
    fn test_category_serde_lowercase() {
        let json = serde_json::to_string(&VehicleCategory::Motorcycle).unwrap();
        assert_eq!(json, "\"motorcycle\"");
    }
}
