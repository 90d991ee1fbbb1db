//! Coordinates, safe locations, and great-circle distance.

use serde::{Deserialize, Serialize};

/// Mean Earth radius (IUGG), in kilometers.
pub const EARTH_MEAN_RADIUS_KM: f64 = 6371.0088;

/// Distances closer than this are treated as equal.
pub const TIE_EPSILON_KM: f64 = 1e-9;

/// A WGS84 latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Finite and within ±90° latitude, ±180° longitude.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Map link for this point.
    pub fn maps_url(&self) -> String {
        format!(
            "https://www.google.com/maps?q={:.6},{:.6}",
            self.lat, self.lon
        )
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.5}, {:.5}", self.lat, self.lon)
    }
}

/// A predefined low-risk evacuation point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafeLocation {
    pub name: String,
    #[serde(flatten)]
    pub coordinates: Coordinates,
}

impl SafeLocation {
    pub fn new(name: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            name: name.into(),
            coordinates: Coordinates::new(lat, lon),
        }
    }
}

/// The lake being monitored; its coordinates are the alert's risk location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredSite {
    pub name: String,
    #[serde(flatten)]
    pub coordinates: Coordinates,
    /// IANA timezone used for timestamps in messages
    pub timezone: String,
}

/// Distance lookup between two points.
pub trait DistancePort: Send + Sync {
    fn distance_km(&self, a: Coordinates, b: Coordinates) -> f64;
}

/// Great-circle distance on a spherical Earth.
#[derive(Debug, Clone, Copy, Default)]
pub struct Haversine;

impl DistancePort for Haversine {
    fn distance_km(&self, a: Coordinates, b: Coordinates) -> f64 {
        let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
        let d_lat = lat2 - lat1;
        let d_lon = (b.lon - a.lon).to_radians();

        let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_MEAN_RADIUS_KM * h.sqrt().min(1.0).asin()
    }
}

/// Result of a nearest-location search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestLocation {
    pub location: SafeLocation,
    pub distance_km: f64,
}

/// Linear scan for the closest safe location.
///
/// Ties (within [`TIE_EPSILON_KM`]) go to the location listed first.
/// Returns `None` for an empty set or when no distance is finite.
pub fn nearest_safe_location(
    distance: &dyn DistancePort,
    from: Coordinates,
    locations: &[SafeLocation],
) -> Option<NearestLocation> {
    let mut best: Option<(&SafeLocation, f64)> = None;

    for location in locations {
        let d = distance.distance_km(from, location.coordinates);
        if !d.is_finite() {
            continue;
        }
        match best {
            Some((_, best_d)) if d >= best_d - TIE_EPSILON_KM => {}
            _ => best = Some((location, d)),
        }
    }

    best.map(|(location, distance_km)| NearestLocation {
        location: location.clone(),
        distance_km,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn khumbu_locations() -> Vec<SafeLocation> {
        vec![
            SafeLocation::new("Namche Bazaar", 27.8050, 86.7139),
            SafeLocation::new("Dingboche", 27.8925, 86.8306),
            SafeLocation::new("Pangboche", 27.8577, 86.7944),
        ]
    }

    #[test]
    fn test_haversine_known_distance() {
        let london = Coordinates::new(51.5007, -0.1246);
        let new_york = Coordinates::new(40.6892, -74.0445);
        let d = Haversine.distance_km(london, new_york);
        assert!((d - 5574.8).abs() < 1.0, "got {d}");
    }

    #[test]
    fn test_haversine_zero_and_symmetric() {
        let a = Coordinates::new(27.8983, 86.9250);
        let b = Coordinates::new(27.8050, 86.7139);
        assert_eq!(Haversine.distance_km(a, a), 0.0);
        assert!((Haversine.distance_km(a, b) - Haversine.distance_km(b, a)).abs() < 1e-9);
    }

    #[test]
    fn test_nearest_picks_minimum() {
        let imja = Coordinates::new(27.8983, 86.9250);
        let nearest = nearest_safe_location(&Haversine, imja, &khumbu_locations()).unwrap();
        assert_eq!(nearest.location.name, "Dingboche");
        assert!((nearest.distance_km - 9.3).abs() < 0.1);
    }

    #[test]
    fn test_equidistant_tie_goes_to_first_listed() {
        let origin = Coordinates::new(0.0, 0.0);
        let east = SafeLocation::new("East", 0.0, 1.0);
        let north = SafeLocation::new("North", 1.0, 0.0);

        let nearest =
            nearest_safe_location(&Haversine, origin, &[east.clone(), north.clone()]).unwrap();
        assert_eq!(nearest.location.name, "East");

        let nearest = nearest_safe_location(&Haversine, origin, &[north, east]).unwrap();
        assert_eq!(nearest.location.name, "North");
    }

    #[test]
    fn test_empty_set_has_no_nearest() {
        let origin = Coordinates::new(0.0, 0.0);
        assert!(nearest_safe_location(&Haversine, origin, &[]).is_none());
    }

    #[test]
    fn test_coordinate_validation() {
        assert!(Coordinates::new(27.9, 86.9).is_valid());
        assert!(!Coordinates::new(91.0, 0.0).is_valid());
        assert!(!Coordinates::new(0.0, -180.5).is_valid());
        assert!(!Coordinates::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_safe_location_json_shape() {
        let location: SafeLocation =
            serde_json::from_str(r#"{"name": "Dingboche", "lat": 27.8925, "lon": 86.8306}"#)
                .unwrap();
        assert_eq!(location, SafeLocation::new("Dingboche", 27.8925, 86.8306));
    }

    #[test]
    fn test_maps_url() {
        let url = Coordinates::new(27.8983, 86.925).maps_url();
        assert_eq!(url, "https://www.google.com/maps?q=27.898300,86.925000");
    }
}
