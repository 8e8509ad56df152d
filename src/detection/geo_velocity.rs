//! Geo-velocity scoring for impossible travel detection
//!
//! Pure functions only: the scorer holds no state and maps the implied
//! travel speed between two logins to a suspicion score.

use crate::models::Location;

/// Elapsed time assumed when no previous login is known. A full day of
/// innocuous travel suppresses false positives for first-time users.
pub const DEFAULT_GAP_HOURS: f64 = 24.0;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Score the travel between the previous and current login locations.
///
/// Returns 0 when either location is missing or the elapsed time is not
/// positive: absence of travel history is not evidence of risk.
pub fn calculate_geo_velocity_score(
    current: Option<&Location>,
    previous: Option<&Location>,
    hours_elapsed: f64,
) -> f64 {
    let (current, previous) = match (current, previous) {
        (Some(c), Some(p)) => (c, p),
        _ => return 0.0,
    };
    if hours_elapsed <= 0.0 {
        return 0.0;
    }

    let distance_km = haversine_km(previous, current);
    let velocity_kmh = distance_km / hours_elapsed;

    if velocity_kmh > 800.0 {
        100.0 // Faster than commercial flight
    } else if velocity_kmh > 500.0 {
        80.0
    } else if velocity_kmh > 300.0 {
        60.0
    } else if velocity_kmh > 200.0 {
        40.0
    } else if velocity_kmh > 100.0 {
        20.0
    } else {
        0.0
    }
}

/// Great-circle distance between two locations via the haversine
/// formula, in kilometers.
pub fn haversine_km(loc1: &Location, loc2: &Location) -> f64 {
    let lat1_rad = loc1.latitude.to_radians();
    let lat2_rad = loc2.latitude.to_radians();
    let delta_lat = (loc2.latitude - loc1.latitude).to_radians();
    let delta_lon = (loc2.longitude - loc1.longitude).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Whether `current` lies farther than `tolerance_km` from every known
/// location. An empty history always reads as new.
pub fn is_new_location(current: &Location, known: &[Location], tolerance_km: f64) -> bool {
    known
        .iter()
        .all(|loc| haversine_km(current, loc) >= tolerance_km)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(latitude: f64, longitude: f64) -> Location {
        Location {
            country: "US".to_string(),
            city: "Test".to_string(),
            latitude,
            longitude,
            timezone: "UTC".to_string(),
        }
    }

    fn nyc() -> Location {
        location(40.7128, -74.0060)
    }

    fn la() -> Location {
        location(34.0522, -118.2437)
    }

    #[test]
    fn test_haversine_distance() {
        // New York to Los Angeles: ~3944 km
        let distance = haversine_km(&nyc(), &la());
        assert!(
            (distance - 3944.0).abs() < 50.0,
            "NYC to LA should be ~3944 km, got {}",
            distance
        );
    }

    #[test]
    fn test_same_location_scores_zero() {
        let score = calculate_geo_velocity_score(Some(&nyc()), Some(&nyc()), 1.0);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_missing_location_scores_zero() {
        assert_eq!(calculate_geo_velocity_score(None, Some(&nyc()), 1.0), 0.0);
        assert_eq!(calculate_geo_velocity_score(Some(&nyc()), None, 1.0), 0.0);
        assert_eq!(calculate_geo_velocity_score(None, None, 1.0), 0.0);
    }

    #[test]
    fn test_non_positive_elapsed_scores_zero() {
        assert_eq!(calculate_geo_velocity_score(Some(&nyc()), Some(&la()), 0.0), 0.0);
        assert_eq!(
            calculate_geo_velocity_score(Some(&nyc()), Some(&la()), -2.0),
            0.0
        );
    }

    #[test]
    fn test_impossible_travel_scores_max() {
        // ~1000 km apart in one hour
        let a = location(48.8566, 2.3522); // Paris
        let b = location(41.9028, 12.4964); // Rome, ~1106 km
        let score = calculate_geo_velocity_score(Some(&b), Some(&a), 1.0);
        assert_eq!(score, 100.0);
    }

    #[test]
    fn test_velocity_bands() {
        // Craft a pair roughly 600 km apart and vary the elapsed time to
        // walk the bands.
        let a = location(0.0, 0.0);
        let b = location(0.0, 5.4); // ~600 km along the equator

        let score = |hours| calculate_geo_velocity_score(Some(&b), Some(&a), hours);
        assert_eq!(score(0.7), 100.0); // ~858 km/h
        assert_eq!(score(1.0), 80.0); // ~600 km/h
        assert_eq!(score(1.7), 60.0); // ~353 km/h
        assert_eq!(score(2.5), 40.0); // ~240 km/h
        assert_eq!(score(4.0), 20.0); // ~150 km/h
        assert_eq!(score(8.0), 0.0); // ~75 km/h
    }

    #[test]
    fn test_plausible_flight_after_long_gap() {
        // NYC to LA over the default 24 h gap: ~164 km/h is a plausible
        // flight and should stay in the lowest non-zero band.
        let score = calculate_geo_velocity_score(Some(&la()), Some(&nyc()), DEFAULT_GAP_HOURS);
        assert_eq!(score, 20.0);
    }

    #[test]
    fn test_is_new_location() {
        let known = vec![nyc()];
        assert!(!is_new_location(&nyc(), &known, 50.0));
        assert!(is_new_location(&la(), &known, 50.0));
        assert!(is_new_location(&nyc(), &[], 50.0));
    }
}
