use crate::classify::Telescope;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::LazyLock;

/// WGS 80/84 equatorial radius in meters
const EQUATORIAL_RADIUS: f64 = 6378137.0;
/// WGS 80/84 polar radius in meters
const POLAR_RADIUS: f64 = 6356752.3;

/// Geocentric cartesian position in meters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoLocation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl GeoLocation {
    /// Convert geodetic longitude/latitude (degrees) and elevation above sea
    /// level (meters) to geocentric X, Y, Z.
    ///
    /// Only accurate to a few kilometers, which is plenty for locating an
    /// observatory.
    pub fn from_geodetic(longitude: f64, latitude: f64, elevation: f64) -> Self {
        let a = EQUATORIAL_RADIUS;
        let b = POLAR_RADIUS;

        let cos2oe = (b / a).powi(2);
        let sin2oe = (a + b) * (a - b) / a.powi(2);

        let theta = longitude.to_radians();
        let phi = latitude.to_radians();

        let n = a / (1.0 - sin2oe * phi.sin().powi(2)).sqrt();
        let h = elevation;

        Self {
            x: (n + h) * theta.cos() * phi.cos(),
            y: (n + h) * theta.sin() * phi.cos(),
            z: (cos2oe * n + h) * phi.sin(),
        }
    }
}

/// Longitude, latitude and elevation of each ground-based telescope.
/// IRAS was in orbit and has no fixed location.
const SITES: &[(Telescope, f64, f64, f64)] = &[
    (Telescope::DraoSt, -119.620000, 48.320000, 545.0),
    (Telescope::Fcrao, -72.345000, 42.391667, 314.0),
    (Telescope::Vla, -107.618333, 34.078333, 2124.0),
];

static LOCATIONS: LazyLock<HashMap<Telescope, GeoLocation>> = LazyLock::new(|| {
    SITES
        .iter()
        .map(|&(telescope, lon, lat, elev)| (telescope, GeoLocation::from_geodetic(lon, lat, elev)))
        .collect()
});

pub fn location(telescope: Telescope) -> Option<GeoLocation> {
    LOCATIONS.get(&telescope).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iras_has_no_location() {
        assert!(location(Telescope::Iras).is_none());
    }

    #[test]
    fn test_ground_sites_on_earth_surface() {
        for telescope in [Telescope::DraoSt, Telescope::Fcrao, Telescope::Vla] {
            let loc = location(telescope).unwrap();
            let r = (loc.x.powi(2) + loc.y.powi(2) + loc.z.powi(2)).sqrt();
            assert!(r > POLAR_RADIUS - 1000.0 && r < EQUATORIAL_RADIUS + 3000.0, "{} r={}", telescope, r);
        }
    }

    #[test]
    fn test_drao_quadrant() {
        // Western, northern hemisphere
        let loc = location(Telescope::DraoSt).unwrap();
        assert!(loc.x < 0.0);
        assert!(loc.y < 0.0);
        assert!(loc.z > 0.0);
        assert!((loc.z - 4_741_000.0).abs() < 10_000.0);
    }

    #[test]
    fn test_equator_prime_meridian() {
        let loc = GeoLocation::from_geodetic(0.0, 0.0, 0.0);
        assert!((loc.x - EQUATORIAL_RADIUS).abs() < 1e-6);
        assert!(loc.y.abs() < 1e-6);
        assert!(loc.z.abs() < 1e-6);
    }

    #[test]
    fn test_north_pole() {
        let loc = GeoLocation::from_geodetic(0.0, 90.0, 0.0);
        assert!((loc.z - POLAR_RADIUS).abs() < 1.0);
    }
}
