use geo::{Distance, Euclidean};

use crate::problem;

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// A point in the planar working frame, in kilometers. Instance files carry
/// WGS84 coordinates; they are projected once on load and everything
/// downstream works in the plane.
#[derive(Debug, Clone, Copy)]
pub struct Location {
    point: geo::Point,
}

impl Location {
    pub fn from_cartesian(x: f64, y: f64) -> Self {
        Self {
            point: geo::Point::new(x, y),
        }
    }

    /// Spherical web-Mercator projection onto a plane measured in km.
    pub fn from_lon_lat(lon: f64, lat: f64) -> Self {
        let lon_rad = lon.to_radians();
        let lat_rad = lat.to_radians();

        let x = EARTH_RADIUS_KM * lon_rad;
        let y = EARTH_RADIUS_KM * (std::f64::consts::FRAC_PI_4 + lat_rad / 2.0).tan().ln();

        Self {
            point: geo::Point::new(x, y),
        }
    }

    pub fn x(&self) -> f64 {
        self.point.x()
    }

    pub fn y(&self) -> f64 {
        self.point.y()
    }

    pub fn euclidean_distance(&self, to: &Location) -> problem::Distance {
        Euclidean.distance(self.point, to.point)
    }
}

impl From<&Location> for geo::Point<f64> {
    fn from(location: &Location) -> Self {
        location.point
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euclidean_distance() {
        let a = Location::from_cartesian(0.0, 0.0);
        let b = Location::from_cartesian(3.0, 4.0);
        assert_eq!(a.euclidean_distance(&b), 5.0);
    }

    #[test]
    fn test_mercator_projection() {
        let origin = Location::from_lon_lat(0.0, 0.0);
        assert!(origin.x().abs() < 1e-9);
        assert!(origin.y().abs() < 1e-9);

        // One degree of longitude on the equator is about 111.19 km.
        let east = Location::from_lon_lat(1.0, 0.0);
        assert!((east.x() - 111.19).abs() < 0.01);

        // Mercator stretches latitude away from the equator.
        let north = Location::from_lon_lat(0.0, 45.0);
        let further = Location::from_lon_lat(0.0, 46.0);
        assert!(further.y() - north.y() > east.x() / 1.0);
    }
}
