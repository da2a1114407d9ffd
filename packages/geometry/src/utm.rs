//! WGS84 to UTM forward projection.
//!
//! Implements the transverse Mercator projection using Krüger's series to
//! third order in the third flattening, which is accurate to well below a
//! millimeter within a UTM zone.

use std::sync::LazyLock;

use geo::Coord;
use livestock_map_building_models::LatLon;

const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Series coefficients derived from the ellipsoid.
struct TransverseMercator {
    /// First eccentricity.
    e: f64,
    /// Rectifying radius.
    rectifying_radius: f64,
    /// Krüger alpha coefficients for 2ξ', 4ξ', 6ξ'.
    alpha: [f64; 3],
}

static WGS84_TM: LazyLock<TransverseMercator> = LazyLock::new(|| {
    let f = WGS84_F;
    let n = f / (2.0 - f);
    let n2 = n * n;
    let n3 = n2 * n;

    TransverseMercator {
        e: (f * (2.0 - f)).sqrt(),
        rectifying_radius: WGS84_A / (1.0 + n) * (1.0 + n2 / 4.0 + n2 * n2 / 64.0),
        alpha: [
            n / 2.0 - 2.0 / 3.0 * n2 + 5.0 / 16.0 * n3,
            13.0 / 48.0 * n2 - 3.0 / 5.0 * n3,
            61.0 / 240.0 * n3,
        ],
    }
});

/// A UTM zone (1-60) and hemisphere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtmZone {
    number: u8,
    north: bool,
}

impl UtmZone {
    /// Selects the zone `floor((lon + 180) / 6) + 1` for a point, clamped to
    /// 1..=60 so that `lon = 180` stays in zone 60.
    #[must_use]
    pub fn for_point(point: LatLon) -> Self {
        let raw = ((point.lon + 180.0) / 6.0).floor() + 1.0;
        let clamped = raw.clamp(1.0, 60.0);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let number = clamped as u8;

        Self {
            number,
            north: point.lat >= 0.0,
        }
    }

    /// Zone number.
    #[must_use]
    pub const fn number(&self) -> u8 {
        self.number
    }

    /// Whether the zone is on the northern hemisphere.
    #[must_use]
    pub const fn is_north(&self) -> bool {
        self.north
    }

    /// Longitude of the zone's central meridian, in degrees.
    #[must_use]
    pub fn central_meridian(&self) -> f64 {
        f64::from(self.number) * 6.0 - 183.0
    }

    /// Projects a geodetic point to easting (`x`) / northing (`y`) meters.
    #[must_use]
    pub fn project(&self, point: LatLon) -> Coord<f64> {
        let tm = &*WGS84_TM;

        let phi = point.lat.to_radians();
        let lambda = (point.lon - self.central_meridian()).to_radians();

        let sin_phi = phi.sin();
        let t = (sin_phi.atanh() - tm.e * (tm.e * sin_phi).atanh()).sinh();
        let xi_prime = t.atan2(lambda.cos());
        let eta_prime = (lambda.sin() / t.mul_add(t, 1.0).sqrt()).atanh();

        let mut xi = xi_prime;
        let mut eta = eta_prime;
        for (alpha, k) in tm.alpha.iter().zip([2.0, 4.0, 6.0]) {
            xi += alpha * (k * xi_prime).sin() * (k * eta_prime).cosh();
            eta += alpha * (k * xi_prime).cos() * (k * eta_prime).sinh();
        }

        let false_northing = if self.north {
            0.0
        } else {
            FALSE_NORTHING_SOUTH
        };

        Coord {
            x: (K0 * tm.rectifying_radius).mul_add(eta, FALSE_EASTING),
            y: (K0 * tm.rectifying_radius).mul_add(xi, false_northing),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_zone_from_longitude() {
        assert_eq!(UtmZone::for_point(LatLon::new(52.1, 5.56)).number(), 31);
        assert_eq!(UtmZone::for_point(LatLon::new(52.3, 6.1)).number(), 32);
        assert_eq!(UtmZone::for_point(LatLon::new(0.0, -180.0)).number(), 1);
        assert_eq!(UtmZone::for_point(LatLon::new(0.0, 180.0)).number(), 60);
    }

    #[test]
    fn central_meridian_of_zone_31_is_3_east() {
        let zone = UtmZone::for_point(LatLon::new(52.0, 5.0));
        assert!((zone.central_meridian() - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn equator_on_central_meridian_is_false_origin() {
        let zone = UtmZone::for_point(LatLon::new(0.0, 3.0));
        let c = zone.project(LatLon::new(0.0, 3.0));
        assert!((c.x - 500_000.0).abs() < 1e-6);
        assert!(c.y.abs() < 1e-6);
    }

    #[test]
    fn northing_on_central_meridian_matches_scaled_meridian_arc() {
        // k0 * meridian arc length from the equator to 52°N on WGS84.
        let zone = UtmZone::for_point(LatLon::new(52.0, 3.0));
        let c = zone.project(LatLon::new(52.0, 3.0));
        assert!((c.x - 500_000.0).abs() < 1e-6);
        assert!((c.y - 5_761_038.2126).abs() < 0.01);
    }

    #[test]
    fn southern_hemisphere_uses_false_northing() {
        let zone = UtmZone::for_point(LatLon::new(-33.9, 18.4));
        assert!(!zone.is_north());
        let c = zone.project(LatLon::new(-33.9, 18.4));
        assert!(c.y > 6_000_000.0 && c.y < 10_000_000.0);
    }
}
