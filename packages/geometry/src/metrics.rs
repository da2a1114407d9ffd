//! Area and oriented length/width of building footprints.
//!
//! All measurements are taken on the ring projected into the UTM zone of
//! its first vertex. Degenerate rings measure as zero rather than failing.

use geo::{Area, Centroid, Coord, LineString, MinimumRotatedRect, Polygon};
use livestock_map_building_models::{BuildingMetrics, LatLon};

use crate::utm::UtmZone;

/// Projects a geodetic ring into the UTM zone of its first vertex.
///
/// Returns `None` for rings with fewer than three distinct vertices.
fn project_ring(ring: &[LatLon]) -> Option<Polygon<f64>> {
    let first = ring.first()?;
    let zone = UtmZone::for_point(*first);

    let mut coords: Vec<Coord<f64>> = ring.iter().map(|p| zone.project(*p)).collect();
    coords.dedup();
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }
    if coords.len() < 3 {
        return None;
    }

    Some(Polygon::new(LineString::from(coords), vec![]))
}

/// Side lengths `(long, short)` of the minimum-area rectangle enclosing a
/// planar polygon.
fn planar_length_width(polygon: &Polygon<f64>) -> (f64, f64) {
    let Some(rect) = polygon.minimum_rotated_rect() else {
        return (0.0, 0.0);
    };

    let corners: Vec<Coord<f64>> = rect.exterior().coords().copied().collect();
    let [a, b, c, ..] = corners[..] else {
        return (0.0, 0.0);
    };

    let edge0 = (b.x - a.x).hypot(b.y - a.y);
    let edge1 = (c.x - b.x).hypot(c.y - b.y);

    (edge0.max(edge1), edge0.min(edge1))
}

/// Planar area of the ring in square meters. Degenerate rings return `0.0`.
#[must_use]
pub fn area_square_meters(ring: &[LatLon]) -> f64 {
    project_ring(ring).map_or(0.0, |polygon| polygon.unsigned_area())
}

/// Length and width of the ring's minimum-area bounding rectangle, in
/// meters. `length >= width`; independent of winding and start vertex.
#[must_use]
pub fn oriented_length_width(ring: &[LatLon]) -> (f64, f64) {
    project_ring(ring).map_or((0.0, 0.0), |polygon| planar_length_width(&polygon))
}

/// Computes all footprint metrics of a ring in one projection pass.
#[must_use]
pub fn compute_metrics(ring: &[LatLon]) -> BuildingMetrics {
    let Some(polygon) = project_ring(ring) else {
        log::debug!("Degenerate ring with {} vertices", ring.len());
        return BuildingMetrics::default();
    };

    let (length_meters, width_meters) = planar_length_width(&polygon);

    BuildingMetrics {
        area_square_meters: polygon.unsigned_area(),
        length_meters,
        width_meters,
    }
}

/// Centroid of a geodetic ring. Used as the query point when looking for
/// nearby addresses; buildings are small enough that computing it on raw
/// degrees is fine.
#[must_use]
pub fn centroid(ring: &[LatLon]) -> Option<LatLon> {
    let coords: Vec<Coord<f64>> = ring.iter().map(|p| Coord { x: p.lon, y: p.lat }).collect();
    let polygon = Polygon::new(LineString::from(coords), vec![]);
    polygon
        .centroid()
        .map(|point| LatLon::new(point.y(), point.x()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAT0: f64 = 52.093;
    const LON0: f64 = 5.567;
    const METERS_PER_DEG_LAT: f64 = 111_257.0;

    fn meters_per_deg_lon() -> f64 {
        111_412.0 * LAT0.to_radians().cos()
    }

    /// A rectangle of `width` x `height` meters, axis-aligned, as a closed
    /// geodetic ring.
    fn geodetic_rect(width: f64, height: f64) -> Vec<LatLon> {
        let dlon = width / meters_per_deg_lon();
        let dlat = height / METERS_PER_DEG_LAT;
        vec![
            LatLon::new(LAT0, LON0),
            LatLon::new(LAT0, LON0 + dlon),
            LatLon::new(LAT0 + dlat, LON0 + dlon),
            LatLon::new(LAT0 + dlat, LON0),
            LatLon::new(LAT0, LON0),
        ]
    }

    /// A rectangle of `a` x `b` meters in the plane, rotated by `angle`.
    fn planar_rect(a: f64, b: f64, angle: f64) -> Vec<Coord<f64>> {
        let (s, c) = angle.sin_cos();
        [(0.0, 0.0), (a, 0.0), (a, b), (0.0, b)]
            .iter()
            .map(|&(x, y)| Coord {
                x: 1000.0 + x * c - y * s,
                y: 2000.0 + x * s + y * c,
            })
            .collect()
    }

    fn polygon(coords: Vec<Coord<f64>>) -> Polygon<f64> {
        Polygon::new(LineString::from(coords), vec![])
    }

    #[test]
    fn planar_rectangle_area_and_sides() {
        for angle in [0.0, 0.3, 1.1, 2.5] {
            let p = polygon(planar_rect(87.0, 23.5, angle));
            assert!((p.unsigned_area() - 87.0 * 23.5).abs() < 1e-6);
            let (length, width) = planar_length_width(&p);
            assert!((length - 87.0).abs() < 1e-6, "angle {angle}: {length}");
            assert!((width - 23.5).abs() < 1e-6, "angle {angle}: {width}");
        }
    }

    #[test]
    fn planar_sides_ignore_winding_and_start_vertex() {
        let mut coords = planar_rect(20.0, 60.0, 0.7);
        let (l0, w0) = planar_length_width(&polygon(coords.clone()));

        coords.reverse();
        let (l1, w1) = planar_length_width(&polygon(coords.clone()));

        coords.rotate_left(2);
        let (l2, w2) = planar_length_width(&polygon(coords));

        assert!((l0 - 60.0).abs() < 1e-6 && (w0 - 20.0).abs() < 1e-6);
        assert!((l0 - l1).abs() < 1e-6 && (w0 - w1).abs() < 1e-6);
        assert!((l0 - l2).abs() < 1e-6 && (w0 - w2).abs() < 1e-6);
    }

    #[test]
    fn planar_sides_of_reflected_rectangle() {
        let coords: Vec<Coord<f64>> = planar_rect(40.0, 15.0, 0.4)
            .into_iter()
            .map(|c| Coord { x: -c.x, y: c.y })
            .collect();
        let (length, width) = planar_length_width(&polygon(coords));
        assert!((length - 40.0).abs() < 1e-6);
        assert!((width - 15.0).abs() < 1e-6);
    }

    #[test]
    fn geodetic_rectangle_measures_close_to_nominal() {
        let ring = geodetic_rect(100.0, 30.0);
        let metrics = compute_metrics(&ring);
        assert!((metrics.area_square_meters - 3000.0).abs() / 3000.0 < 0.01);
        assert!((metrics.length_meters - 100.0).abs() < 1.0);
        assert!((metrics.width_meters - 30.0).abs() < 0.3);
        assert!(metrics.length_meters >= metrics.width_meters);
    }

    #[test]
    fn geodetic_metrics_ignore_winding() {
        let ring = geodetic_rect(50.0, 80.0);
        let mut reversed = ring.clone();
        reversed.reverse();

        let a = compute_metrics(&ring);
        let b = compute_metrics(&reversed);
        assert!((a.area_square_meters - b.area_square_meters).abs() < 1e-6);
        assert!((a.length_meters - b.length_meters).abs() < 1e-6);
        assert!((a.width_meters - b.width_meters).abs() < 1e-6);
    }

    #[test]
    fn area_matches_metrics_area() {
        let ring = geodetic_rect(42.0, 17.0);
        let (length, width) = oriented_length_width(&ring);
        let metrics = compute_metrics(&ring);
        assert!((area_square_meters(&ring) - metrics.area_square_meters).abs() < 1e-9);
        assert!((length - metrics.length_meters).abs() < 1e-9);
        assert!((width - metrics.width_meters).abs() < 1e-9);
    }

    #[test]
    fn degenerate_rings_measure_zero() {
        assert!(area_square_meters(&[]).abs() < f64::EPSILON);
        let two = [LatLon::new(LAT0, LON0), LatLon::new(LAT0, LON0 + 0.001)];
        assert!(area_square_meters(&two).abs() < f64::EPSILON);
        assert_eq!(compute_metrics(&two), BuildingMetrics::default());

        let collinear = [
            LatLon::new(LAT0, LON0),
            LatLon::new(LAT0, LON0 + 0.001),
            LatLon::new(LAT0, LON0 + 0.002),
            LatLon::new(LAT0, LON0),
        ];
        // A parallel is very slightly curved in the projected plane.
        assert!(area_square_meters(&collinear) < 1.0);
    }

    #[test]
    fn centroid_of_rectangle_is_its_center() {
        let ring = geodetic_rect(100.0, 100.0);
        let c = centroid(&ring).unwrap();
        let lat_mid = (ring[0].lat + ring[2].lat) / 2.0;
        let lon_mid = (ring[0].lon + ring[2].lon) / 2.0;
        assert!((c.lat - lat_mid).abs() < 1e-9);
        assert!((c.lon - lon_mid).abs() < 1e-9);
    }
}
