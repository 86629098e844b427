//! Great-circle geometry helpers.
//!
//! Distances use the haversine formula on a spherical Earth of radius
//! 6371 km. All functions are pure.

mod types;

pub use types::{Coordinate, GeoError, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance between two coordinates in meters.
///
/// Symmetric and zero for identical points.
#[inline]
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // Rounding can push h a hair above 1 for antipodal points.
    let h = h.clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Shortest distance in meters from `point` to a polyline.
///
/// Each segment is measured on a local equirectangular projection centred
/// on `point`, which is accurate at the scale of route deviation checks
/// (tens to hundreds of meters). Returns `None` for an empty path.
pub fn distance_to_path_meters(point: Coordinate, path: &[Coordinate]) -> Option<f64> {
    match path {
        [] => None,
        [only] => Some(distance_meters(point, *only)),
        _ => path
            .windows(2)
            .map(|seg| distance_to_segment_meters(point, seg[0], seg[1]))
            .min_by(|a, b| a.total_cmp(b)),
    }
}

fn distance_to_segment_meters(point: Coordinate, start: Coordinate, end: Coordinate) -> f64 {
    let cos_lat = point.latitude.to_radians().cos();
    let project = |c: Coordinate| -> (f64, f64) {
        let x = (c.longitude - point.longitude).to_radians() * cos_lat * EARTH_RADIUS_M;
        let y = (c.latitude - point.latitude).to_radians() * EARTH_RADIUS_M;
        (x, y)
    };

    let (ax, ay) = project(start);
    let (bx, by) = project(end);
    let (dx, dy) = (bx - ax, by - ay);
    let len_sq = dx * dx + dy * dy;

    if len_sq == 0.0 {
        return distance_meters(point, start);
    }

    // Point sits at the origin of the projection.
    let t = (-(ax * dx + ay * dy) / len_sq).clamp(0.0, 1.0);
    let (cx, cy) = (ax + t * dx, ay + t * dy);
    (cx * cx + cy * cy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    #[test]
    fn test_identical_points_zero() {
        let a = coord(53.55, 9.99);
        assert_eq!(distance_meters(a, a), 0.0);
    }

    #[test]
    fn test_thousandth_degree_at_equator() {
        let d = distance_meters(coord(0.0, 0.0), coord(0.0, 0.001));
        assert!((d - 111.19).abs() < 111.19 * 0.01, "got {d}");
    }

    #[test]
    fn test_known_city_pair() {
        // Hamburg to Berlin, roughly 255 km.
        let d = distance_meters(coord(53.5511, 9.9937), coord(52.5200, 13.4050));
        assert!((d - 255_000.0).abs() < 5_000.0, "got {d}");
    }

    #[test]
    fn test_antipodal_points_finite() {
        let d = distance_meters(coord(0.0, 0.0), coord(0.0, 180.0));
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_M).abs() < 1.0);
    }

    #[test]
    fn test_distance_to_path_empty() {
        assert!(distance_to_path_meters(coord(0.0, 0.0), &[]).is_none());
    }

    #[test]
    fn test_distance_to_path_perpendicular() {
        // Path runs east along the equator; point is ~111 m north of it.
        let path = [coord(0.0, -0.01), coord(0.0, 0.01)];
        let d = distance_to_path_meters(coord(0.001, 0.0), &path).unwrap();
        assert!((d - 111.19).abs() < 1.0, "got {d}");
    }

    #[test]
    fn test_distance_to_path_beyond_endpoint() {
        let path = [coord(0.0, 0.0), coord(0.0, 0.001)];
        let d = distance_to_path_meters(coord(0.0, 0.002), &path).unwrap();
        assert!((d - 111.19).abs() < 1.5, "got {d}");
    }

    #[test]
    fn test_distance_to_path_single_point() {
        let d = distance_to_path_meters(coord(0.0, 0.0), &[coord(0.0, 0.001)]).unwrap();
        assert!((d - 111.19).abs() < 1.5);
    }

    fn any_coord() -> impl Strategy<Value = Coordinate> {
        (MIN_LAT..=MAX_LAT, MIN_LON..=MAX_LON).prop_map(|(lat, lon)| coord(lat, lon))
    }

    proptest! {
        #[test]
        fn prop_distance_symmetric(a in any_coord(), b in any_coord()) {
            let ab = distance_meters(a, b);
            let ba = distance_meters(b, a);
            prop_assert!((ab - ba).abs() < 1e-6);
        }

        #[test]
        fn prop_distance_to_self_zero(a in any_coord()) {
            prop_assert_eq!(distance_meters(a, a), 0.0);
        }

        #[test]
        fn prop_distance_bounded(a in any_coord(), b in any_coord()) {
            let d = distance_meters(a, b);
            prop_assert!(d >= 0.0);
            prop_assert!(d <= std::f64::consts::PI * EARTH_RADIUS_M + 1.0);
        }
    }
}
