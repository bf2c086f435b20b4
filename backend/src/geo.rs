use crate::models::Coordinate;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
/// Length of one degree of latitude on the mean sphere.
pub const METERS_PER_DEGREE_LAT: f64 = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;

pub fn haversine_m(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlng = (dlng / 2.0).sin();

    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlng * sin_dlng;
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

pub fn path_length_m(path: &[Coordinate]) -> f64 {
    path.windows(2).map(|w| haversine_m(w[0], w[1])).sum()
}

pub fn meters_to_lat_deg(meters: f64) -> f64 {
    meters / METERS_PER_DEGREE_LAT
}

/// Degree-equivalent of `meters` along a parallel at `at_lat`.
pub fn meters_to_lng_deg(meters: f64, at_lat: f64) -> f64 {
    let cos_lat = at_lat.to_radians().cos().abs().max(0.01);
    meters / (METERS_PER_DEGREE_LAT * cos_lat)
}

/// Moves `coord` by the given metric displacement (flat-earth approximation).
pub fn offset(coord: Coordinate, north_m: f64, east_m: f64) -> Coordinate {
    Coordinate {
        lat: coord.lat + meters_to_lat_deg(north_m),
        lng: coord.lng + meters_to_lng_deg(east_m, coord.lat),
    }
}

/// Unit normal to the start→end axis, in degree space.
pub fn perpendicular_unit(start: Coordinate, end: Coordinate) -> Coordinate {
    let dx = end.lng - start.lng;
    let dy = end.lat - start.lat;
    let len = (dx * dx + dy * dy).sqrt().max(f64::EPSILON);
    Coordinate {
        lng: -dy / len,
        lat: dx / len,
    }
}

/// Minimum distance from `point` to any segment of `path`, projected on a
/// local equirectangular plane around the point.
pub fn distance_to_path_m(point: Coordinate, path: &[Coordinate]) -> Option<f64> {
    match path {
        [] => None,
        [only] => Some(haversine_m(point, *only)),
        _ => path
            .windows(2)
            .map(|w| distance_to_segment_m(point, w[0], w[1]))
            .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)),
    }
}

fn distance_to_segment_m(p: Coordinate, a: Coordinate, b: Coordinate) -> f64 {
    let scale_x = METERS_PER_DEGREE_LAT * p.lat.to_radians().cos();
    let to_local = |c: Coordinate| {
        (
            (c.lng - p.lng) * scale_x,
            (c.lat - p.lat) * METERS_PER_DEGREE_LAT,
        )
    };
    let (ax, ay) = to_local(a);
    let (bx, by) = to_local(b);
    let (dx, dy) = (bx - ax, by - ay);
    let len_sq = dx * dx + dy * dy;
    if len_sq <= f64::EPSILON {
        return haversine_m(p, a);
    }
    let t = (-(ax * dx + ay * dy) / len_sq).clamp(0.0, 1.0);
    let closest = a.interpolate(b, t);
    haversine_m(p, closest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_same_point() {
        let point = Coordinate::new(-12.1186, -77.0318);
        assert_eq!(haversine_m(point, point), 0.0);
    }

    #[test]
    fn test_haversine_known_distance() {
        // One degree of latitude along a meridian.
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(1.0, 0.0);
        assert!((haversine_m(a, b) - METERS_PER_DEGREE_LAT).abs() < 1e-6);
    }

    #[test]
    fn test_path_length_empty_and_single() {
        assert_eq!(path_length_m(&[]), 0.0);
        assert_eq!(path_length_m(&[Coordinate::new(1.0, 1.0)]), 0.0);
    }

    #[test]
    fn test_offset_roundtrips_through_haversine() {
        let origin = Coordinate::new(-12.1, -77.03);
        let moved = offset(origin, 300.0, 0.0);
        assert!((haversine_m(origin, moved) - 300.0).abs() < 0.5);
        let moved = offset(origin, 0.0, 300.0);
        assert!((haversine_m(origin, moved) - 300.0).abs() < 0.5);
    }

    #[test]
    fn test_distance_to_path_projects_onto_segment() {
        let path = [Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 0.02)];
        let above_middle = offset(Coordinate::new(0.0, 0.01), 100.0, 0.0);
        let d = distance_to_path_m(above_middle, &path).unwrap();
        assert!((d - 100.0).abs() < 0.5, "got {d}");
        assert!(distance_to_path_m(above_middle, &[]).is_none());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn valid_coord() -> impl Strategy<Value = Coordinate> {
            (-90.0..=90.0, -180.0..=180.0).prop_map(|(lat, lng)| Coordinate { lat, lng })
        }

        proptest! {
            #[test]
            fn prop_haversine_symmetric(a in valid_coord(), b in valid_coord()) {
                prop_assert!((haversine_m(a, b) - haversine_m(b, a)).abs() < 1e-6);
            }

            #[test]
            fn prop_haversine_bounded_by_half_circumference(a in valid_coord(), b in valid_coord()) {
                let dist = haversine_m(a, b);
                prop_assert!(dist >= 0.0);
                prop_assert!(dist <= std::f64::consts::PI * EARTH_RADIUS_M + 1.0);
            }

            #[test]
            fn prop_haversine_triangle_inequality(
                a in valid_coord(),
                b in valid_coord(),
                c in valid_coord()
            ) {
                prop_assert!(haversine_m(a, c) <= haversine_m(a, b) + haversine_m(b, c) + 1e-3);
            }

            #[test]
            fn prop_path_length_additive(
                path1 in prop::collection::vec(valid_coord(), 2..5),
                path2 in prop::collection::vec(valid_coord(), 2..5)
            ) {
                let mut combined = path1.clone();
                combined.extend_from_slice(&path2);
                let connection = haversine_m(*path1.last().unwrap(), path2[0]);
                let expected = path_length_m(&path1) + connection + path_length_m(&path2);
                prop_assert!((path_length_m(&combined) - expected).abs() < 1e-3);
            }

            #[test]
            fn prop_perpendicular_unit_is_perpendicular(start in valid_coord(), end in valid_coord()) {
                prop_assume!((start.lat - end.lat).abs() > 1e-6 || (start.lng - end.lng).abs() > 1e-6);
                let perp = perpendicular_unit(start, end);
                let dot = (end.lat - start.lat) * perp.lat + (end.lng - start.lng) * perp.lng;
                prop_assert!(dot.abs() < 1e-6);
                prop_assert!(((perp.lat * perp.lat + perp.lng * perp.lng).sqrt() - 1.0).abs() < 1e-6);
            }
        }
    }
}
