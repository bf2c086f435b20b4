use rand::Rng;

use crate::{
    config::{SmoothingConfig, MAX_JITTER_DEG},
    models::Coordinate,
};

/// Refines a coarse polyline with Catmull-Rom interpolation.
///
/// Original vertices are kept as-is; `samples_per_segment` points are
/// inserted between each pair and nudged by at most `jitter_deg` on each
/// axis. Paths with fewer than three points are returned unchanged.
pub fn smooth<R: Rng>(path: &[Coordinate], config: &SmoothingConfig, rng: &mut R) -> Vec<Coordinate> {
    if path.len() < 3 || config.samples_per_segment == 0 {
        return path.to_vec();
    }

    let k = config.samples_per_segment;
    let jitter = if config.jitter_deg.is_finite() {
        config.jitter_deg.abs().min(MAX_JITTER_DEG)
    } else {
        0.0
    };
    let tangents = tangents(path);
    let mut out = Vec::with_capacity(path.len() + (path.len() - 1) * k);
    out.push(path[0]);

    for i in 0..path.len() - 1 {
        let (p0, p1) = (path[i], path[i + 1]);
        let (m0, m1) = (tangents[i], tangents[i + 1]);
        for j in 1..=k {
            let t = j as f64 / (k + 1) as f64;
            let mut point = hermite(p0, m0, p1, m1, t);
            if jitter > 0.0 {
                point.lat += rng.random_range(-jitter..=jitter);
                point.lng += rng.random_range(-jitter..=jitter);
            }
            out.push(point);
        }
        out.push(p1);
    }

    out
}

/// Central differences inside the path, one-sided differences at the ends.
fn tangents(path: &[Coordinate]) -> Vec<Coordinate> {
    let last = path.len() - 1;
    (0..=last)
        .map(|i| {
            let (prev, next, scale) = match i {
                0 => (path[0], path[1], 1.0),
                i if i == last => (path[last - 1], path[last], 1.0),
                i => (path[i - 1], path[i + 1], 0.5),
            };
            Coordinate {
                lat: (next.lat - prev.lat) * scale,
                lng: (next.lng - prev.lng) * scale,
            }
        })
        .collect()
}

fn hermite(p0: Coordinate, m0: Coordinate, p1: Coordinate, m1: Coordinate, t: f64) -> Coordinate {
    let t2 = t * t;
    let t3 = t2 * t;
    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = t3 - 2.0 * t2 + t;
    let h01 = -2.0 * t3 + 3.0 * t2;
    let h11 = t3 - t2;
    Coordinate {
        lat: h00 * p0.lat + h10 * m0.lat + h01 * p1.lat + h11 * m1.lat,
        lng: h00 * p0.lng + h10 * m0.lng + h01 * p1.lng + h11 * m1.lng,
    }
}
