use std::f64::consts::PI;

use rand::Rng;

use crate::{
    config::SynthesisConfig,
    geo::{haversine_m, meters_to_lat_deg, meters_to_lng_deg, perpendicular_unit},
    models::{Coordinate, TransportMode},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Orthogonal city-block moves, used inside the configured metro area.
    Grid,
    /// Bézier arc bent away from the straight line.
    OpenTerrain,
}

pub fn classify(origin: Coordinate, config: &SynthesisConfig) -> Strategy {
    if config.grid_area.contains(origin) {
        Strategy::Grid
    } else {
        Strategy::OpenTerrain
    }
}

pub fn target_point_count(direct_m: f64, mode: TransportMode, config: &SynthesisConfig) -> usize {
    let min = config.min_points.get(mode).max(2);
    let max = config.max_points.max(min);
    let raw = (direct_m / config.step_m(mode)).ceil();
    if raw.is_finite() && raw > 0.0 {
        (raw as usize).clamp(min, max)
    } else {
        min
    }
}

/// Builds a coarse synthetic route from `origin` to `destination`.
///
/// The result always has at least two points, starts exactly at `origin`
/// and ends exactly at `destination`, whatever the random draws were.
pub fn synthesize<R: Rng>(
    origin: Coordinate,
    destination: Coordinate,
    mode: TransportMode,
    config: &SynthesisConfig,
    rng: &mut R,
) -> Vec<Coordinate> {
    let direct_m = haversine_m(origin, destination);
    let num_points = target_point_count(direct_m, mode, config);
    let strategy = classify(origin, config);

    let raw = match strategy {
        Strategy::Grid => grid_path(origin, destination, num_points, config, rng),
        Strategy::OpenTerrain => open_terrain_path(origin, destination, num_points, config, rng),
    };
    let path = finalize(raw, origin, destination);

    tracing::debug!(
        "synthesized {:?} route for {mode}: {:.0}m direct, {} target points, {} emitted",
        strategy,
        direct_m,
        num_points,
        path.len()
    );
    path
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Axis {
    Vertical,
    Horizontal,
}

impl Axis {
    fn other(self) -> Self {
        match self {
            Axis::Vertical => Axis::Horizontal,
            Axis::Horizontal => Axis::Vertical,
        }
    }
}

fn grid_path<R: Rng>(
    origin: Coordinate,
    destination: Coordinate,
    num_points: usize,
    config: &SynthesisConfig,
    rng: &mut R,
) -> Vec<Coordinate> {
    let block_lat = meters_to_lat_deg(config.block_m);
    let block_lng = meters_to_lng_deg(config.block_m, origin.lat);
    let max_blocks = config.max_blocks_per_move.max(1);
    // Origin plus at least one closing point plus the destination.
    let budget = num_points.saturating_sub(3).max(1);

    // Remaining deltas expressed in block units, so both axes compare fairly.
    let remaining_blocks = |c: Coordinate| {
        (
            (destination.lat - c.lat).abs() / block_lat,
            (destination.lng - c.lng).abs() / block_lng,
        )
    };

    let mut path = Vec::with_capacity(num_points + 2);
    path.push(origin);
    let mut current = origin;
    let (v, h) = remaining_blocks(current);
    let mut axis = if v >= h { Axis::Vertical } else { Axis::Horizontal };

    for step in 0..budget {
        let (v_left, h_left) = remaining_blocks(current);
        if v_left <= f64::EPSILON && h_left <= f64::EPSILON {
            break;
        }
        let (this_left, other_left) = match axis {
            Axis::Vertical => (v_left, h_left),
            Axis::Horizontal => (h_left, v_left),
        };
        if this_left <= f64::EPSILON {
            axis = axis.other();
            continue;
        }

        let blocks = rng.random_range(1..=max_blocks) as f64;
        let moved = blocks.min(this_left);
        match axis {
            Axis::Vertical => {
                current.lat += (destination.lat - current.lat).signum() * moved * block_lat;
                if moved >= this_left {
                    current.lat = destination.lat;
                }
            }
            Axis::Horizontal => {
                current.lng += (destination.lng - current.lng).signum() * moved * block_lng;
                if moved >= this_left {
                    current.lng = destination.lng;
                }
            }
        }
        path.push(current);

        let progress = (step + 1) as f64 / budget as f64;
        let mut switch_p = config.switch_base + config.switch_ramp * progress;
        if other_left > this_left - moved {
            switch_p += config.switch_bias;
        }
        if this_left - moved <= f64::EPSILON || rng.random_bool(switch_p.clamp(0.0, 1.0)) {
            axis = axis.other();
        }
    }

    let closing = rng.random_range(1..=2);
    for k in 1..=closing {
        let t = k as f64 / (closing + 1) as f64;
        path.push(current.interpolate(destination, t));
    }
    path.push(destination);
    path
}

fn open_terrain_path<R: Rng>(
    origin: Coordinate,
    destination: Coordinate,
    num_points: usize,
    config: &SynthesisConfig,
    rng: &mut R,
) -> Vec<Coordinate> {
    let controls = control_chain(origin, destination, config, rng);
    let samples = num_points.max(2);
    (0..samples)
        .map(|i| {
            let t = i as f64 / (samples - 1) as f64;
            bezier_point(&controls, t)
        })
        .collect()
}

/// Origin, 1..=max intermediate points pushed sideways under a sine envelope, destination.
fn control_chain<R: Rng>(
    origin: Coordinate,
    destination: Coordinate,
    config: &SynthesisConfig,
    rng: &mut R,
) -> Vec<Coordinate> {
    let direct_m = haversine_m(origin, destination);
    let intermediates = rng.random_range(1..=config.max_control_points.max(1));
    let max_offset_m = (direct_m * config.offset_ratio).min(config.max_offset_m);
    let max_offset_deg = meters_to_lat_deg(max_offset_m);
    let side = if rng.random_bool(0.5) { 1.0 } else { -1.0 };
    let perp = perpendicular_unit(origin, destination);

    let mut controls = Vec::with_capacity(intermediates + 2);
    controls.push(origin);
    for j in 1..=intermediates {
        let t = j as f64 / (intermediates + 1) as f64;
        let envelope = (PI * t).sin();
        let magnitude = max_offset_deg * envelope * rng.random_range(0.6..=1.0) * side;
        let base = origin.interpolate(destination, t);
        controls.push(Coordinate {
            lat: base.lat + perp.lat * magnitude,
            lng: base.lng + perp.lng * magnitude,
        });
    }
    controls.push(destination);
    controls
}

/// Evaluates the control chain at `t` in [0, 1] with cubic Bézier segments.
///
/// Short chains duplicate points to fill a cubic; long chains are cut into
/// 4-point windows starting every third point so neighbouring windows share
/// their joint.
pub fn bezier_point(controls: &[Coordinate], t: f64) -> Coordinate {
    let t = t.clamp(0.0, 1.0);
    match controls {
        [] => Coordinate::new(f64::NAN, f64::NAN),
        [only] => *only,
        [a, b] => cubic(*a, *a, *b, *b, t),
        [a, b, c] => cubic(*a, *b, *b, *c, t),
        [a, b, c, d] => cubic(*a, *b, *c, *d, t),
        _ => {
            let last = controls.len() - 1;
            let windows = last.div_ceil(3);
            let scaled = t * windows as f64;
            let window = (scaled.floor() as usize).min(windows - 1);
            let local = scaled - window as f64;
            let at = |i: usize| controls[(window * 3 + i).min(last)];
            cubic(at(0), at(1), at(2), at(3), local)
        }
    }
}

fn cubic(p0: Coordinate, p1: Coordinate, p2: Coordinate, p3: Coordinate, t: f64) -> Coordinate {
    let u = 1.0 - t;
    let b0 = u * u * u;
    let b1 = 3.0 * u * u * t;
    let b2 = 3.0 * u * t * t;
    let b3 = t * t * t;
    Coordinate {
        lat: b0 * p0.lat + b1 * p1.lat + b2 * p2.lat + b3 * p3.lat,
        lng: b0 * p0.lng + b1 * p1.lng + b2 * p2.lng + b3 * p3.lng,
    }
}

/// Drops consecutive duplicates and pins both endpoints to the request.
pub fn finalize(raw: Vec<Coordinate>, origin: Coordinate, destination: Coordinate) -> Vec<Coordinate> {
    let mut path: Vec<Coordinate> = Vec::with_capacity(raw.len() + 2);
    path.push(origin);
    for point in raw.into_iter().skip(1) {
        if path.last() != Some(&point) {
            path.push(point);
        }
    }
    if path.len() < 2 || path.last() != Some(&destination) {
        path.push(destination);
    }
    path
}
