//! Placeholder points shown when the proximity gateway cannot be reached.
//!
//! Everything produced here carries [`Provenance::Synthetic`] and is never
//! fed to the safety scorer.

use std::f64::consts::TAU;

use rand::{seq::IndexedRandom, Rng};

use crate::{
    config::SyntheticConfig,
    geo::{haversine_m, offset},
    models::{Coordinate, IncidentType, NearbyKind, NearbyPoint, Provenance, SecurityCategory},
};

const SECURITY_DESCRIPTIONS: &[(SecurityCategory, &[&str])] = &[
    (SecurityCategory::Patrol, &["Police station", "Patrol checkpoint", "Municipal security post"]),
    (SecurityCategory::Monitored, &["CCTV monitored corner", "Neighbourhood watch zone"]),
    (SecurityCategory::Lighting, &["Well-lit avenue", "Street lighting cluster", "Lit pedestrian crossing"]),
    (SecurityCategory::Commercial, &["24h convenience store", "Busy shopping strip", "Pharmacy open late"]),
    (SecurityCategory::Hospital, &["Health centre", "Emergency clinic"]),
    (SecurityCategory::Park, &["Neighbourhood park", "Public square"]),
    (SecurityCategory::Risk, &["Poorly lit underpass", "Vacant lot"]),
];

const INCIDENT_DESCRIPTIONS: &[(IncidentType, &[&str])] = &[
    (IncidentType::Robbery, &["Reported phone snatching", "Reported mugging"]),
    (IncidentType::Harassment, &["Reported street harassment"]),
    (IncidentType::Accident, &["Reported traffic collision", "Reported cyclist fall"]),
    (IncidentType::Other, &["Reported vandalism", "Reported disturbance"]),
];

/// Chance that a generated entry is an incident rather than a security point.
const INCIDENT_SHARE: f64 = 0.3;

pub fn generate<R: Rng>(route: &[Coordinate], config: &SyntheticConfig, rng: &mut R) -> Vec<NearbyPoint> {
    if route.is_empty() {
        return Vec::new();
    }
    let min = config.min_points.min(config.max_points);
    let count = rng.random_range(min..=config.max_points);

    (0..count)
        .map(|i| {
            let anchor = route[rng.random_range(0..route.len())];
            let (kind, name) = if rng.random_bool(INCIDENT_SHARE) {
                let (incident_type, pool) = pick(INCIDENT_DESCRIPTIONS, rng);
                (
                    NearbyKind::Incident {
                        incident_type,
                        occurred_at: None,
                    },
                    pick_name(pool, rng),
                )
            } else {
                let (category, pool) = pick(SECURITY_DESCRIPTIONS, rng);
                (NearbyKind::Security { category }, pick_name(pool, rng))
            };

            let max_offset = match kind {
                NearbyKind::Security {
                    category: SecurityCategory::Lighting,
                } => config.lighting_offset_m,
                _ => config.other_offset_m,
            };
            let location = scatter(anchor, max_offset, rng);

            NearbyPoint {
                id: format!("synthetic-{}", i + 1),
                name,
                kind,
                distance_m: haversine_m(anchor, location),
                location: Some(location),
                provenance: Provenance::Synthetic,
            }
        })
        .collect()
}

fn pick<T: Copy, R: Rng>(table: &[(T, &'static [&'static str])], rng: &mut R) -> (T, &'static [&'static str]) {
    let (kind, pool) = table[rng.random_range(0..table.len())];
    (kind, pool)
}

fn pick_name<R: Rng>(pool: &[&str], rng: &mut R) -> String {
    pool.choose(rng).copied().unwrap_or("Point of interest").to_string()
}

fn scatter<R: Rng>(anchor: Coordinate, max_offset_m: f64, rng: &mut R) -> Coordinate {
    let limit = if max_offset_m.is_finite() { max_offset_m.max(0.0) } else { 0.0 };
    let radius = rng.random_range(0.0..=limit);
    let bearing = rng.random_range(0.0..TAU);
    offset(anchor, radius * bearing.cos(), radius * bearing.sin())
}
