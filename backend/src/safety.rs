use chrono::{DateTime, NaiveDate, Utc};

use crate::{
    config::ScoringConfig,
    models::{Coordinate, Incident, SecurityPoint},
};

/// Computes the 0–100 safety index of a route from the points of interest
/// and incidents the proximity gateway found around it.
///
/// # Formula
/// ```text
/// score = clamp(round(base + Σ security + Σ incidents), 0, 100)
///
/// security  = weight[category] * falloff
/// incidents = weight[type] * recency * falloff
///
/// where:
///   falloff = 1 - distance_m / radius_m      (0 beyond radius_m, hard cutoff)
///   recency = max(0, 1 - days_since / decay_days)
/// ```
///
/// Scoring is a pure function of its inputs: the reference instant is passed
/// in, and nothing here draws random numbers.
#[derive(Debug, Clone, Default)]
pub struct SafetyScorer {
    config: ScoringConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    pub id: String,
    pub value: f64,
}

impl SafetyScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn base_score(&self) -> u8 {
        clamp_score(self.config.base, self.config.base)
    }

    pub fn score(
        &self,
        route: &[Coordinate],
        security_points: &[SecurityPoint],
        incidents: &[Incident],
        radius_m: f64,
        now: DateTime<Utc>,
    ) -> u8 {
        let today = now.date_naive();
        let security: f64 = security_points
            .iter()
            .map(|point| self.security_contribution(point, radius_m))
            .sum();
        let risk: f64 = incidents
            .iter()
            .map(|incident| self.incident_contribution(incident, radius_m, today))
            .sum();
        let score = clamp_score(self.config.base + security + risk, self.config.base);

        tracing::debug!(
            "scored route of {} points: base {:.1}, security {:+.2} from {} points, incidents {:+.2} from {} reports -> {}",
            route.len(),
            self.config.base,
            security,
            security_points.len(),
            risk,
            incidents.len(),
            score
        );
        score
    }

    /// Per-item contributions, in input order (security points first).
    pub fn breakdown(
        &self,
        security_points: &[SecurityPoint],
        incidents: &[Incident],
        radius_m: f64,
        now: DateTime<Utc>,
    ) -> Vec<Contribution> {
        let today = now.date_naive();
        security_points
            .iter()
            .map(|p| Contribution {
                id: p.id.clone(),
                value: self.security_contribution(p, radius_m),
            })
            .chain(incidents.iter().map(|i| Contribution {
                id: i.id.clone(),
                value: self.incident_contribution(i, radius_m, today),
            }))
            .collect()
    }

    fn security_contribution(&self, point: &SecurityPoint, radius_m: f64) -> f64 {
        match falloff(point.distance_m, radius_m) {
            Some(falloff) => self.config.security_weights.weight(point.category) * falloff,
            None => 0.0,
        }
    }

    fn incident_contribution(&self, incident: &Incident, radius_m: f64, today: NaiveDate) -> f64 {
        let Some(falloff) = falloff(incident.distance_m, radius_m) else {
            return 0.0;
        };
        let recency = recency_factor(incident.occurred_at, today, self.config.decay_days);
        if recency == 0.0 {
            return 0.0;
        }
        self.config.incident_weights.weight(incident.incident_type) * recency * falloff
    }
}

/// Linear distance falloff inside the buffer radius (inclusive); `None` outside it.
fn falloff(distance_m: f64, radius_m: f64) -> Option<f64> {
    if !radius_m.is_finite() || radius_m <= 0.0 {
        return None;
    }
    // NaN distances fail this comparison and count as out of range.
    if !(distance_m <= radius_m) {
        return None;
    }
    Some(1.0 - distance_m.max(0.0) / radius_m)
}

pub fn recency_factor(occurred_at: NaiveDate, today: NaiveDate, decay_days: f64) -> f64 {
    if decay_days <= 0.0 {
        return 0.0;
    }
    let days_since = (today - occurred_at).num_days().max(0) as f64;
    (1.0 - days_since / decay_days).max(0.0)
}

fn clamp_score(raw: f64, fallback: f64) -> u8 {
    let value = if raw.is_finite() { raw } else { fallback };
    if !value.is_finite() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}
