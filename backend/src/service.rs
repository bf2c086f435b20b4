use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use chrono::{DateTime, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    config::EngineConfig,
    directions::{DirectionsProvider, ProviderError},
    error::RouteError,
    geo::path_length_m,
    gpx_export::encode_route_as_gpx,
    models::{
        Coordinate, GeometrySource, NearbyPoint, RouteBounds, SafeRouteResponse, TransportMode,
    },
    proximity::{GatewayError, NearbyQuery, ProximityGateway},
    safety::SafetyScorer,
    smoothing::smooth,
    synthesis::synthesize,
    synthetic_points,
};

/// Route geometry resolved for one request, before scoring.
#[derive(Debug, Clone)]
pub struct ResolvedRoute {
    pub path: Vec<Coordinate>,
    pub bounding_box: RouteBounds,
    pub distance_m: f64,
    pub duration_s: f64,
    pub source: GeometrySource,
}

/// Orchestrates geometry resolution, proximity lookup and scoring.
///
/// # Failure handling
/// - Directions provider: one attempt under a timeout. Any failure (network,
///   status, timeout, undecodable geometry) falls back to synthesis.
/// - Proximity gateway: on failure the route gets the base score and no
///   gateway points; synthetic placeholders may be attached for display.
/// - Only invalid input is returned as an error.
pub struct SafeRouteService {
    config: EngineConfig,
    provider: Option<Arc<dyn DirectionsProvider>>,
    gateway: Option<Arc<dyn ProximityGateway>>,
    provider_enabled: AtomicBool,
    scorer: SafetyScorer,
}

impl SafeRouteService {
    pub fn new(
        config: EngineConfig,
        provider: Option<Arc<dyn DirectionsProvider>>,
        gateway: Option<Arc<dyn ProximityGateway>>,
    ) -> Self {
        let provider_enabled = AtomicBool::new(config.provider.enabled);
        let scorer = SafetyScorer::new(config.scoring.clone());
        Self {
            config,
            provider,
            gateway,
            provider_enabled,
            scorer,
        }
    }

    pub fn provider_enabled(&self) -> bool {
        self.provider_enabled.load(Ordering::Acquire)
    }

    /// Runtime switch for the real directions provider; takes effect on the next request.
    pub fn set_provider_enabled(&self, enabled: bool) {
        let previous = self.provider_enabled.swap(enabled, Ordering::AcqRel);
        if previous != enabled {
            tracing::info!("directions provider switched {}", if enabled { "on" } else { "off" });
        }
    }

    pub async fn compute_safe_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        mode: TransportMode,
    ) -> Result<SafeRouteResponse, RouteError> {
        let mut rng = StdRng::from_os_rng();
        self.compute_safe_route_with_rng(origin, destination, mode, &mut rng, Utc::now())
            .await
    }

    /// Same as [`compute_safe_route`](Self::compute_safe_route) with an explicit
    /// random source and reference instant.
    pub async fn compute_safe_route_with_rng<R: Rng + Send>(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        mode: TransportMode,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Result<SafeRouteResponse, RouteError> {
        validate_endpoints(origin, destination)?;

        let resolved = self.resolve_geometry(origin, destination, mode, rng).await;
        tracing::info!(
            "route {:?} -> {:?} ({mode}) resolved from {:?}: {} points, {:.0}m",
            origin,
            destination,
            resolved.source,
            resolved.path.len(),
            resolved.distance_m
        );

        let radius_m = self.config.scoring.radius_m;
        let (safety_score, nearby_points) = match self.nearby(&resolved.path, radius_m).await {
            Some(nearby) => {
                let score = self.scorer.score(
                    &resolved.path,
                    &nearby.security_points,
                    &nearby.incidents,
                    radius_m,
                    now,
                );
                for contribution in self.scorer.breakdown(
                    &nearby.security_points,
                    &nearby.incidents,
                    radius_m,
                    now,
                ) {
                    tracing::debug!("score contribution {}: {:+.2}", contribution.id, contribution.value);
                }
                (score, to_nearby_points(&nearby))
            }
            None => {
                let placeholders = if self.config.gateway.synthetic_fallback {
                    synthetic_points::generate(&resolved.path, &self.config.synthetic, rng)
                } else {
                    Vec::new()
                };
                (self.scorer.base_score(), placeholders)
            }
        };

        let gpx_base64 = match encode_route_as_gpx(&resolved.path, &format!("{mode} route")) {
            Ok(encoded) => encoded,
            Err(err) => {
                tracing::warn!("GPX export failed: {err}");
                String::new()
            }
        };

        Ok(SafeRouteResponse {
            route: resolved.path,
            bounding_box: resolved.bounding_box,
            distance_m: resolved.distance_m,
            duration_s: resolved.duration_s,
            safety_score,
            nearby_points,
            geometry_source: resolved.source,
            gpx_base64,
        })
    }

    /// Provider geometry when available, synthesized geometry otherwise.
    pub async fn resolve_geometry<R: Rng + Send>(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        mode: TransportMode,
        rng: &mut R,
    ) -> ResolvedRoute {
        if let Some(provider) = self.provider.as_deref().filter(|_| self.provider_enabled()) {
            match self.fetch_from_provider(provider, origin, destination, mode).await {
                Ok(route) => return route,
                Err(err) => {
                    tracing::warn!("directions provider failed, synthesizing route instead: {err}");
                }
            }
        }
        self.synthesize_route(origin, destination, mode, rng)
    }

    async fn fetch_from_provider(
        &self,
        provider: &dyn DirectionsProvider,
        origin: Coordinate,
        destination: Coordinate,
        mode: TransportMode,
    ) -> Result<ResolvedRoute, ProviderError> {
        let timeout = self.config.provider.timeout();
        let route = tokio::time::timeout(timeout, provider.get_route(origin, destination, mode))
            .await
            .map_err(|_| ProviderError::Timeout(self.config.provider.timeout_ms))??;

        let decoded = route.geometry.to_path(self.config.provider.polyline_precision)?;
        if decoded.len() < 2 {
            return Err(ProviderError::Malformed(format!(
                "geometry has {} point(s)",
                decoded.len()
            )));
        }
        if let Some(bad) = decoded.iter().find(|c| !c.is_valid()) {
            return Err(ProviderError::Malformed(format!("coordinate out of range: {bad:?}")));
        }

        let path = pin_endpoints(decoded, origin, destination);
        let distance_m = positive_or(route.summary.distance_m, || path_length_m(&path));
        let duration_s = positive_or(route.summary.duration_s, || {
            self.estimate_duration_s(distance_m, mode)
        });
        let bounding_box = route
            .bounding_box
            .filter(|b| b.contains(origin) && b.contains(destination))
            .or_else(|| RouteBounds::from_path(&path))
            .unwrap_or_else(|| point_bounds(origin));

        Ok(ResolvedRoute {
            path,
            bounding_box,
            distance_m,
            duration_s,
            source: GeometrySource::Provider,
        })
    }

    fn synthesize_route<R: Rng>(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        mode: TransportMode,
        rng: &mut R,
    ) -> ResolvedRoute {
        let coarse = synthesize(origin, destination, mode, &self.config.synthesis, rng);
        let path = smooth(&coarse, &self.config.smoothing, rng);
        let distance_m = path_length_m(&path);
        let bounding_box = RouteBounds::from_path(&path).unwrap_or_else(|| point_bounds(origin));

        ResolvedRoute {
            duration_s: self.estimate_duration_s(distance_m, mode),
            path,
            bounding_box,
            distance_m,
            source: GeometrySource::Synthesized,
        }
    }

    fn estimate_duration_s(&self, distance_m: f64, mode: TransportMode) -> f64 {
        let speed = self.config.synthesis.speed_mps.get(mode);
        if speed > 0.0 {
            distance_m / speed
        } else {
            0.0
        }
    }

    /// Gateway lookup; `None` when no gateway is configured or it failed.
    async fn nearby(&self, path: &[Coordinate], buffer_m: f64) -> Option<NearbyQuery> {
        let Some(gateway) = self.gateway.as_deref() else {
            tracing::debug!("no proximity gateway configured, scoring with base value");
            return None;
        };
        let timeout = self.config.gateway.timeout();
        let result = match tokio::time::timeout(timeout, gateway.query(path, buffer_m)).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(self.config.gateway.timeout_ms)),
        };
        match result {
            Ok(nearby) => {
                tracing::debug!(
                    "gateway returned {} security points and {} incidents within {buffer_m}m",
                    nearby.security_points.len(),
                    nearby.incidents.len()
                );
                Some(nearby)
            }
            Err(err) => {
                tracing::warn!("proximity gateway failed, using base score: {err}");
                None
            }
        }
    }
}

pub fn validate_endpoints(origin: Coordinate, destination: Coordinate) -> Result<(), RouteError> {
    for (label, coord) in [("origin", origin), ("destination", destination)] {
        if !coord.is_valid() {
            return Err(RouteError::InvalidInput(format!(
                "{label} must be finite WGS84 degrees, got ({}, {})",
                coord.lat, coord.lng
            )));
        }
    }
    Ok(())
}

/// Makes the provider path start at `origin` and end at `destination` exactly.
fn pin_endpoints(
    mut path: Vec<Coordinate>,
    origin: Coordinate,
    destination: Coordinate,
) -> Vec<Coordinate> {
    if path.first() != Some(&origin) {
        path.insert(0, origin);
    }
    if path.last() != Some(&destination) {
        path.push(destination);
    }
    path
}

fn positive_or(value: f64, fallback: impl FnOnce() -> f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback()
    }
}

fn point_bounds(c: Coordinate) -> RouteBounds {
    RouteBounds {
        min_lat: c.lat,
        max_lat: c.lat,
        min_lng: c.lng,
        max_lng: c.lng,
    }
}

fn to_nearby_points(nearby: &NearbyQuery) -> Vec<NearbyPoint> {
    let mut points: Vec<NearbyPoint> = nearby
        .security_points
        .iter()
        .map(NearbyPoint::from)
        .chain(nearby.incidents.iter().map(NearbyPoint::from))
        .collect();
    points.sort_by(|a, b| {
        a.distance_m
            .partial_cmp(&b.distance_m)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    points
}
