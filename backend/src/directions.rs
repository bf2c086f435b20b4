use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    config::ProviderConfig,
    models::{Coordinate, RouteBounds, TransportMode},
    polyline::{self, DecodeError},
};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("directions provider unavailable: {0}")]
    Unavailable(String),
    #[error("directions provider answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("directions provider timed out after {0} ms")]
    Timeout(u64),
    #[error("malformed route geometry: {0}")]
    Decode(#[from] DecodeError),
    #[error("malformed directions response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::Malformed(err.to_string())
        } else {
            ProviderError::Unavailable(err.to_string())
        }
    }
}

/// Route geometry as returned by a provider: an encoded polyline or a
/// GeoJSON `LineString` with `[lng, lat]` positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RouteGeometry {
    Encoded(String),
    GeoJson(LineString),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineString {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Vec<Vec<f64>>,
}

impl RouteGeometry {
    /// Decodes the geometry; `precision` applies to encoded polylines only.
    pub fn to_path(&self, precision: u32) -> Result<Vec<Coordinate>, ProviderError> {
        match self {
            RouteGeometry::Encoded(encoded) => Ok(polyline::decode_with_precision(encoded, precision)?),
            RouteGeometry::GeoJson(line) => {
                if line.kind != "LineString" {
                    return Err(ProviderError::Malformed(format!(
                        "expected LineString geometry, got {}",
                        line.kind
                    )));
                }
                line.coordinates
                    .iter()
                    .map(|position| match position.as_slice() {
                        [lng, lat, ..] => Ok(Coordinate { lat: *lat, lng: *lng }),
                        _ => Err(ProviderError::Malformed(
                            "GeoJSON position with fewer than two values".into(),
                        )),
                    })
                    .collect()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteSummary {
    pub distance_m: f64,
    pub duration_s: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectionsRoute {
    pub geometry: RouteGeometry,
    pub bounding_box: Option<RouteBounds>,
    pub summary: RouteSummary,
}

/// Turn-by-turn directions source.
///
/// Implementations make a single attempt per call; the caller owns the
/// timeout and the fallback to synthesized geometry.
pub trait DirectionsProvider: Send + Sync {
    fn get_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        mode: TransportMode,
    ) -> BoxFuture<'_, Result<DirectionsRoute, ProviderError>>;
}

/// Client for the OpenRouteService v2 directions endpoint.
pub struct OpenRouteServiceProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenRouteServiceProvider {
    pub fn new(config: &ProviderConfig, api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| ProviderError::Unavailable(err.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn profile(mode: TransportMode) -> &'static str {
        match mode {
            TransportMode::Driving => "driving-car",
            TransportMode::Walking => "foot-walking",
            TransportMode::Cycling => "cycling-regular",
        }
    }

    async fn request(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        mode: TransportMode,
    ) -> Result<DirectionsRoute, ProviderError> {
        let url = format!("{}/v2/directions/{}", self.base_url, Self::profile(mode));
        let body = json!({
            "coordinates": [[origin.lng, origin.lat], [destination.lng, destination.lat]]
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OrsResponse = response.json().await?;
        parsed.into_route()
    }
}

impl DirectionsProvider for OpenRouteServiceProvider {
    fn get_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        mode: TransportMode,
    ) -> BoxFuture<'_, Result<DirectionsRoute, ProviderError>> {
        Box::pin(self.request(origin, destination, mode))
    }
}

#[derive(Debug, Deserialize)]
struct OrsResponse {
    #[serde(default)]
    routes: Vec<OrsRoute>,
}

#[derive(Debug, Deserialize)]
struct OrsRoute {
    summary: OrsSummary,
    geometry: RouteGeometry,
    #[serde(default)]
    bbox: Option<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
struct OrsSummary {
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    duration: f64,
}

impl OrsResponse {
    fn into_route(self) -> Result<DirectionsRoute, ProviderError> {
        let route = self
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Malformed("response contains no routes".into()))?;

        // [min_lng, min_lat, max_lng, max_lat], optionally with elevation.
        let bounding_box = route.bbox.and_then(|b| match b.as_slice() {
            [min_lng, min_lat, max_lng, max_lat] => Some(RouteBounds {
                min_lat: *min_lat,
                max_lat: *max_lat,
                min_lng: *min_lng,
                max_lng: *max_lng,
            }),
            [min_lng, min_lat, _, max_lng, max_lat, _] => Some(RouteBounds {
                min_lat: *min_lat,
                max_lat: *max_lat,
                min_lng: *min_lng,
                max_lng: *max_lng,
            }),
            _ => None,
        });

        Ok(DirectionsRoute {
            geometry: route.geometry,
            bounding_box,
            summary: RouteSummary {
                distance_m: route.summary.distance,
                duration_s: route.summary.duration,
            },
        })
    }
}
