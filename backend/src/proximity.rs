use std::{fs::File, io::Read, path::Path};

use chrono::NaiveDate;
use futures::future::{self, BoxFuture};
use serde::{Deserialize, Serialize};

use crate::{
    config::GatewayConfig,
    geo::distance_to_path_m,
    models::{Coordinate, Incident, IncidentType, SecurityCategory, SecurityPoint},
};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("proximity gateway unavailable: {0}")]
    Unavailable(String),
    #[error("proximity gateway answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("proximity gateway timed out after {0} ms")]
    Timeout(u64),
    #[error("malformed proximity response: {0}")]
    Malformed(String),
    #[error("failed to read points file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid points file: {0}")]
    Parse(#[from] serde_json::Error),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::Malformed(err.to_string())
        } else {
            GatewayError::Unavailable(err.to_string())
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NearbyQuery {
    pub security_points: Vec<SecurityPoint>,
    pub incidents: Vec<Incident>,
}

/// Spatial lookup of security points and incidents around a route.
///
/// Every returned item is annotated with its distance to the route. An
/// empty neighbourhood is an empty list, not an error.
pub trait ProximityGateway: Send + Sync {
    fn security_points<'a>(
        &'a self,
        route: &'a [Coordinate],
        buffer_m: f64,
    ) -> BoxFuture<'a, Result<Vec<SecurityPoint>, GatewayError>>;

    fn incidents<'a>(
        &'a self,
        route: &'a [Coordinate],
        buffer_m: f64,
    ) -> BoxFuture<'a, Result<Vec<Incident>, GatewayError>>;

    /// Runs both sub-queries concurrently.
    fn query<'a>(
        &'a self,
        route: &'a [Coordinate],
        buffer_m: f64,
    ) -> BoxFuture<'a, Result<NearbyQuery, GatewayError>> {
        Box::pin(async move {
            let (security_points, incidents) = tokio::join!(
                self.security_points(route, buffer_m),
                self.incidents(route, buffer_m)
            );
            Ok(NearbyQuery {
                security_points: security_points?,
                incidents: incidents?,
            })
        })
    }
}

#[derive(Debug, Serialize)]
struct ProximityRequest {
    /// `[lng, lat]` positions, GeoJSON order.
    geometry: Vec<[f64; 2]>,
    buffer_m: f64,
}

impl ProximityRequest {
    fn new(route: &[Coordinate], buffer_m: f64) -> Self {
        Self {
            geometry: route.iter().map(|c| [c.lng, c.lat]).collect(),
            buffer_m,
        }
    }
}

/// Client for a spatial datastore exposing `POST /security-points` and `POST /incidents`.
pub struct HttpProximityGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProximityGateway {
    pub fn new(config: &GatewayConfig, base_url: &str) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| GatewayError::Unavailable(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        route: &[Coordinate],
        buffer_m: f64,
    ) -> Result<Vec<T>, GatewayError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .client
            .post(&url)
            .json(&ProximityRequest::new(route, buffer_m))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

impl ProximityGateway for HttpProximityGateway {
    fn security_points<'a>(
        &'a self,
        route: &'a [Coordinate],
        buffer_m: f64,
    ) -> BoxFuture<'a, Result<Vec<SecurityPoint>, GatewayError>> {
        Box::pin(self.post("security-points", route, buffer_m))
    }

    fn incidents<'a>(
        &'a self,
        route: &'a [Coordinate],
        buffer_m: f64,
    ) -> BoxFuture<'a, Result<Vec<Incident>, GatewayError>> {
        Box::pin(self.post("incidents", route, buffer_m))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatedSecurityPoint {
    pub id: String,
    pub name: String,
    pub category: SecurityCategory,
    pub location: Coordinate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatedIncident {
    pub id: String,
    #[serde(rename = "type")]
    pub incident_type: IncidentType,
    pub occurred_at: NaiveDate,
    pub location: Coordinate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PointsFile {
    #[serde(default)]
    pub security_points: Vec<LocatedSecurityPoint>,
    #[serde(default)]
    pub incidents: Vec<LocatedIncident>,
}

/// Gateway over a fixed set of located points, measuring distances itself.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGateway {
    points: PointsFile,
}

impl InMemoryGateway {
    pub fn new(points: PointsFile) -> Self {
        Self { points }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, GatewayError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, GatewayError> {
        let points: PointsFile = serde_json::from_reader(reader)?;
        tracing::debug!(
            "in-memory gateway holds {} security points and {} incidents",
            points.security_points.len(),
            points.incidents.len()
        );
        Ok(Self::new(points))
    }

    fn within_buffer(route: &[Coordinate], location: Coordinate, buffer_m: f64) -> Option<f64> {
        distance_to_path_m(location, route).filter(|d| *d <= buffer_m)
    }

    fn nearby_security_points(&self, route: &[Coordinate], buffer_m: f64) -> Vec<SecurityPoint> {
        self.points
            .security_points
            .iter()
            .filter_map(|p| {
                Self::within_buffer(route, p.location, buffer_m).map(|distance_m| SecurityPoint {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    category: p.category,
                    distance_m,
                    location: Some(p.location),
                })
            })
            .collect()
    }

    fn nearby_incidents(&self, route: &[Coordinate], buffer_m: f64) -> Vec<Incident> {
        self.points
            .incidents
            .iter()
            .filter_map(|i| {
                Self::within_buffer(route, i.location, buffer_m).map(|distance_m| Incident {
                    id: i.id.clone(),
                    incident_type: i.incident_type,
                    occurred_at: i.occurred_at,
                    distance_m,
                    location: Some(i.location),
                })
            })
            .collect()
    }
}

impl ProximityGateway for InMemoryGateway {
    fn security_points<'a>(
        &'a self,
        route: &'a [Coordinate],
        buffer_m: f64,
    ) -> BoxFuture<'a, Result<Vec<SecurityPoint>, GatewayError>> {
        Box::pin(future::ready(Ok(self.nearby_security_points(route, buffer_m))))
    }

    fn incidents<'a>(
        &'a self,
        route: &'a [Coordinate],
        buffer_m: f64,
    ) -> BoxFuture<'a, Result<Vec<Incident>, GatewayError>> {
        Box::pin(future::ready(Ok(self.nearby_incidents(route, buffer_m))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::offset;

    fn route() -> Vec<Coordinate> {
        vec![
            Coordinate::new(-12.1186, -77.0318),
            Coordinate::new(-12.1050, -77.0318),
        ]
    }

    fn gateway() -> InMemoryGateway {
        let near = offset(Coordinate::new(-12.11, -77.0318), 0.0, 120.0);
        let far = offset(Coordinate::new(-12.11, -77.0318), 0.0, 2_000.0);
        InMemoryGateway::new(PointsFile {
            security_points: vec![
                LocatedSecurityPoint {
                    id: "near".into(),
                    name: "Comisaria".into(),
                    category: SecurityCategory::Patrol,
                    location: near,
                },
                LocatedSecurityPoint {
                    id: "far".into(),
                    name: "Hospital".into(),
                    category: SecurityCategory::Hospital,
                    location: far,
                },
            ],
            incidents: vec![LocatedIncident {
                id: "inc".into(),
                incident_type: IncidentType::Robbery,
                occurred_at: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
                location: near,
            }],
        })
    }

    #[tokio::test]
    async fn annotates_distances_and_filters_by_buffer() {
        let gateway = gateway();
        let route = route();
        let result = gateway.query(&route, 500.0).await.unwrap();
        assert_eq!(result.security_points.len(), 1);
        assert_eq!(result.security_points[0].id, "near");
        assert!((result.security_points[0].distance_m - 120.0).abs() < 1.0);
        assert_eq!(result.incidents.len(), 1);
    }

    #[tokio::test]
    async fn nothing_nearby_is_empty_not_error() {
        let gateway = InMemoryGateway::default();
        let result = gateway.query(&route(), 500.0).await.unwrap();
        assert_eq!(result, NearbyQuery::default());
    }

    #[test]
    fn parses_points_file() {
        let json = r#"{
            "security_points": [
                { "id": "1", "name": "Serenazgo", "category": "patrol", "location": { "lat": -12.11, "lng": -77.03 } }
            ],
            "incidents": [
                { "id": "2", "type": "harassment", "occurred_at": "2024-05-30", "location": { "lat": -12.11, "lng": -77.03 } }
            ]
        }"#;
        let gateway = InMemoryGateway::from_reader(json.as_bytes()).unwrap();
        assert_eq!(gateway.points.security_points.len(), 1);
        assert_eq!(gateway.points.incidents[0].incident_type, IncidentType::Harassment);
    }

    #[test]
    fn request_body_uses_geojson_order() {
        let body = serde_json::to_value(ProximityRequest::new(&route(), 250.0)).unwrap();
        assert_eq!(body["geometry"][0][0], -77.0318);
        assert_eq!(body["buffer_m"], 250.0);
    }
}
