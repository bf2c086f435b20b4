use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn interpolate(self, other: Self, t: f64) -> Self {
        Self {
            lat: self.lat + (other.lat - self.lat) * t,
            lng: self.lng + (other.lng - self.lng) * t,
        }
    }

    /// Finite and inside the WGS84 degree ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    Driving,
    Walking,
    Cycling,
}

impl TransportMode {
    pub const ALL: [TransportMode; 3] = [Self::Driving, Self::Walking, Self::Cycling];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Driving => "driving",
            Self::Walking => "walking",
            Self::Cycling => "cycling",
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownModeError(pub String);

impl fmt::Display for UnknownModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown transport mode '{}' (expected driving, walking or cycling)",
            self.0
        )
    }
}

impl std::error::Error for UnknownModeError {}

impl FromStr for TransportMode {
    type Err = UnknownModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "driving" => Ok(Self::Driving),
            "walking" => Ok(Self::Walking),
            "cycling" => Ok(Self::Cycling),
            _ => Err(UnknownModeError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityCategory {
    Patrol,
    Commercial,
    Park,
    Monitored,
    Lighting,
    Risk,
    Hospital,
}

impl SecurityCategory {
    pub const ALL: [SecurityCategory; 7] = [
        Self::Patrol,
        Self::Commercial,
        Self::Park,
        Self::Monitored,
        Self::Lighting,
        Self::Risk,
        Self::Hospital,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentType {
    Robbery,
    Harassment,
    Accident,
    Other,
}

impl IncidentType {
    pub const ALL: [IncidentType; 4] = [
        Self::Robbery,
        Self::Harassment,
        Self::Accident,
        Self::Other,
    ];
}

/// Point of interest near a route, as annotated by the proximity gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityPoint {
    pub id: String,
    pub name: String,
    pub category: SecurityCategory,
    pub distance_m: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Coordinate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    #[serde(rename = "type")]
    pub incident_type: IncidentType,
    pub occurred_at: NaiveDate,
    pub distance_m: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Coordinate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl RouteBounds {
    pub fn from_path(path: &[Coordinate]) -> Option<Self> {
        let first = path.first()?;
        let initial = Self {
            min_lat: first.lat,
            max_lat: first.lat,
            min_lng: first.lng,
            max_lng: first.lng,
        };
        Some(path.iter().skip(1).fold(initial, |acc, c| Self {
            min_lat: acc.min_lat.min(c.lat),
            max_lat: acc.max_lat.max(c.lat),
            min_lng: acc.min_lng.min(c.lng),
            max_lng: acc.max_lng.max(c.lng),
        }))
    }

    pub fn contains(&self, coord: Coordinate) -> bool {
        coord.lat >= self.min_lat
            && coord.lat <= self.max_lat
            && coord.lng >= self.min_lng
            && coord.lng <= self.max_lng
    }
}

/// Where a nearby entry came from. Synthetic entries are display placeholders only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Gateway,
    Synthetic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NearbyKind {
    Security {
        category: SecurityCategory,
    },
    Incident {
        #[serde(rename = "type")]
        incident_type: IncidentType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        occurred_at: Option<NaiveDate>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyPoint {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub kind: NearbyKind,
    pub distance_m: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Coordinate>,
    pub provenance: Provenance,
}

impl From<&SecurityPoint> for NearbyPoint {
    fn from(point: &SecurityPoint) -> Self {
        Self {
            id: point.id.clone(),
            name: point.name.clone(),
            kind: NearbyKind::Security {
                category: point.category,
            },
            distance_m: point.distance_m,
            location: point.location,
            provenance: Provenance::Gateway,
        }
    }
}

impl From<&Incident> for NearbyPoint {
    fn from(incident: &Incident) -> Self {
        Self {
            id: incident.id.clone(),
            name: format!("{:?} incident", incident.incident_type).to_lowercase(),
            kind: NearbyKind::Incident {
                incident_type: incident.incident_type,
                occurred_at: Some(incident.occurred_at),
            },
            distance_m: incident.distance_m,
            location: incident.location,
            provenance: Provenance::Gateway,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometrySource {
    Provider,
    Synthesized,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafeRouteRequest {
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub mode: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafeRouteResponse {
    pub route: Vec<Coordinate>,
    pub bounding_box: RouteBounds,
    pub distance_m: f64,
    pub duration_s: f64,
    pub safety_score: u8,
    pub nearby_points: Vec<NearbyPoint>,
    pub geometry_source: GeometrySource,
    #[serde(default)]
    pub gpx_base64: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProviderSwitch {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
}
