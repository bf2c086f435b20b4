pub use shared::{
    ApiError, Coordinate, GeometrySource, Incident, IncidentType, NearbyKind, NearbyPoint,
    Provenance, ProviderSwitch, RouteBounds, SafeRouteRequest, SafeRouteResponse,
    SecurityCategory, SecurityPoint, TransportMode, UnknownModeError,
};
