use std::sync::Arc;

use axum::{
    body::{Body, to_bytes},
    http::Request,
};
use futures::future::{self, BoxFuture};
use hyper::StatusCode;
use saferoute::{
    AppState,
    config::EngineConfig,
    create_router,
    directions::{DirectionsProvider, DirectionsRoute, ProviderError, RouteGeometry, RouteSummary},
    models::{
        ApiError, Coordinate, GeometrySource, Incident, Provenance, ProviderSwitch,
        SafeRouteResponse, SecurityPoint, TransportMode,
    },
    proximity::{GatewayError, InMemoryGateway, ProximityGateway},
    service::SafeRouteService,
};
use serde_json::json;
use tower::ServiceExt;

const SAMPLE_POINTS: &str = include_str!("../data/points.json");

const ORIGIN: Coordinate = Coordinate {
    lat: -12.1186,
    lng: -77.0318,
};
const DESTINATION: Coordinate = Coordinate {
    lat: -12.1050,
    lng: -77.0380,
};

/// Provider returning a straight GeoJSON line that stops a little short of both endpoints.
struct StraightLineProvider;

impl DirectionsProvider for StraightLineProvider {
    fn get_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        _mode: TransportMode,
    ) -> BoxFuture<'_, Result<DirectionsRoute, ProviderError>> {
        let start = origin.interpolate(destination, 0.05);
        let middle = origin.interpolate(destination, 0.5);
        let end = origin.interpolate(destination, 0.95);
        let coordinates = [start, middle, end]
            .iter()
            .map(|c| vec![c.lng, c.lat])
            .collect();
        Box::pin(future::ready(Ok(DirectionsRoute {
            geometry: RouteGeometry::GeoJson(saferoute::directions::LineString {
                kind: "LineString".into(),
                coordinates,
            }),
            bounding_box: None,
            summary: RouteSummary {
                distance_m: 1_700.0,
                duration_s: 1_200.0,
            },
        })))
    }
}

struct BrokenProvider;

impl DirectionsProvider for BrokenProvider {
    fn get_route(
        &self,
        _origin: Coordinate,
        _destination: Coordinate,
        _mode: TransportMode,
    ) -> BoxFuture<'_, Result<DirectionsRoute, ProviderError>> {
        Box::pin(future::ready(Err(ProviderError::Status {
            status: 503,
            body: "maintenance".into(),
        })))
    }
}

struct DownGateway;

impl ProximityGateway for DownGateway {
    fn security_points<'a>(
        &'a self,
        _route: &'a [Coordinate],
        _buffer_m: f64,
    ) -> BoxFuture<'a, Result<Vec<SecurityPoint>, GatewayError>> {
        Box::pin(future::ready(Err(GatewayError::Unavailable("connection refused".into()))))
    }

    fn incidents<'a>(
        &'a self,
        _route: &'a [Coordinate],
        _buffer_m: f64,
    ) -> BoxFuture<'a, Result<Vec<Incident>, GatewayError>> {
        Box::pin(future::ready(Err(GatewayError::Unavailable("connection refused".into()))))
    }
}

fn app_with(
    provider: Option<Arc<dyn DirectionsProvider>>,
    gateway: Option<Arc<dyn ProximityGateway>>,
) -> axum::Router {
    let service = SafeRouteService::new(EngineConfig::default(), provider, gateway);
    create_router(AppState {
        service: Arc::new(service),
    })
}

fn empty_gateway() -> Option<Arc<dyn ProximityGateway>> {
    Some(Arc::new(InMemoryGateway::default()))
}

fn sample_gateway() -> Option<Arc<dyn ProximityGateway>> {
    let gateway = InMemoryGateway::from_reader(SAMPLE_POINTS.as_bytes()).expect("points");
    Some(Arc::new(gateway))
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn lima_request(mode: &str) -> Request<Body> {
    json_request(
        "POST",
        "/api/safe-route",
        json!({
            "origin": { "lat": ORIGIN.lat, "lng": ORIGIN.lng },
            "destination": { "lat": DESTINATION.lat, "lng": DESTINATION.lng },
            "mode": mode
        }),
    )
}

async fn read_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = to_bytes(response.into_body(), 4 * 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn synthesized_lima_route_without_neighbours_scores_base() {
    let app = app_with(None, empty_gateway());

    for mode in ["driving", "walking", "cycling"] {
        let response = app.clone().oneshot(lima_request(mode)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: SafeRouteResponse = read_json(response).await;
        assert_eq!(body.safety_score, 75);
        assert_eq!(body.geometry_source, GeometrySource::Synthesized);
        assert_eq!(body.route.first(), Some(&ORIGIN));
        assert_eq!(body.route.last(), Some(&DESTINATION));
        assert!(body.route.iter().all(|c| body.bounding_box.contains(*c)));
        assert!(body.distance_m > 0.0);
        assert!(body.duration_s > 0.0);
        assert!(body.nearby_points.is_empty());
        assert!(!body.gpx_base64.is_empty());
    }
}

#[tokio::test]
async fn provider_geometry_is_pinned_to_requested_endpoints() {
    let app = app_with(Some(Arc::new(StraightLineProvider)), empty_gateway());

    let response = app.oneshot(lima_request("walking")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: SafeRouteResponse = read_json(response).await;
    assert_eq!(body.geometry_source, GeometrySource::Provider);
    assert_eq!(body.route.len(), 5);
    assert_eq!(body.route[0], ORIGIN);
    assert_eq!(body.route[4], DESTINATION);
    assert_eq!(body.distance_m, 1_700.0);
    assert_eq!(body.duration_s, 1_200.0);
}

#[tokio::test]
async fn provider_failure_falls_back_to_synthesis() {
    let app = app_with(Some(Arc::new(BrokenProvider)), empty_gateway());

    let response = app.oneshot(lima_request("driving")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: SafeRouteResponse = read_json(response).await;
    assert_eq!(body.geometry_source, GeometrySource::Synthesized);
    assert_eq!(body.route.first(), Some(&ORIGIN));
    assert_eq!(body.route.last(), Some(&DESTINATION));
}

#[tokio::test]
async fn gateway_points_are_scored_and_listed() {
    let app = app_with(Some(Arc::new(StraightLineProvider)), sample_gateway());

    let response = app.oneshot(lima_request("walking")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: SafeRouteResponse = read_json(response).await;
    assert!(body.safety_score > 75, "score {}", body.safety_score);
    let ids: Vec<&str> = body.nearby_points.iter().map(|p| p.id.as_str()).collect();
    assert!(ids.contains(&"sp-1"));
    assert!(!ids.contains(&"sp-5"));
    assert!(body.nearby_points.iter().all(|p| p.provenance == Provenance::Gateway));
    assert!(body.nearby_points.iter().all(|p| p.distance_m <= 500.0));
}

#[tokio::test]
async fn gateway_outage_scores_base_and_flags_placeholders() {
    let app = app_with(None, Some(Arc::new(DownGateway)));

    let response = app.oneshot(lima_request("cycling")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: SafeRouteResponse = read_json(response).await;
    assert_eq!(body.safety_score, 75);
    assert!(body.nearby_points.iter().all(|p| p.provenance == Provenance::Synthetic));
}

#[tokio::test]
async fn unknown_mode_is_rejected() {
    let app = app_with(None, empty_gateway());

    let response = app.oneshot(lima_request("teleport")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: ApiError = read_json(response).await;
    assert!(body.message.contains("teleport"));
}

#[tokio::test]
async fn out_of_range_coordinate_is_rejected() {
    let app = app_with(None, empty_gateway());

    let request = json_request(
        "POST",
        "/api/safe-route",
        json!({
            "origin": { "lat": 123.0, "lng": -77.0318 },
            "destination": { "lat": DESTINATION.lat, "lng": DESTINATION.lng },
            "mode": "walking"
        }),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: ApiError = read_json(response).await;
    assert!(body.message.contains("origin"));
}

#[tokio::test]
async fn missing_mode_is_rejected_not_defaulted() {
    let app = app_with(None, empty_gateway());

    let request = json_request(
        "POST",
        "/api/safe-route",
        json!({
            "origin": { "lat": ORIGIN.lat, "lng": ORIGIN.lng },
            "destination": { "lat": DESTINATION.lat, "lng": DESTINATION.lng }
        }),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: ApiError = read_json(response).await;
    assert!(body.message.contains("mode"), "{}", body.message);
}

#[tokio::test]
async fn missing_destination_is_reported_as_api_error() {
    let app = app_with(None, empty_gateway());

    let request = json_request(
        "POST",
        "/api/safe-route",
        json!({
            "origin": { "lat": ORIGIN.lat, "lng": ORIGIN.lng },
            "mode": "driving"
        }),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: ApiError = read_json(response).await;
    assert!(body.message.contains("destination"), "{}", body.message);
}

#[tokio::test]
async fn provider_switch_round_trips_and_disables_provider() {
    let app = app_with(Some(Arc::new(StraightLineProvider)), empty_gateway());

    let get = Request::builder()
        .uri("/api/provider")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(get).await.unwrap();
    let switch: ProviderSwitch = read_json(response).await;
    assert!(switch.enabled);

    let put = json_request("PUT", "/api/provider", json!({ "enabled": false }));
    let response = app.clone().oneshot(put).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let switch: ProviderSwitch = read_json(response).await;
    assert!(!switch.enabled);

    let response = app.oneshot(lima_request("walking")).await.unwrap();
    let body: SafeRouteResponse = read_json(response).await;
    assert_eq!(body.geometry_source, GeometrySource::Synthesized);
}

#[tokio::test]
async fn health_endpoint_answers() {
    let app = app_with(None, None);
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
