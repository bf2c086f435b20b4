use std::{error::Error, net::SocketAddr, sync::Arc};

use saferoute::{
    AppState,
    config::EngineConfig,
    create_router,
    directions::{DirectionsProvider, OpenRouteServiceProvider},
    proximity::{HttpProximityGateway, InMemoryGateway, ProximityGateway},
    service::SafeRouteService,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_ADDR: &str = "0.0.0.0:8080";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "saferoute=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = EngineConfig::from_env()?;

    let provider: Option<Arc<dyn DirectionsProvider>> = match &config.provider.api_key {
        Some(key) => {
            tracing::info!("directions provider at {}", config.provider.base_url);
            Some(Arc::new(OpenRouteServiceProvider::new(&config.provider, key.as_str())?))
        }
        None => {
            tracing::warn!("DIRECTIONS_API_KEY not set, every route will be synthesized");
            None
        }
    };

    let gateway: Option<Arc<dyn ProximityGateway>> =
        match (&config.gateway.base_url, &config.gateway.points_file) {
            (Some(url), _) => {
                tracing::info!("proximity gateway at {url}");
                Some(Arc::new(HttpProximityGateway::new(&config.gateway, url)?))
            }
            (None, Some(path)) => {
                tracing::info!("loading security points from {path}");
                Some(Arc::new(InMemoryGateway::from_file(path)?))
            }
            (None, None) => {
                tracing::warn!("no proximity gateway configured, routes get the base score");
                None
            }
        };

    let state = AppState {
        service: Arc::new(SafeRouteService::new(config, provider, gateway)),
    };
    let app = create_router(state);

    let addr: SocketAddr = std::env::var("SAFEROUTE_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()?;
    tracing::info!("starting saferoute on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
