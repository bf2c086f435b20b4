use std::{path::PathBuf, sync::Arc};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use clap::Parser;
use rand::{rngs::StdRng, SeedableRng};
use saferoute::{
    config::EngineConfig,
    models::{Coordinate, TransportMode},
    polyline,
    proximity::{InMemoryGateway, ProximityGateway},
    service::SafeRouteService,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Synthesize and score a route offline, without a directions provider"
)]
struct Args {
    /// Origin as `lat,lng`
    #[arg(long, value_parser = parse_coordinate, allow_hyphen_values = true)]
    origin: Coordinate,

    /// Destination as `lat,lng`
    #[arg(long, value_parser = parse_coordinate, allow_hyphen_values = true)]
    destination: Coordinate,

    #[arg(long, default_value = "walking")]
    mode: TransportMode,

    /// Seed for reproducible geometry
    #[arg(long)]
    seed: Option<u64>,

    /// JSON engine config overriding the defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Located security points and incidents used for scoring
    #[arg(long)]
    points: Option<PathBuf>,

    /// Write the route as a GPX file instead of printing JSON
    #[arg(long)]
    gpx: Option<PathBuf>,

    /// Print the route as an encoded polyline instead of JSON
    #[arg(long)]
    polyline: bool,

    /// Decimal digits used with --polyline
    #[arg(long, default_value_t = polyline::DEFAULT_PRECISION)]
    precision: u32,
}

fn parse_coordinate(raw: &str) -> Result<Coordinate, String> {
    let (lat, lng) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected `lat,lng`, got `{raw}`"))?;
    let lat: f64 = lat.trim().parse().map_err(|err| format!("bad latitude: {err}"))?;
    let lng: f64 = lng.trim().parse().map_err(|err| format!("bad longitude: {err}"))?;
    let coord = Coordinate::new(lat, lng);
    if !coord.is_valid() {
        return Err(format!("coordinate out of range: {raw}"));
    }
    Ok(coord)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    config.provider.enabled = false;

    let gateway: Option<Arc<dyn ProximityGateway>> = match &args.points {
        Some(path) => Some(Arc::new(InMemoryGateway::from_file(path)?)),
        None => None,
    };
    let service = SafeRouteService::new(config, None, gateway);

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let response = service
        .compute_safe_route_with_rng(args.origin, args.destination, args.mode, &mut rng, Utc::now())
        .await?;
    tracing::info!(
        "{} route: {} points, {:.0}m, score {}",
        args.mode,
        response.route.len(),
        response.distance_m,
        response.safety_score
    );

    match &args.gpx {
        Some(path) => {
            std::fs::write(path, BASE64.decode(&response.gpx_base64)?)?;
            tracing::info!("GPX written to {:?}", path);
        }
        None if args.polyline => println!("{}", polyline::encode(&response.route, args.precision)?),
        None => println!("{}", serde_json::to_string_pretty(&response)?),
    }
    Ok(())
}
