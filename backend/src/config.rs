//! Tunables for synthesis, smoothing and scoring.
//!
//! Every field has a default so a partial JSON file only overrides what it names.

use std::{fs::File, io::Read, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::models::{IncidentType, RouteBounds, SecurityCategory, TransportMode};

/// Largest accepted smoothing jitter, in degrees (about 100 m).
pub const MAX_JITTER_DEG: f64 = 1e-3;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub synthesis: SynthesisConfig,
    pub smoothing: SmoothingConfig,
    pub scoring: ScoringConfig,
    pub synthetic: SyntheticConfig,
    pub provider: ProviderConfig,
    pub gateway: GatewayConfig,
}

impl EngineConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `SAFEROUTE_CONFIG` when set, then applies the provider/gateway
    /// environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("SAFEROUTE_CONFIG") {
            Ok(path) => {
                tracing::info!("loading engine config from {path}");
                Self::from_file(path)?
            }
            Err(_) => Self::default(),
        };
        if let Ok(url) = std::env::var("DIRECTIONS_URL") {
            config.provider.base_url = url;
        }
        if let Ok(key) = std::env::var("DIRECTIONS_API_KEY") {
            config.provider.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("PROXIMITY_URL") {
            config.gateway.base_url = Some(url);
        }
        if let Ok(path) = std::env::var("POINTS_JSON") {
            config.gateway.points_file = Some(path);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.synthesis;
        if s.max_points < 2 {
            return Err(ConfigError::Invalid("synthesis.max_points must be at least 2".into()));
        }
        if s.block_m <= 0.0 || !s.block_m.is_finite() {
            return Err(ConfigError::Invalid("synthesis.block_m must be positive".into()));
        }
        for mode in TransportMode::ALL {
            if s.step_m(mode) <= 0.0 {
                return Err(ConfigError::Invalid(format!("synthesis step for {mode} must be positive")));
            }
        }
        if self.scoring.radius_m <= 0.0 || !self.scoring.radius_m.is_finite() {
            return Err(ConfigError::Invalid("scoring.radius_m must be positive".into()));
        }
        if self.scoring.decay_days <= 0.0 {
            return Err(ConfigError::Invalid("scoring.decay_days must be positive".into()));
        }
        for (name, p) in [
            ("switch_base", s.switch_base),
            ("switch_ramp", s.switch_ramp),
            ("switch_bias", s.switch_bias),
            ("offset_ratio", s.offset_ratio),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(ConfigError::Invalid(format!("synthesis.{name} must be within [0, 1]")));
            }
        }
        if !s.max_offset_m.is_finite() || s.max_offset_m < 0.0 {
            return Err(ConfigError::Invalid("synthesis.max_offset_m must be finite and non-negative".into()));
        }
        let jitter = self.smoothing.jitter_deg;
        if !(0.0..=MAX_JITTER_DEG).contains(&jitter) {
            return Err(ConfigError::Invalid(format!(
                "smoothing.jitter_deg must be within [0, {MAX_JITTER_DEG}]"
            )));
        }
        if self.synthetic.min_points > self.synthetic.max_points {
            return Err(ConfigError::Invalid("synthetic.min_points exceeds max_points".into()));
        }
        for (name, m) in [
            ("lighting_offset_m", self.synthetic.lighting_offset_m),
            ("other_offset_m", self.synthetic.other_offset_m),
        ] {
            if !m.is_finite() || m < 0.0 {
                return Err(ConfigError::Invalid(format!("synthetic.{name} must be finite and non-negative")));
            }
        }
        if !(1..=10).contains(&self.provider.polyline_precision) {
            return Err(ConfigError::Invalid("provider.polyline_precision must be within 1..=10".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PerMode<T> {
    pub driving: T,
    pub walking: T,
    pub cycling: T,
}

impl<T: Copy> PerMode<T> {
    pub fn get(&self, mode: TransportMode) -> T {
        match mode {
            TransportMode::Driving => self.driving,
            TransportMode::Walking => self.walking,
            TransportMode::Cycling => self.cycling,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Origins inside this box get grid (city block) synthesis.
    pub grid_area: RouteBounds,
    /// Metres of direct distance per generated point.
    pub step_m: PerMode<f64>,
    pub min_points: PerMode<usize>,
    pub max_points: usize,
    pub block_m: f64,
    pub max_blocks_per_move: u32,
    pub switch_base: f64,
    pub switch_ramp: f64,
    /// Added to the switch probability when the other axis has more left to cover.
    pub switch_bias: f64,
    pub max_offset_m: f64,
    pub offset_ratio: f64,
    pub max_control_points: usize,
    /// Average speeds used to estimate synthesized durations, in m/s.
    pub speed_mps: PerMode<f64>,
}

impl SynthesisConfig {
    pub fn step_m(&self, mode: TransportMode) -> f64 {
        self.step_m.get(mode)
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            grid_area: RouteBounds {
                min_lat: -12.30,
                max_lat: -11.80,
                min_lng: -77.20,
                max_lng: -76.80,
            },
            step_m: PerMode {
                driving: 300.0,
                walking: 120.0,
                cycling: 200.0,
            },
            min_points: PerMode {
                driving: 5,
                walking: 8,
                cycling: 6,
            },
            max_points: 25,
            block_m: 300.0,
            max_blocks_per_move: 3,
            switch_base: 0.35,
            switch_ramp: 0.45,
            switch_bias: 0.2,
            max_offset_m: 800.0,
            offset_ratio: 0.15,
            max_control_points: 3,
            speed_mps: PerMode {
                driving: 8.3,
                walking: 1.4,
                cycling: 4.5,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    pub samples_per_segment: usize,
    /// Upper bound of the per-axis jitter applied to interpolated points, in degrees.
    pub jitter_deg: f64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            samples_per_segment: 3,
            jitter_deg: 1e-4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub base: f64,
    pub radius_m: f64,
    pub decay_days: f64,
    pub security_weights: SecurityWeights,
    pub incident_weights: IncidentWeights,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base: 75.0,
            radius_m: 500.0,
            decay_days: 30.0,
            security_weights: SecurityWeights::default(),
            incident_weights: IncidentWeights::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityWeights {
    /// Police station or patrol base.
    pub patrol: f64,
    /// Neighbourhood watch or camera-monitored zone.
    pub monitored: f64,
    pub hospital: f64,
    pub lighting: f64,
    pub commercial: f64,
    pub park: f64,
    pub risk: f64,
}

impl SecurityWeights {
    pub fn weight(&self, category: SecurityCategory) -> f64 {
        match category {
            SecurityCategory::Patrol => self.patrol,
            SecurityCategory::Monitored => self.monitored,
            SecurityCategory::Hospital => self.hospital,
            SecurityCategory::Lighting => self.lighting,
            SecurityCategory::Commercial => self.commercial,
            SecurityCategory::Park => self.park,
            SecurityCategory::Risk => self.risk,
        }
    }
}

impl Default for SecurityWeights {
    fn default() -> Self {
        Self {
            patrol: 5.0,
            monitored: 3.0,
            hospital: 2.0,
            lighting: 1.0,
            commercial: 1.0,
            park: 0.5,
            risk: -4.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct IncidentWeights {
    pub robbery: f64,
    pub harassment: f64,
    pub accident: f64,
    pub other: f64,
}

impl IncidentWeights {
    pub fn weight(&self, incident_type: IncidentType) -> f64 {
        match incident_type {
            IncidentType::Robbery => self.robbery,
            IncidentType::Harassment => self.harassment,
            IncidentType::Accident => self.accident,
            IncidentType::Other => self.other,
        }
    }
}

impl Default for IncidentWeights {
    fn default() -> Self {
        Self {
            robbery: -8.0,
            harassment: -5.0,
            accident: -3.0,
            other: -2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub min_points: usize,
    pub max_points: usize,
    pub lighting_offset_m: f64,
    pub other_offset_m: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            min_points: 5,
            max_points: 10,
            lighting_offset_m: 30.0,
            other_offset_m: 150.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Initial state of the runtime "use real provider" switch.
    pub enabled: bool,
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_ms: u64,
    /// Decimal digits of encoded geometries (5 for OpenRouteService, 6 for polyline6 providers).
    pub polyline_precision: u32,
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.openrouteservice.org".to_string(),
            api_key: None,
            timeout_ms: 8_000,
            polyline_precision: crate::polyline::DEFAULT_PRECISION,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub base_url: Option<String>,
    pub points_file: Option<String>,
    pub timeout_ms: u64,
    /// Return generated placeholder points when the gateway is unavailable.
    pub synthetic_fallback: bool,
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            points_file: None,
            timeout_ms: 5_000,
            synthetic_fallback: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let json = r#"{ "scoring": { "base": 60.0, "incident_weights": { "robbery": -10.0 } } }"#;
        let config = EngineConfig::from_reader(json.as_bytes()).expect("config");
        assert_eq!(config.scoring.base, 60.0);
        assert_eq!(config.scoring.incident_weights.robbery, -10.0);
        assert_eq!(config.scoring.incident_weights.harassment, -5.0);
        assert_eq!(config.scoring.radius_m, 500.0);
        assert_eq!(config.synthesis.max_points, 25);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "smoothing": {{ "samples_per_segment": 5 }} }}"#).unwrap();
        let config = EngineConfig::from_file(file.path()).expect("config");
        assert_eq!(config.smoothing.samples_per_segment, 5);
        assert_eq!(config.smoothing.jitter_deg, 1e-4);
    }

    #[test]
    fn rejects_non_positive_radius() {
        let json = r#"{ "scoring": { "radius_m": 0.0 } }"#;
        assert!(matches!(
            EngineConfig::from_reader(json.as_bytes()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_tunables() {
        for json in [
            r#"{ "smoothing": { "jitter_deg": 1e308 } }"#,
            r#"{ "smoothing": { "jitter_deg": -1e-4 } }"#,
            r#"{ "smoothing": { "jitter_deg": 0.01 } }"#,
            r#"{ "synthesis": { "switch_base": 1.5 } }"#,
            r#"{ "synthesis": { "switch_bias": -0.1 } }"#,
            r#"{ "synthesis": { "max_offset_m": -1.0 } }"#,
            r#"{ "synthetic": { "lighting_offset_m": -5.0 } }"#,
            r#"{ "provider": { "polyline_precision": 0 } }"#,
        ] {
            assert!(
                matches!(EngineConfig::from_reader(json.as_bytes()), Err(ConfigError::Invalid(_))),
                "{json} should be rejected"
            );
        }
    }

    #[test]
    fn default_config_is_valid() {
        EngineConfig::default().validate().expect("defaults validate");
        let six = r#"{ "provider": { "polyline_precision": 6 }, "smoothing": { "jitter_deg": 0.0 } }"#;
        let config = EngineConfig::from_reader(six.as_bytes()).expect("config");
        assert_eq!(config.provider.polyline_precision, 6);
    }

    #[test]
    fn default_weights_match_named_tables() {
        let weights = SecurityWeights::default();
        assert_eq!(weights.weight(SecurityCategory::Patrol), 5.0);
        assert_eq!(weights.weight(SecurityCategory::Lighting), 1.0);
        assert_eq!(IncidentWeights::default().weight(IncidentType::Other), -2.0);
    }
}
