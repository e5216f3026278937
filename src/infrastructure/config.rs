use crate::engine::DetectionMode;
use chrono::FixedOffset;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct TankConfig {
    #[serde(default)]
    pub server: ServerSettings,
    pub firebase: FirebaseSettings,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub display: DisplaySettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub levels: LevelSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FirebaseSettings {
    pub database_url: String,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default = "default_readings_path")]
    pub readings_path: String,
    #[serde(default = "default_refills_path")]
    pub refills_path: String,
    #[serde(default = "default_pumps_path")]
    pub pumps_path: String,
    #[serde(default = "default_latest_path")]
    pub latest_path: String,
}

fn default_readings_path() -> String {
    "sensor_readings".to_string()
}

fn default_refills_path() -> String {
    "compesa_arrivals".to_string()
}

fn default_pumps_path() -> String {
    "pump_activations".to_string()
}

fn default_latest_path() -> String {
    "latest".to_string()
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct EngineSettings {
    pub min_increase: f64,
    pub expected_interval_hours: f64,
    pub detection_mode: DetectionMode,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            min_increase: crate::engine::event_detector::DEFAULT_MIN_INCREASE,
            expected_interval_hours: crate::engine::stats::DEFAULT_EXPECTED_INTERVAL_HOURS,
            detection_mode: DetectionMode::PerStep,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct DisplaySettings {
    pub utc_offset_hours: i32,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self { utc_offset_hours: -3 }
    }
}

impl DisplaySettings {
    pub fn offset(&self) -> anyhow::Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_hours * 3600)
            .ok_or_else(|| anyhow::anyhow!("invalid utc_offset_hours: {}", self.utc_offset_hours))
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct CacheSettings {
    pub ttl_secs: u64,
    pub all_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 60,
            all_ttl_secs: 300,
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn all_ttl(&self) -> Duration {
        Duration::from_secs(self.all_ttl_secs)
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct LevelSettings {
    pub low: f64,
    pub medium: f64,
}

impl Default for LevelSettings {
    fn default() -> Self {
        Self {
            low: 40.0,
            medium: 80.0,
        }
    }
}

/// Load `config/tank.*`, overridable through `TANK__SECTION__KEY` variables.
pub fn load_tank_config() -> anyhow::Result<TankConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/tank"))
        .add_source(config::Environment::with_prefix("TANK").separator("__"))
        .build()?;

    Ok(settings.try_deserialize()?)
}
