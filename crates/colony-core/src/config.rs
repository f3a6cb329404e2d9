//! Configuration loading and typed config structures for the Colony engine.
//!
//! The canonical configuration lives in `colony-config.yaml` at the project
//! root. Every section and field has a default, so an empty file (or no
//! file) yields a working engine. Rule sections are the config structs of
//! `colony-world` and `colony-population` themselves; [`ColonyConfig::rules`]
//! assembles them into a [`WorldRules`].

use std::path::Path;

use serde::Deserialize;

use colony_population::{PopulationConfig, PopulationError};
use colony_world::{
    AccumulationConfig, AreaConfig, ConstructionConfig, DisasterConfig, ProductionConfig,
    RepairConfig, SettlementConfig, WorldError, WorldRules,
};

/// Seconds per hour; hourly offsets must be below this.
const SECONDS_PER_HOUR: u32 = 3600;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A scheduler or service value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// A world rule table is unusable.
    #[error("invalid world rules: {source}")]
    Rules {
        /// The underlying rule error.
        #[from]
        source: WorldError,
    },

    /// The population table is unusable.
    #[error("invalid population config: {source}")]
    Population {
        /// The underlying population error.
        #[from]
        source: PopulationError,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration.
///
/// Mirrors the structure of `colony-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ColonyConfig {
    /// Tick loop cadence and subsystem windows.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Founding defaults and base capacities.
    #[serde(default)]
    pub settlement: SettlementConfig,

    /// Construction queue slots.
    #[serde(default)]
    pub construction: ConstructionConfig,

    /// Build area budget.
    #[serde(default)]
    pub area: AreaConfig,

    /// Offline accumulation tiers.
    #[serde(default)]
    pub accumulation: AccumulationConfig,

    /// Per-capita upkeep.
    #[serde(default)]
    pub production: ProductionConfig,

    /// Population dynamics.
    #[serde(default)]
    pub population: PopulationConfig,

    /// Disaster lifecycle.
    #[serde(default)]
    pub disasters: DisasterConfig,

    /// Repairs and the emergency window.
    #[serde(default)]
    pub repairs: RepairConfig,

    /// Observer HTTP server.
    #[serde(default)]
    pub observer: ObserverConfig,

    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// World seeding and persistence.
    #[serde(default)]
    pub world: WorldConfig,
}

impl ColonyConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `COLONY_OBSERVER_PORT` overrides `observer.port`
    /// - `COLONY_LOG_LEVEL` overrides `logging.level`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, then apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `COLONY_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Some(port) = std::env::var("COLONY_OBSERVER_PORT")
            .ok()
            .and_then(|val| val.parse().ok())
        {
            self.observer.port = port;
        }
        if let Ok(level) = std::env::var("COLONY_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// The world rule tables as one aggregate.
    pub fn rules(&self) -> WorldRules {
        WorldRules {
            settlement: self.settlement.clone(),
            area: self.area,
            accumulation: self.accumulation.clone(),
            production: self.production.clone(),
            construction: self.construction,
            disasters: self.disasters.clone(),
            repairs: self.repairs,
        }
    }

    /// Reject values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scheduler.validate()?;
        self.rules().validate()?;
        self.population.validate()?;
        Ok(())
    }
}

/// Tick loop configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SchedulerConfig {
    /// Milliseconds between scheduler wakes.
    #[serde(default = "default_loop_interval_ms")]
    pub loop_interval_ms: u64,

    /// Seconds after a boundary during which a missed window still fires.
    #[serde(default = "default_fire_grace_secs")]
    pub fire_grace_secs: u32,

    /// Offset into the hour of the resources tick.
    #[serde(default = "default_resources_offset_secs")]
    pub resources_offset_secs: u32,

    /// Offset into the hour of the population tick.
    #[serde(default = "default_population_offset_secs")]
    pub population_offset_secs: u32,

    /// Offset into the hour of the repairs tick.
    #[serde(default = "default_repairs_offset_secs")]
    pub repairs_offset_secs: u32,

    /// Period of the disaster check.
    #[serde(default = "default_disaster_period_secs")]
    pub disaster_period_secs: u32,

    /// Period of the construction completion sweep.
    #[serde(default = "default_construction_period_secs")]
    pub construction_period_secs: u32,

    /// Settlements processed concurrently per batch (0 = automatic).
    #[serde(default)]
    pub worker_parallelism: usize,

    /// Timing deviation beyond which a firing is logged as a warning.
    #[serde(default = "default_deviation_warn_ms")]
    pub deviation_warn_ms: u64,

    /// Seconds between periodic monitor reports in the log.
    #[serde(default = "default_report_interval_secs")]
    pub report_interval_secs: u64,

    /// Samples kept by the tick monitor.
    #[serde(default = "default_monitor_capacity")]
    pub monitor_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            loop_interval_ms: default_loop_interval_ms(),
            fire_grace_secs: default_fire_grace_secs(),
            resources_offset_secs: default_resources_offset_secs(),
            population_offset_secs: default_population_offset_secs(),
            repairs_offset_secs: default_repairs_offset_secs(),
            disaster_period_secs: default_disaster_period_secs(),
            construction_period_secs: default_construction_period_secs(),
            worker_parallelism: 0,
            deviation_warn_ms: default_deviation_warn_ms(),
            report_interval_secs: default_report_interval_secs(),
            monitor_capacity: default_monitor_capacity(),
        }
    }
}

impl SchedulerConfig {
    /// Reject zero cadences and offsets outside the hour.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(String::from(msg)));
        if self.loop_interval_ms == 0 {
            return invalid("scheduler.loop_interval_ms must be > 0");
        }
        if self.disaster_period_secs == 0 || self.construction_period_secs == 0 {
            return invalid("scheduler periods must be > 0");
        }
        for (name, offset) in [
            ("resources_offset_secs", self.resources_offset_secs),
            ("population_offset_secs", self.population_offset_secs),
            ("repairs_offset_secs", self.repairs_offset_secs),
        ] {
            if offset >= SECONDS_PER_HOUR {
                return Err(ConfigError::Invalid(format!(
                    "scheduler.{name} must be < {SECONDS_PER_HOUR}"
                )));
            }
        }
        if self.monitor_capacity == 0 {
            return invalid("scheduler.monitor_capacity must be > 0");
        }
        Ok(())
    }
}

/// Observer HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObserverConfig {
    /// Whether to start the observer.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Bind address.
    #[serde(default = "default_observer_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_observer_port")]
    pub port: u16,

    /// Messages buffered per WebSocket subscriber before it starts skipping.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_observer_host(),
            port: default_observer_port(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// World seeding and persistence.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// Human-readable world name.
    #[serde(default = "default_world_name")]
    pub name: String,

    /// Seed for every random roll the engine makes.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Settlements founded at startup when the store is empty.
    #[serde(default = "default_demo_settlements")]
    pub demo_settlements: u32,

    /// Biomes assigned round-robin to seeded settlements.
    #[serde(default = "default_biomes")]
    pub biomes: Vec<String>,

    /// Snapshot file restored at startup and written at shutdown.
    #[serde(default)]
    pub snapshot_path: Option<String>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: default_world_name(),
            seed: default_seed(),
            demo_settlements: default_demo_settlements(),
            biomes: default_biomes(),
            snapshot_path: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

const fn default_loop_interval_ms() -> u64 {
    1000
}

const fn default_fire_grace_secs() -> u32 {
    300
}

const fn default_resources_offset_secs() -> u32 {
    0
}

const fn default_population_offset_secs() -> u32 {
    1800
}

const fn default_repairs_offset_secs() -> u32 {
    2700
}

const fn default_disaster_period_secs() -> u32 {
    900
}

const fn default_construction_period_secs() -> u32 {
    60
}

const fn default_deviation_warn_ms() -> u64 {
    1000
}

const fn default_report_interval_secs() -> u64 {
    3600
}

const fn default_monitor_capacity() -> usize {
    3600
}

fn default_observer_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_observer_port() -> u16 {
    8080
}

const fn default_channel_capacity() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_world_name() -> String {
    "Colony".to_owned()
}

const fn default_seed() -> u64 {
    42
}

const fn default_demo_settlements() -> u32 {
    3
}

fn default_biomes() -> Vec<String> {
    ["plains", "forest", "coast"]
        .into_iter()
        .map(str::to_owned)
        .collect()
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ColonyConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduler.loop_interval_ms, 1000);
        assert_eq!(config.scheduler.population_offset_secs, 1800);
        assert_eq!(config.construction.active_slots, 3);
        assert_eq!(config.area.base_capacity, 500);
    }

    #[test]
    fn parse_sectioned_yaml() {
        let yaml = r#"
scheduler:
  loop_interval_ms: 500
  disaster_period_secs: 600

construction:
  active_slots: 2

area:
  base_capacity: 400
  per_town_hall_level: 150

accumulation:
  tiers:
    - { until_effective_hours: 12, rate: 1 }
    - { until_effective_hours: 24, rate: 0.5 }

population:
  immigration_threshold: 80

disasters:
  warning_chance_bp: 0

world:
  name: "Test World"
  demo_settlements: 1
"#;
        let config = ColonyConfig::parse(yaml);
        assert!(config.is_ok(), "{config:?}");
        let config = config.ok().unwrap_or_default();

        assert_eq!(config.scheduler.loop_interval_ms, 500);
        assert_eq!(config.scheduler.disaster_period_secs, 600);
        assert_eq!(config.scheduler.repairs_offset_secs, 2700);
        assert_eq!(config.construction.active_slots, 2);
        assert_eq!(config.rules().area.per_town_hall_level, 150);
        assert_eq!(config.accumulation.tiers.len(), 2);
        assert_eq!(config.population.immigration_threshold, 80);
        assert_eq!(config.disasters.warning_chance_bp, 0);
        assert_eq!(config.world.name, "Test World");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_empty_yaml() {
        let config = ColonyConfig::parse("");
        assert!(config.is_ok());
    }

    #[test]
    fn offset_outside_hour_rejected() {
        let config = ColonyConfig::parse("scheduler:\n  repairs_offset_secs: 3600\n")
            .ok()
            .unwrap_or_default();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn zero_slots_rejected() {
        let config = ColonyConfig::parse("construction:\n  active_slots: 0\n")
            .ok()
            .unwrap_or_default();
        assert!(matches!(config.validate(), Err(ConfigError::Rules { .. })));
    }

    #[test]
    fn unordered_tiers_rejected() {
        let yaml = "accumulation:\n  tiers:\n    - { until_effective_hours: 48, rate: 0.5 }\n    - { until_effective_hours: 24, rate: 1 }\n";
        let config = ColonyConfig::parse(yaml).ok().unwrap_or_default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("colony-config.yaml");
        if path.exists() {
            let config = ColonyConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
