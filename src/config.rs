//! Configuration system for sensing scenarios.
//!
//! This module provides YAML/JSON configuration file support for defining
//! scenarios declaratively: the application graph, the devices hosting its
//! modules and the sensors feeding it.
//!
//! # Configuration File Structure
//!
//! ```yaml
//! simulation:
//!   name: mine-safety
//!   max_time: 1000
//!   seed: 42
//!
//! application:
//!   id: MineSafetyApp
//!   user_id: 1
//!   modules:
//!     - { name: gasinfo-module, ram: 10 }
//!     - { name: master-module, ram: 10 }
//!   sources: [gas-sensor]
//!   edges:
//!     - { source: GAS, destination: gasinfo-module, cpu_length: 1000,
//!         network_length: 200, type_tag: GAS, category: sensor }
//!   loops:
//!     - [gas-sensor, gasinfo-module, master-module]
//!
//! devices:
//!   - { name: router, mips: 10000, level: 0, modules: [master-module] }
//!   - { name: gas-fog, mips: 5000, level: 2, uplink_latency: 2, modules: [gasinfo-module] }
//!
//! sensors:
//!   - name: gas-sensor
//!     type_tag: GAS
//!     gateway: gas-fog
//!     latency: 6
//!     distribution: { type: deterministic, value: 5 }
//!     range: { min: 0.0, max: 100.0 }
//!     alert: { threshold: 90.0 }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use thiserror::Error;

use crate::application::{AppEdge, AppGraph, AppGraphBuilder, AppModule, EdgeCategory, GraphError};
use crate::distribution::TransmitDistribution;
use crate::engine::EngineError;
use crate::entities::alert::{AlertKind, DEFAULT_RESPONSE_MODULE};
use crate::entities::processing::ModulePlacement;
use crate::entities::sensor::{ValueRange, DEFAULT_JOIN_DELAY, DEFAULT_TRANSMISSION_START_DELAY};
use crate::types::{SimTime, UserId};

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid application graph: {0}")]
    Graph(#[from] GraphError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown file format: {0}")]
    UnknownFormat(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Global simulation parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    /// Scenario name used in reports
    #[serde(default = "default_name")]
    pub name: String,

    /// Maximum simulation time
    #[serde(default = "default_max_time")]
    pub max_time: SimTime,

    /// Seed from which every sensor's random source is derived
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Added to the first sampling interval of every sensor
    #[serde(default = "default_start_delay")]
    pub transmission_start_delay: SimTime,

    /// Delay before sensors announce themselves to their gateway
    #[serde(default = "default_join_delay")]
    pub join_delay: SimTime,
}

fn default_name() -> String {
    "scenario".to_string()
}

fn default_max_time() -> SimTime {
    1000
}

fn default_seed() -> u64 {
    42
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_start_delay() -> SimTime {
    DEFAULT_TRANSMISSION_START_DELAY
}

fn default_join_delay() -> SimTime {
    DEFAULT_JOIN_DELAY
}

fn default_sensor_latency() -> SimTime {
    6
}

fn default_response_module() -> String {
    DEFAULT_RESPONSE_MODULE.to_string()
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            name: default_name(),
            max_time: default_max_time(),
            seed: default_seed(),
            log_level: default_log_level(),
            transmission_start_delay: default_start_delay(),
            join_delay: default_join_delay(),
        }
    }
}

/// Application graph declaration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    pub id: String,

    #[serde(default)]
    pub user_id: UserId,

    #[serde(default)]
    pub modules: Vec<AppModule>,

    /// Names (typically sensor names) loops may start from
    #[serde(default)]
    pub sources: Vec<String>,

    #[serde(default)]
    pub edges: Vec<AppEdge>,

    #[serde(default)]
    pub loops: Vec<Vec<String>>,
}

impl ApplicationConfig {
    /// Builds and validates the application graph.
    pub fn build_graph(&self) -> Result<AppGraph, GraphError> {
        let mut builder = AppGraphBuilder::new(self.id.as_str());
        for module in &self.modules {
            builder = builder.module(module.name.as_str(), module.ram);
        }
        for source in &self.sources {
            builder = builder.source(source.as_str());
        }
        for edge in &self.edges {
            builder = builder.edge(edge.clone());
        }
        for path in &self.loops {
            builder = builder.add_loop(path.iter().map(String::as_str));
        }
        builder.build()
    }
}

/// A processing device and the modules it hosts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub name: String,

    /// Instructions per time unit
    pub mips: u64,

    /// Level in the hierarchy (0 is the top)
    #[serde(default)]
    pub level: u32,

    /// Delay added to messages leaving this device
    #[serde(default)]
    pub uplink_latency: SimTime,

    #[serde(default)]
    pub modules: Vec<String>,
}

impl DeviceConfig {
    pub fn new(name: impl Into<String>, mips: u64) -> Self {
        Self {
            name: name.into(),
            mips,
            level: 0,
            uplink_latency: 0,
            modules: Vec::new(),
        }
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    pub fn with_uplink_latency(mut self, latency: SimTime) -> Self {
        self.uplink_latency = latency;
        self
    }

    /// Places `module` on this device.
    pub fn hosting(mut self, module: impl Into<String>) -> Self {
        self.modules.push(module.into());
        self
    }
}

/// Threshold alert attached to a sensor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Derived from the sensor's type tag when omitted
    #[serde(default)]
    pub kind: Option<AlertKind>,

    /// Defaults to the kind's standard threshold
    #[serde(default)]
    pub threshold: Option<f64>,

    #[serde(default = "default_response_module")]
    pub destination_module: String,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            kind: None,
            threshold: None,
            destination_module: default_response_module(),
        }
    }
}

impl AlertConfig {
    /// Resolves the processor kind for a sensor with `type_tag`.
    pub fn resolve_kind(&self, type_tag: &str) -> Option<AlertKind> {
        self.kind.or_else(|| AlertKind::for_type_tag(type_tag))
    }
}

/// A sensor wired to a gateway device.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    pub name: String,
    pub type_tag: String,

    /// Name of the gateway device
    pub gateway: String,

    #[serde(default = "default_sensor_latency")]
    pub latency: SimTime,

    #[serde(default)]
    pub distribution: TransmitDistribution,

    #[serde(default)]
    pub range: ValueRange,

    #[serde(default)]
    pub alert: Option<AlertConfig>,
}

impl SensorConfig {
    pub fn new(name: impl Into<String>, type_tag: impl Into<String>, gateway: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_tag: type_tag.into(),
            gateway: gateway.into(),
            latency: default_sensor_latency(),
            distribution: TransmitDistribution::default(),
            range: ValueRange::default(),
            alert: None,
        }
    }

    pub fn with_latency(mut self, latency: SimTime) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_distribution(mut self, distribution: TransmitDistribution) -> Self {
        self.distribution = distribution;
        self
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.range = ValueRange::new(min, max);
        self
    }

    pub fn with_alert(mut self, alert: AlertConfig) -> Self {
        self.alert = Some(alert);
        self
    }
}

/// Complete scenario configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Global simulation parameters
    #[serde(default)]
    pub simulation: SimulationParams,

    pub application: ApplicationConfig,

    #[serde(default)]
    pub devices: Vec<DeviceConfig>,

    #[serde(default)]
    pub sensors: Vec<SensorConfig>,
}

impl ScenarioConfig {
    /// Loads configuration from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Loads configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        let config: ScenarioConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Loads configuration from a JSON string.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: ScenarioConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a file, auto-detecting format.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        match ext.to_lowercase().as_str() {
            "yaml" | "yml" => Self::from_yaml_file(path),
            "json" => Self::from_json_file(path),
            _ => Err(ConfigError::UnknownFormat(ext.to_string())),
        }
    }

    /// Validates the entire configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        self.prepare().map(|_| ())
    }

    /// Validates the configuration and returns the built graph and module
    /// placement, so callers need not build them a second time.
    pub fn prepare(&self) -> ConfigResult<(AppGraph, ModulePlacement)> {
        let graph = self.application.build_graph()?;
        let placement = self.placement()?;

        // Entity names share one namespace
        let mut names = HashSet::new();
        for device in &self.devices {
            if !names.insert(device.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate entity name: {}",
                    device.name
                )));
            }
            if device.mips == 0 {
                return Err(ConfigError::Validation(format!(
                    "Device {} has zero mips",
                    device.name
                )));
            }
        }

        let device_names: HashSet<&str> = self.devices.iter().map(|d| d.name.as_str()).collect();
        for sensor in &self.sensors {
            if !names.insert(sensor.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate entity name: {}",
                    sensor.name
                )));
            }
            if !device_names.contains(sensor.gateway.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Sensor {} references non-existent gateway device: {}",
                    sensor.name, sensor.gateway
                )));
            }
            if !sensor.range.is_valid() {
                return Err(ConfigError::Validation(format!(
                    "Sensor {} has invalid value range [{}, {}]",
                    sensor.name, sensor.range.min, sensor.range.max
                )));
            }
            sensor.distribution.validate().map_err(|e| {
                ConfigError::Validation(format!("Sensor {} distribution: {}", sensor.name, e))
            })?;

            if let Some(alert) = &sensor.alert {
                if alert.resolve_kind(&sensor.type_tag).is_none() {
                    return Err(ConfigError::Validation(format!(
                        "Sensor {} has an alert but no processor exists for type tag {}",
                        sensor.name, sensor.type_tag
                    )));
                }
                if alert.threshold.is_some_and(|t| !t.is_finite()) {
                    return Err(ConfigError::Validation(format!(
                        "Sensor {} has a non-finite alert threshold",
                        sensor.name
                    )));
                }
                if placement.device_for(&alert.destination_module).is_none() {
                    return Err(ConfigError::Validation(format!(
                        "Sensor {} alerts module {} which is placed on no device",
                        sensor.name, alert.destination_module
                    )));
                }
            }

            if graph.find_edge_by_source(&sensor.type_tag).is_none() {
                tracing::warn!(
                    sensor = %sensor.name,
                    type_tag = %sensor.type_tag,
                    "sensor type tag matches no edge; its readings will be skipped"
                );
            }
        }

        for module in graph.modules() {
            if placement.device_for(&module.name).is_none() {
                tracing::warn!(module = %module.name, "module is not placed on any device");
            }
        }

        Ok((graph, placement))
    }

    /// Builds the module-to-device mapping declared by the devices.
    pub fn placement(&self) -> ConfigResult<ModulePlacement> {
        let declared: HashSet<&str> = self
            .application
            .modules
            .iter()
            .map(|m| m.name.as_str())
            .collect();

        let mut placement = ModulePlacement::new();
        for device in &self.devices {
            for module in &device.modules {
                if !declared.contains(module.as_str()) {
                    return Err(ConfigError::Validation(format!(
                        "Device {} hosts undeclared module: {}",
                        device.name, module
                    )));
                }
                if let Some(previous) = placement.place(module.as_str(), device.name.as_str()) {
                    return Err(ConfigError::Validation(format!(
                        "Module {} is placed on both {} and {}",
                        module, previous, device.name
                    )));
                }
            }
        }
        Ok(placement)
    }

    /// Saves configuration to a YAML file.
    pub fn to_yaml_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Saves configuration to a JSON file.
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Converts to YAML string.
    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Converts to JSON string.
    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Finds a device configuration by name.
    pub fn find_device(&self, name: &str) -> Option<&DeviceConfig> {
        self.devices.iter().find(|d| d.name == name)
    }

    /// Finds a sensor configuration by name.
    pub fn find_sensor(&self, name: &str) -> Option<&SensorConfig> {
        self.sensors.iter().find(|s| s.name == name)
    }

    /// Sensor names grouped by gateway device.
    pub fn sensors_by_gateway(&self) -> HashMap<&str, Vec<&str>> {
        let mut grouped: HashMap<&str, Vec<&str>> = HashMap::new();
        for sensor in &self.sensors {
            grouped
                .entry(sensor.gateway.as_str())
                .or_default()
                .push(sensor.name.as_str());
        }
        grouped
    }

    /// The mine-safety monitoring deployment.
    ///
    /// Gas, chemical and surrounding-environment sensors each feed an info
    /// module on their own fog device; all three report to a master module on
    /// the router, which alerts a response module on the proxy server.
    pub fn mine_safety() -> Self {
        let builder = ScenarioConfigBuilder::new("mine-safety")
            .max_time(1000)
            .application("MineSafetyApp", 1)
            .module("master-module", 10)
            .module("response-module", 10)
            .module("gasinfo-module", 10)
            .module("chinfo-module", 10)
            .module("srinfo-module", 10)
            .edge(AppEdge::new("GAS", "gasinfo-module", 1000, 200, "GAS", EdgeCategory::Sensor))
            .edge(AppEdge::new("CHEM", "chinfo-module", 1000, 200, "CHEM", EdgeCategory::Sensor))
            .edge(AppEdge::new("SR", "srinfo-module", 1000, 200, "SR", EdgeCategory::Sensor))
            .edge(AppEdge::new("gasinfo-module", "master-module", 2000, 200, "GAS_PROCESS", EdgeCategory::Module))
            .edge(AppEdge::new("chinfo-module", "master-module", 2000, 200, "CHEM_PROCESS", EdgeCategory::Module))
            .edge(AppEdge::new("srinfo-module", "master-module", 2000, 200, "SR_PROCESS", EdgeCategory::Module))
            .edge(AppEdge::new("master-module", "response-module", 2000, 200, "ALERT", EdgeCategory::Module))
            .add_loop(["gas-sensor", "gasinfo-module", "master-module", "response-module"])
            .add_loop(["chem-sensor", "chinfo-module", "master-module", "response-module"])
            .add_loop(["sr-sensor", "srinfo-module", "master-module", "response-module"])
            .device(DeviceConfig::new("router", 10000).hosting("master-module"))
            .device(
                DeviceConfig::new("proxy-server", 8000)
                    .with_level(1)
                    .with_uplink_latency(4)
                    .hosting("response-module"),
            );

        let sensors = [
            ("gas", "GAS", "gasinfo-module", 100.0),
            ("chem", "CHEM", "chinfo-module", 50.0),
            ("sr", "SR", "srinfo-module", 10.0),
        ];
        let builder = sensors.iter().fold(builder, |b, (prefix, tag, module, max)| {
            b.source(format!("{prefix}-sensor"))
                .device(
                    DeviceConfig::new(format!("{prefix}-fog"), 5000)
                        .with_level(2)
                        .with_uplink_latency(2)
                        .hosting(*module),
                )
                .sensor(
                    SensorConfig::new(format!("{prefix}-sensor"), *tag, format!("{prefix}-fog"))
                        .with_distribution(TransmitDistribution::deterministic(5))
                        .with_range(0.0, *max)
                        .with_alert(AlertConfig::default()),
                )
        });

        builder.into_config()
    }
}

/// Builder for creating ScenarioConfig programmatically.
#[derive(Default)]
pub struct ScenarioConfigBuilder {
    config: ScenarioConfig,
}

impl ScenarioConfigBuilder {
    /// Creates a builder for a scenario called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        let mut config = ScenarioConfig::default();
        config.simulation.name = name.into();
        Self { config }
    }

    /// Sets the maximum simulation time.
    pub fn max_time(mut self, time: SimTime) -> Self {
        self.config.simulation.max_time = time;
        self
    }

    /// Sets the scenario seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.simulation.seed = seed;
        self
    }

    /// Sets the log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.simulation.log_level = level.into();
        self
    }

    /// Sets the delay added to every sensor's first sample.
    pub fn transmission_start_delay(mut self, delay: SimTime) -> Self {
        self.config.simulation.transmission_start_delay = delay;
        self
    }

    /// Sets the topology join delay.
    pub fn join_delay(mut self, delay: SimTime) -> Self {
        self.config.simulation.join_delay = delay;
        self
    }

    /// Sets the application id and owning user.
    pub fn application(mut self, id: impl Into<String>, user_id: UserId) -> Self {
        self.config.application.id = id.into();
        self.config.application.user_id = user_id;
        self
    }

    /// Declares a module.
    pub fn module(mut self, name: impl Into<String>, ram: u32) -> Self {
        self.config.application.modules.push(AppModule {
            name: name.into(),
            ram,
        });
        self
    }

    /// Declares a loop source name.
    pub fn source(mut self, name: impl Into<String>) -> Self {
        self.config.application.sources.push(name.into());
        self
    }

    /// Declares an edge.
    pub fn edge(mut self, edge: AppEdge) -> Self {
        self.config.application.edges.push(edge);
        self
    }

    /// Declares a monitored loop.
    pub fn add_loop<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config
            .application
            .loops
            .push(path.into_iter().map(Into::into).collect());
        self
    }

    /// Adds a device.
    pub fn device(mut self, device: DeviceConfig) -> Self {
        self.config.devices.push(device);
        self
    }

    /// Adds a sensor.
    pub fn sensor(mut self, sensor: SensorConfig) -> Self {
        self.config.sensors.push(sensor);
        self
    }

    /// Returns the configuration without validating it.
    pub fn into_config(self) -> ScenarioConfig {
        self.config
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> ConfigResult<ScenarioConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_YAML: &str = r#"
simulation:
  name: tiny
  max_time: 200
  seed: 7

application:
  id: app
  modules:
    - { name: gasinfo-module, ram: 10 }
    - { name: master-module }
  sources: [gas-sensor]
  edges:
    - { source: GAS, destination: gasinfo-module, cpu_length: 1000, network_length: 200, type_tag: GAS, category: sensor }
    - { source: gasinfo-module, destination: master-module, cpu_length: 2000, network_length: 200, type_tag: GAS_PROCESS, category: module }
  loops:
    - [gas-sensor, gasinfo-module, master-module]

devices:
  - { name: router, mips: 10000, modules: [master-module] }
  - { name: gas-fog, mips: 5000, level: 2, uplink_latency: 2, modules: [gasinfo-module] }

sensors:
  - name: gas-sensor
    type_tag: GAS
    gateway: gas-fog
    distribution: { type: uniform, min: 3, max: 7 }
    range: { min: 0.0, max: 100.0 }
"#;

    #[test]
    fn test_default_params() {
        let params = SimulationParams::default();
        assert_eq!(params.max_time, 1000);
        assert_eq!(params.seed, 42);
        assert_eq!(params.transmission_start_delay, 5);
        assert_eq!(params.join_delay, 1);
    }

    #[test]
    fn test_yaml_parsing() {
        let config = ScenarioConfig::from_yaml(MINIMAL_YAML).unwrap();
        assert_eq!(config.simulation.name, "tiny");
        assert_eq!(config.simulation.max_time, 200);
        assert_eq!(config.simulation.log_level, "info");
        assert_eq!(config.application.modules[1].ram, 0);
        assert_eq!(config.devices.len(), 2);

        let sensor = config.find_sensor("gas-sensor").unwrap();
        assert_eq!(sensor.latency, 6);
        assert_eq!(sensor.distribution, TransmitDistribution::Uniform { min: 3, max: 7 });
        assert!(sensor.alert.is_none());
        assert_eq!(config.find_device("gas-fog").unwrap().uplink_latency, 2);
    }

    #[test]
    fn test_json_parsing() {
        let json = ScenarioConfig::mine_safety().to_json().unwrap();
        let config = ScenarioConfig::from_json(&json).unwrap();
        assert_eq!(config, ScenarioConfig::mine_safety());
    }

    #[test]
    fn test_mine_safety_is_valid() {
        let config = ScenarioConfig::mine_safety();
        config.validate().unwrap();

        assert_eq!(config.devices.len(), 5);
        assert_eq!(config.sensors.len(), 3);
        assert_eq!(config.application.loops.len(), 3);

        let placement = config.placement().unwrap();
        assert_eq!(placement.device_for("master-module"), Some("router"));
        assert_eq!(placement.device_for("response-module"), Some("proxy-server"));
        assert_eq!(placement.device_for("chinfo-module"), Some("chem-fog"));

        let by_gateway = config.sensors_by_gateway();
        assert_eq!(by_gateway["sr-fog"], vec!["sr-sensor"]);
    }

    #[test]
    fn test_builder() {
        let config = ScenarioConfigBuilder::new("b")
            .max_time(50)
            .seed(3)
            .application("app", 2)
            .module("m", 1)
            .edge(AppEdge::new("T", "m", 10, 10, "T", EdgeCategory::Sensor))
            .device(DeviceConfig::new("d", 100).hosting("m"))
            .sensor(SensorConfig::new("s", "T", "d").with_latency(1))
            .build()
            .unwrap();

        assert_eq!(config.simulation.max_time, 50);
        assert_eq!(config.simulation.seed, 3);
        assert_eq!(config.application.user_id, 2);
        assert_eq!(config.sensors[0].latency, 1);
    }

    #[test]
    fn test_validation_unknown_gateway() {
        let mut config = ScenarioConfig::mine_safety();
        config.sensors[0].gateway = "nowhere".into();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validation_duplicate_names() {
        let mut config = ScenarioConfig::mine_safety();
        config.sensors[1].name = "router".into();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validation_double_placement() {
        let mut config = ScenarioConfig::mine_safety();
        config.devices[0].modules.push("gasinfo-module".into());
        assert!(matches!(config.placement(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validation_undeclared_module_on_device() {
        let mut config = ScenarioConfig::mine_safety();
        config.devices[1].modules.push("ghost-module".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_bad_range_and_distribution() {
        let mut config = ScenarioConfig::mine_safety();
        config.sensors[0].range = ValueRange::new(10.0, 0.0);
        assert!(config.validate().is_err());

        let mut config = ScenarioConfig::mine_safety();
        config.sensors[0].distribution = TransmitDistribution::Uniform { min: 9, max: 2 };
        assert!(config.validate().is_err());

        let mut config = ScenarioConfig::mine_safety();
        config.devices[0].mips = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_alert_without_processor() {
        let mut config = ScenarioConfig::mine_safety();
        config.sensors[0].type_tag = "UNKNOWN".into();
        assert!(config.validate().is_err());

        config.sensors[0].alert = None;
        config.validate().unwrap();
    }

    #[test]
    fn test_validation_graph_error() {
        let mut config = ScenarioConfig::mine_safety();
        config.application.loops.push(vec!["ghost".into(), "master-module".into()]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Graph(GraphError::UnknownLoopName { .. }))
        ));
    }

    #[test]
    fn test_unknown_format() {
        let result = ScenarioConfig::from_file("scenario.toml");
        assert!(matches!(result, Err(ConfigError::UnknownFormat(ext)) if ext == "toml"));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = ScenarioConfig::mine_safety();
        let yaml = config.to_yaml().unwrap();
        let restored = ScenarioConfig::from_yaml(&yaml).unwrap();
        assert_eq!(config, restored);
    }
}
