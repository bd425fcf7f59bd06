//! Integration tests for full scenarios.
//!
//! These tests verify end-to-end runs of the mine-safety deployment including:
//! - Loop completion and latency through fog, router and proxy devices
//! - Alerts and acknowledgements reaching their targets
//! - YAML loading and seed determinism

use std::path::PathBuf;

use fogloop::config::{DeviceConfig, SensorConfig};
use fogloop::{run_batch, run_scenario, Scenario, ScenarioConfig, Sensor};

// ============================================================================
// Helpers
// ============================================================================

fn demo_yaml() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/mine_safety.yaml")
}

fn sensor_stat(report: &fogloop::RunReport, sensor: &str, field: &str) -> u64 {
    report.entities[sensor][field].as_u64().unwrap()
}

// ============================================================================
// Mine Safety
// ============================================================================

#[test]
fn test_mine_safety_loops_complete() {
    let report = run_scenario(&ScenarioConfig::mine_safety()).unwrap();

    assert_eq!(report.engine.final_time, 1000);
    assert_eq!(report.engine.entity_count, 8);
    assert_eq!(report.engine.delivery_failures, 0);
    assert_eq!(report.loops.len(), 3);

    // Ticks at 10, 15, ..., 1000; a reading needs 10 units to close its loop
    // (6 sensor link, 1 + 2 on the fog device, 1 on the router).
    for l in &report.loops {
        assert_eq!(l.emitted, 199, "loop {}", l.path);
        assert_eq!(l.completed, 197, "loop {}", l.path);
        assert_eq!(l.min_latency, Some(10));
        assert_eq!(l.max_latency, Some(10));
        assert_eq!(l.mean_latency, Some(10.0));
    }
    assert_eq!(report.engine.tracked_messages, 3 * 199);
}

#[test]
fn test_mine_safety_alerts_and_acks() {
    let mut scenario = Scenario::from_config(&ScenarioConfig::mine_safety()).unwrap();
    let report = scenario.run();

    let alerts: u64 = ["gas-sensor", "chem-sensor", "sr-sensor"]
        .iter()
        .map(|s| sensor_stat(&report, s, "alerts_fired"))
        .sum();
    assert!(alerts > 0);

    let proxy = &report.entities["proxy-server"];
    let processed = proxy["per_module"]["response-module"].as_u64().unwrap();
    assert_eq!(processed, 3 * 197 + alerts);

    let gas = scenario.engine.entity_id("gas-sensor").unwrap();
    let sensor = scenario.engine.entity::<Sensor>(gas).unwrap();
    assert_eq!(sensor.stats().samples, 199);
    // Readings reach the fog 6 units after their tick, so those sent at 995
    // and 1000 are never acked. Alerts are acked by the proxy at once.
    assert_eq!(sensor.stats().acks_received, 197 + sensor.stats().alerts_fired);
}

#[test]
fn test_attached_sensors_recorded() {
    let mut scenario = Scenario::from_config(&ScenarioConfig::mine_safety()).unwrap();
    scenario.run();

    let fog = scenario.engine.entity_id("chem-fog").unwrap();
    let node = scenario
        .engine
        .entity::<fogloop::ProcessingNode>(fog)
        .unwrap();
    let chem = scenario.engine.entity_id("chem-sensor").unwrap();
    assert_eq!(node.attached_sensors(), &[(chem, "CHEM".to_string())]);
}

#[test]
fn test_unknown_type_tag_in_scenario() {
    let mut config = ScenarioConfig::mine_safety();
    config.simulation.max_time = 200;
    config
        .sensors
        .push(SensorConfig::new("dust-sensor", "DUST", "gas-fog"));

    let report = run_scenario(&config).unwrap();
    assert_eq!(sensor_stat(&report, "dust-sensor", "transmitted"), 0);
    assert!(sensor_stat(&report, "dust-sensor", "skipped_no_edge") > 0);
    assert!(report.completed_loops() > 0);
}

#[test]
fn test_slower_fog_raises_latency() {
    let mut config = ScenarioConfig::mine_safety();
    config.simulation.max_time = 300;
    let gas_fog = config.devices.iter_mut().find(|d| d.name == "gas-fog").unwrap();
    *gas_fog = DeviceConfig::new("gas-fog", 250)
        .with_level(2)
        .with_uplink_latency(2)
        .hosting("gasinfo-module");

    let report = run_scenario(&config).unwrap();
    // 1000 / 250 = 4 units of processing instead of 1
    assert_eq!(report.loop_report(0).unwrap().min_latency, Some(13));
    assert_eq!(report.loop_report(1).unwrap().min_latency, Some(10));
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_demo_yaml_matches_builtin() {
    let loaded = ScenarioConfig::from_file(demo_yaml()).unwrap();
    assert_eq!(loaded, ScenarioConfig::mine_safety());
}

#[test]
fn test_yaml_run_reports() {
    let mut config = ScenarioConfig::from_yaml_file(demo_yaml()).unwrap();
    config.simulation.max_time = 100;
    let report = run_scenario(&config).unwrap();

    let json = report.to_json().unwrap();
    assert!(json.contains("gas-sensor -> gasinfo-module -> master-module -> response-module"));

    let csv = report.loops_to_csv();
    assert_eq!(csv.lines().count(), 4);
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn test_same_seed_same_run() {
    let mut config = ScenarioConfig::mine_safety();
    config.simulation.max_time = 300;
    config.simulation.seed = 7;

    let reports = run_batch(&[config.clone(), config]);
    let a = reports[0].as_ref().unwrap();
    let b = reports[1].as_ref().unwrap();

    assert_eq!(a.entities, b.entities);
    assert_eq!(
        serde_json::to_value(&a.loops).unwrap(),
        serde_json::to_value(&b.loops).unwrap()
    );
}

#[test]
fn test_seed_changes_readings() {
    let mut config = ScenarioConfig::mine_safety();
    config.simulation.max_time = 300;

    config.simulation.seed = 1;
    let first = run_scenario(&config).unwrap();
    config.simulation.seed = 2;
    let second = run_scenario(&config).unwrap();

    assert_ne!(
        first.entities["gas-sensor"]["last_value"],
        second.entities["gas-sensor"]["last_value"]
    );
}
