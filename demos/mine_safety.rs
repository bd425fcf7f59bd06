//! Mine Safety Monitoring Example
//!
//! Runs the mine-safety deployment: gas, chemical and surrounding-environment
//! sensors report through fog devices to a master module on the router, and
//! out-of-range readings raise alerts on the proxy server.
//!
//! Usage:
//!
//! ```text
//! cargo run --example mine_safety                 # built-in scenario
//! cargo run --example mine_safety -- demos/mine_safety.yaml
//! ```

use std::error::Error;

use fogloop::{Scenario, ScenarioConfig, Sensor};

fn main() -> Result<(), Box<dyn Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => ScenarioConfig::from_file(path)?,
        None => ScenarioConfig::mine_safety(),
    };
    fogloop::init_logging(&config.simulation.log_level);

    println!("=== {} ===", config.simulation.name);
    println!("  Max time: {}", config.simulation.max_time);
    println!("  Seed:     {}", config.simulation.seed);
    for (gateway, sensors) in config.sensors_by_gateway() {
        println!("  {} <- {}", gateway, sensors.join(", "));
    }
    println!();

    let mut scenario = Scenario::from_config(&config)?;
    let report = scenario.run();

    print!("{}", report.summary());
    println!();

    println!("Sensors:");
    for sc in &config.sensors {
        let Some(id) = scenario.engine.entity_id(&sc.name) else {
            continue;
        };
        if let Some(sensor) = scenario.engine.entity::<Sensor>(id) {
            let stats = sensor.stats();
            println!(
                "  {:<12} samples={:<4} tracked={:<4} alerts={:<4} acks={}",
                sc.name, stats.samples, stats.tracked, stats.alerts_fired, stats.acks_received
            );
        }
    }

    Ok(())
}
