//! # Fogloop
//!
//! A discrete-event simulation of sensors feeding processing nodes, with
//! end-to-end latency tracking for declared application loops.
//!
//! ## Design Principles
//!
//! - **Entity-Driven**: Every participant is an [`Entity`] registered with the
//!   [`SimulationEngine`]; entities talk only through timestamped events.
//! - **Graph as Source of Truth**: An [`AppGraph`] names the modules, the
//!   edges messages follow and the loops whose latency is measured.
//! - **Explicit Time Registry**: Emission times live in a [`TimeKeeper`]
//!   owned by the engine and handed to entities through their context.
//!   Each run gets its own registry.
//! - **Deterministic**: A scenario seed fixes every sampled reading and every
//!   randomized transmit interval.
//!
//! ## Features
//!
//! - `parallel` - Run batches of independent scenarios on rayon
//!
//! ## Quick Start
//!
//! ```rust
//! use fogloop::{run_scenario, ScenarioConfig};
//!
//! let mut config = ScenarioConfig::mine_safety();
//! config.simulation.max_time = 200;
//!
//! let report = run_scenario(&config).unwrap();
//! println!("Completed loops: {}", report.completed_loops());
//! for l in &report.loops {
//!     println!("{} -> {:?}", l.path, l.mean_latency);
//! }
//! ```
//!
//! ## Configuration-Driven Setup
//!
//! ```rust,ignore
//! use fogloop::{Scenario, ScenarioConfig};
//!
//! let config = ScenarioConfig::from_yaml_file("mine_safety.yaml")?;
//! let mut scenario = Scenario::from_config(&config)?;
//! let report = scenario.run();
//! report.to_json_file("report.json")?;
//! ```

pub mod types;
pub mod random;
pub mod distribution;
pub mod message;
pub mod event;
pub mod application;
pub mod timekeeper;
pub mod entity;
pub mod engine;
pub mod entities;
pub mod config;
pub mod scenario;
pub mod stats;
pub mod parallel;

// Re-export commonly used types
pub use types::{EntityId, LoopId, MessageId, SimTime, UserId};
pub use random::{FixedSequence, RandomSource, SeededRandom};
pub use distribution::TransmitDistribution;
pub use message::{Direction, Message};
pub use event::{Event, EventPayload, EventTag};
pub use application::{AppEdge, AppGraph, AppGraphBuilder, AppLoop, AppModule, EdgeCategory, GraphError};
pub use timekeeper::{LoopLatency, TimeKeeper, TimingError};
pub use entity::{Entity, EntityDirectory, EntityKind, SimContext};
pub use engine::{EngineError, EngineStats, SimulationEngine};
pub use entities::{
    AlertKind, ModulePlacement, ProcessingNode, Sensor, SensorStats, ThresholdProcessor,
    TransmitOutcome, ValueRange,
};
pub use config::{ConfigError, ScenarioConfig, ScenarioConfigBuilder};
pub use scenario::{run_scenario, Scenario};
pub use stats::{LoopReport, RunReport, Timer};
pub use parallel::{run_batch, BatchRunner};

/// Initialize the tracing subscriber for logging.
///
/// Call this at the start of your program to enable logging. `RUST_LOG`
/// overrides `level` when set.
///
/// # Example
///
/// ```rust,ignore
/// fogloop::init_logging("info");
/// ```
pub fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
