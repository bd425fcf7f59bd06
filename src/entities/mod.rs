//! Built-in entity implementations.
//!
//! # Available Entities
//!
//! - [`Sensor`] - Periodically samples a reading and sends it to its gateway
//! - [`ProcessingNode`] - Hosts application modules and closes monitored loops
//!
//! Sensors may carry a [`ThresholdProcessor`] that raises alerts on
//! out-of-range readings.

pub mod alert;
pub mod processing;
pub mod sensor;

pub use alert::{AlertKind, AlertOrigin, ThresholdProcessor};
pub use processing::{ModulePlacement, ProcessingNode, ProcessingStats};
pub use sensor::{Sensor, SensorStats, TransmitOutcome, ValueRange};
