//! The simulated unit of data in flight.

use serde::{Deserialize, Serialize};

use crate::types::{EntityId, MessageId, UserId};

/// Output size of every sensor reading.
pub const SENSOR_OUTPUT_SIZE: u64 = 3;

/// Flow direction relative to the device hierarchy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Towards the cloud
    #[default]
    Up,
    /// Towards the edge
    Down,
}

/// A message travelling between entities.
///
/// Cost fields (`cpu_length`, `network_length`, `output_size`) are carried
/// for downstream consumers; the sensor only copies them from the edge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Owning application instance
    pub application_id: String,
    /// Unique for the lifetime of the run
    pub message_id: MessageId,
    pub direction: Direction,
    pub cpu_length: u64,
    pub network_length: u64,
    pub output_size: u64,
    /// Category used for edge and route matching (e.g. "GAS")
    pub type_tag: String,
    pub source_module_name: String,
    pub destination_module_name: String,
    /// Target entity in the engine's address space
    pub destination_device_id: EntityId,
    /// Entity that emitted this message
    pub source_entity_id: EntityId,
    /// Sampled reading
    pub payload_value: f64,
    /// Tracking id in the TimeKeeper, `None` when not part of a monitored loop
    pub actual_message_id: Option<MessageId>,
    pub user_id: UserId,
}

impl Message {
    /// Creates an upward message with empty routing fields.
    pub fn new(
        application_id: impl Into<String>,
        message_id: MessageId,
        type_tag: impl Into<String>,
    ) -> Self {
        Self {
            application_id: application_id.into(),
            message_id,
            direction: Direction::Up,
            cpu_length: 0,
            network_length: 0,
            output_size: 0,
            type_tag: type_tag.into(),
            source_module_name: String::new(),
            destination_module_name: String::new(),
            destination_device_id: 0,
            source_entity_id: 0,
            payload_value: 0.0,
            actual_message_id: None,
            user_id: 0,
        }
    }

    /// Sets the cost fields.
    pub fn with_costs(mut self, cpu_length: u64, network_length: u64, output_size: u64) -> Self {
        self.cpu_length = cpu_length;
        self.network_length = network_length;
        self.output_size = output_size;
        self
    }

    /// Sets source and destination module names.
    pub fn with_route(mut self, source: impl Into<String>, destination: impl Into<String>) -> Self {
        self.source_module_name = source.into();
        self.destination_module_name = destination.into();
        self
    }

    /// Returns `true` if this message carries a tracking id.
    pub fn is_tracked(&self) -> bool {
        self.actual_message_id.is_some()
    }

    /// Returns the tracking id, or -1 when untracked.
    pub fn tracking_id_raw(&self) -> i64 {
        self.actual_message_id
            .and_then(|id| i64::try_from(id).ok())
            .unwrap_or(-1)
    }
}
