//! Event definitions for the simulation.
//!
//! Events are the only way entities interact: every delivery, timer and
//! announcement is an [`Event`] addressed to one entity at one virtual time.

use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::types::{EntityId, MessageId, SimTime};

/// Kinds of events an entity can react to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventTag {
    /// Self-addressed sampling timer of a sensor
    SelfEmitTick,
    /// A message delivered to its destination device
    MessageArrival,
    /// Receipt acknowledgement for a sensor message
    MessageArrivedAck,
    /// A sensor announcing itself to its gateway
    TopologyJoin,
}

/// The payload of an event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    /// No payload (timers)
    Empty,
    /// A message in flight
    Message(Box<Message>),
    /// Acknowledgement of the given message id
    Ack { message_id: MessageId },
    /// Topology join announcement carrying the sensor's type tag
    Join { type_tag: String },
}

impl EventPayload {
    /// Returns the carried message, if any.
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            EventPayload::Message(msg) => Some(msg),
            _ => None,
        }
    }

    /// Takes the carried message out of the payload.
    pub fn into_message(self) -> Option<Message> {
        match self {
            EventPayload::Message(msg) => Some(*msg),
            _ => None,
        }
    }
}

/// An event scheduled on the engine's timeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Absolute virtual time at which the event fires
    pub time: SimTime,
    /// Entity that scheduled the event
    pub source: EntityId,
    /// Entity the event is delivered to
    pub target: EntityId,
    pub tag: EventTag,
    pub payload: EventPayload,
}

impl Event {
    /// Creates a new event.
    pub fn new(
        time: SimTime,
        source: EntityId,
        target: EntityId,
        tag: EventTag,
        payload: EventPayload,
    ) -> Self {
        Self {
            time,
            source,
            target,
            tag,
            payload,
        }
    }

    /// Creates a self-addressed timer event.
    pub fn timer(time: SimTime, entity: EntityId, tag: EventTag) -> Self {
        Self::new(time, entity, entity, tag, EventPayload::Empty)
    }

    /// Returns `true` if the event was scheduled by its own target.
    pub fn is_self_addressed(&self) -> bool {
        self.source == self.target
    }
}
