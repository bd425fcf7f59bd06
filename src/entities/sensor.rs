//! Periodic sampling sensor.
//!
//! A `Sensor` wakes on a self-addressed timer, draws a reading from its value
//! range, resolves the application edge for its type tag, registers loop
//! timing and sends the resulting message to its gateway device after its
//! link latency. It then re-arms the timer using its transmit distribution.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use fogloop::application::{AppEdge, AppGraphBuilder, EdgeCategory};
//! use fogloop::entities::{Sensor, TransmitOutcome, ValueRange};
//! use fogloop::entity::{EntityDirectory, EntityKind, SimContext};
//! use fogloop::random::FixedSequence;
//! use fogloop::timekeeper::TimeKeeper;
//!
//! let graph = AppGraphBuilder::new("mine")
//!     .module("gasinfo-module", 10)
//!     .source("gas-sensor")
//!     .edge(AppEdge::new("GAS", "gasinfo-module", 1000, 200, "GAS", EdgeCategory::Sensor))
//!     .add_loop(["gas-sensor", "gasinfo-module"])
//!     .build()
//!     .unwrap();
//!
//! let mut dir = EntityDirectory::new();
//! let gateway = dir.register("gas-fog", EntityKind::ProcessingNode).unwrap();
//! let me = dir.register("gas-sensor", EntityKind::Sensor).unwrap();
//!
//! let mut sensor = Sensor::new("gas-sensor", "GAS", gateway, 6, Arc::new(graph))
//!     .with_range(ValueRange::new(0.0, 100.0))
//!     .with_rng(Box::new(FixedSequence::new([0.25])));
//!
//! let mut tk = TimeKeeper::new();
//! let mut ids = 1;
//! let mut ctx = SimContext::new(me, 10, &dir, &mut tk, &mut ids);
//! let outcome = sensor.sample_and_transmit(&mut ctx);
//!
//! assert!(matches!(outcome, TransmitOutcome::Sent { tracking_id: Some(_), .. }));
//! assert_eq!(sensor.sampled_value(), 25.0);
//! assert_eq!(ctx.outbox()[0].time, 16);
//! ```

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;

use crate::application::AppGraph;
use crate::distribution::TransmitDistribution;
use crate::engine::EngineError;
use crate::entities::alert::{AlertOrigin, ThresholdProcessor};
use crate::entity::{Entity, EntityKind, SimContext};
use crate::event::{Event, EventPayload, EventTag};
use crate::message::{Direction, Message, SENSOR_OUTPUT_SIZE};
use crate::random::{RandomSource, SeededRandom};
use crate::types::{EntityId, MessageId, SimTime, UserId};

/// Delay before the first sampling tick, on top of the first draw.
pub const DEFAULT_TRANSMISSION_START_DELAY: SimTime = 5;

/// Delay before the topology join announcement.
pub const DEFAULT_JOIN_DELAY: SimTime = 1;

/// Inclusive range of sampled readings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Maps a unit draw onto the range; the result never leaves `[min, max]`.
    pub fn sample(&self, unit: f64) -> f64 {
        let value = self.min + (self.max - self.min) * unit;
        if value.is_nan() || value < self.min {
            self.min
        } else if value > self.max {
            self.max
        } else {
            value
        }
    }

    /// Returns `true` if both bounds are finite and `min <= max`.
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }
}

impl Default for ValueRange {
    fn default() -> Self {
        Self::new(0.0, 100.0)
    }
}

/// Result of one sampling step.
#[derive(Clone, Debug, PartialEq)]
pub enum TransmitOutcome {
    /// A message was handed to the engine
    Sent {
        message_id: MessageId,
        /// `None` when the edge is not part of a monitored loop
        tracking_id: Option<MessageId>,
    },
    /// No edge matches the sensor's type tag; nothing was sent
    NoMatchingEdge,
    /// The engine rejected the delivery
    DeliveryFailed(EngineError),
}

/// Counters kept by a sensor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorStats {
    pub samples: u64,
    pub transmitted: u64,
    pub tracked: u64,
    pub skipped_no_edge: u64,
    pub delivery_failures: u64,
    pub alerts_fired: u64,
    pub acks_received: u64,
}

/// A simulated sensor.
pub struct Sensor {
    name: String,
    user_id: UserId,
    application_id: String,
    type_tag: String,
    gateway_device_id: EntityId,
    latency: SimTime,
    distribution: TransmitDistribution,
    value_range: ValueRange,
    sampled_value: f64,
    graph: Arc<AppGraph>,
    rng: Box<dyn RandomSource>,
    processor: Option<ThresholdProcessor>,
    start_delay: SimTime,
    join_delay: SimTime,
    enabled: bool,
    stats: SensorStats,
}

impl Sensor {
    /// Creates a sensor sending to `gateway_device_id` after `latency`.
    ///
    /// The application id is taken from `graph`. Defaults: deterministic
    /// 5-unit interval, range `[0, 100]`, seed 0, no alert processor.
    pub fn new(
        name: impl Into<String>,
        type_tag: impl Into<String>,
        gateway_device_id: EntityId,
        latency: SimTime,
        graph: Arc<AppGraph>,
    ) -> Self {
        Self {
            name: name.into(),
            user_id: 0,
            application_id: graph.app_id().to_string(),
            type_tag: type_tag.into(),
            gateway_device_id,
            latency,
            distribution: TransmitDistribution::default(),
            value_range: ValueRange::default(),
            sampled_value: 0.0,
            graph,
            rng: Box::new(SeededRandom::from_seed(0)),
            processor: None,
            start_delay: DEFAULT_TRANSMISSION_START_DELAY,
            join_delay: DEFAULT_JOIN_DELAY,
            enabled: true,
            stats: SensorStats::default(),
        }
    }

    pub fn with_user_id(mut self, user_id: UserId) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_distribution(mut self, distribution: TransmitDistribution) -> Self {
        self.distribution = distribution;
        self
    }

    pub fn with_range(mut self, range: ValueRange) -> Self {
        self.value_range = range;
        self
    }

    /// Replaces the random source used for readings and intervals.
    pub fn with_rng(mut self, rng: Box<dyn RandomSource>) -> Self {
        self.rng = rng;
        self
    }

    /// Attaches a threshold processor evaluated on every reading.
    pub fn with_processor(mut self, processor: ThresholdProcessor) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn with_start_delay(mut self, delay: SimTime) -> Self {
        self.start_delay = delay;
        self
    }

    pub fn with_join_delay(mut self, delay: SimTime) -> Self {
        self.join_delay = delay;
        self
    }

    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    pub fn gateway_device_id(&self) -> EntityId {
        self.gateway_device_id
    }

    pub fn latency(&self) -> SimTime {
        self.latency
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn application_id(&self) -> &str {
        &self.application_id
    }

    /// Most recent reading.
    pub fn sampled_value(&self) -> f64 {
        self.sampled_value
    }

    pub fn value_range(&self) -> ValueRange {
        self.value_range
    }

    pub fn processor(&self) -> Option<&ThresholdProcessor> {
        self.processor.as_ref()
    }

    pub fn stats(&self) -> &SensorStats {
        &self.stats
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Stops the sensor: the next timer firing is not re-armed.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Draws a new reading from the value range.
    pub fn sample(&mut self) -> f64 {
        self.sampled_value = self.value_range.sample(self.rng.next_unit());
        self.stats.samples += 1;
        self.sampled_value
    }

    /// Samples, runs the alert processor, and sends one message along the
    /// edge matching the type tag.
    pub fn sample_and_transmit(&mut self, ctx: &mut SimContext<'_>) -> TransmitOutcome {
        let reading = self.sample();
        self.run_processor(ctx, reading);

        let graph = Arc::clone(&self.graph);
        let Some(edge) = graph.find_edge_by_source(&self.type_tag) else {
            self.stats.skipped_no_edge += 1;
            tracing::warn!(sensor = %self.name, type_tag = %self.type_tag, "no matching edge found");
            return TransmitOutcome::NoMatchingEdge;
        };

        let message_id = ctx.next_message_id();
        let mut msg = Message::new(self.application_id.as_str(), message_id, self.type_tag.as_str())
            .with_costs(edge.cpu_length, edge.network_length, SENSOR_OUTPUT_SIZE)
            .with_route(self.name.as_str(), edge.destination.as_str());
        msg.direction = Direction::Up;
        msg.user_id = self.user_id;
        msg.payload_value = reading;
        msg.source_entity_id = ctx.self_id();

        let now = ctx.now();
        msg.actual_message_id =
            ctx.timekeeper_mut()
                .register_timing(&graph, &self.name, &edge.destination, now);
        msg.destination_device_id = self.gateway_device_id;
        let tracking_id = msg.actual_message_id;

        tracing::debug!(
            sensor = %self.name,
            message_id,
            tracking_id = msg.tracking_id_raw(),
            destination = %edge.destination,
            reading,
            "sending message"
        );

        match ctx.schedule(
            self.gateway_device_id,
            self.latency,
            EventTag::MessageArrival,
            EventPayload::Message(Box::new(msg)),
        ) {
            Ok(()) => {
                self.stats.transmitted += 1;
                if tracking_id.is_some() {
                    self.stats.tracked += 1;
                }
                TransmitOutcome::Sent {
                    message_id,
                    tracking_id,
                }
            }
            Err(err) => {
                self.stats.delivery_failures += 1;
                tracing::error!(sensor = %self.name, message_id, error = %err, "message delivery failed");
                TransmitOutcome::DeliveryFailed(err)
            }
        }
    }

    fn run_processor(&mut self, ctx: &mut SimContext<'_>, reading: f64) {
        let Some(processor) = &self.processor else {
            return;
        };
        let origin = AlertOrigin {
            source_entity: ctx.self_id(),
            source_name: &self.name,
            user_id: self.user_id,
            application_id: &self.application_id,
        };
        match processor.process(ctx, reading, &origin) {
            Ok(true) => self.stats.alerts_fired += 1,
            Ok(false) => {}
            Err(err) => {
                tracing::error!(sensor = %self.name, error = %err, "alert delivery failed");
            }
        }
    }

    fn arm_timer(&mut self, ctx: &mut SimContext<'_>, extra: SimTime) {
        let delay = self
            .distribution
            .next_value(self.rng.as_mut())
            .saturating_add(extra);
        if let Err(err) = ctx.schedule_self(delay, EventTag::SelfEmitTick) {
            tracing::error!(sensor = %self.name, error = %err, "could not schedule next sample");
        }
    }
}

impl Entity for Sensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Sensor
    }

    /// Clears counters and rewinds the random source. A disabled sensor
    /// stays disabled.
    fn on_reset(&mut self) {
        self.stats = SensorStats::default();
        self.sampled_value = 0.0;
        self.rng.reset();
    }

    fn on_start(&mut self, ctx: &mut SimContext<'_>) {
        if self.graph.find_edge_by_source(&self.type_tag).is_none() {
            tracing::warn!(sensor = %self.name, type_tag = %self.type_tag, "no edge declared for sensor type tag");
        }
        if ctx.kind_of(self.gateway_device_id).is_none() {
            tracing::warn!(sensor = %self.name, gateway = self.gateway_device_id, "gateway is not a registered entity");
        }

        let join = EventPayload::Join {
            type_tag: self.type_tag.clone(),
        };
        if let Err(err) = ctx.schedule(self.gateway_device_id, self.join_delay, EventTag::TopologyJoin, join) {
            tracing::warn!(sensor = %self.name, error = %err, "topology join not announced");
        }

        if self.enabled {
            self.arm_timer(ctx, self.start_delay);
        }
    }

    fn on_event(&mut self, ctx: &mut SimContext<'_>, event: Event) {
        match event.tag {
            EventTag::SelfEmitTick => {
                if !self.enabled {
                    tracing::debug!(sensor = %self.name, "sensor disabled; timer not re-armed");
                    return;
                }
                self.sample_and_transmit(ctx);
                self.arm_timer(ctx, 0);
            }
            EventTag::MessageArrivedAck => {
                self.stats.acks_received += 1;
            }
            other => {
                tracing::trace!(sensor = %self.name, tag = ?other, "ignored event");
            }
        }
    }

    fn export_stats(&self) -> serde_json::Value {
        serde_json::json!({
            "type_tag": self.type_tag,
            "gateway": self.gateway_device_id,
            "enabled": self.enabled,
            "last_value": self.sampled_value,
            "samples": self.stats.samples,
            "transmitted": self.stats.transmitted,
            "tracked": self.stats.tracked,
            "skipped_no_edge": self.stats.skipped_no_edge,
            "delivery_failures": self.stats.delivery_failures,
            "alerts_fired": self.stats.alerts_fired,
            "acks_received": self.stats.acks_received,
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
