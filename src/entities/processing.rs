//! Processing nodes (fog devices) hosting application modules.
//!
//! A `ProcessingNode` is the receiving end of sensor traffic. For every
//! message addressed to a module it hosts, it acknowledges sensor senders,
//! closes the message's loop when the module is the loop's last element, and
//! forwards along each outgoing edge of the module. Module placement is
//! shared by all nodes of a scenario through [`ModulePlacement`].

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::application::AppGraph;
use crate::entity::{Entity, EntityKind, SimContext};
use crate::event::{Event, EventPayload, EventTag};
use crate::message::Message;
use crate::types::{EntityId, SimTime};

/// Maps each module to the name of the device hosting it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModulePlacement {
    module_to_device: BTreeMap<String, String>,
}

impl ModulePlacement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places `module` on `device`, returning the previous device if any.
    pub fn place(&mut self, module: impl Into<String>, device: impl Into<String>) -> Option<String> {
        self.module_to_device.insert(module.into(), device.into())
    }

    /// Name of the device hosting `module`.
    pub fn device_for(&self, module: &str) -> Option<&str> {
        self.module_to_device.get(module).map(String::as_str)
    }

    /// Modules hosted by `device`, in name order.
    pub fn modules_on<'a>(&'a self, device: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.module_to_device
            .iter()
            .filter(move |(_, d)| d.as_str() == device)
            .map(|(m, _)| m.as_str())
    }

    pub fn len(&self) -> usize {
        self.module_to_device.len()
    }

    pub fn is_empty(&self) -> bool {
        self.module_to_device.is_empty()
    }
}

/// Counters kept by a processing node.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingStats {
    /// Messages processed by a hosted module
    pub processed: u64,
    /// Messages relayed to the device hosting their module
    pub routed: u64,
    /// Messages emitted along module edges
    pub forwarded: u64,
    pub acks_sent: u64,
    pub loops_completed: u64,
    pub timing_errors: u64,
    /// Messages dropped for lack of a route
    pub dropped: u64,
    /// Processed messages per hosted module
    pub per_module: BTreeMap<String, u64>,
}

/// A device hosting application modules.
pub struct ProcessingNode {
    name: String,
    mips: u64,
    level: u32,
    uplink_latency: SimTime,
    graph: Arc<AppGraph>,
    placement: Arc<ModulePlacement>,
    attached_sensors: Vec<(EntityId, String)>,
    stats: ProcessingStats,
}

impl ProcessingNode {
    /// Creates a node. A `mips` of zero is treated as one.
    pub fn new(
        name: impl Into<String>,
        mips: u64,
        graph: Arc<AppGraph>,
        placement: Arc<ModulePlacement>,
    ) -> Self {
        Self {
            name: name.into(),
            mips: mips.max(1),
            level: 0,
            uplink_latency: 0,
            graph,
            placement,
            attached_sensors: Vec::new(),
            stats: ProcessingStats::default(),
        }
    }

    /// Sets the level in the device hierarchy (0 is the top).
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    /// Sets the delay added when a message leaves this device.
    pub fn with_uplink_latency(mut self, latency: SimTime) -> Self {
        self.uplink_latency = latency;
        self
    }

    pub fn mips(&self) -> u64 {
        self.mips
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn uplink_latency(&self) -> SimTime {
        self.uplink_latency
    }

    /// Returns `true` if `module` is placed on this device.
    pub fn hosts(&self, module: &str) -> bool {
        self.placement.device_for(module) == Some(self.name.as_str())
    }

    /// Sensors that announced themselves, with their type tags.
    pub fn attached_sensors(&self) -> &[(EntityId, String)] {
        &self.attached_sensors
    }

    pub fn stats(&self) -> &ProcessingStats {
        &self.stats
    }

    /// Virtual time needed to execute `cpu_length` instructions.
    pub fn processing_delay(&self, cpu_length: u64) -> SimTime {
        cpu_length.div_ceil(self.mips)
    }

    fn on_message(&mut self, ctx: &mut SimContext<'_>, sender: EntityId, mut msg: Message) {
        if matches!(ctx.kind_of(sender), Some(EntityKind::Sensor)) {
            let ack = EventPayload::Ack {
                message_id: msg.message_id,
            };
            match ctx.schedule(sender, 0, EventTag::MessageArrivedAck, ack) {
                Ok(()) => self.stats.acks_sent += 1,
                Err(err) => tracing::warn!(device = %self.name, error = %err, "ack not delivered"),
            }
        }

        let module = msg.destination_module_name.clone();
        if !self.hosts(&module) {
            let target = self.placement.device_for(&module).and_then(|d| ctx.lookup(d));
            let Some(target) = target else {
                self.stats.dropped += 1;
                tracing::warn!(device = %self.name, module = %module, "no device hosts module; message dropped");
                return;
            };
            msg.destination_device_id = target;
            match ctx.schedule(
                target,
                self.uplink_latency,
                EventTag::MessageArrival,
                EventPayload::Message(Box::new(msg)),
            ) {
                Ok(()) => self.stats.routed += 1,
                Err(err) => {
                    self.stats.dropped += 1;
                    tracing::warn!(device = %self.name, error = %err, "message could not be routed");
                }
            }
            return;
        }

        self.stats.processed += 1;
        *self.stats.per_module.entry(module.clone()).or_default() += 1;

        let graph = Arc::clone(&self.graph);
        let owning_loop = msg
            .actual_message_id
            .and_then(|id| ctx.timekeeper().loop_of(id))
            .and_then(|loop_id| graph.get_loop(loop_id));

        if let (Some(id), Some(app_loop)) = (msg.actual_message_id, owning_loop) {
            if app_loop.last() == Some(module.as_str()) {
                let now = ctx.now();
                match ctx.timekeeper_mut().record_arrival(id, now) {
                    Ok(latency) => {
                        self.stats.loops_completed += 1;
                        tracing::debug!(
                            device = %self.name,
                            loop_id = app_loop.id,
                            tracking_id = id,
                            latency,
                            "loop completed"
                        );
                    }
                    Err(err) => {
                        self.stats.timing_errors += 1;
                        tracing::warn!(device = %self.name, error = %err, "loop completion not recorded");
                    }
                }
            }
        }

        let delay = self.processing_delay(msg.cpu_length);
        for edge in graph.edges_from(&module) {
            let Some(target) = self
                .placement
                .device_for(&edge.destination)
                .and_then(|d| ctx.lookup(d))
            else {
                self.stats.dropped += 1;
                tracing::warn!(
                    device = %self.name,
                    destination = %edge.destination,
                    "edge destination is not placed on any device"
                );
                continue;
            };

            let tracking_id = match (msg.actual_message_id, owning_loop) {
                (Some(id), Some(l)) if l.has_edge(&module, &edge.destination) => Some(id),
                _ => None,
            };

            let mut out = Message::new(msg.application_id.as_str(), ctx.next_message_id(), edge.type_tag.as_str())
                .with_costs(edge.cpu_length, edge.network_length, msg.output_size)
                .with_route(module.as_str(), edge.destination.as_str());
            out.direction = edge.direction;
            out.destination_device_id = target;
            out.source_entity_id = ctx.self_id();
            out.payload_value = msg.payload_value;
            out.user_id = msg.user_id;
            out.actual_message_id = tracking_id;

            let hop = if target == ctx.self_id() { 0 } else { self.uplink_latency };
            match ctx.schedule(
                target,
                delay.saturating_add(hop),
                EventTag::MessageArrival,
                EventPayload::Message(Box::new(out)),
            ) {
                Ok(()) => self.stats.forwarded += 1,
                Err(err) => {
                    self.stats.dropped += 1;
                    tracing::warn!(device = %self.name, error = %err, "forwarded message not delivered");
                }
            }
        }
    }
}

impl Entity for ProcessingNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> EntityKind {
        EntityKind::ProcessingNode
    }

    fn on_reset(&mut self) {
        self.stats = ProcessingStats::default();
        self.attached_sensors.clear();
    }

    fn on_start(&mut self, _ctx: &mut SimContext<'_>) {
        let hosted: Vec<&str> = self.placement.modules_on(&self.name).collect();
        tracing::debug!(device = %self.name, mips = self.mips, level = self.level, ?hosted, "device started");
    }

    fn on_event(&mut self, ctx: &mut SimContext<'_>, event: Event) {
        match event.tag {
            EventTag::MessageArrival => {
                let sender = event.source;
                match event.payload.into_message() {
                    Some(msg) => self.on_message(ctx, sender, msg),
                    None => {
                        self.stats.dropped += 1;
                        tracing::warn!(device = %self.name, "arrival without a message payload");
                    }
                }
            }
            EventTag::TopologyJoin => {
                if let EventPayload::Join { type_tag } = event.payload {
                    tracing::debug!(device = %self.name, sensor = event.source, type_tag = %type_tag, "sensor joined");
                    self.attached_sensors.push((event.source, type_tag));
                }
            }
            other => {
                tracing::trace!(device = %self.name, tag = ?other, "ignored event");
            }
        }
    }

    fn export_stats(&self) -> serde_json::Value {
        serde_json::json!({
            "mips": self.mips,
            "level": self.level,
            "attached_sensors": self.attached_sensors.len(),
            "processed": self.stats.processed,
            "routed": self.stats.routed,
            "forwarded": self.stats.forwarded,
            "acks_sent": self.stats.acks_sent,
            "loops_completed": self.stats.loops_completed,
            "timing_errors": self.stats.timing_errors,
            "dropped": self.stats.dropped,
            "per_module": self.stats.per_module,
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
