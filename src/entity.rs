//! Entities and the context they run in.
//!
//! An entity is anything the engine dispatches events to: sensors,
//! processing nodes, or user-defined types. Entities never see the engine
//! itself; each callback receives a [`SimContext`] exposing the clock,
//! scheduling, the entity directory and the run's
//! [`TimeKeeper`](crate::timekeeper::TimeKeeper).

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;

use crate::engine::EngineError;
use crate::event::{Event, EventPayload, EventTag};
use crate::timekeeper::TimeKeeper;
use crate::types::{EntityId, MessageId, SimTime};

/// The kind of an entity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Periodic sampling source
    Sensor,
    /// Device hosting application modules
    ProcessingNode,
    /// Custom entity type with a string identifier
    Custom(String),
}

/// The capability every simulated entity implements.
///
/// All methods run on the engine's single logical timeline; none of them
/// may block. Side effects go through `ctx`.
pub trait Entity: Send {
    /// Unique name of the entity.
    fn name(&self) -> &str;

    /// What kind of entity this is.
    fn kind(&self) -> EntityKind;

    /// Returns the entity to its pre-run state.
    ///
    /// Called by `init` before any `on_start`, so a re-initialised engine
    /// replays the same run.
    fn on_reset(&mut self) {}

    /// Called once when the run starts, in registration order.
    fn on_start(&mut self, _ctx: &mut SimContext<'_>) {}

    /// Called for every event addressed to this entity.
    fn on_event(&mut self, ctx: &mut SimContext<'_>, event: Event);

    /// Called once when the run is torn down.
    fn on_shutdown(&mut self, _ctx: &mut SimContext<'_>) {}

    /// Statistics collected during the run.
    fn export_stats(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// Downcast support for inspecting concrete entities.
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast support.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Name and kind of every registered entity, indexed by id.
#[derive(Clone, Debug, Default)]
pub struct EntityDirectory {
    names: Vec<String>,
    kinds: Vec<EntityKind>,
    by_name: HashMap<String, EntityId>,
}

impl EntityDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry and returns its id. Names must be unique.
    pub fn register(&mut self, name: impl Into<String>, kind: EntityKind) -> Result<EntityId, EngineError> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(EngineError::DuplicateName(name));
        }
        let id = self.names.len() as EntityId;
        self.by_name.insert(name.clone(), id);
        self.names.push(name);
        self.kinds.push(kind);
        Ok(id)
    }

    /// Returns `true` if `id` is registered.
    pub fn contains(&self, id: EntityId) -> bool {
        (id as usize) < self.names.len()
    }

    /// Resolves a name to an id.
    pub fn lookup(&self, name: &str) -> Option<EntityId> {
        self.by_name.get(name).copied()
    }

    /// Returns the name of `id`.
    pub fn name_of(&self, id: EntityId) -> Option<&str> {
        self.names.get(id as usize).map(String::as_str)
    }

    /// Returns the kind of `id`.
    pub fn kind_of(&self, id: EntityId) -> Option<&EntityKind> {
        self.kinds.get(id as usize)
    }

    /// Number of registered entities.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Engine services available to an entity during one callback.
///
/// Scheduled events are buffered in an outbox that the engine drains after
/// the callback returns.
pub struct SimContext<'a> {
    self_id: EntityId,
    now: SimTime,
    directory: &'a EntityDirectory,
    timekeeper: &'a mut TimeKeeper,
    message_counter: &'a mut MessageId,
    outbox: Vec<Event>,
    failed: u64,
}

impl<'a> SimContext<'a> {
    /// Creates a context for `self_id` at time `now`.
    ///
    /// The engine builds one per callback; tests can build one directly to
    /// drive an entity without an engine.
    pub fn new(
        self_id: EntityId,
        now: SimTime,
        directory: &'a EntityDirectory,
        timekeeper: &'a mut TimeKeeper,
        message_counter: &'a mut MessageId,
    ) -> Self {
        Self {
            self_id,
            now,
            directory,
            timekeeper,
            message_counter,
            outbox: Vec::new(),
            failed: 0,
        }
    }

    /// Id of the entity being called.
    pub fn self_id(&self) -> EntityId {
        self.self_id
    }

    /// Current virtual time.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Delivers `payload` to `target` after `delay`.
    ///
    /// Fails, without affecting anything else, when `target` is not a
    /// registered entity or the delivery time overflows.
    pub fn schedule(
        &mut self,
        target: EntityId,
        delay: SimTime,
        tag: EventTag,
        payload: EventPayload,
    ) -> Result<(), EngineError> {
        if !self.directory.contains(target) {
            self.failed += 1;
            return Err(EngineError::UnknownEntity(target));
        }
        let Some(time) = self.now.checked_add(delay) else {
            self.failed += 1;
            return Err(EngineError::TimeOverflow { now: self.now, delay });
        };
        self.outbox
            .push(Event::new(time, self.self_id, target, tag, payload));
        Ok(())
    }

    /// Schedules a payload-less event to the calling entity itself.
    pub fn schedule_self(&mut self, delay: SimTime, tag: EventTag) -> Result<(), EngineError> {
        self.schedule(self.self_id, delay, tag, EventPayload::Empty)
    }

    /// Resolves an entity name.
    pub fn lookup(&self, name: &str) -> Option<EntityId> {
        self.directory.lookup(name)
    }

    /// Returns the kind of a registered entity.
    pub fn kind_of(&self, id: EntityId) -> Option<&EntityKind> {
        self.directory.kind_of(id)
    }

    /// Returns the name of a registered entity.
    pub fn name_of(&self, id: EntityId) -> Option<&str> {
        self.directory.name_of(id)
    }

    /// Allocates a run-unique message id.
    pub fn next_message_id(&mut self) -> MessageId {
        let id = *self.message_counter;
        *self.message_counter += 1;
        id
    }

    /// The run's timing registry.
    pub fn timekeeper(&self) -> &TimeKeeper {
        self.timekeeper
    }

    /// Mutable access to the run's timing registry.
    pub fn timekeeper_mut(&mut self) -> &mut TimeKeeper {
        self.timekeeper
    }

    /// Events scheduled so far in this callback.
    pub fn outbox(&self) -> &[Event] {
        &self.outbox
    }

    /// Number of scheduling attempts rejected in this callback.
    pub fn failed_deliveries(&self) -> u64 {
        self.failed
    }

    /// Consumes the context, returning scheduled events and the failure count.
    pub fn into_parts(self) -> (Vec<Event>, u64) {
        (self.outbox, self.failed)
    }
}
