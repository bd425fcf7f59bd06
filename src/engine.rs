//! Discrete-event simulation engine.
//!
//! The `SimulationEngine` owns every registered entity, the event queue, the
//! virtual clock and the run's [`TimeKeeper`]. It executes one event at a
//! time in timestamp order; events sharing a timestamp are delivered in the
//! order they were scheduled.

use std::collections::{BTreeMap, VecDeque};
use thiserror::Error;

use crate::entity::{Entity, EntityDirectory, SimContext};
use crate::event::Event;
use crate::timekeeper::TimeKeeper;
use crate::types::{EntityId, MessageId, SimTime};

/// Errors surfaced by the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("no entity registered with id {0}")]
    UnknownEntity(EntityId),

    #[error("an entity named `{0}` is already registered")]
    DuplicateName(String),

    #[error("virtual time overflow: {now} + {delay}")]
    TimeOverflow { now: SimTime, delay: SimTime },
}

/// Statistics collected by the simulation engine.
#[derive(Clone, Debug, Default)]
pub struct EngineStats {
    /// Total number of events delivered to entities
    pub events_processed: u64,
    /// Total number of events accepted into the queue
    pub events_scheduled: u64,
    /// Scheduling requests rejected (unknown target or time overflow)
    pub delivery_failures: u64,
    /// Highest queue length observed
    pub peak_queue_len: usize,
}

/// The discrete-event simulation engine.
///
/// # Example
///
/// ```ignore
/// let mut engine = SimulationEngine::new();
/// let gateway = engine.register_entity(Box::new(node))?;
/// engine.register_entity(Box::new(sensor))?;
/// engine.init();
/// engine.run(1000);
/// ```
pub struct SimulationEngine {
    /// Entities indexed by id; a slot is empty only while its entity runs
    entities: Vec<Option<Box<dyn Entity>>>,
    directory: EntityDirectory,
    queue: BTreeMap<SimTime, VecDeque<Event>>,
    queue_len: usize,
    current_time: SimTime,
    timekeeper: TimeKeeper,
    next_message_id: MessageId,
    stats: EngineStats,
}

impl SimulationEngine {
    /// Creates an empty engine.
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
            directory: EntityDirectory::new(),
            queue: BTreeMap::new(),
            queue_len: 0,
            current_time: 0,
            timekeeper: TimeKeeper::new(),
            next_message_id: 1,
            stats: EngineStats::default(),
        }
    }

    /// Registers an entity and returns its id.
    ///
    /// Ids are assigned densely in registration order. Names must be unique.
    pub fn register_entity(&mut self, entity: Box<dyn Entity>) -> Result<EntityId, EngineError> {
        let id = self.directory.register(entity.name(), entity.kind())?;
        tracing::debug!(id, name = entity.name(), kind = ?entity.kind(), "registered entity");
        self.entities.push(Some(entity));
        Ok(id)
    }

    /// Resolves an entity name to its id.
    pub fn entity_id(&self, name: &str) -> Option<EntityId> {
        self.directory.lookup(name)
    }

    /// Returns the entity directory.
    pub fn directory(&self) -> &EntityDirectory {
        &self.directory
    }

    /// Returns the number of registered entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Downcasts a registered entity to its concrete type.
    pub fn entity<T: Entity + 'static>(&self, id: EntityId) -> Option<&T> {
        self.entities
            .get(id as usize)?
            .as_ref()?
            .as_any()
            .downcast_ref::<T>()
    }

    /// Mutable variant of [`entity`](Self::entity).
    pub fn entity_mut<T: Entity + 'static>(&mut self, id: EntityId) -> Option<&mut T> {
        self.entities
            .get_mut(id as usize)?
            .as_mut()?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    /// Returns the current virtual time.
    pub fn now(&self) -> SimTime {
        self.current_time
    }

    /// Returns the run's timing registry.
    pub fn timekeeper(&self) -> &TimeKeeper {
        &self.timekeeper
    }

    /// Number of events waiting in the queue.
    pub fn pending_events(&self) -> usize {
        self.queue_len
    }

    /// Time of the next queued event.
    pub fn next_event_time(&self) -> Option<SimTime> {
        self.queue.keys().next().copied()
    }

    /// Injects an external event into the queue.
    ///
    /// Events in the past are delivered at the current time.
    pub fn inject(&mut self, mut event: Event) -> Result<(), EngineError> {
        if !self.directory.contains(event.target) {
            self.stats.delivery_failures += 1;
            return Err(EngineError::UnknownEntity(event.target));
        }
        event.time = event.time.max(self.current_time);
        self.enqueue(event);
        Ok(())
    }

    /// Resets the clock, queue, timing registry and every entity, then
    /// starts every entity in registration order.
    ///
    /// This must be called before `run()`.
    pub fn init(&mut self) {
        self.current_time = 0;
        self.queue.clear();
        self.queue_len = 0;
        self.timekeeper.reset();
        self.next_message_id = 1;
        self.stats = EngineStats::default();

        for entity in self.entities.iter_mut().flatten() {
            entity.on_reset();
        }
        for id in 0..self.entities.len() as EntityId {
            self.dispatch(id, |entity, ctx| entity.on_start(ctx));
        }
        tracing::info!(
            entities = self.entities.len(),
            pending = self.queue_len,
            "simulation initialized"
        );
    }

    /// Delivers the next queued event.
    ///
    /// Returns `false` when the queue is empty.
    pub fn step(&mut self) -> bool {
        let Some(event) = self.pop_next() else {
            return false;
        };
        self.current_time = event.time;
        self.stats.events_processed += 1;

        let target = event.target;
        tracing::trace!(time = event.time, source = event.source, target, tag = ?event.tag, "dispatching event");
        self.dispatch(target, |entity, ctx| entity.on_event(ctx, event));
        true
    }

    /// Runs the simulation until no event remains at or before `max_time`.
    ///
    /// The clock ends at `max_time`; later events stay queued.
    pub fn run(&mut self, max_time: SimTime) {
        while self.next_event_time().is_some_and(|t| t <= max_time) {
            self.step();
        }
        self.current_time = self.current_time.max(max_time);
        tracing::info!(
            now = self.current_time,
            processed = self.stats.events_processed,
            pending = self.queue_len,
            "simulation run finished"
        );
    }

    /// Tears the run down: calls every entity's `on_shutdown` and drops the
    /// remaining queue.
    pub fn shutdown(&mut self) {
        for id in 0..self.entities.len() as EntityId {
            self.dispatch(id, |entity, ctx| entity.on_shutdown(ctx));
        }
        self.queue.clear();
        self.queue_len = 0;
        tracing::debug!(now = self.current_time, "simulation shut down");
    }

    /// Runs `f` against entity `id` with a fresh context, then enqueues what
    /// it scheduled.
    fn dispatch<F>(&mut self, id: EntityId, f: F)
    where
        F: FnOnce(&mut dyn Entity, &mut SimContext<'_>),
    {
        let Some(mut entity) = self.entities.get_mut(id as usize).and_then(Option::take) else {
            tracing::warn!(id, "event for unknown entity dropped");
            self.stats.delivery_failures += 1;
            return;
        };

        let (outbox, failed) = {
            let mut ctx = SimContext::new(
                id,
                self.current_time,
                &self.directory,
                &mut self.timekeeper,
                &mut self.next_message_id,
            );
            f(entity.as_mut(), &mut ctx);
            ctx.into_parts()
        };

        self.entities[id as usize] = Some(entity);
        self.stats.delivery_failures += failed;
        for event in outbox {
            self.enqueue(event);
        }
    }

    fn enqueue(&mut self, event: Event) {
        self.queue.entry(event.time).or_default().push_back(event);
        self.queue_len += 1;
        self.stats.events_scheduled += 1;
        self.stats.peak_queue_len = self.stats.peak_queue_len.max(self.queue_len);
    }

    fn pop_next(&mut self) -> Option<Event> {
        let mut slot = self.queue.first_entry()?;
        let event = slot.get_mut().pop_front();
        if slot.get().is_empty() {
            slot.remove();
        }
        if event.is_some() {
            self.queue_len -= 1;
        }
        event
    }

    /// Exports statistics from the engine and all entities.
    pub fn export_stats(&self) -> serde_json::Value {
        let mut entity_stats = serde_json::Map::new();
        for entity in self.entities.iter().flatten() {
            entity_stats.insert(entity.name().to_string(), entity.export_stats());
        }

        serde_json::json!({
            "engine": {
                "current_time": self.current_time,
                "events_processed": self.stats.events_processed,
                "events_scheduled": self.stats.events_scheduled,
                "delivery_failures": self.stats.delivery_failures,
                "peak_queue_len": self.stats.peak_queue_len,
                "pending_events": self.queue_len,
                "entity_count": self.entities.len(),
                "tracked_messages": self.timekeeper.issued(),
            },
            "entities": entity_stats,
        })
    }

    /// Returns the engine statistics.
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }
}

impl Default for SimulationEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKind;
    use crate::event::{EventPayload, EventTag};
    use std::any::Any;

    /// Records what it sees and optionally re-arms a timer.
    struct Recorder {
        name: String,
        period: Option<SimTime>,
        seen: Vec<(SimTime, EventTag, EntityId)>,
        started: bool,
        stopped: bool,
    }

    impl Recorder {
        fn new(name: &str, period: Option<SimTime>) -> Self {
            Self {
                name: name.to_string(),
                period,
                seen: Vec::new(),
                started: false,
                stopped: false,
            }
        }
    }

    impl Entity for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn kind(&self) -> EntityKind {
            EntityKind::Custom("recorder".into())
        }

        fn on_reset(&mut self) {
            self.seen.clear();
            self.started = false;
            self.stopped = false;
        }

        fn on_start(&mut self, ctx: &mut SimContext<'_>) {
            self.started = true;
            if let Some(period) = self.period {
                ctx.schedule_self(period, EventTag::SelfEmitTick).unwrap();
            }
        }

        fn on_event(&mut self, ctx: &mut SimContext<'_>, event: Event) {
            self.seen.push((ctx.now(), event.tag, event.source));
            if let (Some(period), EventTag::SelfEmitTick) = (self.period, event.tag) {
                ctx.schedule_self(period, EventTag::SelfEmitTick).unwrap();
            }
        }

        fn on_shutdown(&mut self, _ctx: &mut SimContext<'_>) {
            self.stopped = true;
        }

        fn export_stats(&self) -> serde_json::Value {
            serde_json::json!({ "seen": self.seen.len() })
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn test_engine_creation() {
        let engine = SimulationEngine::new();
        assert_eq!(engine.now(), 0);
        assert_eq!(engine.entity_count(), 0);
        assert_eq!(engine.pending_events(), 0);
    }

    #[test]
    fn test_register_entity() {
        let mut engine = SimulationEngine::new();
        let a = engine.register_entity(Box::new(Recorder::new("a", None))).unwrap();
        let b = engine.register_entity(Box::new(Recorder::new("b", None))).unwrap();

        assert_eq!((a, b), (0, 1));
        assert_eq!(engine.entity_id("b"), Some(1));
        assert!(engine.entity::<Recorder>(a).is_some());
        assert!(engine.entity::<Recorder>(7).is_none());
        assert_eq!(
            engine.register_entity(Box::new(Recorder::new("a", None))),
            Err(EngineError::DuplicateName("a".into()))
        );
    }

    #[test]
    fn test_periodic_timer() {
        let mut engine = SimulationEngine::new();
        let id = engine.register_entity(Box::new(Recorder::new("tick", Some(10)))).unwrap();

        engine.init();
        engine.run(45);

        let rec = engine.entity::<Recorder>(id).unwrap();
        assert!(rec.started);
        let times: Vec<SimTime> = rec.seen.iter().map(|(t, _, _)| *t).collect();
        assert_eq!(times, vec![10, 20, 30, 40]);
        assert_eq!(engine.now(), 45);
        assert_eq!(engine.next_event_time(), Some(50));
    }

    #[test]
    fn test_fifo_for_equal_timestamps() {
        let mut engine = SimulationEngine::new();
        let sink = engine.register_entity(Box::new(Recorder::new("sink", None))).unwrap();
        engine.register_entity(Box::new(Recorder::new("x", None))).unwrap();
        engine.register_entity(Box::new(Recorder::new("y", None))).unwrap();
        engine.init();

        engine
            .inject(Event::new(5, 2, sink, EventTag::MessageArrival, EventPayload::Empty))
            .unwrap();
        engine
            .inject(Event::new(5, 1, sink, EventTag::TopologyJoin, EventPayload::Empty))
            .unwrap();
        engine
            .inject(Event::new(3, 1, sink, EventTag::MessageArrivedAck, EventPayload::Empty))
            .unwrap();
        engine.run(10);

        let rec = engine.entity::<Recorder>(sink).unwrap();
        let order: Vec<(SimTime, EventTag, EntityId)> = rec.seen.clone();
        assert_eq!(
            order,
            vec![
                (3, EventTag::MessageArrivedAck, 1),
                (5, EventTag::MessageArrival, 2),
                (5, EventTag::TopologyJoin, 1),
            ]
        );
    }

    #[test]
    fn test_inject_unknown_target() {
        let mut engine = SimulationEngine::new();
        engine.init();
        let result = engine.inject(Event::timer(1, 9, EventTag::SelfEmitTick));
        assert_eq!(result, Err(EngineError::UnknownEntity(9)));
        assert_eq!(engine.stats().delivery_failures, 1);
    }

    #[test]
    fn test_step_on_empty_queue() {
        let mut engine = SimulationEngine::new();
        engine.init();
        assert!(!engine.step());
        engine.run(100);
        assert_eq!(engine.now(), 100);
    }

    #[test]
    fn test_shutdown() {
        let mut engine = SimulationEngine::new();
        let id = engine.register_entity(Box::new(Recorder::new("t", Some(1)))).unwrap();
        engine.init();
        engine.run(3);
        engine.shutdown();

        assert!(engine.entity::<Recorder>(id).unwrap().stopped);
        assert_eq!(engine.pending_events(), 0);
    }

    #[test]
    fn test_init_resets_run_state() {
        let mut engine = SimulationEngine::new();
        let id = engine.register_entity(Box::new(Recorder::new("t", Some(2)))).unwrap();
        engine.init();
        engine.run(10);
        assert!(engine.stats().events_processed > 0);
        assert_eq!(engine.entity::<Recorder>(id).unwrap().seen.len(), 5);

        engine.init();
        assert_eq!(engine.now(), 0);
        assert_eq!(engine.stats().events_processed, 0);
        assert_eq!(engine.pending_events(), 1);
        assert!(engine.entity::<Recorder>(id).unwrap().seen.is_empty());

        engine.run(10);
        assert_eq!(engine.entity::<Recorder>(id).unwrap().seen.len(), 5);
    }

    #[test]
    fn test_export_stats() {
        let mut engine = SimulationEngine::new();
        engine.register_entity(Box::new(Recorder::new("t", Some(10)))).unwrap();
        engine.init();
        engine.run(50);

        let stats = engine.export_stats();
        assert_eq!(stats["engine"]["current_time"], 50);
        assert_eq!(stats["engine"]["events_processed"], 5);
        assert_eq!(stats["entities"]["t"]["seen"], 5);
    }
}
