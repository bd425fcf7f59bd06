//! Loop timing registry.
//!
//! The [`TimeKeeper`] correlates tracking ids with their emission time and
//! the loop they belong to, so end-to-end latency can be computed once a
//! message reaches the last module of its loop.
//!
//! One instance exists per simulation run. It is owned by the engine and
//! handed to entities through the
//! [`SimContext`](crate::entity::SimContext); it is never global.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use crate::application::AppGraph;
use crate::types::{LoopId, MessageId, SimTime};

/// Errors raised when recording loop completions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimingError {
    #[error("tracking id {0} was never registered")]
    UnknownId(MessageId),

    #[error("tracking id {0} already completed its loop")]
    AlreadyCompleted(MessageId),

    #[error("tracking id {id} arrived at {arrival} before its emission at {emitted}")]
    ArrivalBeforeEmission {
        id: MessageId,
        emitted: SimTime,
        arrival: SimTime,
    },
}

/// Aggregate latency figures for one loop.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LoopLatency {
    pub loop_id: LoopId,
    /// Tracking ids issued for this loop
    pub emitted: usize,
    /// Tracking ids that reached the end of the loop
    pub completed: usize,
    pub mean: Option<f64>,
    pub min: Option<SimTime>,
    pub max: Option<SimTime>,
}

/// Per-run registry of tracking ids, emission times and loop membership.
#[derive(Debug)]
pub struct TimeKeeper {
    next_id: MessageId,
    loop_to_ids: BTreeMap<LoopId, Vec<MessageId>>,
    emit_times: HashMap<MessageId, SimTime>,
    id_to_loop: HashMap<MessageId, LoopId>,
    end_times: HashMap<MessageId, SimTime>,
}

impl TimeKeeper {
    /// Creates an empty registry. The first issued id is 1.
    pub fn new() -> Self {
        Self {
            next_id: 1,
            loop_to_ids: BTreeMap::new(),
            emit_times: HashMap::new(),
            id_to_loop: HashMap::new(),
            end_times: HashMap::new(),
        }
    }

    /// Clears all state. Called by the engine at run start.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Registers an emission on the pair `source -> dest`.
    ///
    /// Searches `graph`'s loops in declaration order for one containing the
    /// pair. On a match a fresh id is allocated, appended to that loop and
    /// stamped with `now`. Without a match nothing is mutated and `None` is
    /// returned: the message is untracked.
    pub fn register_timing(
        &mut self,
        graph: &AppGraph,
        source: &str,
        dest: &str,
        now: SimTime,
    ) -> Option<MessageId> {
        let loop_id = graph.loop_for_edge(source, dest)?.id;

        let id = self.next_id;
        self.next_id += 1;
        self.loop_to_ids.entry(loop_id).or_default().push(id);
        self.emit_times.insert(id, now);
        self.id_to_loop.insert(id, loop_id);

        tracing::trace!(id, loop_id, source, dest, now, "registered loop timing");
        Some(id)
    }

    /// Records that `id` reached the end of its loop at `now`.
    ///
    /// Returns the loop latency. End times are write-once.
    pub fn record_arrival(&mut self, id: MessageId, now: SimTime) -> Result<SimTime, TimingError> {
        let emitted = *self.emit_times.get(&id).ok_or(TimingError::UnknownId(id))?;
        if self.end_times.contains_key(&id) {
            return Err(TimingError::AlreadyCompleted(id));
        }
        let latency = now
            .checked_sub(emitted)
            .ok_or(TimingError::ArrivalBeforeEmission {
                id,
                emitted,
                arrival: now,
            })?;
        self.end_times.insert(id, now);
        Ok(latency)
    }

    /// Returns the next id that would be issued.
    pub fn peek_next_id(&self) -> MessageId {
        self.next_id
    }

    /// Number of ids issued since the last reset.
    pub fn issued(&self) -> usize {
        self.emit_times.len()
    }

    /// Emission time of `id`.
    pub fn emit_time(&self, id: MessageId) -> Option<SimTime> {
        self.emit_times.get(&id).copied()
    }

    /// Loop that `id` was registered against.
    pub fn loop_of(&self, id: MessageId) -> Option<LoopId> {
        self.id_to_loop.get(&id).copied()
    }

    /// Ids issued for `loop_id`, in issue order.
    pub fn ids_for_loop(&self, loop_id: LoopId) -> &[MessageId] {
        self.loop_to_ids
            .get(&loop_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Latency of a completed id.
    pub fn latency(&self, id: MessageId) -> Option<SimTime> {
        let end = self.end_times.get(&id)?;
        let start = self.emit_times.get(&id)?;
        end.checked_sub(*start)
    }

    /// Loops that have issued at least one id.
    pub fn tracked_loops(&self) -> impl Iterator<Item = LoopId> + '_ {
        self.loop_to_ids.keys().copied()
    }

    /// Summarises latency over every completed id of `loop_id`.
    pub fn loop_summary(&self, loop_id: LoopId) -> LoopLatency {
        let ids = self.ids_for_loop(loop_id);
        let latencies: Vec<SimTime> = ids.iter().filter_map(|id| self.latency(*id)).collect();

        let mean = if latencies.is_empty() {
            None
        } else {
            Some(latencies.iter().sum::<SimTime>() as f64 / latencies.len() as f64)
        };

        LoopLatency {
            loop_id,
            emitted: ids.len(),
            completed: latencies.len(),
            mean,
            min: latencies.iter().min().copied(),
            max: latencies.iter().max().copied(),
        }
    }
}

impl Default for TimeKeeper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{AppEdge, AppGraphBuilder, EdgeCategory};

    fn two_loop_graph() -> AppGraph {
        AppGraphBuilder::new("mine")
            .module("gasinfo-module", 10)
            .module("chinfo-module", 10)
            .module("master-module", 10)
            .source("gas-sensor")
            .source("chem-sensor")
            .edge(AppEdge::new("GAS", "gasinfo-module", 1000, 200, "GAS", EdgeCategory::Sensor))
            .edge(AppEdge::new("CHEM", "chinfo-module", 1000, 200, "CHEM", EdgeCategory::Sensor))
            .add_loop(["gas-sensor", "gasinfo-module", "master-module"])
            .add_loop(["chem-sensor", "chinfo-module", "master-module"])
            .build()
            .unwrap()
    }

    #[test]
    fn test_register_tracked_pair() {
        let graph = two_loop_graph();
        let mut tk = TimeKeeper::new();

        let id = tk.register_timing(&graph, "gas-sensor", "gasinfo-module", 10).unwrap();

        assert_eq!(tk.emit_time(id), Some(10));
        assert_eq!(tk.loop_of(id), Some(0));
        assert_eq!(tk.ids_for_loop(0), &[id]);
        assert!(tk.ids_for_loop(1).is_empty());
    }

    #[test]
    fn test_register_untracked_pair_mutates_nothing() {
        let graph = two_loop_graph();
        let mut tk = TimeKeeper::new();
        let before = tk.peek_next_id();

        assert_eq!(tk.register_timing(&graph, "gas-sensor", "master-module", 10), None);
        assert_eq!(tk.peek_next_id(), before);
        assert_eq!(tk.issued(), 0);
        assert_eq!(tk.tracked_loops().count(), 0);
    }

    #[test]
    fn test_ids_strictly_increasing() {
        let graph = two_loop_graph();
        let mut tk = TimeKeeper::new();

        let a = tk.register_timing(&graph, "gas-sensor", "gasinfo-module", 5).unwrap();
        let b = tk.register_timing(&graph, "chem-sensor", "chinfo-module", 5).unwrap();
        let c = tk.register_timing(&graph, "gas-sensor", "gasinfo-module", 5).unwrap();

        assert!(a < b && b < c);
        assert_eq!(tk.ids_for_loop(0), &[a, c]);
        assert_eq!(tk.ids_for_loop(1), &[b]);
    }

    #[test]
    fn test_pair_lands_in_owning_loop() {
        let graph = two_loop_graph();
        let mut tk = TimeKeeper::new();

        let id = tk.register_timing(&graph, "chinfo-module", "master-module", 0).unwrap();
        assert_eq!(tk.loop_of(id), Some(1));
    }

    #[test]
    fn test_record_arrival() {
        let graph = two_loop_graph();
        let mut tk = TimeKeeper::new();
        let id = tk.register_timing(&graph, "gas-sensor", "gasinfo-module", 10).unwrap();

        assert_eq!(tk.record_arrival(id, 35), Ok(25));
        assert_eq!(tk.latency(id), Some(25));
        assert_eq!(tk.record_arrival(id, 40), Err(TimingError::AlreadyCompleted(id)));
        assert_eq!(tk.record_arrival(999, 40), Err(TimingError::UnknownId(999)));
    }

    #[test]
    fn test_arrival_before_emission() {
        let graph = two_loop_graph();
        let mut tk = TimeKeeper::new();
        let id = tk.register_timing(&graph, "gas-sensor", "gasinfo-module", 50).unwrap();

        assert!(matches!(
            tk.record_arrival(id, 10),
            Err(TimingError::ArrivalBeforeEmission { .. })
        ));
        assert_eq!(tk.latency(id), None);
    }

    #[test]
    fn test_loop_summary() {
        let graph = two_loop_graph();
        let mut tk = TimeKeeper::new();
        let a = tk.register_timing(&graph, "gas-sensor", "gasinfo-module", 0).unwrap();
        let b = tk.register_timing(&graph, "gas-sensor", "gasinfo-module", 10).unwrap();
        let _pending = tk.register_timing(&graph, "gas-sensor", "gasinfo-module", 20).unwrap();
        tk.record_arrival(a, 8).unwrap();
        tk.record_arrival(b, 22).unwrap();

        let summary = tk.loop_summary(0);
        assert_eq!(summary.emitted, 3);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.mean, Some(10.0));
        assert_eq!(summary.min, Some(8));
        assert_eq!(summary.max, Some(12));

        let empty = tk.loop_summary(1);
        assert_eq!(empty.emitted, 0);
        assert_eq!(empty.mean, None);
    }

    #[test]
    fn test_reset() {
        let graph = two_loop_graph();
        let mut tk = TimeKeeper::new();
        tk.register_timing(&graph, "gas-sensor", "gasinfo-module", 0).unwrap();
        tk.reset();

        assert_eq!(tk.issued(), 0);
        assert_eq!(tk.peek_next_id(), 1);
        assert!(tk.ids_for_loop(0).is_empty());
    }
}
