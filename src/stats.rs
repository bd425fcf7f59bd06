//! Run reports and their export formats.
//!
//! A [`RunReport`] captures everything a finished run produced: engine
//! counters, per-entity statistics and per-loop latency. It exports to JSON,
//! CSV and a human-readable summary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use crate::application::AppGraph;
use crate::engine::SimulationEngine;
use crate::types::{LoopId, SimTime};

/// Aggregate report of a simulation run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RunReport {
    /// Run metadata
    pub metadata: RunMetadata,

    /// Engine-level statistics
    pub engine: EngineSummary,

    /// Per-entity statistics, keyed by entity name
    pub entities: BTreeMap<String, serde_json::Value>,

    /// Latency per monitored loop, in loop declaration order
    pub loops: Vec<LoopReport>,

    /// Timing statistics
    pub timing: TimingStats,
}

/// Metadata about the run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Scenario name
    pub name: String,

    pub application_id: String,

    pub seed: u64,

    /// Crate version that produced the report
    pub version: String,
}

/// Engine-level statistics.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EngineSummary {
    /// Final simulation time
    pub final_time: SimTime,

    pub events_processed: u64,

    pub events_scheduled: u64,

    pub delivery_failures: u64,

    pub peak_queue_len: usize,

    /// Events still queued after the run
    pub pending_events: usize,

    pub entity_count: usize,

    /// Tracking ids issued by the TimeKeeper
    pub tracked_messages: usize,
}

/// Latency figures for one loop.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LoopReport {
    pub loop_id: LoopId,

    /// Loop path rendered as `a -> b -> c`
    pub path: String,

    pub emitted: usize,

    pub completed: usize,

    pub mean_latency: Option<f64>,

    pub min_latency: Option<SimTime>,

    pub max_latency: Option<SimTime>,
}

/// Timing/performance statistics.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TimingStats {
    /// Total wall-clock time in milliseconds
    pub total_wall_time_ms: f64,

    /// Simulation time per wall-clock second
    pub sim_time_per_second: f64,

    /// Events processed per second
    pub events_per_second: f64,
}

impl RunReport {
    /// Collects the report of a finished run.
    pub fn collect(name: impl Into<String>, seed: u64, engine: &SimulationEngine, graph: &AppGraph) -> Self {
        let stats = engine.stats();
        let timekeeper = engine.timekeeper();

        let loops = graph
            .loops()
            .iter()
            .map(|l| {
                let latency = timekeeper.loop_summary(l.id);
                LoopReport {
                    loop_id: l.id,
                    path: l.describe(),
                    emitted: latency.emitted,
                    completed: latency.completed,
                    mean_latency: latency.mean,
                    min_latency: latency.min,
                    max_latency: latency.max,
                }
            })
            .collect();

        let exported = engine.export_stats();
        let entities = exported["entities"]
            .as_object()
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        Self {
            metadata: RunMetadata {
                name: name.into(),
                application_id: graph.app_id().to_string(),
                seed,
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            engine: EngineSummary {
                final_time: engine.now(),
                events_processed: stats.events_processed,
                events_scheduled: stats.events_scheduled,
                delivery_failures: stats.delivery_failures,
                peak_queue_len: stats.peak_queue_len,
                pending_events: engine.pending_events(),
                entity_count: engine.entity_count(),
                tracked_messages: timekeeper.issued(),
            },
            entities,
            loops,
            timing: TimingStats::default(),
        }
    }

    /// Updates timing statistics based on wall clock time.
    pub fn compute_timing(&mut self, wall_time_ms: f64) {
        self.timing.total_wall_time_ms = wall_time_ms;

        if wall_time_ms > 0.0 {
            let seconds = wall_time_ms / 1000.0;
            self.timing.sim_time_per_second = self.engine.final_time as f64 / seconds;
            self.timing.events_per_second = self.engine.events_processed as f64 / seconds;
        }
    }

    /// Report for loop `loop_id`.
    pub fn loop_report(&self, loop_id: LoopId) -> Option<&LoopReport> {
        self.loops.iter().find(|l| l.loop_id == loop_id)
    }

    /// Total loop completions across all loops.
    pub fn completed_loops(&self) -> usize {
        self.loops.iter().map(|l| l.completed).sum()
    }

    /// Exports the report to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Exports the report to a JSON file.
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = self.to_json().map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e)
        })?;
        std::fs::write(path, json)
    }

    /// Exports summary statistics to CSV.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();

        csv.push_str("metric,value\n");

        csv.push_str(&format!("final_time,{}\n", self.engine.final_time));
        csv.push_str(&format!("events_processed,{}\n", self.engine.events_processed));
        csv.push_str(&format!("events_scheduled,{}\n", self.engine.events_scheduled));
        csv.push_str(&format!("delivery_failures,{}\n", self.engine.delivery_failures));
        csv.push_str(&format!("peak_queue_len,{}\n", self.engine.peak_queue_len));
        csv.push_str(&format!("entity_count,{}\n", self.engine.entity_count));
        csv.push_str(&format!("tracked_messages,{}\n", self.engine.tracked_messages));

        csv.push_str(&format!("wall_time_ms,{:.2}\n", self.timing.total_wall_time_ms));
        csv.push_str(&format!("sim_time_per_second,{:.2}\n", self.timing.sim_time_per_second));
        csv.push_str(&format!("events_per_second,{:.2}\n", self.timing.events_per_second));

        csv
    }

    /// Exports summary statistics to a CSV file.
    pub fn to_csv_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        std::fs::write(path, self.to_csv())
    }

    /// Exports per-loop latency to CSV. Missing figures are left empty.
    pub fn loops_to_csv(&self) -> String {
        let mut csv = String::new();

        csv.push_str("loop_id,path,emitted,completed,mean_latency,min_latency,max_latency\n");

        for l in &self.loops {
            csv.push_str(&format!(
                "{},\"{}\",{},{},{},{},{}\n",
                l.loop_id,
                l.path.replace('"', "\"\""),
                l.emitted,
                l.completed,
                l.mean_latency.map(|v| format!("{v:.3}")).unwrap_or_default(),
                l.min_latency.map(|v| v.to_string()).unwrap_or_default(),
                l.max_latency.map(|v| v.to_string()).unwrap_or_default(),
            ));
        }

        csv
    }

    /// Exports per-loop latency to a CSV file.
    pub fn loops_to_csv_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        std::fs::write(path, self.loops_to_csv())
    }

    /// Writes a human-readable summary to a writer.
    pub fn write_summary<W: Write>(&self, mut w: W) -> std::io::Result<()> {
        writeln!(w, "=== Simulation Report ===")?;
        writeln!(w)?;

        if !self.metadata.name.is_empty() {
            writeln!(w, "Name: {}", self.metadata.name)?;
        }
        writeln!(w, "Application: {}", self.metadata.application_id)?;
        writeln!(w, "Seed: {}", self.metadata.seed)?;
        writeln!(w)?;

        writeln!(w, "--- Engine ---")?;
        writeln!(w, "Final simulation time: {}", self.engine.final_time)?;
        writeln!(w, "Events processed: {}", self.engine.events_processed)?;
        writeln!(w, "Events scheduled: {}", self.engine.events_scheduled)?;
        writeln!(w, "Delivery failures: {}", self.engine.delivery_failures)?;
        writeln!(w, "Entities: {}", self.engine.entity_count)?;
        writeln!(w, "Tracked messages: {}", self.engine.tracked_messages)?;
        writeln!(w)?;

        writeln!(w, "--- Timing ---")?;
        writeln!(w, "Wall time: {:.2} ms", self.timing.total_wall_time_ms)?;
        writeln!(w, "Events/sec: {:.2}", self.timing.events_per_second)?;
        writeln!(w)?;

        writeln!(w, "--- Loop latency ---")?;
        for l in &self.loops {
            writeln!(w, "Loop {}: {}", l.loop_id, l.path)?;
            match l.mean_latency {
                Some(mean) => writeln!(
                    w,
                    "  {}/{} completed, mean {:.2}, min {}, max {}",
                    l.completed,
                    l.emitted,
                    mean,
                    l.min_latency.unwrap_or_default(),
                    l.max_latency.unwrap_or_default()
                )?,
                None => writeln!(w, "  {}/{} completed", l.completed, l.emitted)?,
            }
        }

        Ok(())
    }

    /// Returns a summary string.
    pub fn summary(&self) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_summary(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// A simple timer for measuring wall-clock time.
#[derive(Debug)]
pub struct Timer {
    start: std::time::Instant,
}

impl Timer {
    /// Starts a new timer.
    pub fn start() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }

    /// Returns elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns elapsed time in seconds.
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::start()
    }
}
