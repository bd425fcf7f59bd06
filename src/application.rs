//! Application graph: modules, routing edges and monitored loops.
//!
//! The graph is a static description of which source routes to which
//! module and which name sequences form end-to-end loops. It is built and
//! validated once through [`AppGraphBuilder`] and never mutated while a
//! simulation runs.
//!
//! # Example
//!
//! ```
//! use fogloop::application::{AppEdge, AppGraphBuilder, EdgeCategory};
//!
//! let graph = AppGraphBuilder::new("mine")
//!     .module("gasinfo-module", 10)
//!     .module("master-module", 10)
//!     .source("gas-sensor")
//!     .edge(AppEdge::new("GAS", "gasinfo-module", 1000, 200, "GAS", EdgeCategory::Sensor))
//!     .edge(AppEdge::new("gasinfo-module", "master-module", 2000, 200, "GAS_PROCESS", EdgeCategory::Module))
//!     .add_loop(["gas-sensor", "gasinfo-module", "master-module"])
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(graph.find_edge_by_source("GAS").unwrap().destination, "gasinfo-module");
//! assert!(graph.loop_has_edge(0, "gas-sensor", "gasinfo-module"));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::message::Direction;
use crate::types::LoopId;

/// Errors raised while building an application graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("application id must not be empty")]
    EmptyApplicationId,

    #[error("module `{0}` is declared more than once")]
    DuplicateModule(String),

    #[error("edge {from} -> {to} targets undeclared module `{to}`")]
    UnknownDestination { from: String, to: String },

    #[error("module edge {from} -> {to} starts at undeclared module `{from}`")]
    UnknownSource { from: String, to: String },

    #[error("loop {loop_id} needs at least two names, got {len}")]
    LoopTooShort { loop_id: LoopId, len: usize },

    #[error("loop {loop_id} references unknown name `{name}`")]
    UnknownLoopName { loop_id: LoopId, name: String },
}

/// Kind of an edge, mirroring what sits at its source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeCategory {
    /// Sensor readings entering the application
    Sensor,
    /// Commands leaving the application towards an actuator
    Actuator,
    /// Module-to-module traffic
    Module,
}

/// A processing module of the application.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppModule {
    pub name: String,
    #[serde(default)]
    pub ram: u32,
}

/// Declared routing rule from a named source to a destination module.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppEdge {
    pub source: String,
    pub destination: String,
    pub cpu_length: u64,
    pub network_length: u64,
    pub type_tag: String,
    #[serde(default)]
    pub direction: Direction,
    pub category: EdgeCategory,
}

impl AppEdge {
    /// Creates an upward edge.
    pub fn new(
        source: impl Into<String>,
        destination: impl Into<String>,
        cpu_length: u64,
        network_length: u64,
        type_tag: impl Into<String>,
        category: EdgeCategory,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            cpu_length,
            network_length,
            type_tag: type_tag.into(),
            direction: Direction::Up,
            category,
        }
    }

    /// Sets the edge direction.
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }
}

/// An ordered path of names monitored for end-to-end latency.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppLoop {
    pub id: LoopId,
    pub path: Vec<String>,
}

impl AppLoop {
    /// Returns `true` iff `a` is immediately followed by `b` in the path.
    pub fn has_edge(&self, a: &str, b: &str) -> bool {
        self.path.windows(2).any(|w| w[0] == a && w[1] == b)
    }

    /// First name of the path.
    pub fn first(&self) -> Option<&str> {
        self.path.first().map(String::as_str)
    }

    /// Last name of the path, where the loop completes.
    pub fn last(&self) -> Option<&str> {
        self.path.last().map(String::as_str)
    }

    /// Renders the path as `a -> b -> c`.
    pub fn describe(&self) -> String {
        self.path.join(" -> ")
    }
}

/// Validated, read-only application graph.
#[derive(Clone, Debug, Serialize)]
pub struct AppGraph {
    app_id: String,
    modules: Vec<AppModule>,
    sources: Vec<String>,
    edges: Vec<AppEdge>,
    loops: Vec<AppLoop>,
}

impl AppGraph {
    /// Returns the application id.
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Returns all declared modules.
    pub fn modules(&self) -> &[AppModule] {
        &self.modules
    }

    /// Returns `true` if a module with this name is declared.
    pub fn has_module(&self, name: &str) -> bool {
        self.modules.iter().any(|m| m.name == name)
    }

    /// Returns the declared source names (e.g. sensor names used in loops).
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Returns all edges in declaration order.
    pub fn edges(&self) -> &[AppEdge] {
        &self.edges
    }

    /// Returns all loops in declaration order.
    pub fn loops(&self) -> &[AppLoop] {
        &self.loops
    }

    /// Finds the edge whose source is `name`.
    ///
    /// When several edges share a source the first one in declaration
    /// order wins.
    pub fn find_edge_by_source(&self, name: &str) -> Option<&AppEdge> {
        self.edges.iter().find(|e| e.source == name)
    }

    /// Iterates over every edge leaving `name`, in declaration order.
    pub fn edges_from<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a AppEdge> + 'a {
        self.edges.iter().filter(move |e| e.source == name)
    }

    /// Returns the loop with the given id.
    pub fn get_loop(&self, loop_id: LoopId) -> Option<&AppLoop> {
        self.loops.get(loop_id)
    }

    /// Returns `true` if loop `loop_id` exists and contains the pair `a -> b`.
    pub fn loop_has_edge(&self, loop_id: LoopId, a: &str, b: &str) -> bool {
        self.get_loop(loop_id).is_some_and(|l| l.has_edge(a, b))
    }

    /// First loop, in declaration order, containing the pair `a -> b`.
    pub fn loop_for_edge(&self, a: &str, b: &str) -> Option<&AppLoop> {
        self.loops.iter().find(|l| l.has_edge(a, b))
    }
}

/// Builder for [`AppGraph`]; validation happens in [`build`](Self::build).
#[derive(Debug, Default)]
pub struct AppGraphBuilder {
    app_id: String,
    modules: Vec<AppModule>,
    sources: Vec<String>,
    edges: Vec<AppEdge>,
    loops: Vec<Vec<String>>,
}

impl AppGraphBuilder {
    /// Starts a graph for the given application id.
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            ..Self::default()
        }
    }

    /// Declares a processing module.
    pub fn module(mut self, name: impl Into<String>, ram: u32) -> Self {
        self.modules.push(AppModule {
            name: name.into(),
            ram,
        });
        self
    }

    /// Declares a source name (typically a sensor) that loops may start from.
    pub fn source(mut self, name: impl Into<String>) -> Self {
        self.sources.push(name.into());
        self
    }

    /// Declares an edge.
    pub fn edge(mut self, edge: AppEdge) -> Self {
        self.edges.push(edge);
        self
    }

    /// Declares a loop; its id is its position among declared loops.
    pub fn add_loop<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.loops.push(path.into_iter().map(Into::into).collect());
        self
    }

    /// Validates the declarations and produces the graph.
    pub fn build(self) -> Result<AppGraph, GraphError> {
        if self.app_id.trim().is_empty() {
            return Err(GraphError::EmptyApplicationId);
        }

        let mut module_names = HashSet::new();
        for module in &self.modules {
            if !module_names.insert(module.name.as_str()) {
                return Err(GraphError::DuplicateModule(module.name.clone()));
            }
        }

        for edge in &self.edges {
            let needs_module_destination = edge.category != EdgeCategory::Actuator;
            if needs_module_destination && !module_names.contains(edge.destination.as_str()) {
                return Err(GraphError::UnknownDestination {
                    from: edge.source.clone(),
                    to: edge.destination.clone(),
                });
            }
            if edge.category == EdgeCategory::Module && !module_names.contains(edge.source.as_str()) {
                return Err(GraphError::UnknownSource {
                    from: edge.source.clone(),
                    to: edge.destination.clone(),
                });
            }
        }

        let mut known: HashSet<&str> = module_names.clone();
        known.extend(self.sources.iter().map(String::as_str));
        for edge in &self.edges {
            known.insert(edge.source.as_str());
            known.insert(edge.destination.as_str());
        }

        for (loop_id, path) in self.loops.iter().enumerate() {
            if path.len() < 2 {
                return Err(GraphError::LoopTooShort {
                    loop_id,
                    len: path.len(),
                });
            }
            if let Some(name) = path.iter().find(|n| !known.contains(n.as_str())) {
                return Err(GraphError::UnknownLoopName {
                    loop_id,
                    name: name.clone(),
                });
            }
        }

        let mut seen_sources: HashMap<&str, usize> = HashMap::new();
        for edge in &self.edges {
            *seen_sources.entry(edge.source.as_str()).or_default() += 1;
        }
        for (source, count) in seen_sources {
            let is_fan_out = module_names.contains(source);
            if count > 1 && !is_fan_out {
                tracing::warn!(
                    source,
                    count,
                    "several edges share a source; the first declared edge is used"
                );
            }
        }

        let mut pair_owner: HashMap<(&str, &str), LoopId> = HashMap::new();
        for (loop_id, path) in self.loops.iter().enumerate() {
            for w in path.windows(2) {
                let first = *pair_owner
                    .entry((w[0].as_str(), w[1].as_str()))
                    .or_insert(loop_id);
                if first != loop_id {
                    tracing::warn!(
                        from = %w[0],
                        to = %w[1],
                        first_loop = first,
                        loop_id,
                        "pair appears in several loops; timing registers against the first"
                    );
                }
            }
        }

        let loops = self
            .loops
            .into_iter()
            .enumerate()
            .map(|(id, path)| AppLoop { id, path })
            .collect();

        Ok(AppGraph {
            app_id: self.app_id,
            modules: self.modules,
            sources: self.sources,
            edges: self.edges,
            loops,
        })
    }
}
