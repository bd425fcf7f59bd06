//! Batch execution of independent scenarios.
//!
//! Every scenario in a batch gets its own engine and its own
//! [`TimeKeeper`](crate::timekeeper::TimeKeeper); nothing is shared between
//! runs. With the `parallel` feature the runs are spread over rayon's thread
//! pool, otherwise they execute one after another.
//!
//! # Feature Flag
//!
//! Parallel execution requires the `parallel` feature:
//! ```toml
//! [dependencies]
//! fogloop = { version = "0.1", features = ["parallel"] }
//! ```

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::{ConfigResult, ScenarioConfig};
use crate::scenario::run_scenario;
use crate::stats::RunReport;
use crate::types::LoopId;

/// Runs a batch of scenarios.
#[derive(Clone, Debug, Default)]
pub struct BatchRunner {
    /// Number of worker threads (0 = auto)
    num_threads: usize,
}

impl BatchRunner {
    /// Creates a runner using rayon's default pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of worker threads.
    ///
    /// Pass 0 for automatic detection (uses number of CPUs). Ignored without
    /// the `parallel` feature.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = threads;
        self
    }

    /// Runs every scenario sequentially. Results keep input order.
    #[cfg(not(feature = "parallel"))]
    pub fn run(&self, configs: &[ScenarioConfig]) -> Vec<ConfigResult<RunReport>> {
        configs.iter().map(run_scenario).collect()
    }

    /// Runs every scenario in parallel. Results keep input order.
    #[cfg(feature = "parallel")]
    pub fn run(&self, configs: &[ScenarioConfig]) -> Vec<ConfigResult<RunReport>> {
        let run_all = || configs.par_iter().map(run_scenario).collect::<Vec<_>>();

        if self.num_threads == 0 {
            return run_all();
        }
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_threads)
            .build()
        {
            Ok(pool) => pool.install(run_all),
            Err(err) => {
                tracing::warn!(error = %err, "could not build thread pool; using the global pool");
                run_all()
            }
        }
    }
}

/// Runs a batch with the default runner.
pub fn run_batch(configs: &[ScenarioConfig]) -> Vec<ConfigResult<RunReport>> {
    BatchRunner::new().run(configs)
}

/// Copies `base` once per seed, naming each copy after its seed.
pub fn seed_sweep(base: &ScenarioConfig, seeds: impl IntoIterator<Item = u64>) -> Vec<ScenarioConfig> {
    seeds
        .into_iter()
        .map(|seed| {
            let mut config = base.clone();
            config.simulation.seed = seed;
            config.simulation.name = format!("{}-seed{}", base.simulation.name, seed);
            config
        })
        .collect()
}

/// Mean latency of `loop_id` across reports, weighted by completions.
pub fn pooled_mean_latency(reports: &[RunReport], loop_id: LoopId) -> Option<f64> {
    let (total, count) = reports
        .iter()
        .filter_map(|r| r.loop_report(loop_id))
        .filter_map(|l| l.mean_latency.map(|m| (m * l.completed as f64, l.completed)))
        .fold((0.0, 0usize), |(t, c), (sum, n)| (t + sum, c + n));

    (count > 0).then(|| total / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::TransmitDistribution;

    fn short_mine_safety() -> ScenarioConfig {
        let mut config = ScenarioConfig::mine_safety();
        config.simulation.max_time = 150;
        config
    }

    #[test]
    fn test_seed_sweep() {
        let configs = seed_sweep(&short_mine_safety(), [1, 2, 3]);
        assert_eq!(configs.len(), 3);
        assert_eq!(configs[1].simulation.seed, 2);
        assert_eq!(configs[2].simulation.name, "mine-safety-seed3");
    }

    #[test]
    fn test_run_batch_keeps_order() {
        let configs = seed_sweep(&short_mine_safety(), [10, 20]);
        let reports = run_batch(&configs);

        assert_eq!(reports.len(), 2);
        let first = reports[0].as_ref().unwrap();
        let second = reports[1].as_ref().unwrap();
        assert_eq!(first.metadata.seed, 10);
        assert_eq!(second.metadata.seed, 20);
    }

    #[test]
    fn test_runs_are_isolated() {
        // Identical configs yield identical tracking counts: no state leaks
        // from one run's TimeKeeper into another.
        let configs = vec![short_mine_safety(), short_mine_safety(), short_mine_safety()];
        let reports: Vec<RunReport> = BatchRunner::new()
            .with_threads(2)
            .run(&configs)
            .into_iter()
            .map(Result::unwrap)
            .collect();

        let tracked: Vec<usize> = reports.iter().map(|r| r.engine.tracked_messages).collect();
        assert!(tracked.iter().all(|&t| t == tracked[0]));
        assert!(tracked[0] > 0);
    }

    #[test]
    fn test_invalid_config_reported_per_run() {
        let mut bad = short_mine_safety();
        bad.sensors[0].distribution = TransmitDistribution::Uniform { min: 5, max: 1 };
        let reports = run_batch(&[short_mine_safety(), bad]);

        assert!(reports[0].is_ok());
        assert!(reports[1].is_err());
    }

    #[test]
    fn test_pooled_mean_latency() {
        let reports: Vec<RunReport> = run_batch(&seed_sweep(&short_mine_safety(), [1, 2]))
            .into_iter()
            .map(Result::unwrap)
            .collect();

        let mean = pooled_mean_latency(&reports, 0).unwrap();
        assert!(mean > 0.0);
        assert_eq!(pooled_mean_latency(&[], 0), None);
    }
}
