//! Parallel execution of independent scenarios
//!
//! Each scenario builds and runs its own [`crate::EventLoop`] inside a closure, so
//! nothing is shared between scenarios and results are the same regardless of
//! thread count or execution order.
//!
//! # Example: a small parameter sweep
//!
//! ```rust
//! use des::parallel::{ParallelRunner, simple_progress_reporter};
//!
//! let capacities = [1usize, 2, 3, 4];
//! let results = ParallelRunner::new(capacities.len(), |scenario_id| {
//!     capacities[scenario_id] * 10
//! })
//! .progress(simple_progress_reporter(2))
//! .num_threads(2)
//! .run();
//!
//! assert_eq!(results, vec![Ok(10), Ok(20), Ok(30), Ok(40)]);
//! ```
//!
//! # Determinism
//!
//! Results are deterministic when:
//! 1. The scenario closure derives any seed from `scenario_id` or its own inputs
//! 2. Agents use seeded RNGs (e.g., `StdRng::seed_from_u64(seed)`)
//! 3. No shared mutable state across scenarios
//!
//! # Error Handling
//!
//! Panics in individual scenarios are caught and returned as `Err(String)`.
//! Other scenarios continue executing normally.

use rayon::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};

/// Executes independent scenarios in parallel
///
/// Generic over:
/// - `R`: Result produced by one scenario
/// - `F`: Scenario function, `Fn(usize) -> R`, called once per scenario id
pub struct ParallelRunner<R, F>
where
    F: Fn(usize) -> R + Send + Sync,
    R: Send,
{
    num_scenarios: usize,
    scenario: F,
    num_threads: Option<usize>,
    progress_callback: Option<Arc<dyn Fn(usize, usize) + Send + Sync>>,
}

impl<R, F> ParallelRunner<R, F>
where
    F: Fn(usize) -> R + Send + Sync,
    R: Send,
{
    /// Create a new parallel runner
    ///
    /// # Arguments
    ///
    /// * `num_scenarios` - Number of independent scenarios to run
    /// * `scenario` - Closure that runs the scenario with the given id
    pub fn new(num_scenarios: usize, scenario: F) -> Self {
        ParallelRunner {
            num_scenarios,
            scenario,
            num_threads: None,
            progress_callback: None,
        }
    }

    /// Set number of threads (defaults to rayon's global pool)
    pub fn num_threads(mut self, n: usize) -> Self {
        self.num_threads = Some(n);
        self
    }

    /// Set progress callback (called after each scenario completes)
    ///
    /// The callback receives `(completed_count, total_count)`.
    pub fn progress<P>(mut self, callback: P) -> Self
    where
        P: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// Execute all scenarios and return results in scenario_id order
    ///
    /// - `Ok(R)` for scenarios that returned
    /// - `Err(String)` for scenarios that panicked
    pub fn run(self) -> Vec<Result<R, String>> {
        let progress_counter = AtomicUsize::new(0);

        let pool = self.num_threads.and_then(|n| {
            match rayon::ThreadPoolBuilder::new().num_threads(n).build() {
                Ok(pool) => Some(pool),
                Err(e) => {
                    warn!(threads = n, error = %e, "falling back to the global thread pool");
                    None
                }
            }
        });

        let execute = || {
            (0..self.num_scenarios)
                .into_par_iter()
                .map(|scenario_id| {
                    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                        (self.scenario)(scenario_id)
                    }));

                    let completed = progress_counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(ref callback) = self.progress_callback {
                        callback(completed, self.num_scenarios);
                    }

                    result.map_err(|panic| {
                        if let Some(s) = panic.downcast_ref::<&str>() {
                            s.to_string()
                        } else if let Some(s) = panic.downcast_ref::<String>() {
                            s.clone()
                        } else {
                            "Unknown panic".to_string()
                        }
                    })
                })
                .collect()
        };

        match pool {
            Some(pool) => pool.install(execute),
            None => execute(),
        }
    }
}

/// Run scenarios in parallel with the default pool and no progress reporting
pub fn run_parallel<R, F>(num_scenarios: usize, scenario: F) -> Vec<Result<R, String>>
where
    F: Fn(usize) -> R + Send + Sync,
    R: Send,
{
    ParallelRunner::new(num_scenarios, scenario).run()
}

/// Progress callback that logs every `interval` completed scenarios
pub fn simple_progress_reporter(interval: usize) -> impl Fn(usize, usize) + Send + Sync {
    let interval = interval.max(1);
    move |completed, total| {
        if completed % interval == 0 || completed == total {
            info!("completed {}/{} scenarios", completed, total);
        }
    }
}
