//! Two-stage service facility simulation
//!
//! Entities (passengers at a security checkpoint, cars at a carwash) arrive at
//! random, queue for each stage in turn, are served and depart. Each stage is a
//! capacity-limited FIFO pool of the [`des`] kernel. A run stops at its horizon;
//! entities still inside are abandoned where they are.
//!
//! ```no_run
//! use checkpoint::{FacilityConfig, run_once};
//!
//! let result = run_once(&FacilityConfig::airport())?;
//! println!("average wait {:?}", result.average_wait());
//! # Ok::<(), checkpoint::CheckpointError>(())
//! ```

pub mod arrivals;
pub mod config;
pub mod context;
pub mod entity;
pub mod error;
pub mod output;
pub mod run;
pub mod sweep;

pub use config::{ArrivalConfig, ExperimentFile, FacilityConfig, StageConfig, SweepSettings, WaitAccounting};
pub use context::{TraceRecord, Transition};
pub use des::dists::VariateSpec;
pub use error::CheckpointError;
pub use run::{ExperimentResult, StageSummary, run_once, run_once_traced};
pub use sweep::{Sweep, SweepEntry, SweepErrorPolicy, SweepReport, SweepRow, capacity_grid, run_sweep};
