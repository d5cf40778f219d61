//! # Dinesim - timeout-based dining philosophers simulation
//!
//! N agents sit in a ring, each needing exclusive use of its left and right
//! neighbour resource to "eat". Agents acquire resources with a bounded
//! timeout, so a circular wait can never hold the ring forever: whoever runs
//! out of budget releases what it holds and tries again later.
//!
//! ## Architecture
//!
//! - `config`: `SimulationConfig`, defaults and validation
//! - `config_loader`: YAML config files and command-line overrides
//! - `cancel`: cancellation token shared by every blocking wait
//! - `resource`: exclusively-held, time-bounded lock with RAII release
//! - `agent`: the think / hungry / eat state machine and its statistics
//! - `coordinator`: ring construction, launch and bounded shutdown
//! - `report`: results table, deadlock and starvation diagnostics
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use dinesim::{Coordinator, SimulationConfig, SimulationReport};
//! use std::time::Duration;
//!
//! let config = SimulationConfig {
//!     run_time: Duration::from_secs(3),
//!     ..Default::default()
//! };
//! let snapshot = Coordinator::new(config)?.run()?;
//! SimulationReport::new(snapshot).print();
//! # Ok::<(), color_eyre::eyre::Error>(())
//! ```
//!
//! ## Diagnostics
//!
//! "Deadlock suspected" only means no agent completed a meal during the
//! run. It is a heuristic: very short runs or very large timeouts can
//! produce the same result without any circular wait.

pub mod agent;
pub mod cancel;
pub mod config;
pub mod config_loader;
pub mod coordinator;
pub mod report;
pub mod resource;

pub use config::{ConfigError, SimulationConfig};
pub use coordinator::{Coordinator, SimulationSnapshot};
pub use report::SimulationReport;
