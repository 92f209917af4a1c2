//! SoulExplorer library
//!
//! Session-level glue over the state registry, the differ and the iteration
//! scheduler, plus the pieces of the `soulexplorer` binary that integration
//! tests exercise.

pub mod cli;
pub mod config;
pub mod errors;
pub mod replay;
pub mod session;

pub use config::{ExplorerConfig, LoggingConfig, SchedulerConfig};
pub use errors::{ExplorerError, ExplorerResult};
pub use replay::{load_replay, parse_replay, replay, ReplayReport, ReplayStep, ReplayStepReport};
pub use session::ExplorationSession;
