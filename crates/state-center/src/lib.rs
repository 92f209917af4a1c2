//! Page-state bookkeeping for an exploration session.
//!
//! [`StateRegistry`] folds observations into fingerprinted [`StateNode`]s,
//! records transitions between them, indexes visits by path and reports
//! when the explorer keeps cycling through the same few states.

pub mod node;
pub mod registry;
pub mod transition;

pub use node::{StateNode, StateSummary};
pub use registry::{
    DeadLoopConfig, DeadLoopReport, RegistryStats, StateListener, StateRegistry, Subscription,
};
pub use transition::{ExplorationPath, PathStep, Transition, TransitionRecord, TransitionTrigger};
