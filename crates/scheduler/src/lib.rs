//! Cooperative iteration loop for exploration agents.
//!
//! [`IterationScheduler`] runs a handler repeatedly with bounded attempts and
//! an optional error policy. An [`InterruptCoordinator`] lets an operator halt
//! or redirect the loop while a handler is still in flight.

pub mod error;
pub mod interrupt;
pub mod iteration;
pub mod metrics;
pub mod model;
pub mod tracer;

pub use error::LoopError;
pub use interrupt::{InstructionPrompt, InterruptCoordinator, InterruptEvent, ScriptedPrompt};
pub use iteration::{ErrorPolicy, IterationScheduler};
pub use model::{
    ErrorAction, InterruptHook, IterationContext, IterationControl, LoopOutcome, LoopStatus,
    SchedulerOptions, TraceInfo,
};
pub use tracer::{LoopTracer, NoopTracer, SpanTracer};
