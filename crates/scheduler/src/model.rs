use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use soulexplorer_core_types::{AgentId, RunId, SessionId};

use crate::interrupt::InterruptCoordinator;
use crate::tracer::{LoopTracer, NoopTracer};

/// What a handler wants the loop to do next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IterationControl<T> {
    /// Record the result and run another iteration.
    Continue(T),
    /// Record the result and end the run.
    Stop(T),
    /// Run another iteration without recording anything.
    Retry,
}

/// Decision returned by an error policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorAction {
    Retry,
    Stop,
    Propagate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LoopStatus {
    Stopped,
    Exhausted,
    Interrupted,
}

impl LoopStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LoopStatus::Stopped => "stopped",
            LoopStatus::Exhausted => "exhausted",
            LoopStatus::Interrupted => "interrupted",
        }
    }
}

impl fmt::Display for LoopStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct LoopOutcome<T> {
    pub status: LoopStatus,
    /// Result of the last iteration that completed with a value.
    pub result: Option<T>,
    pub iterations: u32,
    pub last_error: Option<String>,
}

impl<T> LoopOutcome<T> {
    pub fn summary(&self) -> String {
        let mut summary = format!("{} after {} iteration(s)", self.status, self.iterations);
        if let Some(error) = &self.last_error {
            summary.push_str("; last error: ");
            summary.push_str(error);
        }
        summary
    }
}

/// Identifiers attached to the tracing span of a run.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TraceInfo {
    pub name: String,
    pub session_id: Option<SessionId>,
    pub agent_id: Option<AgentId>,
    pub run_id: RunId,
}

impl TraceInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn with_agent(mut self, agent_id: AgentId) -> Self {
        self.agent_id = Some(agent_id);
        self
    }
}

pub type InterruptHook = Arc<dyn Fn(&str, u32) + Send + Sync>;

#[derive(Clone)]
pub struct SchedulerOptions {
    pub max_attempts: u32,
    pub interruptible: bool,
    pub coordinator: Option<Arc<InterruptCoordinator>>,
    pub stop_keywords: Vec<String>,
    pub trace: Option<TraceInfo>,
    pub tracer: Arc<dyn LoopTracer>,
    /// Called with the operator's instruction and the interrupted iteration.
    pub on_interrupt: Option<InterruptHook>,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interruptible: true,
            coordinator: None,
            stop_keywords: vec!["stop".to_string(), "exit".to_string()],
            trace: None,
            tracer: Arc::new(NoopTracer),
            on_interrupt: None,
        }
    }
}

impl fmt::Debug for SchedulerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerOptions")
            .field("max_attempts", &self.max_attempts)
            .field("interruptible", &self.interruptible)
            .field("coordinator", &self.coordinator.is_some())
            .field("stop_keywords", &self.stop_keywords)
            .field("trace", &self.trace)
            .field("on_interrupt", &self.on_interrupt.is_some())
            .finish()
    }
}

impl SchedulerOptions {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_coordinator(mut self, coordinator: Arc<InterruptCoordinator>) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    pub fn interruptible(mut self, interruptible: bool) -> Self {
        self.interruptible = interruptible;
        self
    }

    pub fn with_trace(mut self, trace: TraceInfo) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn with_tracer(mut self, tracer: Arc<dyn LoopTracer>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn on_interrupt<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, u32) + Send + Sync + 'static,
    {
        self.on_interrupt = Some(Arc::new(hook));
        self
    }

    pub fn is_stop_keyword(&self, instruction: &str) -> bool {
        let instruction = instruction.trim();
        self.stop_keywords
            .iter()
            .any(|keyword| keyword.trim().eq_ignore_ascii_case(instruction))
    }
}

/// Per-invocation view handed to the handler.
#[derive(Clone)]
pub struct IterationContext {
    iteration: u32,
    instruction: Option<String>,
    stop: Arc<AtomicBool>,
    coordinator: Option<Arc<InterruptCoordinator>>,
}

impl IterationContext {
    pub(crate) fn new(
        iteration: u32,
        instruction: Option<String>,
        coordinator: Option<Arc<InterruptCoordinator>>,
    ) -> Self {
        Self {
            iteration,
            instruction,
            stop: Arc::new(AtomicBool::new(false)),
            coordinator,
        }
    }

    /// One-based index of this iteration.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Operator instruction carried over from the interrupt that preceded
    /// this iteration.
    pub fn instruction(&self) -> Option<&str> {
        self.instruction.as_deref()
    }

    /// End the run once this invocation returns, whatever it returns.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Ask the operator for fresh instruction mid-iteration.
    pub async fn pause(&self) -> Option<String> {
        match &self.coordinator {
            Some(coordinator) => coordinator.request_instruction().await,
            None => None,
        }
    }
}

impl fmt::Debug for IterationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IterationContext")
            .field("iteration", &self.iteration)
            .field("instruction", &self.instruction)
            .field("stop_requested", &self.stop_requested())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_keywords_ignore_case_and_whitespace() {
        let options = SchedulerOptions::default();
        assert!(options.is_stop_keyword(" STOP "));
        assert!(options.is_stop_keyword("Exit"));
        assert!(!options.is_stop_keyword("stop here"));
    }

    #[test]
    fn summary_names_last_error() {
        let outcome: LoopOutcome<()> = LoopOutcome {
            status: LoopStatus::Exhausted,
            result: None,
            iterations: 10,
            last_error: Some("element not found".into()),
        };
        assert_eq!(
            outcome.summary(),
            "exhausted after 10 iteration(s); last error: element not found"
        );
    }

    #[test]
    fn context_stop_flag_is_shared_between_clones() {
        let ctx = IterationContext::new(1, None, None);
        let clone = ctx.clone();
        clone.request_stop();
        assert!(ctx.stop_requested());
    }
}
