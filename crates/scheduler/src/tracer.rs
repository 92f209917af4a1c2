use tracing::{info_span, Span};

use crate::model::TraceInfo;

/// Produces the span an iteration loop runs inside.
pub trait LoopTracer: Send + Sync {
    fn span(&self, trace: Option<&TraceInfo>) -> Span;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopTracer;

impl LoopTracer for NoopTracer {
    fn span(&self, _trace: Option<&TraceInfo>) -> Span {
        Span::none()
    }
}

/// Opens an `iteration_loop` span tagged with the session, agent and run ids.
#[derive(Clone, Copy, Debug, Default)]
pub struct SpanTracer;

impl LoopTracer for SpanTracer {
    fn span(&self, trace: Option<&TraceInfo>) -> Span {
        match trace {
            Some(trace) => info_span!(
                "iteration_loop",
                name = %trace.name,
                session = trace.session_id.as_ref().map(|id| id.as_str()).unwrap_or("-"),
                agent = trace.agent_id.as_ref().map(|id| id.as_str()).unwrap_or("-"),
                run = %trace.run_id,
            ),
            None => info_span!("iteration_loop"),
        }
    }
}
