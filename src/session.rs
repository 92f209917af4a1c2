//! One exploration session: registry, interrupt coordinator and the loop
//! options derived from configuration.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use perceiver_structural::{Diff, Observation};
use soulexplorer_core_types::{AgentId, SessionId};
use soulexplorer_scheduler::{
    InterruptCoordinator, IterationContext, IterationControl, IterationScheduler, LoopError,
    LoopOutcome, SchedulerOptions, SpanTracer, TraceInfo,
};
use soulexplorer_state_center::{StateNode, StateRegistry, TransitionTrigger};
use tracing::{info, warn};

use crate::config::ExplorerConfig;
use crate::errors::{ExplorerError, ExplorerResult};

pub struct ExplorationSession {
    id: SessionId,
    agent_id: AgentId,
    config: ExplorerConfig,
    registry: Arc<StateRegistry>,
    coordinator: Arc<InterruptCoordinator>,
    last_observation: Mutex<Option<Arc<Observation>>>,
}

impl ExplorationSession {
    pub fn new(config: ExplorerConfig) -> Self {
        Self::with_coordinator(config, InterruptCoordinator::new())
    }

    /// Build a session around a coordinator the UI layer already holds.
    pub fn with_coordinator(
        config: ExplorerConfig,
        coordinator: Arc<InterruptCoordinator>,
    ) -> Self {
        let registry = Arc::new(StateRegistry::with_config(config.dead_loop()));
        let session = Self {
            id: SessionId::new(),
            agent_id: AgentId::new(),
            config,
            registry,
            coordinator,
            last_observation: Mutex::new(None),
        };
        info!(session = %session.id, "exploration session created");
        session
    }

    pub fn with_agent(mut self, agent_id: AgentId) -> Self {
        self.agent_id = agent_id;
        self
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<StateRegistry> {
        &self.registry
    }

    pub fn coordinator(&self) -> &Arc<InterruptCoordinator> {
        &self.coordinator
    }

    pub fn observe(
        &self,
        observation: Observation,
        action: Option<&str>,
        trigger: TransitionTrigger,
    ) -> Arc<StateNode> {
        *self.last_observation.lock() = Some(Arc::new(observation.clone()));
        self.registry.update(observation, action, None, trigger)
    }

    pub fn observe_basic(&self, url: &str, title: &str) -> Arc<StateNode> {
        self.observe(
            Observation::basic(url, title),
            None,
            TransitionTrigger::Navigation,
        )
    }

    /// Compare `observation` with the one fed to [`observe`](Self::observe)
    /// last. Does not record anything.
    pub async fn diff_against_previous(&self, observation: &Observation) -> ExplorerResult<Diff> {
        let previous = self.last_observation.lock().clone();
        let mut diff = Diff::new(observation.clone(), previous);
        diff.calculate().await?;
        Ok(diff)
    }

    /// Fails with [`ExplorerError::DeadLoop`] when recent transitions keep
    /// revisiting the same few states.
    pub fn ensure_progress(&self) -> ExplorerResult<()> {
        match self.registry.dead_loop() {
            Some(report) => {
                warn!(
                    session = %self.id,
                    window = report.window,
                    states = ?report.fingerprints,
                    "dead loop detected"
                );
                Err(ExplorerError::DeadLoop {
                    window: report.window,
                    fingerprints: report.fingerprints,
                })
            }
            None => Ok(()),
        }
    }

    pub fn scheduler_options(&self) -> SchedulerOptions {
        self.config
            .scheduler_options(Some(Arc::clone(&self.coordinator)))
            .with_tracer(Arc::new(SpanTracer))
            .with_trace(
                TraceInfo::new("agent")
                    .with_session(self.id.clone())
                    .with_agent(self.agent_id.clone()),
            )
    }

    /// Run an agent handler under this session's scheduler options.
    pub async fn run_agent<T, E, F, Fut>(
        &self,
        handler: F,
    ) -> Result<LoopOutcome<T>, LoopError<E>>
    where
        E: fmt::Display + Send + 'static,
        F: FnMut(IterationContext) -> Fut,
        Fut: Future<Output = Result<IterationControl<T>, E>> + Send + 'static,
        T: Send + 'static,
    {
        let scheduler = IterationScheduler::new(self.scheduler_options());
        let outcome = scheduler.run(handler).await?;
        info!(session = %self.id, summary = %outcome.summary(), "agent run finished");
        Ok(outcome)
    }

    /// Forget everything observed so far. Listeners and the coordinator stay.
    pub fn reset(&self) {
        self.registry.reset();
        *self.last_observation.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn diff_uses_last_observed_page() {
        let session = ExplorationSession::new(ExplorerConfig::default());
        let first = Observation::new("https://app.example/list").with_html("<ul><li>a</li></ul>");
        let diff = session.diff_against_previous(&first).await.unwrap();
        assert_eq!(diff.summary(), "first observation");
        session.observe(first, None, TransitionTrigger::Capture);

        let second =
            Observation::new("https://app.example/list").with_html("<ul><li>a</li><li>b</li></ul>");
        let diff = session.diff_against_previous(&second).await.unwrap();
        assert!(diff.has_changes());
        assert_eq!(diff.structural_subtree(), Some("<li>b</li>"));
    }

    #[test]
    fn ensure_progress_reports_dead_loop() {
        let session = ExplorationSession::new(ExplorerConfig::default());
        for _ in 0..3 {
            session.observe_basic("https://app.example/a", "A");
            session.observe_basic("https://app.example/b", "B");
        }
        let err = session.ensure_progress().unwrap_err();
        assert!(err.is_dead_loop());
        session.reset();
        assert!(session.ensure_progress().is_ok());
    }

    #[test]
    fn scheduler_options_carry_coordinator() {
        let session = ExplorationSession::new(ExplorerConfig::default());
        let options = session.scheduler_options();
        assert!(options.coordinator.is_some());
        assert_eq!(options.max_attempts, 10);
        let trace = options.trace.expect("trace info");
        assert_eq!(trace.session_id.as_ref(), Some(session.id()));
    }
}
