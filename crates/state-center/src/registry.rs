use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use perceiver_structural::{normalize_path, CaptureArtifacts, Observation};
use serde::{Deserialize, Serialize};
use soulexplorer_core_types::SoulError;
use tracing::{debug, warn};

use crate::node::StateNode;
use crate::transition::{ExplorationPath, Transition, TransitionTrigger};

pub type StateListener = Arc<dyn Fn(&Transition) -> Result<(), SoulError> + Send + Sync>;

/// Trailing-window parameters for dead-loop detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadLoopConfig {
    /// Number of most recent transitions inspected.
    pub window: usize,
    /// The window is a dead loop when it visits at most this many states.
    pub max_distinct: usize,
}

impl Default for DeadLoopConfig {
    fn default() -> Self {
        Self {
            window: 6,
            max_distinct: 2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeadLoopReport {
    pub window: usize,
    pub fingerprints: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct RegistryStats {
    pub states: usize,
    pub transitions: usize,
    pub listeners: usize,
    pub dead_loop: bool,
}

#[derive(Clone, Copy, Debug)]
struct PathVisits {
    count: u64,
    last: DateTime<Utc>,
}

#[derive(Default)]
struct RegistryInner {
    states: HashMap<String, Arc<StateNode>>,
    current: Option<Arc<StateNode>>,
    last_observation: Option<Arc<Observation>>,
    history: Vec<Transition>,
    path: ExplorationPath,
    paths: HashMap<String, PathVisits>,
}

#[derive(Default)]
struct ListenerTable {
    next_id: u64,
    entries: Vec<(u64, StateListener)>,
}

/// Handle returned by [`StateRegistry::on_change`].
pub struct Subscription {
    id: u64,
    table: Weak<Mutex<ListenerTable>>,
}

impl Subscription {
    /// Remove the listener. Returns false when it was already gone.
    pub fn unsubscribe(self) -> bool {
        let Some(table) = self.table.upgrade() else {
            return false;
        };
        let mut table = table.lock();
        let before = table.entries.len();
        table.entries.retain(|(id, _)| *id != self.id);
        table.entries.len() != before
    }
}

/// Single source of truth for where the explorer is and where it has been.
///
/// Observations are deduplicated into [`StateNode`]s by fingerprint. Moving to
/// a different fingerprint appends a [`Transition`] and notifies listeners;
/// re-observing the current fingerprint changes nothing.
pub struct StateRegistry {
    config: DeadLoopConfig,
    inner: Mutex<RegistryInner>,
    listeners: Arc<Mutex<ListenerTable>>,
}

impl Default for StateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StateRegistry {
    pub fn new() -> Self {
        Self::with_config(DeadLoopConfig::default())
    }

    pub fn with_config(config: DeadLoopConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(RegistryInner::default()),
            listeners: Arc::new(Mutex::new(ListenerTable::default())),
        }
    }

    pub fn config(&self) -> DeadLoopConfig {
        self.config
    }

    /// Record an observation and return the state it maps to.
    ///
    /// Bookkeeping completes under the registry lock; listeners run after it
    /// is released, in registration order.
    pub fn update(
        &self,
        observation: Observation,
        action: Option<&str>,
        artifacts: Option<CaptureArtifacts>,
        trigger: TransitionTrigger,
    ) -> Arc<StateNode> {
        let fingerprint = observation.fingerprint();
        let transition = {
            let mut inner = self.inner.lock();
            if let Some(current) = inner.current.as_ref() {
                if current.fingerprint() == fingerprint {
                    return Arc::clone(current);
                }
            }

            let now = Utc::now();
            let artifacts = artifacts.or_else(|| observation.artifacts.clone());
            let observation = Arc::new(observation);
            let node = match inner.states.get(&fingerprint) {
                Some(existing) => {
                    existing.record_visit(now, artifacts.as_ref());
                    Arc::clone(existing)
                }
                None => {
                    let created = Arc::new(StateNode::from_observation(
                        &observation,
                        fingerprint.clone(),
                        artifacts,
                        now,
                    ));
                    inner.states.insert(fingerprint, Arc::clone(&created));
                    created
                }
            };

            inner
                .paths
                .entry(node.relative_path().to_string())
                .and_modify(|visits| {
                    visits.count = visits.count.saturating_add(1);
                    visits.last = now;
                })
                .or_insert(PathVisits {
                    count: 1,
                    last: now,
                });

            let transition = Transition {
                from: inner.current.replace(Arc::clone(&node)),
                to: node,
                trigger,
                action: action.map(str::to_string),
                at: now,
            };
            let initial = inner.last_observation.replace(Arc::clone(&observation));
            inner.history.push(transition.clone());
            inner.path.record(initial, transition.clone(), observation);
            debug!(
                target: "state.registry",
                from = transition.from_fingerprint().unwrap_or("<start>"),
                to = transition.to_fingerprint(),
                trigger = %transition.trigger,
                visits = transition.to.visit_count(),
                "state transition recorded"
            );
            transition
        };

        self.notify(&transition);
        transition.to
    }

    /// Record a navigation signal that carries only a URL and a title.
    pub fn update_from_basic(
        &self,
        url: &str,
        title: &str,
        trigger: TransitionTrigger,
    ) -> Arc<StateNode> {
        self.update(Observation::basic(url, title), None, None, trigger)
    }

    /// True when `node` is not the current state (pointer comparison).
    pub fn has_changed(&self, node: &Arc<StateNode>) -> bool {
        match self.inner.lock().current.as_ref() {
            Some(current) => !Arc::ptr_eq(current, node),
            None => true,
        }
    }

    pub fn current(&self) -> Option<Arc<StateNode>> {
        self.inner.lock().current.clone()
    }

    pub fn state(&self, fingerprint: &str) -> Option<Arc<StateNode>> {
        self.inner.lock().states.get(fingerprint).cloned()
    }

    pub fn states(&self) -> Vec<Arc<StateNode>> {
        let inner = self.inner.lock();
        let mut states: Vec<_> = inner.states.values().cloned().collect();
        states.sort_by_key(|node| node.first_seen());
        states
    }

    pub fn state_count(&self) -> usize {
        self.inner.lock().states.len()
    }

    pub fn history(&self) -> Vec<Transition> {
        self.inner.lock().history.clone()
    }

    /// The last `count` transitions, oldest first.
    pub fn recent(&self, count: usize) -> Vec<Transition> {
        let inner = self.inner.lock();
        let start = inner.history.len().saturating_sub(count);
        inner.history[start..].to_vec()
    }

    pub fn history_len(&self) -> usize {
        self.inner.lock().history.len()
    }

    pub fn path(&self) -> ExplorationPath {
        self.inner.lock().path.clone()
    }

    pub fn is_in_dead_loop(&self) -> bool {
        self.dead_loop().is_some()
    }

    /// Evaluated on demand from the stored history.
    pub fn dead_loop(&self) -> Option<DeadLoopReport> {
        let inner = self.inner.lock();
        detect_dead_loop(&inner.history, &self.config)
    }

    pub fn has_visited(&self, path: &str) -> bool {
        self.inner.lock().paths.contains_key(&normalize_path(path))
    }

    pub fn visit_count(&self, path: &str) -> u64 {
        self.inner
            .lock()
            .paths
            .get(&normalize_path(path))
            .map(|visits| visits.count)
            .unwrap_or(0)
    }

    pub fn last_visit(&self, path: &str) -> Option<DateTime<Utc>> {
        self.inner
            .lock()
            .paths
            .get(&normalize_path(path))
            .map(|visits| visits.last)
    }

    pub fn on_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Transition) -> Result<(), SoulError> + Send + Sync + 'static,
    {
        let mut table = self.listeners.lock();
        let id = table.next_id;
        table.next_id += 1;
        table.entries.push((id, Arc::new(listener)));
        Subscription {
            id,
            table: Arc::downgrade(&self.listeners),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().entries.len()
    }

    pub fn clear_listeners(&self) {
        self.listeners.lock().entries.clear();
    }

    /// Forget every state, transition and visit. Listeners are kept.
    pub fn reset(&self) {
        *self.inner.lock() = RegistryInner::default();
        debug!(target: "state.registry", "registry reset");
    }

    pub fn stats(&self) -> RegistryStats {
        let listeners = self.listener_count();
        let inner = self.inner.lock();
        RegistryStats {
            states: inner.states.len(),
            transitions: inner.history.len(),
            listeners,
            dead_loop: detect_dead_loop(&inner.history, &self.config).is_some(),
        }
    }

    fn notify(&self, transition: &Transition) {
        let listeners: Vec<(u64, StateListener)> = self.listeners.lock().entries.clone();
        for (id, listener) in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(transition))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(target: "state.registry", listener = id, error = %err, "state listener failed");
                }
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    warn!(target: "state.registry", listener = id, %message, "state listener panicked");
                }
            }
        }
    }
}

fn detect_dead_loop(history: &[Transition], config: &DeadLoopConfig) -> Option<DeadLoopReport> {
    if config.window == 0 || history.len() < config.window {
        return None;
    }
    let mut fingerprints: Vec<String> = Vec::new();
    for transition in &history[history.len() - config.window..] {
        let fingerprint = transition.to_fingerprint();
        if !fingerprints.iter().any(|seen| seen == fingerprint) {
            fingerprints.push(fingerprint.to_string());
        }
    }
    (fingerprints.len() <= config.max_distinct).then(|| DeadLoopReport {
        window: config.window,
        fingerprints,
    })
}
