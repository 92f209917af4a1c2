use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use perceiver_structural::Observation;
use serde::{Deserialize, Serialize};

use crate::node::StateNode;

/// What caused a move between states.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransitionTrigger {
    Navigation,
    Action,
    Capture,
    Manual,
    Other(String),
}

impl TransitionTrigger {
    pub fn as_str(&self) -> &str {
        match self {
            TransitionTrigger::Navigation => "navigation",
            TransitionTrigger::Action => "action",
            TransitionTrigger::Capture => "capture",
            TransitionTrigger::Manual => "manual",
            TransitionTrigger::Other(label) => label,
        }
    }
}

impl Default for TransitionTrigger {
    fn default() -> Self {
        TransitionTrigger::Capture
    }
}

impl fmt::Display for TransitionTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for TransitionTrigger {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "navigation" => TransitionTrigger::Navigation,
            "action" => TransitionTrigger::Action,
            "capture" => TransitionTrigger::Capture,
            "manual" => TransitionTrigger::Manual,
            _ => TransitionTrigger::Other(value.trim().to_string()),
        }
    }
}

impl From<String> for TransitionTrigger {
    fn from(value: String) -> Self {
        TransitionTrigger::from(value.as_str())
    }
}

impl From<TransitionTrigger> for String {
    fn from(value: TransitionTrigger) -> Self {
        value.as_str().to_string()
    }
}

/// One recorded move between two states.
#[derive(Clone, Debug)]
pub struct Transition {
    pub from: Option<Arc<StateNode>>,
    pub to: Arc<StateNode>,
    pub trigger: TransitionTrigger,
    pub action: Option<String>,
    pub at: DateTime<Utc>,
}

impl Transition {
    pub fn from_fingerprint(&self) -> Option<&str> {
        self.from.as_deref().map(StateNode::fingerprint)
    }

    pub fn to_fingerprint(&self) -> &str {
        self.to.fingerprint()
    }

    pub fn record(&self) -> TransitionRecord {
        TransitionRecord {
            from: self.from_fingerprint().map(str::to_string),
            to: self.to_fingerprint().to_string(),
            trigger: self.trigger.to_string(),
            action: self.action.clone(),
            at: self.at,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ({})",
            self.from_fingerprint().unwrap_or("<start>"),
            self.to_fingerprint(),
            self.trigger
        )?;
        if let Some(action) = &self.action {
            write!(f, " via {action}")?;
        }
        Ok(())
    }
}

/// Serializable form of a transition for reports.
#[derive(Clone, Debug, Serialize)]
pub struct TransitionRecord {
    pub from: Option<String>,
    pub to: String,
    pub trigger: String,
    pub action: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct PathStep {
    pub initial: Option<Arc<Observation>>,
    pub transition: Transition,
    pub result: Arc<Observation>,
}

/// Ordered steps taken during a session.
#[derive(Clone, Debug, Default)]
pub struct ExplorationPath {
    steps: Vec<PathStep>,
}

impl ExplorationPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        initial: Option<Arc<Observation>>,
        transition: Transition,
        result: Arc<Observation>,
    ) {
        self.steps.push(PathStep {
            initial,
            transition,
            result,
        });
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn last(&self) -> Option<&PathStep> {
        self.steps.last()
    }

    /// Destination fingerprint of every step, in order.
    pub fn fingerprints(&self) -> Vec<&str> {
        self.steps
            .iter()
            .map(|step| step.transition.to_fingerprint())
            .collect()
    }
}
