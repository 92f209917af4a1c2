//! Session replay
//!
//! Feeds recorded observations through an [`ExplorationSession`] and reports
//! what the registry and the differ made of them.

use std::path::Path;

use perceiver_structural::Observation;
use serde::{Deserialize, Serialize};
use soulexplorer_state_center::{
    DeadLoopReport, StateSummary, TransitionRecord, TransitionTrigger,
};
use tokio::fs;

use crate::errors::{ExplorerError, ExplorerResult};
use crate::session::ExplorationSession;

#[derive(Deserialize)]
#[serde(untagged)]
enum RecordedEntry {
    Wrapped {
        observation: Observation,
        #[serde(default)]
        trigger: Option<TransitionTrigger>,
        #[serde(default)]
        action: Option<String>,
    },
    Bare(Observation),
}

/// One recorded capture.
#[derive(Clone, Debug)]
pub struct ReplayStep {
    pub observation: Observation,
    pub trigger: TransitionTrigger,
    pub action: Option<String>,
}

impl From<RecordedEntry> for ReplayStep {
    fn from(entry: RecordedEntry) -> Self {
        match entry {
            RecordedEntry::Wrapped {
                observation,
                trigger,
                action,
            } => Self {
                observation,
                trigger: trigger.unwrap_or_default(),
                action,
            },
            RecordedEntry::Bare(observation) => Self {
                observation,
                trigger: TransitionTrigger::default(),
                action: None,
            },
        }
    }
}

pub fn parse_replay(content: &str) -> ExplorerResult<Vec<ReplayStep>> {
    let entries: Vec<RecordedEntry> =
        serde_json::from_str(content).map_err(|err| ExplorerError::Replay(err.to_string()))?;
    Ok(entries.into_iter().map(ReplayStep::from).collect())
}

pub async fn load_replay(path: &Path) -> ExplorerResult<Vec<ReplayStep>> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|source| ExplorerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    parse_replay(&content)
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayStepReport {
    pub index: usize,
    pub relative_path: String,
    pub fingerprint: String,
    pub transitioned: bool,
    pub visit_count: u64,
    pub diff: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub steps: Vec<ReplayStepReport>,
    pub states: Vec<StateSummary>,
    pub transitions: Vec<TransitionRecord>,
    pub dead_loop: Option<DeadLoopReport>,
}

pub async fn replay(
    session: &ExplorationSession,
    steps: Vec<ReplayStep>,
) -> ExplorerResult<ReplayReport> {
    let mut reports = Vec::with_capacity(steps.len());
    for (index, step) in steps.into_iter().enumerate() {
        let diff = session.diff_against_previous(&step.observation).await?;
        let error = step.observation.error.clone();
        let before = session.registry().history_len();
        let node = session.observe(step.observation, step.action.as_deref(), step.trigger);
        reports.push(ReplayStepReport {
            index,
            relative_path: node.relative_path().to_string(),
            fingerprint: node.fingerprint().to_string(),
            transitioned: session.registry().history_len() > before,
            visit_count: node.visit_count(),
            diff: diff.summary(),
            error,
        });
    }

    let registry = session.registry();
    Ok(ReplayReport {
        steps: reports,
        states: registry.states().iter().map(|node| node.summary()).collect(),
        transitions: registry.history().iter().map(|t| t.record()).collect(),
        dead_loop: registry.dead_loop(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_bare_and_wrapped_entries() {
        let steps = parse_replay(
            r#"[
                {"url": "https://app.example/login", "headings": {"h1": "Sign in"}},
                {"observation": {"url": "https://app.example/home"}, "trigger": "navigation", "action": "submit"}
            ]"#,
        )
        .unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].trigger, TransitionTrigger::Capture);
        assert_eq!(steps[0].observation.fingerprint(), "login_sign_in");
        assert_eq!(steps[1].trigger, TransitionTrigger::Navigation);
        assert_eq!(steps[1].action.as_deref(), Some("submit"));
    }

    #[test]
    fn rejects_non_array_input() {
        let err = parse_replay(r#"{"url": "https://app.example"}"#).unwrap_err();
        assert!(matches!(err, ExplorerError::Replay(_)));
    }
}
