use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use similar::{ChangeTag, TextDiff};

use crate::errors::PerceiverError;
use crate::events;
use crate::model::Observation;
use crate::tree::{self, StructuralChange, StructuralDelta};

/// Line-level change in the accessibility summary.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AccessibilityDelta {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl AccessibilityDelta {
    pub fn between(before: &str, after: &str) -> Self {
        let mut delta = Self::default();
        let diff = TextDiff::from_lines(before, after);
        for change in diff.iter_all_changes() {
            let line = change.value().trim();
            if line.is_empty() {
                continue;
            }
            match change.tag() {
                ChangeTag::Insert => delta.added.push(line.to_string()),
                ChangeTag::Delete => delta.removed.push(line.to_string()),
                ChangeTag::Equal => {}
            }
        }
        delta
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Changes between two observations.
///
/// Nothing is compared until [`Diff::calculate`] runs, and observations of
/// different locations are never compared: their deltas stay empty.
#[derive(Clone, Debug)]
pub struct Diff {
    current: Arc<Observation>,
    previous: Option<Arc<Observation>>,
    structural: StructuralDelta,
    accessibility: AccessibilityDelta,
    calculated: bool,
}

struct Comparison {
    structural: StructuralDelta,
    accessibility: AccessibilityDelta,
}

impl Diff {
    pub fn new(
        current: impl Into<Arc<Observation>>,
        previous: Option<impl Into<Arc<Observation>>>,
    ) -> Self {
        Self {
            current: current.into(),
            previous: previous.map(Into::into),
            structural: StructuralDelta::default(),
            accessibility: AccessibilityDelta::default(),
            calculated: false,
        }
    }

    pub fn current(&self) -> &Observation {
        &self.current
    }

    pub fn previous(&self) -> Option<&Observation> {
        self.previous.as_deref()
    }

    pub fn is_same_location(&self) -> bool {
        self.previous
            .as_ref()
            .map(|prev| prev.relative_path() == self.current.relative_path())
            .unwrap_or(false)
    }

    pub fn location_changed(&self) -> bool {
        !self.is_same_location()
    }

    pub fn is_calculated(&self) -> bool {
        self.calculated
    }

    /// Run the comparison. Parsing happens on the blocking pool; calling this
    /// again after success is a no-op.
    pub async fn calculate(&mut self) -> Result<(), PerceiverError> {
        if self.calculated {
            return Ok(());
        }
        let Some(previous) = self.previous.clone() else {
            self.calculated = true;
            return Ok(());
        };
        if !self.is_same_location() {
            events::emit_diff_suppressed(&previous.relative_path(), &self.current.relative_path());
            self.calculated = true;
            return Ok(());
        }

        let current = Arc::clone(&self.current);
        let started = Instant::now();
        let comparison = tokio::task::spawn_blocking(move || compare(&previous, &current))
            .await
            .map_err(|err| {
                if err.is_cancelled() {
                    PerceiverError::Aborted(err.to_string())
                } else {
                    PerceiverError::internal(err.to_string())
                }
            })?;

        self.structural = comparison.structural;
        self.accessibility = comparison.accessibility;
        self.calculated = true;
        events::emit_diff(
            &self.current.relative_path(),
            self.structural.total(),
            self.accessibility_changed(),
            started.elapsed(),
        );
        Ok(())
    }

    pub fn structural_changes(&self) -> &[StructuralChange] {
        &self.structural.changes
    }

    pub fn structural_delta(&self) -> &StructuralDelta {
        &self.structural
    }

    /// The smallest HTML region of the current page that holds every change.
    pub fn structural_subtree(&self) -> Option<&str> {
        self.structural.subtree.as_deref()
    }

    pub fn accessibility_delta(&self) -> &AccessibilityDelta {
        &self.accessibility
    }

    pub fn accessibility_changed(&self) -> bool {
        !self.accessibility.is_empty()
    }

    pub fn has_changes(&self) -> bool {
        if self.previous.is_none() {
            return false;
        }
        !self.structural.is_empty() || !self.accessibility.is_empty()
    }

    pub fn summary(&self) -> String {
        let Some(previous) = self.previous.as_ref() else {
            return "first observation".to_string();
        };
        if self.location_changed() {
            return format!(
                "location changed: {} -> {}",
                previous.relative_path(),
                self.current.relative_path()
            );
        }
        if !self.calculated {
            return "not calculated".to_string();
        }
        if !self.has_changes() {
            return "no changes".to_string();
        }
        format!(
            "{} structural change(s), accessibility +{}/-{}",
            self.structural.total(),
            self.accessibility.added.len(),
            self.accessibility.removed.len()
        )
    }
}

fn compare(previous: &Observation, current: &Observation) -> Comparison {
    let structural = match (previous.html.as_deref(), current.html.as_deref()) {
        (Some(before), Some(after)) => tree::diff_html(before, after),
        _ => StructuralDelta::default(),
    };
    let accessibility = match (
        previous.aria_snapshot.as_deref(),
        current.aria_snapshot.as_deref(),
    ) {
        (Some(before), Some(after)) => AccessibilityDelta::between(before, after),
        _ => AccessibilityDelta::default(),
    };
    Comparison {
        structural,
        accessibility,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARIA: &str = "- heading \"Inbox\"\n- button \"Compose\"\n- link \"Sent\"\n";

    fn inbox(html: &str, aria: &str) -> Observation {
        Observation::new("https://mail.example/inbox")
            .with_h1("Inbox")
            .with_html(html)
            .with_aria_snapshot(aria)
    }

    #[tokio::test]
    async fn cross_location_diff_is_suppressed() {
        let previous = inbox("<main><p>one</p></main>", ARIA);
        let current = Observation::new("https://mail.example/sent")
            .with_html("<main><p>two</p></main>")
            .with_aria_snapshot("- button \"Archive\"");
        let mut diff = Diff::new(current, Some(previous));
        assert!(diff.location_changed());
        diff.calculate().await.unwrap();
        assert!(diff.structural_changes().is_empty());
        assert!(diff.structural_subtree().is_none());
        assert!(diff.accessibility_delta().is_empty());
        assert!(!diff.accessibility_changed());
        assert!(!diff.has_changes());
        assert!(diff.summary().starts_with("location changed"));
    }

    #[tokio::test]
    async fn identical_observations_have_no_changes() {
        let html = "<main><p>same</p></main>";
        let mut diff = Diff::new(inbox(html, ARIA), Some(inbox(html, ARIA)));
        assert!(diff.is_same_location());
        diff.calculate().await.unwrap();
        assert!(!diff.has_changes());
        assert_eq!(diff.summary(), "no changes");
    }

    #[tokio::test]
    async fn accessibility_change_is_detected() {
        let html = "<main><p>same</p></main>";
        let changed_aria = ARIA.replace("- link \"Sent\"", "- link \"Sent\"\n- link \"Drafts\"");
        let mut diff = Diff::new(inbox(html, &changed_aria), Some(inbox(html, ARIA)));
        diff.calculate().await.unwrap();
        assert!(diff.has_changes());
        assert!(diff.accessibility_changed());
        assert_eq!(diff.accessibility_delta().added, vec!["- link \"Drafts\"".to_string()]);
        assert!(diff.accessibility_delta().removed.is_empty());
        assert!(diff.structural_changes().is_empty());
    }

    #[tokio::test]
    async fn structural_change_yields_subtree() {
        let before = "<main><ul><li>a</li></ul><footer>f</footer></main>";
        let after = "<main><ul><li>a</li><li>b</li></ul><footer>f</footer></main>";
        let mut diff = Diff::new(inbox(after, ARIA), Some(inbox(before, ARIA)));
        diff.calculate().await.unwrap();
        assert!(diff.has_changes());
        assert_eq!(diff.structural_changes().len(), 1);
        assert_eq!(diff.structural_subtree(), Some("<li>b</li>"));
        assert!(!diff.accessibility_changed());
    }

    #[tokio::test]
    async fn first_observation_is_not_a_change() {
        let mut diff = Diff::new(inbox("<p>x</p>", ARIA), None::<Observation>);
        assert!(!diff.is_same_location());
        diff.calculate().await.unwrap();
        assert!(diff.is_calculated());
        assert!(!diff.has_changes());
        assert_eq!(diff.summary(), "first observation");
    }

    #[test]
    fn accessibility_delta_tracks_removals() {
        let delta = AccessibilityDelta::between(ARIA, "- heading \"Inbox\"\n");
        assert_eq!(delta.removed.len(), 2);
        assert!(delta.added.is_empty());
    }
}
