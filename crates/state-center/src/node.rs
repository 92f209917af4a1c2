use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use perceiver_structural::{CaptureArtifacts, Headings, Observation};
use serde::Serialize;

/// One distinct state of the explored surface, keyed by fingerprint.
///
/// Nodes are shared as `Arc<StateNode>`; the registry hands out the same
/// allocation for every observation that maps to the same fingerprint, so
/// pointer identity is meaningful.
#[derive(Debug)]
pub struct StateNode {
    fingerprint: String,
    relative_path: String,
    full_url: Option<String>,
    title: Option<String>,
    headings: Headings,
    aria_snapshot: Option<String>,
    first_seen: DateTime<Utc>,
    visits: Mutex<VisitRecord>,
}

#[derive(Debug)]
struct VisitRecord {
    count: u64,
    last_seen: DateTime<Utc>,
    artifacts: CaptureArtifacts,
}

/// Serializable copy of a node's fields.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSummary {
    pub fingerprint: String,
    pub relative_path: String,
    pub full_url: Option<String>,
    pub title: Option<String>,
    pub visit_count: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub artifacts: Option<CaptureArtifacts>,
}

impl StateNode {
    pub(crate) fn from_observation(
        observation: &Observation,
        fingerprint: String,
        artifacts: Option<CaptureArtifacts>,
        seen_at: DateTime<Utc>,
    ) -> Self {
        Self {
            fingerprint,
            relative_path: observation.relative_path(),
            full_url: observation
                .full_url
                .clone()
                .or_else(|| observation.url.clone()),
            title: observation.title.clone(),
            headings: observation.headings.clone(),
            aria_snapshot: observation.aria_snapshot.clone(),
            first_seen: seen_at,
            visits: Mutex::new(VisitRecord {
                count: 1,
                last_seen: seen_at,
                artifacts: artifacts.unwrap_or_default(),
            }),
        }
    }

    pub(crate) fn record_visit(&self, at: DateTime<Utc>, artifacts: Option<&CaptureArtifacts>) {
        let mut visits = self.visits.lock();
        visits.count = visits.count.saturating_add(1);
        visits.last_seen = at;
        if let Some(artifacts) = artifacts {
            visits.artifacts.merge(artifacts);
        }
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    pub fn full_url(&self) -> Option<&str> {
        self.full_url.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn headings(&self) -> &Headings {
        &self.headings
    }

    pub fn aria_snapshot(&self) -> Option<&str> {
        self.aria_snapshot.as_deref()
    }

    pub fn first_seen(&self) -> DateTime<Utc> {
        self.first_seen
    }

    pub fn visit_count(&self) -> u64 {
        self.visits.lock().count
    }

    pub fn last_seen(&self) -> DateTime<Utc> {
        self.visits.lock().last_seen
    }

    pub fn artifacts(&self) -> Option<CaptureArtifacts> {
        let visits = self.visits.lock();
        (!visits.artifacts.is_empty()).then(|| visits.artifacts.clone())
    }

    pub fn summary(&self) -> StateSummary {
        let visits = self.visits.lock();
        StateSummary {
            fingerprint: self.fingerprint.clone(),
            relative_path: self.relative_path.clone(),
            full_url: self.full_url.clone(),
            title: self.title.clone(),
            visit_count: visits.count,
            first_seen: self.first_seen,
            last_seen: visits.last_seen,
            artifacts: (!visits.artifacts.is_empty()).then(|| visits.artifacts.clone()),
        }
    }
}
