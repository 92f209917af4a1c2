//! Errors surfaced by an exploration session.

use std::path::PathBuf;

use perceiver_structural::PerceiverError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExplorerError {
    /// The explorer keeps cycling through the same few states. Callers are
    /// expected to change strategy rather than retry.
    #[error("dead loop: last {window} transitions only visited [{}]", .fingerprints.join(", "))]
    DeadLoop {
        window: usize,
        fingerprints: Vec<String>,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid replay file: {0}")]
    Replay(String),

    #[error(transparent)]
    Diff(#[from] PerceiverError),
}

impl ExplorerError {
    pub fn is_dead_loop(&self) -> bool {
        matches!(self, ExplorerError::DeadLoop { .. })
    }
}

pub type ExplorerResult<T> = Result<T, ExplorerError>;
