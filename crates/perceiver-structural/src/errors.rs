use thiserror::Error;

#[derive(Debug, Error)]
pub enum PerceiverError {
    #[error("diff calculation aborted: {0}")]
    Aborted(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl PerceiverError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
