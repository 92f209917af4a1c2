use std::error::Error;
use std::fmt;

use soulexplorer_core_types::SoulError;

/// Terminal failure of an iteration loop.
#[derive(Debug)]
pub enum LoopError<E> {
    /// The handler returned an error that no policy absorbed.
    Handler { iteration: u32, source: E },
    /// The handler task panicked.
    Panicked { iteration: u32, message: String },
}

impl<E> LoopError<E> {
    pub fn iteration(&self) -> u32 {
        match self {
            LoopError::Handler { iteration, .. } | LoopError::Panicked { iteration, .. } => {
                *iteration
            }
        }
    }
}

impl<E: fmt::Display> fmt::Display for LoopError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopError::Handler { iteration, source } => {
                write!(f, "iteration {iteration} failed: {source}")
            }
            LoopError::Panicked { iteration, message } => {
                write!(f, "iteration {iteration} panicked: {message}")
            }
        }
    }
}

impl<E> Error for LoopError<E>
where
    E: Error + 'static,
{
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LoopError::Handler { source, .. } => Some(source),
            LoopError::Panicked { .. } => None,
        }
    }
}

impl<E: fmt::Display> From<LoopError<E>> for SoulError {
    fn from(value: LoopError<E>) -> Self {
        SoulError::new(format!("scheduler error: {value}"))
    }
}
