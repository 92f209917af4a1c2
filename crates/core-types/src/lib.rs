use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Shared error type for the exploration core crates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SoulError {
    #[error("{message}")]
    Message { message: String },
}

impl SoulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Message { message } => message,
        }
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
        #[derive(Clone, Debug, Eq, PartialEq, Hash)]
        pub struct $name(pub String);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// One exploration session; registries and coordinators are scoped to it.
    SessionId
);
string_id!(
    /// The agent driving a session.
    AgentId
);
string_id!(
    /// A single scheduler run.
    RunId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_displayable() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a, b);
        assert_eq!(a.to_string(), a.0);

        let agent = AgentId::from("explorer");
        assert_eq!(agent.as_str(), "explorer");
    }

    #[test]
    fn soul_error_exposes_message() {
        let err = SoulError::new("listener failed");
        assert_eq!(err.to_string(), "listener failed");
        assert_eq!(err.message(), "listener failed");
    }
}
