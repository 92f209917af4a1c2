//! Observation identity and change detection.
//!
//! An [`Observation`] is one captured view of the explored application. Its
//! [`Observation::fingerprint`] is the identity key the state registry
//! deduplicates on, and a [`Diff`] reports what changed between two
//! observations of the same location.

pub mod differ;
pub mod errors;
pub mod events;
pub mod fingerprint;
pub mod model;
pub mod tree;

pub use differ::{AccessibilityDelta, Diff};
pub use errors::PerceiverError;
pub use fingerprint::{fingerprint, normalize_path, relative_path};
pub use model::{CaptureArtifacts, Headings, Observation};
pub use tree::{ChangeKind, DomNode, StructuralChange, StructuralDelta};
