//! Host editor interface.
//!
//! The host editor pushes its notifications as [`HostEvent`]s. In sidecar
//! mode they arrive as JSON lines and are parsed by an [`EventSource`].

pub mod source;
pub mod types;

// Re-export commonly used types
pub use source::{EventSource, SourceError, DEFAULT_SOURCE_CAPACITY};
pub use types::{HostEvent, RawObservation, SelectionChange, TextChange};
