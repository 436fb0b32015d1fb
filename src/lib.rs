//! editor-pulse - live editor activity as decaying behavioral metrics.
//!
//! Keystrokes, cursor motion and editor switches are reduced to five
//! bounded parameters (intensity, focus, chaos, heat, cursor flow) that a
//! renderer can sample at a fixed frame rate. The parameters rise with
//! activity and decay smoothly while the user is idle.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           editor-pulse                           │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐             │
//! │  │ Host events │──▶│ Extractors  │──▶│ Aggregator  │──▶ Renderer │
//! │  │ (JSON lines)│   │ (smoothing) │   │  (decay)    │  (messages) │
//! │  └─────────────┘   └─────────────┘   └─────────────┘             │
//! │                                             ▲                    │
//! │                                      ┌─────────────┐             │
//! │                                      │ Tick (100ms)│             │
//! │                                      └─────────────┘             │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use editor_pulse::{Config, HostEvent, Session, TextChange};
//!
//! let mut session = Session::open(&Config::default()).expect("session");
//! let messages = session.subscribe().expect("subscribe");
//!
//! session
//!     .handle_event(HostEvent::TextChange {
//!         changes: vec![TextChange::new("let", 0, 10, 4)],
//!     })
//!     .expect("send");
//!
//! for message in messages.try_iter() {
//!     println!("{}", serde_json::to_string(&message).unwrap());
//! }
//! session.close();
//! ```

pub mod config;
pub mod core;
pub mod host;
pub mod publish;
pub mod relay;
pub mod session;
pub mod stats;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError};
pub use crate::core::{ActivityAggregator, ActivityVector, PresetCycler, SignalExtractors};
pub use host::{EventSource, HostEvent, RawObservation, SelectionChange, TextChange};
pub use publish::{MessageSink, Publisher, RendererMessage};
pub use relay::{relay, RelayError, RelayReport};
pub use session::{CancellationToken, Session, SessionCore, SessionError, TickTask};
pub use stats::{SessionStats, SharedStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
