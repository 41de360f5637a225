//! Meshstate: state transitions and state bindings for mesh server models
//!
//! Meshstate turns state-change requests for generic server models (OnOff,
//! Level, Power OnOff, Default Transition Time, Light Lightness) into timed
//! changes of present state. It honours delays and transition times, filters
//! repeated transactions, publishes status, persists settled values and lets
//! a change in one model drive a bound state in another.
//!
//! # Core Concepts
//!
//! - **Descriptor**: per-instance record of present and target state and the
//!   progress of the running change
//! - **Transition controller**: the Idle/Delayed/Transitioning state machine
//!   driven by one timer per instance
//! - **Bindings**: resolvers that map a state change onto another element
//! - **Front-ends**: request validation, transaction filtering and replies
//!
//! The engine is single-threaded and cooperative: every inbound message and
//! every expired timer is processed to completion before the next one.
//!
//! # Example
//!
//! ```rust
//! use meshstate::core::{ModelKind, OnOff, OnPowerUp};
//! use meshstate::engine::{ElementBuilder, Engine};
//! use meshstate::models::{MessageContext, MessageOutcome, ModelMessage};
//!
//! let mut engine = Engine::builder()
//!     .element(ElementBuilder::new().model(ModelKind::GenPowerOnOff))
//!     .element(ElementBuilder::new().model(ModelKind::GenOnOff))
//!     .build()
//!     .unwrap();
//! engine.bind_onoff_to_on_power_up(0, 1);
//!
//! let outcome = engine.handle_message(
//!     MessageContext::new(0, 0x1201),
//!     ModelMessage::Set {
//!         model: ModelKind::GenPowerOnOff,
//!         params: vec![u8::from(OnPowerUp::Default)],
//!         ack: false,
//!     },
//! );
//! assert_eq!(outcome, MessageOutcome::Accepted);
//!
//! engine.power_up();
//! assert_eq!(engine.onoff(1), Some(OnOff::On));
//! ```

pub mod bindings;
pub mod config;
pub mod core;
pub mod dedup;
pub mod descriptor;
pub mod engine;
pub mod events;
pub mod models;
pub mod snapshot;
pub mod status;
pub mod timer;
pub mod timing;
pub mod transport;
mod transition;

// Re-export commonly used types
pub use bindings::{BindingTable, Registration, Resolver, MAX_BINDINGS};
pub use config::{ConfigError, EngineConfig};
pub use core::{ElementId, ModelKind, StateValue, UpdateSource};
pub use engine::{BuildError, ElementBuilder, Engine, EngineBuilder};
pub use events::{EventStatus, ModelEvent};
pub use snapshot::{DescriptorSnapshot, SnapshotError};
pub use timing::TransitionTime;
