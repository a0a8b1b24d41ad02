//! jointly-core: reactive session layer over a robot telemetry bridge.
//!
//! Sits between the wire client ([`jointly_api`]) and consumers (the
//! CLI, dashboards). Owns the connection lifecycle, decodes telemetry
//! into a latest-value store, maintains the topic directory, runs the
//! dynamic subscription binder, and gates outbound commands.
//!
//! # Example
//!
//! ```rust,ignore
//! use jointly_core::{Session, SessionConfig};
//!
//! let config = SessionConfig::new("ws://192.168.123.4:9090".parse()?);
//! let session = Session::new(config);
//! session.open().await?;
//!
//! let mut states = session.store().subscribe_state();
//! while let Some(Some(state)) = states.changed().await {
//!     println!("tick {} battery {}%", state.tick, state.battery);
//! }
//! ```

pub mod binder;
pub mod command;
pub mod config;
pub mod directory;
pub mod error;
pub mod session;
pub mod store;
pub mod stream;

pub use binder::{BindingState, TopicBinder};
pub use command::NeckCommand;
pub use config::{
    DEFAULT_BATTERY_TOPIC, DEFAULT_COMMAND_TOPIC, FLOAT64_MULTI_ARRAY, SessionConfig,
};
pub use directory::{TopicDescriptor, TopicDirectory};
pub use error::CoreError;
pub use session::Session;
pub use store::TelemetryStore;
pub use stream::ValueStream;

// Re-export the wire-level types consumers interact with directly.
pub use jointly_api::{BatteryState, ConnectionStatus, JointReading, RobotState};
