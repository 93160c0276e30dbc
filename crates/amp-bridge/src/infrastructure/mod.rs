//! Infrastructure layer for amp-bridge.
//!
//! Everything that touches the outside world lives here:
//!
//! - the in-process message bus and its adapter to the router
//! - spawning the relay helper program
//! - the WebSocket gateway panels connect through
//! - reading the TOML configuration file
//!
//! # What does NOT belong here?
//!
//! - Request routing and the busy gate (that is the application layer)
//! - Message type definitions (that is the domain layer)

pub mod bus;
pub mod bus_adapter;
pub mod config_file;
pub mod process_executor;
pub mod ws_server;

pub use bus::{BusEvent, MessageBus, GENERAL_TOPIC};
pub use bus_adapter::{BusAdapter, BusPublisher};
pub use config_file::{load_file_config, ConfigError};
pub use process_executor::ProcessExecutor;
pub use ws_server::run_server;
