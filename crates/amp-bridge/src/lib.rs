//! amp-bridge library crate.
//!
//! Serialises commands to a relay-controlled amplifier and keeps every
//! connected control panel in sync with the amplifier's last known state.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Browser panels (JSON over WebSocket)
//!         ↕
//! [amp-bridge]
//!   ├── domain/             Pure types: wire messages, HardwareState, BridgeConfig
//!   ├── application/        StateStore (cache + busy gate), RequestRouter
//!   └── infrastructure/
//!         ├── ws_server/        WebSocket gateway (tokio-tungstenite)
//!         ├── bus/              In-process topic bus (tokio broadcast)
//!         ├── bus_adapter/      Bus ↔ router boundary
//!         ├── process_executor/ Runs the relay helper program
//!         └── config_file/      Optional TOML configuration
//!         ↕
//! Relay helper program (one invocation per command)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and reaches the outside world only
//!   through the `CommandExecutor` and `ResponsePublisher` traits.
//! - `infrastructure` implements those traits with `tokio` and `tungstenite`.
//!
//! # For beginners: how one action flows
//!
//! A panel sends `{"kind":"Action","command":"power","params":"on",...}`.  The
//! router claims the busy gate, answers at once with an `Acknowledgement`,
//! runs the helper in a background task, updates the cache on success, frees
//! the gate and finally broadcasts a `Completion`.  A second action arriving
//! in the meantime is turned away with a busy `Completion`.

/// Domain layer: pure types (no I/O).
pub mod domain;

/// Application layer: state cache, busy gate and request routing.
pub mod application;

/// Infrastructure layer: bus, gateway, helper process and config file.
pub mod infrastructure;
