//! Application layer for amp-bridge.
//!
//! Knows *what* to do with a panel request, and delegates *how* to the
//! infrastructure layer through two traits: [`CommandExecutor`] (running the
//! relay helper) and [`ResponsePublisher`] (broadcasting on the bus).
//!
//! # What does NOT belong here?
//!
//! - Spawning processes (that is `infrastructure::process_executor`)
//! - Bus channels and sockets (that is `infrastructure::bus` / `ws_server`)

pub mod executor;
pub mod router;
pub mod state_store;

pub use executor::{CommandExecutor, ExecError, ExecOutput};
pub use router::{RequestRouter, ResponsePublisher, RouterError};
pub use state_store::{BusyGuard, StateStore};
