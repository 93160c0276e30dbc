//! Domain layer for amp-bridge.
//!
//! Pure types with no I/O, no async runtime, and no process handling:
//!
//! - Bus message types (the JSON "language" between panel and bridge)
//! - Hardware attributes, helper command verbs, and the cached state
//! - Configuration structures

pub mod config;
pub mod messages;
pub mod state;

pub use config::{BridgeConfig, FileConfig};
pub use messages::{ClientRequest, ErrorInfo, LifecycleEvent, ServerResponse, BROADCAST_CLIENT_ID};
pub use state::{AmpCommand, Attribute, AttributeError, HardwareState};
