//! JSON message types exchanged over the message bus.
//!
//! The control panel and the bridge talk through a publish/subscribe bus.
//! Requests travel on the extension's own topic; lifecycle notifications
//! travel on the shared `general` topic.  Every response is broadcast to all
//! connected panels, and each panel keeps only the ones carrying its own
//! `clientId`.
//!
//! # Message flow
//!
//! ```text
//! Panel  → Bridge:  {"kind":"StatusQuery"|"Action", ...}      →  ClientRequest
//! Panel  → Bridge:  {"header":"activatedExtension", ...}      →  LifecycleEvent
//! Bridge → Panels:  ServerResponse  →  {"kind":"StatusResponse"|"Acknowledgement"|"Completion", ...}
//! ```
//!
//! # JSON discriminant
//!
//! Requests and responses are JSON objects with a `"kind"` field naming the
//! variant; the remaining fields sit in the same object:
//!
//! ```json
//! {"kind":"Action","clientId":"c1","command":"power","params":"on"}
//! ```
//!
//! Serde's `#[serde(tag = "kind")]` handles this automatically.  Field names
//! are camelCase on the wire because the panel is written in JavaScript.

use serde::{Deserialize, Serialize};

/// Client id used for pushes that are not addressed to any particular panel.
///
/// Sent when the extension is activated and the bridge pushes its cached
/// state to every panel at once.
pub const BROADCAST_CLIENT_ID: &str = "*";

// ── Panel → Bridge messages ───────────────────────────────────────────────────

/// All requests a control panel can send to the bridge.
///
/// # Serde representation
///
/// ```json
/// {"kind":"StatusQuery","clientId":"c1","attribute":"power"}
/// {"kind":"Action","clientId":"c1","command":"volume","params":"up 2"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ClientRequest {
    /// Read one cached hardware attribute.  Never touches the hardware.
    StatusQuery {
        /// Opaque id generated by the panel, unique per browser session.
        #[serde(rename = "clientId")]
        client_id: String,
        /// Name of the cached attribute, e.g. `"power"`.
        attribute: String,
    },

    /// Run a state-changing helper command.
    Action {
        #[serde(rename = "clientId")]
        client_id: String,
        /// Helper verb: `"power"`, `"volume"` or `"reset"`.
        command: String,
        /// Free-form argument string appended to the verb, e.g. `"on"` or
        /// `"down 3"`.  Absent means no arguments.
        #[serde(default)]
        params: String,
    },
}

impl ClientRequest {
    /// Returns the originating panel's client id.
    pub fn client_id(&self) -> &str {
        match self {
            ClientRequest::StatusQuery { client_id, .. } | ClientRequest::Action { client_id, .. } => {
                client_id
            }
        }
    }

    /// Short variant name for log lines.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ClientRequest::StatusQuery { .. } => "StatusQuery",
            ClientRequest::Action { .. } => "Action",
        }
    }
}

/// Notifications on the shared `general` topic.
///
/// Only extension activation matters to the bridge; every other header is
/// decoded as [`LifecycleEvent::Other`] and ignored.
///
/// ```json
/// {"header":"activatedExtension","extension":"akai_amp"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "header")]
pub enum LifecycleEvent {
    /// The UI switched to an extension's panel.
    #[serde(rename = "activatedExtension")]
    ActivatedExtension {
        /// Name of the extension that became active.
        extension: String,
    },

    /// Any other lifecycle header.
    #[serde(other)]
    Other,
}

// ── Bridge → Panel messages ───────────────────────────────────────────────────

/// Error details attached to a failed [`ServerResponse::Completion`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Short heading the panel shows in its error banner.
    pub title: String,
    /// Longer description, usually the helper's stderr.
    pub message: String,
}

impl ErrorInfo {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}

/// All messages the bridge broadcasts back to the panels.
///
/// Every variant echoes the fields that identify the originating request so
/// a panel can correlate responses with what it sent.
///
/// # Serde representation
///
/// ```json
/// {"kind":"StatusResponse","clientId":"c1","attribute":"power","value":true}
/// {"kind":"Acknowledgement","clientId":"c1","command":"power","params":"on","resolvedCommand":"power on"}
/// {"kind":"Completion","clientId":"c1","command":"power","params":"on","error":null}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ServerResponse {
    /// Answer to a `StatusQuery`, served from the cache.
    StatusResponse {
        #[serde(rename = "clientId")]
        client_id: String,
        attribute: String,
        value: bool,
    },

    /// The action was accepted and is about to be sent to the hardware.
    ///
    /// Always precedes the matching `Completion`.
    Acknowledgement {
        #[serde(rename = "clientId")]
        client_id: String,
        command: String,
        params: String,
        /// The exact command line handed to the helper program.
        #[serde(rename = "resolvedCommand")]
        resolved_command: String,
    },

    /// The action finished, or was rejected because another one is running.
    Completion {
        #[serde(rename = "clientId")]
        client_id: String,
        command: String,
        params: String,
        /// `null` on success.
        #[serde(default)]
        error: Option<ErrorInfo>,
    },
}

impl ServerResponse {
    /// Returns the client id this response is addressed to.
    pub fn client_id(&self) -> &str {
        match self {
            ServerResponse::StatusResponse { client_id, .. }
            | ServerResponse::Acknowledgement { client_id, .. }
            | ServerResponse::Completion { client_id, .. } => client_id,
        }
    }

    /// `true` for a `Completion` that carries an error.
    pub fn is_error(&self) -> bool {
        matches!(self, ServerResponse::Completion { error: Some(_), .. })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
