//! RequestRouter: turns panel requests into helper calls and bus responses.
//!
//! This is the heart of the bridge.  It classifies each [`ClientRequest`],
//! consults or updates the [`StateStore`], drives the [`CommandExecutor`],
//! and emits [`ServerResponse`]s through a [`ResponsePublisher`].
//!
//! # Response protocol
//!
//! ```text
//! StatusQuery ──► StatusResponse                       (inline, from cache)
//!
//! Action ──► try_acquire ──┬─ None ──► Completion{error: busy}
//!                          │
//!                          └─ guard ─► Acknowledgement  (inline)
//!                                      spawn ──► helper call
//!                                                 ├─ update cache on success
//!                                                 ├─ drop(guard)
//!                                                 └─ Completion{error|null}
//! ```
//!
//! [`RequestRouter::handle`] is synchronous: the busy check-and-set and the
//! Acknowledgement both happen before it returns, with no await in between.
//! The only suspension point is the helper call inside the spawned task,
//! which owns the [`BusyGuard`] and therefore always releases it.
//!
//! # Architecture
//!
//! The router depends only on traits (`CommandExecutor`, `ResponsePublisher`)
//! and domain types.  The bus and the helper process are injected at
//! construction time, so everything here is unit-testable.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::application::executor::{CommandExecutor, ExecError, ExecOutput};
use crate::application::state_store::{BusyGuard, StateStore};
use crate::domain::messages::{ClientRequest, ErrorInfo, ServerResponse, BROADCAST_CLIENT_ID};
use crate::domain::state::{
    parse_status_output, resolve_command, AmpCommand, Attribute, AttributeError,
};

/// Error title shown when an action is rejected because another is running.
pub const BUSY_TITLE: &str = "busy";
/// Error message shown with [`BUSY_TITLE`].
pub const BUSY_MESSAGE: &str = "Another amplifier command is still in progress";
/// Error title shown when the helper program reports a failure.
pub const EXECUTOR_FAILURE_TITLE: &str = "Error with amplifier";
/// Error message used when a failed helper printed nothing on stderr.
pub const UNKNOWN_PROBLEM: &str = "Unknown problem";

/// Default helper arguments that print the relay status.
pub const DEFAULT_STATUS_COMMAND: &str = "status short";

/// Failures the router can report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    /// A `StatusQuery` named an attribute that is not cached.
    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),

    /// An `Action` arrived while another was still running.
    #[error("another mutating command is in flight")]
    Busy,

    /// The helper program reported failure.
    #[error("helper failed: {0}")]
    ExecutorFailure(String),

    /// The request could not be decoded into a known kind.
    #[error("unrecognized request: {0}")]
    UnrecognizedRequestKind(String),

    /// An `Action` named a verb the helper does not support.
    #[error("unrecognized command: {0}")]
    UnrecognizedCommand(String),

    /// The helper's status output could not be interpreted.
    #[error("unrecognized relay status: {0:?}")]
    MalformedStatus(String),
}

impl From<AttributeError> for RouterError {
    fn from(err: AttributeError) -> Self {
        match err {
            AttributeError::UnknownAttribute(name) => RouterError::UnknownAttribute(name),
            AttributeError::UnrecognizedCommand(name) => RouterError::UnrecognizedCommand(name),
        }
    }
}

/// Outbound side of the bus, as seen by the router.
///
/// Publishing is fire-and-forget: delivery is a broadcast to every panel and
/// nothing the router does depends on who is listening.
pub trait ResponsePublisher: Send + Sync {
    fn publish(&self, response: ServerResponse);
}

/// Routes panel requests.  Cheap to clone; all state is behind `Arc`s.
#[derive(Clone)]
pub struct RequestRouter {
    store: Arc<StateStore>,
    executor: Arc<dyn CommandExecutor>,
    publisher: Arc<dyn ResponsePublisher>,
    command_timeout: Option<Duration>,
    status_command: String,
}

/// Everything the action task needs once the gate is held.
struct ActionJob {
    client_id: String,
    command: String,
    params: String,
    verb: AmpCommand,
    resolved: String,
}

impl RequestRouter {
    /// Creates a router with no helper timeout and the default status command.
    pub fn new(
        store: Arc<StateStore>,
        executor: Arc<dyn CommandExecutor>,
        publisher: Arc<dyn ResponsePublisher>,
    ) -> Self {
        Self {
            store,
            executor,
            publisher,
            command_timeout: None,
            status_command: DEFAULT_STATUS_COMMAND.to_string(),
        }
    }

    /// Bounds every helper call.  `None` waits forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Overrides the helper arguments used to read the relay status.
    pub fn with_status_command(mut self, status_command: impl Into<String>) -> Self {
        self.status_command = status_command.into();
        self
    }

    // ── Entry point ───────────────────────────────────────────────────────────

    /// Handles one decoded request.
    ///
    /// Returns the action task's handle when an `Action` was accepted, so
    /// callers can wait for its `Completion`.  Everything else is finished by
    /// the time this returns.
    ///
    /// Malformed requests (unknown attribute, unknown verb) are logged and
    /// produce no response.  Must be called from within a Tokio runtime.
    pub fn handle(&self, request: ClientRequest) -> Option<JoinHandle<()>> {
        match request {
            ClientRequest::StatusQuery {
                client_id,
                attribute,
            } => {
                if let Err(e) = self.answer_status(client_id, attribute) {
                    warn!("dropping status query: {e}");
                }
                None
            }
            ClientRequest::Action {
                client_id,
                command,
                params,
            } => match self.dispatch_action(client_id, command, params) {
                Ok(handle) => Some(handle),
                Err(RouterError::Busy) => None,
                Err(e) => {
                    warn!("dropping action: {e}");
                    None
                }
            },
        }
    }

    // ── Status queries ────────────────────────────────────────────────────────

    /// Answers a status query from the cache.
    ///
    /// # Errors
    ///
    /// [`RouterError::UnknownAttribute`]; nothing is published in that case.
    pub fn answer_status(&self, client_id: String, attribute: String) -> Result<(), RouterError> {
        let value = self.store.get(&attribute)?;
        debug!("status {attribute}={value} for {client_id}");
        self.publisher.publish(ServerResponse::StatusResponse {
            client_id,
            attribute,
            value,
        });
        Ok(())
    }

    /// Broadcasts every cached attribute to all panels.
    ///
    /// Used when the panel is activated, so it can draw the current state
    /// without asking for each attribute.
    pub fn push_status(&self) {
        let snapshot = self.store.snapshot();
        for attribute in Attribute::ALL {
            self.publisher.publish(ServerResponse::StatusResponse {
                client_id: BROADCAST_CLIENT_ID.to_string(),
                attribute: attribute.as_str().to_string(),
                value: snapshot.get(attribute),
            });
        }
    }

    // ── Actions ───────────────────────────────────────────────────────────────

    /// Claims the busy gate, acknowledges, and spawns the helper call.
    ///
    /// # Errors
    ///
    /// - [`RouterError::UnrecognizedCommand`]: nothing is published and the
    ///   gate is not touched.
    /// - [`RouterError::Busy`]: a busy `Completion` has already been
    ///   published to the originating client; no `Acknowledgement` is sent.
    pub fn dispatch_action(
        &self,
        client_id: String,
        command: String,
        params: String,
    ) -> Result<JoinHandle<()>, RouterError> {
        let verb: AmpCommand = command.parse()?;

        let Some(guard) = self.store.try_acquire() else {
            debug!("rejecting {command} {params} from {client_id}: busy");
            self.publisher.publish(ServerResponse::Completion {
                client_id,
                command,
                params,
                error: Some(ErrorInfo::new(BUSY_TITLE, BUSY_MESSAGE)),
            });
            return Err(RouterError::Busy);
        };

        let resolved = resolve_command(&command, &params);
        info!("{client_id} requested `{resolved}`");

        self.publisher.publish(ServerResponse::Acknowledgement {
            client_id: client_id.clone(),
            command: command.clone(),
            params: params.clone(),
            resolved_command: resolved.clone(),
        });

        let job = ActionJob {
            client_id,
            command,
            params,
            verb,
            resolved,
        };
        let router = self.clone();
        Ok(tokio::spawn(async move {
            router.complete_action(guard, job).await;
        }))
    }

    /// The single continuation of an accepted action.
    ///
    /// Owns `guard`, so the gate is released on every exit path.  Helper
    /// faults arrive here as an ordinary failed [`ExecOutput`] and still end
    /// in a Completion.
    async fn complete_action(&self, guard: BusyGuard, job: ActionJob) {
        let output = self.run_helper(&job.resolved).await;

        let error = match &output.result {
            Ok(()) => {
                if let Some(power) = job.verb.resulting_power(&job.params) {
                    self.store.set(Attribute::Power, power);
                    debug!("cached power={power}");
                }
                None
            }
            Err(e) => {
                let info = failure_info(e, &output.stderr);
                error!("{}: {} (`{}`: {e})", info.title, info.message, job.resolved);
                Some(info)
            }
        };

        guard.release();

        self.publisher.publish(ServerResponse::Completion {
            client_id: job.client_id,
            command: job.command,
            params: job.params,
            error,
        });
    }

    // ── Startup seeding ───────────────────────────────────────────────────────

    /// Re-reads the relay status from the helper and updates the cache.
    ///
    /// A status read does not mutate the relays, so it never takes the busy
    /// gate and never causes an action to be turned away.  Run it before
    /// requests are routed (see `main.rs`).  On success the new state is
    /// pushed to all panels.
    ///
    /// # Errors
    ///
    /// - [`RouterError::ExecutorFailure`] if the helper failed.
    /// - [`RouterError::MalformedStatus`] if its output was not understood.
    ///
    /// The cache is left untouched in every error case.
    pub async fn refresh_from_hardware(&self) -> Result<bool, RouterError> {
        let output = self.run_helper(&self.status_command).await;

        if let Err(e) = &output.result {
            let info = failure_info(e, &output.stderr);
            return Err(RouterError::ExecutorFailure(info.message));
        }

        let power = parse_status_output(&output.stdout)
            .ok_or_else(|| RouterError::MalformedStatus(output.stdout.clone()))?;
        self.store.set(Attribute::Power, power);
        info!("relay status read from hardware: power={power}");
        self.push_status();
        Ok(power)
    }

    /// Runs one helper call, bounded by the timeout.
    ///
    /// A panic raised while polling the call is caught here and reported as
    /// [`ExecError::Fault`], so the caller always gets an [`ExecOutput`].
    async fn run_helper(&self, command_line: &str) -> ExecOutput {
        let call = async {
            let call = self.executor.execute(command_line);
            match self.command_timeout {
                Some(limit) => match tokio::time::timeout(limit, call).await {
                    Ok(output) => output,
                    Err(_) => ExecOutput::failure(ExecError::Timeout(limit), ""),
                },
                None => call.await,
            }
        };
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(output) => output,
            Err(payload) => {
                ExecOutput::failure(ExecError::Fault(panic_reason(payload.as_ref())), "")
            }
        }
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic".to_string())
}

/// Builds the user-facing error for a failed helper call.
///
/// Prefers whatever the helper printed on stderr; a timeout or fault
/// describes itself; anything else is an unknown problem.
fn failure_info(error: &ExecError, stderr: &str) -> ErrorInfo {
    let stderr = stderr.trim();
    let message = if !stderr.is_empty() {
        stderr.to_string()
    } else if matches!(error, ExecError::Timeout(_) | ExecError::Fault(_)) {
        error.to_string()
    } else {
        UNKNOWN_PROBLEM.to_string()
    };
    ErrorInfo::new(EXECUTOR_FAILURE_TITLE, message)
}
