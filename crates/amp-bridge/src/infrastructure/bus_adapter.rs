//! BusAdapter: the boundary between the message bus and the router.
//!
//! Inbound, it listens to two topics:
//!
//! - the extension's own topic, where panels send [`ClientRequest`]s;
//! - [`GENERAL_TOPIC`], where the UI announces which extension was opened.
//!
//! Outbound, [`BusPublisher`] serialises every [`ServerResponse`] onto the
//! extension's topic.  Delivery is a broadcast; filtering by client id is
//! left to the panels.
//!
//! Payloads that do not decode into a known request kind are logged and
//! dropped.  The panel gets no reply for them.

use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::application::router::{RequestRouter, ResponsePublisher, RouterError};
use crate::domain::messages::{ClientRequest, LifecycleEvent, ServerResponse};
use crate::infrastructure::bus::{BusEvent, MessageBus, GENERAL_TOPIC};

// ── Outbound ──────────────────────────────────────────────────────────────────

/// [`ResponsePublisher`] that broadcasts on the bus.
#[derive(Debug, Clone)]
pub struct BusPublisher {
    bus: MessageBus,
    topic: String,
}

impl BusPublisher {
    pub fn new(bus: MessageBus, topic: impl Into<String>) -> Self {
        Self {
            bus,
            topic: topic.into(),
        }
    }
}

impl ResponsePublisher for BusPublisher {
    fn publish(&self, response: ServerResponse) {
        match serde_json::to_value(&response) {
            Ok(payload) => {
                let receivers = self.bus.send_to_ui(&self.topic, payload);
                trace!("response for {} delivered to {receivers} panel(s)", response.client_id());
            }
            Err(e) => error!("failed to serialise response: {e}"),
        }
    }
}

// ── Inbound ───────────────────────────────────────────────────────────────────

/// Decodes a request payload.
///
/// # Errors
///
/// [`RouterError::UnrecognizedRequestKind`] when the payload is not a
/// well-formed `StatusQuery` or `Action`.
pub fn decode_request(payload: Value) -> Result<ClientRequest, RouterError> {
    serde_json::from_value(payload).map_err(|e| RouterError::UnrecognizedRequestKind(e.to_string()))
}

/// Feeds bus events into a [`RequestRouter`].
#[derive(Clone)]
pub struct BusAdapter {
    extension: String,
    router: RequestRouter,
}

impl BusAdapter {
    pub fn new(extension: impl Into<String>, router: RequestRouter) -> Self {
        Self {
            extension: extension.into(),
            router,
        }
    }

    /// Routes one inbound event.
    ///
    /// Synchronous, so a request is fully classified (and an action's busy
    /// gate claimed) before the next event is looked at.  Returns the action
    /// task handle when an action was accepted.
    pub fn dispatch(&self, event: BusEvent) -> Option<JoinHandle<()>> {
        if event.topic == self.extension {
            match decode_request(event.payload) {
                Ok(request) => {
                    debug!("{} from {}", request.kind_name(), request.client_id());
                    self.router.handle(request)
                }
                Err(e) => {
                    warn!("{}: dropping request: {e}", self.extension);
                    None
                }
            }
        } else if event.topic == GENERAL_TOPIC {
            self.on_lifecycle(event.payload);
            None
        } else {
            trace!("ignoring event on topic {}", event.topic);
            None
        }
    }

    fn on_lifecycle(&self, payload: Value) {
        match serde_json::from_value::<LifecycleEvent>(payload) {
            Ok(LifecycleEvent::ActivatedExtension { extension }) if extension == self.extension => {
                debug!("{} activated; pushing cached state", self.extension);
                self.router.push_status();
            }
            Ok(_) => {}
            Err(e) => trace!("ignoring undecodable lifecycle event: {e}"),
        }
    }

    /// Consumes inbound events until the bus is closed.
    ///
    /// Subscribe *before* spawning this, so no event published in between is
    /// missed.
    pub async fn run(self, mut inbound: broadcast::Receiver<BusEvent>) {
        info!("listening on topics `{}` and `{GENERAL_TOPIC}`", self.extension);
        loop {
            match inbound.recv().await {
                Ok(event) => {
                    self.dispatch(event);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("bus adapter fell behind; {skipped} inbound event(s) lost");
                }
                Err(RecvError::Closed) => {
                    debug!("inbound bus closed");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::executor::{CommandExecutor, ExecOutput};
    use crate::application::state_store::StateStore;
    use crate::domain::state::Attribute;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::broadcast::error::TryRecvError;

    struct OkExecutor;

    #[async_trait]
    impl CommandExecutor for OkExecutor {
        async fn execute(&self, _command_line: &str) -> ExecOutput {
            ExecOutput::success("")
        }
    }

    fn make_adapter(bus: &MessageBus) -> (BusAdapter, Arc<StateStore>) {
        let store = Arc::new(StateStore::new());
        let publisher = Arc::new(BusPublisher::new(bus.clone(), "akai_amp"));
        let router = RequestRouter::new(Arc::clone(&store), Arc::new(OkExecutor), publisher);
        (BusAdapter::new("akai_amp", router), store)
    }

    #[test]
    fn test_decode_request_rejects_unknown_kind() {
        let result = decode_request(json!({"kind": "Dance", "clientId": "c1"}));
        assert!(matches!(result, Err(RouterError::UnrecognizedRequestKind(_))));
    }

    #[tokio::test]
    async fn test_status_query_on_extension_topic_is_answered_on_same_topic() {
        // Arrange
        let bus = MessageBus::default();
        let mut ui = bus.subscribe_ui();
        let (adapter, store) = make_adapter(&bus);
        store.set(Attribute::Power, true);

        // Act
        adapter.dispatch(BusEvent::new(
            "akai_amp",
            json!({"kind": "StatusQuery", "clientId": "c1", "attribute": "power"}),
        ));

        // Assert
        let event = ui.try_recv().unwrap();
        assert_eq!(event.topic, "akai_amp");
        assert_eq!(
            event.payload,
            json!({"kind": "StatusResponse", "clientId": "c1", "attribute": "power", "value": true})
        );
    }

    #[tokio::test]
    async fn test_action_produces_ack_then_completion() {
        let bus = MessageBus::default();
        let mut ui = bus.subscribe_ui();
        let (adapter, _) = make_adapter(&bus);

        let handle = adapter
            .dispatch(BusEvent::new(
                "akai_amp",
                json!({"kind": "Action", "clientId": "c1", "command": "power", "params": "on"}),
            ))
            .expect("action accepted");
        handle.await.unwrap();

        assert_eq!(ui.try_recv().unwrap().payload["kind"], "Acknowledgement");
        let completion = ui.try_recv().unwrap().payload;
        assert_eq!(completion["kind"], "Completion");
        assert!(completion["error"].is_null());
    }

    #[tokio::test]
    async fn test_malformed_request_gets_no_reply() {
        let bus = MessageBus::default();
        let mut ui = bus.subscribe_ui();
        let (adapter, _) = make_adapter(&bus);

        assert!(adapter
            .dispatch(BusEvent::new("akai_amp", json!({"header": "power", "content": {"on": "on"}})))
            .is_none());

        assert!(matches!(ui.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_activation_of_this_extension_pushes_cached_state() {
        let bus = MessageBus::default();
        let mut ui = bus.subscribe_ui();
        let (adapter, _) = make_adapter(&bus);

        adapter.dispatch(BusEvent::new(
            GENERAL_TOPIC,
            json!({"header": "activatedExtension", "extension": "akai_amp"}),
        ));

        let event = ui.try_recv().unwrap();
        assert_eq!(event.payload["kind"], "StatusResponse");
        assert_eq!(event.payload["clientId"], "*");
        assert_eq!(event.payload["attribute"], "power");
    }

    #[tokio::test]
    async fn test_activation_of_other_extension_is_ignored() {
        let bus = MessageBus::default();
        let mut ui = bus.subscribe_ui();
        let (adapter, _) = make_adapter(&bus);

        adapter.dispatch(BusEvent::new(
            GENERAL_TOPIC,
            json!({"header": "activatedExtension", "extension": "equaliser"}),
        ));
        adapter.dispatch(BusEvent::new(GENERAL_TOPIC, json!({"header": "languageChanged"})));

        assert!(matches!(ui.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_other_topics_are_ignored() {
        let bus = MessageBus::default();
        let mut ui = bus.subscribe_ui();
        let (adapter, _) = make_adapter(&bus);

        adapter.dispatch(BusEvent::new(
            "equaliser",
            json!({"kind": "StatusQuery", "clientId": "c1", "attribute": "power"}),
        ));

        assert!(matches!(ui.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_run_loop_answers_published_requests() {
        // Arrange
        let bus = MessageBus::default();
        let mut ui = bus.subscribe_ui();
        let (adapter, _) = make_adapter(&bus);
        let task = tokio::spawn(adapter.run(bus.subscribe_inbound()));

        // Act
        bus.publish_inbound(
            "akai_amp",
            json!({"kind": "StatusQuery", "clientId": "c9", "attribute": "power"}),
        );

        // Assert
        let event = tokio_test::assert_ok!(
            tokio::time::timeout(std::time::Duration::from_secs(1), ui.recv()).await
        );
        assert_eq!(event.unwrap().payload["clientId"], "c9");
        task.abort();
    }
}
