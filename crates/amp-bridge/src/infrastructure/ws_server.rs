//! WebSocket gateway: connects browser panels to the message bus.
//!
//! Each WebSocket text frame is one bus event, with the topic carried in a
//! `target` field next to the payload's own fields:
//!
//! ```json
//! {"target": "akai_amp", "kind": "Action", "clientId": "c1", "command": "power", "params": "on"}
//! ```
//!
//! Frames from a panel are published on the inbound direction.  Every
//! outbound bus event is written to every connected panel in the same shape.
//!
//! # Sessions
//!
//! Each panel runs in its own Tokio task with two forwarders:
//!
//! - **Panel → Bus**: decodes frames and calls `publish_inbound`.
//! - **Bus → Panel**: drains an outbound subscription into the socket.
//!
//! The session ends as soon as either forwarder stops; the other one is
//! aborted so its bus subscription goes away with the panel.  The accept
//! loop polls the shared `running` flag every 200 ms so Ctrl+C stops new
//! sessions.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_async,
    tungstenite::{Error as WsError, Message as WsMessage},
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::infrastructure::bus::{BusEvent, MessageBus};

const ACCEPT_POLL: Duration = Duration::from_millis(200);

// ── Frame format ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct InboundFrame {
    target: String,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

/// Parses a panel frame into a bus event.
pub(crate) fn decode_frame(text: &str) -> Result<BusEvent, serde_json::Error> {
    let frame: InboundFrame = serde_json::from_str(text)?;
    Ok(BusEvent::new(frame.target, Value::Object(frame.fields)))
}

/// Renders a bus event as a panel frame.
///
/// Object payloads are flattened next to `target`; anything else is placed
/// under `content`.
pub(crate) fn encode_frame(event: &BusEvent) -> String {
    let mut frame = Map::new();
    frame.insert("target".to_string(), Value::String(event.topic.clone()));
    match &event.payload {
        Value::Object(fields) => {
            for (key, value) in fields {
                if key != "target" {
                    frame.insert(key.clone(), value.clone());
                }
            }
        }
        other => {
            frame.insert("content".to_string(), other.clone());
        }
    }
    Value::Object(frame).to_string()
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `bind_addr` and serves panels until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn run_server(
    bind_addr: SocketAddr,
    bus: MessageBus,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind WebSocket listener on {bind_addr}"))?;

    info!("WebSocket gateway listening on {bind_addr}");
    serve(listener, bus, running).await
}

/// Accept loop over an already-bound listener.
///
/// Split out from [`run_server`] so tests can bind port 0 and read back the
/// real address first.
pub async fn serve(
    listener: TcpListener,
    bus: MessageBus,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                debug!("new panel connection from {peer_addr}");
                let bus = bus.clone();
                tokio::spawn(async move {
                    handle_panel_session(stream, peer_addr, bus).await;
                });
            }
            Ok(Err(e)) => error!("accept error: {e}"),
            Err(_) => {}
        }
    }

    Ok(())
}

// ── Per-session handler ───────────────────────────────────────────────────────

async fn handle_panel_session(raw_stream: TcpStream, peer_addr: SocketAddr, bus: MessageBus) {
    match run_session(raw_stream, peer_addr, bus).await {
        Ok(()) => info!("panel {peer_addr} disconnected"),
        Err(e) => warn!("panel {peer_addr} closed with error: {e:#}"),
    }
}

async fn run_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    bus: MessageBus,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(raw_stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    let session_id = Uuid::new_v4();
    info!("session {session_id} established with {peer_addr}");

    // Subscribe before spawning so nothing published during setup is missed.
    let mut ui_rx = bus.subscribe_ui();
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    // ── Bus → Panel ───────────────────────────────────────────────────────────
    let mut bus_to_panel = tokio::spawn(async move {
        loop {
            match ui_rx.recv().await {
                Ok(event) => {
                    if ws_tx.send(WsMessage::Text(encode_frame(&event))).await.is_err() {
                        debug!("session {session_id}: send failed (panel gone)");
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("session {session_id}: panel too slow, {skipped} event(s) dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // ── Panel → Bus ───────────────────────────────────────────────────────────
    let mut panel_to_bus = tokio::spawn(async move {
        loop {
            let ws_msg = match ws_rx.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(WsError::ConnectionClosed | WsError::Protocol(_))) => break,
                Some(Err(e)) => {
                    warn!("session {session_id}: WebSocket error: {e}");
                    break;
                }
                None => break,
            };

            match ws_msg {
                WsMessage::Text(text) => match decode_frame(&text) {
                    Ok(event) => {
                        debug!("session {session_id}: frame for `{}`", event.topic);
                        bus.publish_inbound(event.topic, event.payload);
                    }
                    Err(e) => warn!("session {session_id}: invalid frame: {e}"),
                },
                WsMessage::Close(_) => break,
                WsMessage::Binary(_) => {
                    warn!("session {session_id}: unexpected binary frame (ignored)");
                }
                WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => {}
            }
        }
    });

    tokio::select! {
        _ = &mut bus_to_panel => debug!("session {session_id}: bus→panel task ended"),
        _ = &mut panel_to_bus => debug!("session {session_id}: panel→bus task ended"),
    }
    // The survivor holds a bus subscription or the socket; stop it now.
    bus_to_panel.abort();
    panel_to_bus.abort();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_frame_splits_target_from_payload() {
        let event = decode_frame(
            r#"{"target":"akai_amp","kind":"StatusQuery","clientId":"c1","attribute":"power"}"#,
        )
        .unwrap();

        assert_eq!(event.topic, "akai_amp");
        assert_eq!(
            event.payload,
            json!({"kind": "StatusQuery", "clientId": "c1", "attribute": "power"})
        );
    }

    #[test]
    fn test_decode_frame_requires_target() {
        assert!(decode_frame(r#"{"kind":"StatusQuery"}"#).is_err());
        assert!(decode_frame("not json").is_err());
    }

    #[test]
    fn test_encode_frame_flattens_object_payload() {
        let event = BusEvent::new("akai_amp", json!({"kind": "Completion", "clientId": "c1"}));

        let frame: Value = serde_json::from_str(&encode_frame(&event)).unwrap();

        assert_eq!(
            frame,
            json!({"target": "akai_amp", "kind": "Completion", "clientId": "c1"})
        );
    }

    #[test]
    fn test_encode_frame_keeps_topic_over_payload_target() {
        let event = BusEvent::new("akai_amp", json!({"target": "elsewhere"}));

        let frame: Value = serde_json::from_str(&encode_frame(&event)).unwrap();

        assert_eq!(frame["target"], "akai_amp");
    }

    #[test]
    fn test_encode_frame_wraps_scalar_payload() {
        let event = BusEvent::new("general", json!("ready"));

        let frame: Value = serde_json::from_str(&encode_frame(&event)).unwrap();

        assert_eq!(frame, json!({"target": "general", "content": "ready"}));
    }
}
