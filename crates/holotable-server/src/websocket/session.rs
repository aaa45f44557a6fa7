//! One socket's lifetime: join the group, feed inbound events to the bus,
//! write outbound frames, announce the departure.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use holotable_core::messages::now_timestamp;
use metrics::{counter, gauge, histogram};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::ClientConnection;
use crate::bus::{MessageBus, Outcome};
use crate::config::ServerConfig;
use crate::metrics::{
    BUS_EVENTS_DROPPED_TOTAL, WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE,
    WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL,
};

/// Reply to a greeting frame.
pub fn greeting(client_name: &str) -> String {
    format!("Hello Client #{client_name}")
}

/// Sent to the group when a client leaves.
pub fn farewell(client_name: &str) -> String {
    format!("Client #{client_name} left the chat")
}

/// Parse an inbound frame and stamp it with the connection's identity and the server clock.
///
/// Returns `None` for text that is not a JSON object.
pub fn stamp(text: &str, group_name: &str, client_name: &str) -> Option<Value> {
    let mut payload: Value = serde_json::from_str(text).ok()?;
    let object = payload.as_object_mut()?;
    let _ = object.insert("author".into(), Value::from(client_name));
    let _ = object.insert("group_name".into(), Value::from(group_name));
    let _ = object.insert("created_at".into(), Value::from(now_timestamp()));
    Some(payload)
}

/// Handle one inbound text frame. Frames are handled strictly one at a time.
pub async fn handle_text(
    text: &str,
    connection: &ClientConnection,
    bus: &MessageBus,
    config: &ServerConfig,
) {
    if text.starts_with(config.greeting_prefix.as_str()) {
        if !bus
            .registry()
            .send_direct(connection, &greeting(&connection.client_name))
        {
            info!("failed to enqueue greeting");
        }
        return;
    }

    let Some(payload) = stamp(text, &connection.group_name, &connection.client_name) else {
        counter!(BUS_EVENTS_DROPPED_TOTAL, "reason" => "malformed").increment(1);
        warn!(len = text.len(), "ignoring frame that is not a JSON object");
        return;
    };

    match bus.process(payload).await {
        Ok(Outcome::Delivered { message_type, recipients, .. }) => {
            debug!(%message_type, recipients, "event delivered");
        }
        Ok(Outcome::Dropped(reason)) => {
            debug!(%reason, "event dropped");
        }
        Err(e) => {
            warn!(error = %e, "event rejected");
        }
    }
}

/// Run a socket from upgrade to disconnect.
///
/// 1. Registers the socket in its group
/// 2. Answers greetings and hands every other frame to the bus
/// 3. Forwards queued frames and sends periodic Pings, closing unresponsive or
///    evicted clients
/// 4. Unregisters and tells the group the client left
#[instrument(skip_all, fields(group = %group_name, client = %client_name))]
pub async fn run_ws_session(
    ws: WebSocket,
    group_name: String,
    client_name: String,
    bus: Arc<MessageBus>,
    config: Arc<ServerConfig>,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(config.outbound_buffer.max(1));
    let connection = Arc::new(ClientConnection::new(
        client_name.clone(),
        group_name.clone(),
        send_tx,
    ));
    let registry = Arc::clone(bus.registry());

    let connection_start = Instant::now();
    info!(conn_id = %connection.id, "client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);
    registry.connect(Arc::clone(&connection));

    let outbound_conn = Arc::clone(&connection);
    let ping_every = config.ping_interval();
    let pong_timeout = config.pong_timeout();
    let mut outbound = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(ping_every);
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    let Some(text) = msg else { break };
                    if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                        break;
                    }
                }
                () = outbound_conn.closed() => {
                    info!("closing evicted socket");
                    break;
                }
                _ = ping_interval.tick() => {
                    if !outbound_conn.check_alive() && outbound_conn.last_pong_elapsed() > pong_timeout {
                        warn!("client unresponsive for {pong_timeout:?}, disconnecting");
                        break;
                    }
                    if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = ws_tx.close().await;
    });

    loop {
        let msg = tokio::select! {
            msg = ws_rx.next() => msg,
            _ = &mut outbound => {
                debug!("writer finished");
                break;
            }
            () = shutdown.cancelled() => {
                info!("server shutting down, closing socket");
                break;
            }
        };
        let Some(Ok(msg)) = msg else { break };

        let text = match msg {
            Message::Text(t) => Some(t.as_str().to_owned()),
            Message::Binary(data) => {
                if let Ok(s) = std::str::from_utf8(&data) {
                    Some(s.to_owned())
                } else {
                    info!(len = data.len(), "received non-UTF8 binary frame");
                    None
                }
            }
            Message::Close(_) => {
                info!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {
                connection.mark_alive();
                None
            }
        };
        let Some(text) = text else { continue };
        connection.mark_alive();
        handle_text(&text, &connection, &bus, &config).await;
    }

    info!(age_secs = connection.age().as_secs(), "client disconnected");
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection_start.elapsed().as_secs_f64());
    outbound.abort();
    let _ = registry.disconnect(&connection);
    let report = registry.broadcast(&group_name, &farewell(&client_name));
    debug!(recipients = report.recipients, "farewell sent");
}
