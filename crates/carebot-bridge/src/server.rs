//! [`BridgeServer`] – WebSocket hub between external clients and the engine.
//!
//! Each connection is bidirectional: stamped events from the [`Emitter`]'s
//! broadcast bus flow out to every client, inbound text frames are parsed as
//! [`CommandEnvelope`]s and pushed onto the engine's command queue. Scope
//! filtering is the engine's job; the bridge forwards everything that
//! parses.

use std::net::SocketAddr;

use carebot_engine::{Emitter, CAPABILITIES};
use carebot_types::{CarebotError, CommandEnvelope, OutgoingEvent};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default TCP port for the command/event WebSocket.
pub const DEFAULT_PORT: u16 = 8765;

pub struct BridgeServer {
    emitter: Emitter,
    commands: mpsc::UnboundedSender<CommandEnvelope>,
    port: u16,
}

impl BridgeServer {
    pub fn new(emitter: Emitter, commands: mpsc::UnboundedSender<CommandEnvelope>) -> Self {
        Self {
            emitter,
            commands,
            port: DEFAULT_PORT,
        }
    }

    /// Override the listening port (builder-style).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Bind and serve until `shutdown` fires.
    ///
    /// # Errors
    ///
    /// Returns [`CarebotError::Channel`] if the TCP listener cannot bind.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), CarebotError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| CarebotError::Channel(format!("bind error on {addr}: {e}")))?;
        info!(%addr, "bridge listening");
        self.serve(listener, shutdown).await;
        Ok(())
    }

    /// Accept loop over an already-bound listener. Tests bind port 0 and
    /// call this directly.
    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("bridge shutting down");
                    return;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let emitter = self.emitter.clone();
                        let commands = self.commands.clone();
                        let token = shutdown.clone();
                        tokio::spawn(async move {
                            if let Err(e) =
                                handle_connection(stream, peer, emitter, commands, token).await
                            {
                                debug!(%peer, error = %e, "client connection ended");
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "accept error"),
                },
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    emitter: Emitter,
    commands: mpsc::UnboundedSender<CommandEnvelope>,
    shutdown: CancellationToken,
) -> Result<(), CarebotError> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| CarebotError::Channel(format!("WS handshake from {peer}: {e}")))?;
    debug!(%peer, "client connected");

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    // Subscribe before the hello so no event can slip between them.
    let mut bus_rx = emitter.subscribe();

    let hello = emitter.stamp(emitter.hello_event(&CAPABILITIES));
    send_json(&mut ws_tx, &hello).await?;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,

            // Downstream: event bus → client.
            result = bus_rx.recv() => match result {
                Ok(stamped) => {
                    if send_json(&mut ws_tx, &stamped).await.is_err() {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!(%peer, lagged = n, "client fell behind, events skipped");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },

            // Upstream: client → command queue.
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<CommandEnvelope>(text.as_str()) {
                        Ok(envelope) => {
                            if commands.send(envelope).is_err() {
                                // Engine is gone, nothing left to serve.
                                break;
                            }
                        }
                        Err(e) => {
                            debug!(%peer, error = %e, "unparseable frame");
                            // Reply only to the offending client.
                            let reply = emitter.stamp(OutgoingEvent::Error {
                                error: "invalid_json".to_string(),
                                command: None,
                            });
                            if send_json(&mut ws_tx, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(_)) => break,
                _ => {}
            },
        }
    }

    debug!(%peer, "client disconnected");
    Ok(())
}

async fn send_json<S, T>(ws_tx: &mut S, value: &T) -> Result<(), CarebotError>
where
    S: SinkExt<Message> + Unpin,
    T: serde::Serialize,
{
    let json = serde_json::to_string(value)
        .map_err(|e| CarebotError::Channel(format!("serialize: {e}")))?;
    ws_tx
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| CarebotError::Channel("client write failed".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use carebot_types::{RobotId, Stamped};
    use futures_util::StreamExt;
    use tokio_tungstenite::connect_async;

    async fn start_server() -> (
        SocketAddr,
        Emitter,
        mpsc::UnboundedReceiver<CommandEnvelope>,
        CancellationToken,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let emitter = Emitter::new(RobotId::Left);
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let server = BridgeServer::new(emitter.clone(), tx);
        tokio::spawn(server.serve(listener, shutdown.clone()));
        (addr, emitter, rx, shutdown)
    }

    async fn next_text(
        ws: &mut (impl StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
              + Unpin),
    ) -> String {
        loop {
            match ws.next().await.unwrap().unwrap() {
                Message::Text(text) => return text.to_string(),
                _ => continue,
            }
        }
    }

    #[tokio::test]
    async fn client_receives_hello_then_broadcast_events() {
        let (addr, emitter, _rx, shutdown) = start_server().await;
        let (mut ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();

        let hello: Stamped = serde_json::from_str(&next_text(&mut ws).await).unwrap();
        assert!(matches!(
            hello.event,
            OutgoingEvent::Hello { ref agent, .. } if agent == "carebot"
        ));

        emitter.ack("hug");
        let acked: Stamped = serde_json::from_str(&next_text(&mut ws).await).unwrap();
        assert!(matches!(
            acked.event,
            OutgoingEvent::Ack { ref command, .. } if command == "hug"
        ));

        shutdown.cancel();
    }

    #[tokio::test]
    async fn inbound_text_is_queued_as_an_envelope() {
        let (addr, _emitter, mut rx, shutdown) = start_server().await;
        let (mut ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        let _hello = next_text(&mut ws).await;

        ws.send(Message::Text(
            r#"{"type":"command","command":"hug","robot_id":"robot_left"}"#.into(),
        ))
        .await
        .unwrap();

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.command, "hug");
        assert_eq!(envelope.robot_id.as_deref(), Some("robot_left"));

        shutdown.cancel();
    }

    #[tokio::test]
    async fn invalid_json_gets_an_error_reply_and_no_envelope() {
        let (addr, _emitter, mut rx, shutdown) = start_server().await;
        let (mut ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        let _hello = next_text(&mut ws).await;

        ws.send(Message::Text("not json {".into())).await.unwrap();

        let reply: Stamped = serde_json::from_str(&next_text(&mut ws).await).unwrap();
        assert!(matches!(
            reply.event,
            OutgoingEvent::Error { ref error, .. } if error == "invalid_json"
        ));
        assert!(rx.try_recv().is_err());

        shutdown.cancel();
    }

    #[tokio::test]
    async fn every_client_sees_every_event() {
        let (addr, emitter, _rx, shutdown) = start_server().await;
        let (mut a, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        let (mut b, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        let _ = next_text(&mut a).await;
        let _ = next_text(&mut b).await;

        emitter.result_completed("init_pose", "init_completed");
        let ea: Stamped = serde_json::from_str(&next_text(&mut a).await).unwrap();
        let eb: Stamped = serde_json::from_str(&next_text(&mut b).await).unwrap();
        assert_eq!(ea.event, eb.event);

        shutdown.cancel();
    }
}
