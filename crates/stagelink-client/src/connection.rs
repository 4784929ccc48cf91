//! Auto-reconnecting relay connection
//!
//! One `RelayConnection` per process connects to the relay's `/ws`
//! endpoint, retries with a fixed delay when the transport drops, and
//! exposes named-event emit/subscribe. There is no queueing or delivery
//! guarantee: events emitted while disconnected are dropped with a debug
//! log, matching the browser clients this replaces.

use futures_util::{SinkExt, StreamExt};
use stagelink_core::{ClientEvent, ServerEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Connection behavior knobs
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Delay between reconnect attempts
    pub reconnect_delay: Duration,
    /// Maximum number of connect attempts; `None` retries forever
    pub max_retries: Option<u32>,
    /// Capacity of the inbound event channel
    pub channel_capacity: usize,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(1),
            max_retries: None,
            channel_capacity: 100,
        }
    }
}

/// Handle to the background connection task
pub struct RelayConnection {
    outbound: mpsc::Sender<ClientEvent>,
    inbound: broadcast::Sender<ServerEvent>,
    connected: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl RelayConnection {
    /// Spawn the connection task against a `ws://host:port/ws` URL.
    /// Returns immediately; the first connect happens in the background.
    pub fn connect(url: impl Into<String>, options: ConnectOptions) -> Self {
        let url = url.into();
        let (outbound, outbound_rx) = mpsc::channel(options.channel_capacity);
        let (inbound, _) = broadcast::channel(options.channel_capacity);
        let connected = Arc::new(AtomicBool::new(false));

        let task = tokio::spawn(connection_task(
            url,
            options,
            outbound_rx,
            inbound.clone(),
            connected.clone(),
        ));

        Self {
            outbound,
            inbound,
            connected,
            task,
        }
    }

    /// Emit an event to the relay. Silently dropped (debug-logged) while
    /// disconnected or when the outbound buffer is full.
    pub fn emit(&self, event: ClientEvent) {
        if !self.is_connected() {
            debug!(?event, "Dropping event while disconnected");
            return;
        }
        if let Err(e) = self.outbound.try_send(event) {
            debug!(error = %e, "Dropping event, outbound buffer full");
        }
    }

    /// Subscribe to events delivered by the relay
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.inbound.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Wait until the transport is up, or give up after `timeout`
    pub async fn wait_connected(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.is_connected() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.is_connected()
    }
}

impl Drop for RelayConnection {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn connection_task(
    url: String,
    options: ConnectOptions,
    mut outbound: mpsc::Receiver<ClientEvent>,
    inbound: broadcast::Sender<ServerEvent>,
    connected: Arc<AtomicBool>,
) {
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        match connect_async(&url).await {
            Ok((stream, _)) => {
                info!(url = %url, "Connected to relay");
                connected.store(true, Ordering::SeqCst);
                attempts = 0;

                run_socket(stream, &mut outbound, &inbound).await;

                connected.store(false, Ordering::SeqCst);
                info!(url = %url, "Disconnected from relay");
            }
            Err(e) => {
                debug!(url = %url, attempt = attempts, error = %e, "Relay connect failed");
            }
        }

        if let Some(max) = options.max_retries {
            if attempts >= max {
                warn!(url = %url, attempts, "Giving up on relay connection");
                return;
            }
        }
        tokio::time::sleep(options.reconnect_delay).await;
    }
}

/// Pump one live socket until it closes or errors
async fn run_socket(
    stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    outbound: &mut mpsc::Receiver<ClientEvent>,
    inbound: &broadcast::Sender<ServerEvent>,
) {
    let (mut sender, mut receiver) = stream.split();

    loop {
        tokio::select! {
            event = outbound.recv() => {
                match event {
                    Some(event) => {
                        let json = match event.to_json() {
                            Ok(json) => json,
                            Err(e) => {
                                warn!(error = %e, "Failed to serialize client event");
                                continue;
                            }
                        };
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            return;
                        }
                    }
                    // Connection handle dropped
                    None => return,
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match ServerEvent::from_json(text.as_str()) {
                            Ok(event) => {
                                // Only fails with no subscribers, which is fine
                                let _ = inbound.send(event);
                            }
                            Err(e) => {
                                warn!(error = %e, "Unparseable server event");
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return,
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        return;
                    }
                    _ => {}
                }
            }
        }
    }
}
