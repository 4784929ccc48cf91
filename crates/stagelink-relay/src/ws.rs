//! WebSocket handler: per-client socket loop and event fan-out

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use stagelink_core::{validate_upload, ClientEvent, ClientId, ServerEvent};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// WebSocket upgrade handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let client = ClientId::new();
    let (mut sender, mut receiver) = socket.split();
    let mut relay_events = state.subscribe();

    info!(client = %client, "WebSocket client connected");

    loop {
        tokio::select! {
            // Forward relay events to this client
            event = relay_events.recv() => {
                match event {
                    Ok(relay_event) => {
                        // Skip events that originated on this connection
                        if relay_event.from == Some(client) {
                            continue;
                        }
                        if send_event(&mut sender, &relay_event.event).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        debug!(client = %client, skipped = n, "Relay event channel lagged");
                        // Continue - lagging is not fatal
                    }
                    Err(e) => {
                        debug!(client = %client, error = %e, "Relay event channel error");
                        break;
                    }
                }
            }

            // Handle incoming messages from the client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        // Keepalive before JSON dispatch
                        if text.as_str() == "ping" {
                            if send_event(&mut sender, &ServerEvent::Pong).await.is_err() {
                                break;
                            }
                            continue;
                        }

                        let event = match ClientEvent::from_json(text.as_str()) {
                            Ok(event) => event,
                            Err(e) => {
                                warn!(client = %client, error = %e, "Unparseable client event");
                                continue;
                            }
                        };

                        if handle_event(&state, client, event, &mut sender).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(client = %client, error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    // Transport teardown is the only release path for the control slot
    state.release_control(client).await;
    info!(client = %client, "WebSocket client disconnected");
}

type WsSender = futures_util::stream::SplitSink<WebSocket, Message>;

async fn send_event(sender: &mut WsSender, event: &ServerEvent) -> Result<(), ()> {
    match event.to_json() {
        Ok(json) => sender.send(Message::Text(json.into())).await.map_err(|_| ()),
        Err(e) => {
            warn!(error = %e, "Failed to serialize server event");
            Ok(())
        }
    }
}

/// Dispatch one parsed client event. Returns Err when the socket is gone.
async fn handle_event(
    state: &Arc<AppState>,
    client: ClientId,
    event: ClientEvent,
    sender: &mut WsSender,
) -> Result<(), ()> {
    match event {
        ClientEvent::RequestControl => {
            let verdict = if state.request_control(client).await {
                ServerEvent::ControlGranted
            } else {
                ServerEvent::ControlDenied
            };
            send_event(sender, &verdict).await?;
        }

        ClientEvent::CameraUpdate(pose) => {
            if state.is_holder(client).await {
                state.broadcast(Some(client), ServerEvent::CameraUpdate(pose));
            } else {
                warn!(client = %client, "camera_update from non-holder dropped");
            }
        }

        ClientEvent::SettingsUpdate(snapshot) => {
            if state.is_holder(client).await {
                state.broadcast(Some(client), ServerEvent::SettingsUpdate(snapshot));
            } else {
                warn!(client = %client, "settings_update from non-holder dropped");
            }
        }

        ClientEvent::SettingsUpdateLocal(snapshot) => {
            if state.is_holder(client).await {
                state.broadcast(Some(client), ServerEvent::SettingsUpdateLocal(snapshot));
            } else {
                warn!(client = %client, "settings_update_local from non-holder dropped");
            }
        }

        ClientEvent::GetFiles => {
            let models = state.store.list(&state.config.public_url()).await;
            send_event(sender, &ServerEvent::FilesList(models)).await?;
        }

        ClientEvent::RequestPresignedUrl { file_name, file_type } => {
            debug!(client = %client, file = %file_name, file_type = %file_type, "Presign requested");
            let existing = state.store.names().await;
            let reply = match validate_upload(&file_name, 0, &existing) {
                Ok(()) => {
                    let token = state.presigner.issue(&file_name);
                    ServerEvent::PresignedUrl {
                        upload_url: format!(
                            "{}/api/presigned/{}",
                            state.config.public_url(),
                            token
                        ),
                        file_name,
                    }
                }
                Err(e) => ServerEvent::PresignedUrlError {
                    message: e.to_string(),
                },
            };
            send_event(sender, &reply).await?;
        }

        ClientEvent::UploadComplete { file_name, author, folder } => {
            match state
                .store
                .register(&file_name, author.clone(), folder)
                .await
            {
                Ok(()) => {
                    let model_url = format!(
                        "{}/models/{}",
                        state.config.public_url(),
                        file_name
                    );
                    // Everyone, including the uploader, refreshes its catalog
                    state.broadcast(
                        None,
                        ServerEvent::ModelUploaded {
                            file_name,
                            model_url,
                            author,
                        },
                    );
                }
                Err(e) => {
                    warn!(client = %client, model = %file_name, error = %e, "upload_complete for unknown file");
                }
            }
        }

        ClientEvent::ModelSwitch { index } => {
            state.broadcast(Some(client), ServerEvent::ModelSwitch { index });
        }
    }

    Ok(())
}
