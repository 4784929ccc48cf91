//! Application state: control arbitration and event fan-out

use stagelink_core::{ClientId, ServerEvent};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

use crate::config::Config;
use crate::presign::Presigner;
use crate::store::{ModelStore, StoreError};

/// An event on the fan-out channel
///
/// `from` identifies the originating connection so its own socket loop can
/// skip it; `None` means deliver to every client.
#[derive(Debug, Clone)]
pub struct RelayEvent {
    pub from: Option<ClientId>,
    pub event: ServerEvent,
}

/// Shared application state
pub struct AppState {
    /// The single-writer slot: at most one controller at a time
    controller: RwLock<Option<ClientId>>,
    /// Event broadcast for WebSocket clients
    pub events: broadcast::Sender<RelayEvent>,
    /// Uploaded model files and metadata
    pub store: ModelStore,
    /// Upload token signer
    pub presigner: Presigner,
    /// Configuration
    pub config: Config,
}

impl AppState {
    /// Create new application state
    pub fn new(config: Config) -> Result<Arc<Self>, StoreError> {
        let store = ModelStore::open(&config.models.path)?;
        let presigner = Presigner::new(&config.presign.secret, config.presign.expiry_secs);
        let (events, _) = broadcast::channel(config.relay.channel_capacity);

        Ok(Arc::new(Self {
            controller: RwLock::new(None),
            events,
            store,
            presigner,
            config,
        }))
    }

    /// Arbitrate a control request. The first requester wins; anyone else
    /// is denied while the slot is held. Re-requests by the current holder
    /// are re-granted.
    pub async fn request_control(&self, client: ClientId) -> bool {
        let mut controller = self.controller.write().await;
        match *controller {
            None => {
                *controller = Some(client);
                info!(client = %client, "Control granted");
                true
            }
            Some(holder) if holder == client => true,
            Some(holder) => {
                info!(client = %client, holder = %holder, "Control denied");
                false
            }
        }
    }

    /// Release the slot if `client` holds it. Called on disconnect; the
    /// protocol has no explicit release event.
    pub async fn release_control(&self, client: ClientId) {
        let mut controller = self.controller.write().await;
        if *controller == Some(client) {
            *controller = None;
            info!(client = %client, "Control released");
        }
    }

    /// The current holder of the single-writer slot
    pub async fn holder(&self) -> Option<ClientId> {
        *self.controller.read().await
    }

    /// True if `client` currently holds control
    pub async fn is_holder(&self, client: ClientId) -> bool {
        *self.controller.read().await == Some(client)
    }

    /// Publish an event to connected clients
    pub fn broadcast(&self, from: Option<ClientId>, event: ServerEvent) {
        // Send only fails when no client is subscribed, which is fine
        if let Err(e) = self.events.send(RelayEvent { from, event }) {
            debug!(error = %e, "No subscribers for relay event");
        }
    }

    /// Subscribe to relay events
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.events.subscribe()
    }
}
